//! Audit logging for control-channel activity.
//!
//! Two separate sinks:
//!
//! - **Audit** (syslog, tag `SUPPLICANT_LINK`): one JSON line per lifecycle
//!   event (channel open/close, command timeout, monitor termination,
//!   daemon start/stop).
//! - **Debug** (`tracing`): everything else, to stderr.
//!
//! ```json
//! {"ts":"2026-01-07T14:32:01Z","event":"command_timeout","path":"/var/run/wpa_supplicant/wlan0","command":"SCAN"}
//! ```
//!
//! [`record`] is safe to call before [`init_logger`]; events are then
//! dropped.

mod error;
mod events;
mod syslog;

pub use error::TelemetryError;
pub use events::{AuditEvent, TimestampedEvent};
pub use syslog::{AuditLogger, SYSLOG_TAG, init_logger, init_null_logger, record, try_audit};
