//! Audit event types for structured logging.
//!
//! These events are logged to syslog with the `SUPPLICANT_LINK` tag.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Control-channel and daemon lifecycle events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Control channel opened and attached.
    ChannelOpen {
        /// Daemon endpoint path.
        path: String,
    },

    /// Control channel closed.
    ChannelClose {
        /// Daemon endpoint path.
        path: String,
    },

    /// A command got no reply in time.
    CommandTimeout {
        /// Daemon endpoint path.
        path: String,
        /// Command verb.
        command: String,
    },

    /// The event stream ended.
    MonitorTerminated {
        /// Daemon endpoint path.
        path: String,
        /// Why the stream ended.
        reason: String,
    },

    /// Supplicant service started.
    SupplicantStart {
        /// Service name.
        service: String,
    },

    /// Supplicant service stopped.
    SupplicantStop {
        /// Service name.
        service: String,
    },
}

/// Wrapper for serializing events with timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// ISO8601 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The event, flattened.
    #[serde(flatten)]
    pub event: &'a AuditEvent,
}

impl AuditEvent {
    /// Wrap this event with the current time.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }
}
