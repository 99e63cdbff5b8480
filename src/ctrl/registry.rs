//! Interface name to channel slot mapping.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::channel::ControlChannel;

/// Logical channel slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSlot {
    /// Station interface.
    Primary,
    /// P2P or other secondary interface.
    Secondary,
}

impl ChannelSlot {
    /// Number of slots.
    pub const COUNT: usize = 2;

    /// All slots in index order.
    pub const ALL: [ChannelSlot; Self::COUNT] = [ChannelSlot::Primary, ChannelSlot::Secondary];

    /// Slot for `ifname` given the primary interface name.
    ///
    /// `None` and any name starting with `primary` map to
    /// [`ChannelSlot::Primary`]; everything else to [`ChannelSlot::Secondary`].
    pub fn for_interface(primary: &str, ifname: Option<&str>) -> Self {
        match ifname {
            Some(name) if !name.starts_with(primary) => ChannelSlot::Secondary,
            _ => ChannelSlot::Primary,
        }
    }

    fn index(self) -> usize {
        match self {
            ChannelSlot::Primary => 0,
            ChannelSlot::Secondary => 1,
        }
    }
}

impl fmt::Display for ChannelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSlot::Primary => write!(f, "primary"),
            ChannelSlot::Secondary => write!(f, "secondary"),
        }
    }
}

/// Owns the channel of every slot.
///
/// Channels are handed out as `Arc`s so a reader can block on one without
/// holding the slot table.
#[derive(Debug)]
pub struct InterfaceRegistry {
    primary_iface: String,
    slots: Mutex<[Option<Arc<ControlChannel>>; ChannelSlot::COUNT]>,
}

impl InterfaceRegistry {
    /// Create an empty registry for the given primary interface name.
    pub fn new(primary_iface: impl Into<String>) -> Self {
        Self {
            primary_iface: primary_iface.into(),
            slots: Mutex::new([None, None]),
        }
    }

    /// The configured primary interface name.
    pub fn primary_iface(&self) -> &str {
        &self.primary_iface
    }

    /// Map an interface name to its slot.
    pub fn resolve(&self, ifname: Option<&str>) -> ChannelSlot {
        ChannelSlot::for_interface(&self.primary_iface, ifname)
    }

    /// The channel currently in `slot`.
    pub fn channel(&self, slot: ChannelSlot) -> Option<Arc<ControlChannel>> {
        self.lock()[slot.index()].clone()
    }

    /// Put `channel` into `slot`, returning the channel it replaced.
    pub fn install(&self, slot: ChannelSlot, channel: ControlChannel) -> Option<Arc<ControlChannel>> {
        debug!("Installing {:?} into {} slot", channel.path(), slot);
        self.lock()[slot.index()].replace(Arc::new(channel))
    }

    /// Remove and return the channel in `slot`.
    pub fn take(&self, slot: ChannelSlot) -> Option<Arc<ControlChannel>> {
        self.lock()[slot.index()].take()
    }

    /// Close and remove every channel.
    pub fn close_all(&self) {
        for slot in ChannelSlot::ALL {
            if let Some(channel) = self.take(slot) {
                channel.close();
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, [Option<Arc<ControlChannel>>; ChannelSlot::COUNT]> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
