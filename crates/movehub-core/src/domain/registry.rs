//! Port registry: which device type is currently attached to which port.
//!
//! Sensor-data frames carry no description of their payload.  The decoder
//! learns the shape from the device type most recently reported for the
//! port, so the registry must track attach and detach events exactly:
//! a port is present if and only if its latest attach has not been followed
//! by a detach.

use std::collections::HashMap;

use tracing::trace;

use crate::protocol::messages::{DeviceType, Notification, Port, RegistryUpdate};

/// Live port → device-type table.
///
/// All mutation goes through [`upsert`](Self::upsert) and
/// [`remove`](Self::remove).
///
/// # Examples
///
/// ```rust
/// use movehub_core::{DeviceType, Port, PortRegistry};
///
/// let mut registry = PortRegistry::new();
/// registry.upsert(Port::D, DeviceType::ExternalMotor);
/// assert_eq!(registry.lookup(Port::D), Some(DeviceType::ExternalMotor));
/// registry.remove(Port::D);
/// assert_eq!(registry.lookup(Port::D), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortRegistry {
    ports: HashMap<Port, DeviceType>,
}

impl PortRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `port` to `device_type`, replacing any previous mapping.
    ///
    /// Both are stored in canonical form, so a `Port::Other` or
    /// `DeviceType::Other` carrying a named wire byte is kept as the named
    /// variant.  Returns the previous device type, if there was one.
    pub fn upsert(&mut self, port: Port, device_type: DeviceType) -> Option<DeviceType> {
        let port = Port::from_u8(port.as_u8());
        let device_type = DeviceType::from_u8(device_type.as_u8());
        self.ports.insert(port, device_type)
    }

    /// Clears the mapping for `port`.  Removing an unmapped port is a no-op.
    pub fn remove(&mut self, port: Port) -> Option<DeviceType> {
        self.ports.remove(&port)
    }

    /// Returns the device type attached to `port`.
    pub fn lookup(&self, port: Port) -> Option<DeviceType> {
        self.ports.get(&port).copied()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Iterates over all current mappings in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Port, DeviceType)> + '_ {
        self.ports.iter().map(|(port, device_type)| (*port, *device_type))
    }

    /// Applies the registry change carried by `notification`.
    ///
    /// Returns `true` if the notification was an attach or detach event.
    pub fn apply(&mut self, notification: &Notification) -> bool {
        match notification.registry_update() {
            Some(RegistryUpdate::Upsert(port, device_type)) => {
                trace!(%port, ?device_type, "port attached");
                self.upsert(port, device_type);
                true
            }
            Some(RegistryUpdate::Remove(port)) => {
                trace!(%port, "port detached");
                self.remove(port);
                true
            }
            None => false,
        }
    }
}
