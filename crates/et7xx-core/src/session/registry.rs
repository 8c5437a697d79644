//! Device number allocation
//!
//! Each probed sensor gets a minor number under [`ET7XX_MAJOR`]. The
//! registry is an ordinary object owned by whoever manages device
//! lifecycle; there is no process-wide list.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};

/// Character device major number
pub const ET7XX_MAJOR: u32 = 152;

/// Number of minors available
pub const N_SPI_MINORS: u32 = 32;

/// Major/minor pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceNumber {
    /// Major number
    pub major: u32,
    /// Minor number
    pub minor: u32,
}

impl core::fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

struct Slots<D> {
    minors: u32,
    devices: BTreeMap<u32, Arc<D>>,
}

/// Minor-number bitmap plus the devices registered under it
pub struct DeviceRegistry<D> {
    slots: Mutex<Slots<D>>,
}

impl<D> Default for DeviceRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DeviceRegistry<D> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                minors: 0,
                devices: BTreeMap::new(),
            }),
        }
    }

    /// Register a device under the lowest free minor
    ///
    /// Fails with `ResourceExhausted` once all minors are taken.
    pub fn register(&self, device: D) -> Result<(DeviceNumber, Arc<D>)> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let minor = (!slots.minors).trailing_zeros();
        if minor >= N_SPI_MINORS {
            log::warn!("et7xx: no free minor numbers");
            return Err(Error::ResourceExhausted);
        }
        slots.minors |= 1 << minor;
        let device = Arc::new(device);
        slots.devices.insert(minor, Arc::clone(&device));

        let number = DeviceNumber {
            major: ET7XX_MAJOR,
            minor,
        };
        log::debug!("et7xx: registered device {}", number);
        Ok((number, device))
    }

    /// Find the device registered under `minor`
    pub fn lookup(&self, minor: u32) -> Option<Arc<D>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.devices.get(&minor).cloned()
    }

    /// Remove the device under `minor` and free the number
    pub fn unregister(&self, minor: u32) -> Option<Arc<D>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let device = slots.devices.remove(&minor)?;
        slots.minors &= !(1 << minor);
        log::debug!("et7xx: unregistered device {}:{}", ET7XX_MAJOR, minor);
        Some(device)
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.devices.len()
    }

    /// True when no device is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minors_allocated_lowest_first() {
        let registry = DeviceRegistry::new();
        let (a, _) = registry.register("a").unwrap();
        let (b, _) = registry.register("b").unwrap();
        assert_eq!(a, DeviceNumber { major: 152, minor: 0 });
        assert_eq!(b.minor, 1);

        registry.unregister(0).unwrap();
        let (c, _) = registry.register("c").unwrap();
        assert_eq!(c.minor, 0);
        assert_eq!(*registry.lookup(0).unwrap(), "c");
    }

    #[test]
    fn test_exhaustion() {
        let registry = DeviceRegistry::new();
        for i in 0..N_SPI_MINORS {
            registry.register(i).unwrap();
        }
        assert_eq!(registry.len(), 32);
        assert!(matches!(registry.register(99), Err(Error::ResourceExhausted)));
    }

    #[test]
    fn test_unregister_unknown_minor() {
        let registry: DeviceRegistry<u8> = DeviceRegistry::new();
        assert!(registry.unregister(5).is_none());
        assert!(registry.lookup(5).is_none());
        assert!(registry.is_empty());
    }
}
