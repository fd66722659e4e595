//! LED registry seam: where per-zone control points are published.
//!
//! An attached device registers one [`LedHandle`] per zone, named
//! `"<device-instance>::<zone-name>"`. Whoever owns the registry delivers
//! brightness/color writes through [`LedHandle::set_brightness`].

use std::collections::BTreeMap;
use std::fmt;

use crate::session::SessionHandle;
use crate::zones::ZoneId;

/// A registry refused a control point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryError(pub String);

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LED registration failed: {}", self.0)
    }
}

impl std::error::Error for RegistryError {}

/// Where control points are registered.
pub trait LedRegistry {
    fn register(&mut self, led: LedHandle) -> Result<(), RegistryError>;
    fn unregister(&mut self, name: &str);
}

/// One addressable control point, bound directly to its zone slot.
#[derive(Clone)]
pub struct LedHandle {
    name: String,
    zone: ZoneId,
    session: SessionHandle,
}

impl fmt::Debug for LedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedHandle")
            .field("name", &self.name)
            .field("zone", &self.zone)
            .finish()
    }
}

impl LedHandle {
    pub fn new(name: String, zone: ZoneId, session: SessionHandle) -> Self {
        Self {
            name,
            zone,
            session,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn zone(&self) -> ZoneId {
        self.zone
    }

    /// Fire-and-forget: queue the value and schedule a device update.
    pub fn set_brightness(&self, value: u16) {
        if let Err(e) = self.session.set_pending(self.zone, value) {
            log::warn!("{}: {e}, request ignored", self.name);
        }
    }

    /// Value queued but not yet sent, if any.
    pub fn pending(&self) -> Option<u16> {
        self.session.zones().pending(self.zone)
    }
}

/// In-process registry keyed by control point name.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    leds: BTreeMap<String, LedHandle>,
    limit: Option<usize>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that refuses registrations beyond `limit` entries.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            leds: BTreeMap::new(),
            limit: Some(limit),
        }
    }

    pub fn get(&self, name: &str) -> Option<&LedHandle> {
        self.leds.get(name)
    }

    /// Find by zone name alone, ignoring the instance prefix.
    pub fn find_zone(&self, zone_name: &str) -> Option<&LedHandle> {
        self.leds.values().find(|h| {
            h.name
                .rsplit_once("::")
                .is_some_and(|(_, z)| z.eq_ignore_ascii_case(zone_name))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.leds.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }
}

impl LedRegistry for MemoryRegistry {
    fn register(&mut self, led: LedHandle) -> Result<(), RegistryError> {
        if self.leds.contains_key(&led.name) {
            return Err(RegistryError(format!("{}: already registered", led.name)));
        }
        if self.limit.is_some_and(|limit| self.leds.len() >= limit) {
            return Err(RegistryError(format!("{}: registry full", led.name)));
        }
        self.leds.insert(led.name.clone(), led);
        Ok(())
    }

    fn unregister(&mut self, name: &str) {
        self.leds.remove(name);
    }
}
