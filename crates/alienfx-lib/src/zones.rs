//! Zone table: the named lighting regions of one attached device and the
//! color queued for each.
//!
//! Each zone's pending slot is a single atomic word, so producers and the
//! session worker never take a lock here. [`ZoneTable::set_pending`] is a
//! store and [`ZoneTable::drain_pending`] a swap-and-clear, so a color that
//! races with a drain is either consumed by it or left for the next one,
//! never lost and never sent twice.

use std::collections::TryReserveError;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

use crate::models::ZoneDescriptor;
use crate::protocol::MAX_REGION;

/// Marks an empty pending slot. Colors are 16-bit, so this never collides.
const NO_COLOR: u32 = u32::MAX;

/// Index of a zone in its table, handed out at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub usize);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A set request referenced a zone that is not in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownZone(pub ZoneId);

impl fmt::Display for UnknownZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown zone {}", self.0)
    }
}

impl std::error::Error for UnknownZone {}

pub type Result<T> = std::result::Result<T, UnknownZone>;

/// One lighting region.
#[derive(Debug)]
pub struct Zone {
    name: &'static str,
    region: u32,
    pending: AtomicU32,
}

impl Zone {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A drained `(region, color)` pair, input to the transaction builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneColor {
    pub region: u32,
    pub color: u16,
}

/// Serializable zone summary for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneInfo {
    pub name: String,
    pub region: u32,
}

/// Fixed set of zones for one device instance.
#[derive(Debug)]
pub struct ZoneTable {
    zones: Vec<Zone>,
}

impl ZoneTable {
    /// Build the table from a static per-model descriptor list.
    ///
    /// Declaration order is kept and becomes the order of every drain.
    pub fn from_descriptors(
        descriptors: &[ZoneDescriptor],
    ) -> std::result::Result<Self, TryReserveError> {
        let mut zones = Vec::new();
        zones.try_reserve_exact(descriptors.len())?;
        for d in descriptors {
            debug_assert!(d.region <= MAX_REGION, "zone {} mask exceeds 24 bits", d.name);
            debug_assert!(
                !zones.iter().any(|z: &Zone| z.name == d.name || z.region == d.region),
                "duplicate zone {} / 0x{:04X}",
                d.name,
                d.region
            );
            zones.push(Zone {
                name: d.name,
                region: d.region,
                pending: AtomicU32::new(NO_COLOR),
            });
        }
        Ok(ZoneTable { zones })
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Look a zone up by name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<ZoneId> {
        self.zones
            .iter()
            .position(|z| z.name.eq_ignore_ascii_case(name))
            .map(ZoneId)
    }

    /// Zones with their ids, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (ZoneId, &Zone)> {
        self.zones.iter().enumerate().map(|(i, z)| (ZoneId(i), z))
    }

    pub fn infos(&self) -> Vec<ZoneInfo> {
        self.zones
            .iter()
            .map(|z| ZoneInfo {
                name: z.name.to_string(),
                region: z.region,
            })
            .collect()
    }

    /// Queue `color` for a zone, replacing anything queued before.
    pub fn set_pending(&self, id: ZoneId, color: u16) -> Result<()> {
        let zone = self.zones.get(id.0).ok_or(UnknownZone(id))?;
        zone.pending.store(u32::from(color), Ordering::Release);
        Ok(())
    }

    /// Color currently queued for a zone, without consuming it.
    pub fn pending(&self, id: ZoneId) -> Option<u16> {
        let raw = self.zones.get(id.0)?.pending.load(Ordering::Acquire);
        (raw != NO_COLOR).then_some(raw as u16)
    }

    /// Take every queued color, in declaration order, clearing each slot.
    pub fn drain_pending(&self) -> Vec<ZoneColor> {
        self.zones
            .iter()
            .filter_map(|z| {
                let raw = z.pending.swap(NO_COLOR, Ordering::AcqRel);
                (raw != NO_COLOR).then_some(ZoneColor {
                    region: z.region,
                    color: raw as u16,
                })
            })
            .collect()
    }

    /// Whether any zone has a queued color.
    pub fn has_pending(&self) -> bool {
        self.zones
            .iter()
            .any(|z| z.pending.load(Ordering::Acquire) != NO_COLOR)
    }
}
