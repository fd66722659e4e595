//! Model profiles: zone descriptor tables for AlienFX controllers.
//!
//! Each profile lists the addressable regions of one hardware model in the
//! order transactions walk them. Region masks are fixed by the firmware.
//! Unknown models get `None` from [`detect_model`].

use crate::protocol::ALIENFX_VID;

/// Static description of one zone: its name and firmware region mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneDescriptor {
    pub name: &'static str,
    pub region: u32,
}

/// Zone layout for a specific model.
#[derive(Debug)]
pub struct ModelProfile {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    pub zones: &'static [ZoneDescriptor],
}

impl ModelProfile {
    /// Zone descriptor by name, case-insensitive.
    pub fn zone(&self, name: &str) -> Option<&'static ZoneDescriptor> {
        let zones: &'static [ZoneDescriptor] = self.zones;
        zones.iter().find(|z| z.name.eq_ignore_ascii_case(name))
    }
}

// ── Alienware M11x ──

/// Region masks from the `hid-alienfx` driver's M11x zone table.
/// `all-but-power` and `all` are the unions of the individual masks and
/// address several regions at once.
static M11X_ZONES: [ZoneDescriptor; 10] = [
    ZoneDescriptor {
        name: "keyboard",
        region: 0x0001,
    },
    ZoneDescriptor {
        name: "speaker-left",
        region: 0x0020,
    },
    ZoneDescriptor {
        name: "speaker-right",
        region: 0x0040,
    },
    ZoneDescriptor {
        name: "logo",
        region: 0x0100,
    },
    ZoneDescriptor {
        name: "media-bar",
        region: 0x0800,
    },
    ZoneDescriptor {
        name: "power-button",
        region: 0x2000,
    },
    ZoneDescriptor {
        name: "power-button-eyes",
        region: 0x4000,
    },
    ZoneDescriptor {
        name: "power-reset-state",
        region: 0x8000,
    },
    ZoneDescriptor {
        name: "all-but-power",
        region: 0x0961,
    },
    ZoneDescriptor {
        name: "all",
        region: 0xE961,
    },
];

static ALIENWARE_M11X: ModelProfile = ModelProfile {
    name: "Alienware M11x",
    vendor_id: ALIENFX_VID,
    product_id: 0x0514,
    zones: &M11X_ZONES,
};

static MODELS: [&ModelProfile; 1] = [&ALIENWARE_M11X];

/// All known model profiles.
pub fn all_models() -> &'static [&'static ModelProfile] {
    &MODELS
}

/// Detect the model profile from USB vendor/product ids.
pub fn detect_model(vendor_id: u16, product_id: u16) -> Option<&'static ModelProfile> {
    MODELS
        .iter()
        .copied()
        .find(|m| m.vendor_id == vendor_id && m.product_id == product_id)
}

/// Look a profile up by name, e.g. `"m11x"` or `"Alienware M11x"`.
pub fn model_by_name(name: &str) -> Option<&'static ModelProfile> {
    let name = name.trim();
    MODELS.iter().copied().find(|m| {
        m.name.eq_ignore_ascii_case(name)
            || m
                .name
                .rsplit(' ')
                .next()
                .is_some_and(|short| short.eq_ignore_ascii_case(name))
    })
}
