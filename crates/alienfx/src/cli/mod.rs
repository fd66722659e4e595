//! CLI subcommands: zone tables, devices, color updates, saved colors,
//! packet dumps.

mod apply;
mod config_cmd;
mod devices;
mod encode;
mod save;
mod zones;

use std::collections::BTreeMap;
use std::path::Path;

use clap::Subcommand;
use serde::Serialize;

pub(super) use alienfx_lib::AlienfxError;
pub(super) use alienfx_lib::config::Config;
pub(super) use alienfx_lib::device::{self, DeviceInfo, DiscoveredDevice};
pub(super) use alienfx_lib::error::Result;
pub(super) use alienfx_lib::led;
pub(super) use alienfx_lib::models::{self, ModelProfile};
pub(super) use alienfx_lib::session::SessionStats;
pub(super) use alienfx_lib::zones::ZoneInfo;

const PADDING: usize = 2;

/// Column width that leaves [`PADDING`] spaces after the longest key.
pub(super) fn kv_width(keys: &[&str]) -> usize {
    keys.iter().map(|k| k.len() + PADDING).max().unwrap_or(0)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<w$}{value}")
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AlienfxError::Io(std::io::Error::other(e)))?;
    println!("{text}");
    Ok(())
}

/// Load the config from `custom` or the default path, logging parse warnings.
pub(super) fn load_config(custom: Option<&Path>) -> Config {
    match custom {
        Some(path) => {
            let (config, warnings) = Config::load_from(path);
            for w in &warnings {
                log::warn!("{w}");
            }
            config
        }
        None => Config::load(),
    }
}

/// Resolve a `--model` argument.
pub(super) fn resolve_model(name: &str) -> Result<&'static ModelProfile> {
    models::model_by_name(name).ok_or_else(|| {
        let known: Vec<&str> = models::all_models().iter().map(|m| m.name).collect();
        AlienfxError::Config(format!(
            "Unknown model \"{name}\" (known: {})",
            known.join(", ")
        ))
    })
}

/// Parse `zone=color` into a zone name of `model` and a device color.
pub(super) fn parse_assignment(s: &str, model: &ModelProfile) -> Result<(&'static str, u16)> {
    let Some((zone, color)) = s.split_once('=') else {
        return Err(AlienfxError::Config(format!(
            "Expected ZONE=COLOR, got \"{s}\""
        )));
    };
    let desc = model.zone(zone.trim()).ok_or_else(|| {
        AlienfxError::Zone(format!("Unknown zone \"{}\" for {}", zone.trim(), model.name))
    })?;
    Ok((desc.name, led::parse_color(color)?))
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct ZonesOutput {
    pub model: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub zones: Vec<ZoneInfo>,
}

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub devices: Vec<DiscoveredDevice>,
}

#[derive(Serialize)]
pub(super) struct EncodeOutput {
    pub model: String,
    pub packets: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct ApplyOutput {
    pub device: DeviceInfo,
    pub zones: Vec<String>,
    pub stats: SessionStats,
}

#[derive(Serialize)]
pub(super) struct SaveOutput {
    pub config_file: String,
    /// Every color now in the file, not only the ones just saved.
    pub colors: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub problems: Vec<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the zones of a model
    Zones {
        /// Model name, e.g. "m11x"
        #[arg(long, default_value = "m11x")]
        model: String,
    },

    /// List connected AlienFX controllers
    Devices,

    /// Set zone colors on the connected controller
    Set {
        /// One or more ZONE=COLOR pairs, e.g. keyboard=#FF0000 logo=blue
        #[arg(required = true, value_name = "ZONE=COLOR")]
        assignments: Vec<String>,
    },

    /// Apply the colors from the config file
    Apply,

    /// Store zone colors in the config file, for `apply`
    Save {
        /// One or more ZONE=COLOR pairs
        #[arg(required = true, value_name = "ZONE=COLOR")]
        assignments: Vec<String>,
        /// Model whose zone names are accepted
        #[arg(long, default_value = "m11x")]
        model: String,
    },

    /// Print the packets a set would send, without touching hardware
    Encode {
        /// One or more ZONE=COLOR pairs
        #[arg(required = true, value_name = "ZONE=COLOR")]
        assignments: Vec<String>,
        /// Model name, e.g. "m11x"
        #[arg(long, default_value = "m11x")]
        model: String,
    },

    /// Show current configuration and file path
    Config,
}

pub fn run(cmd: Command, json: bool, config_path: Option<&Path>) -> Result<()> {
    match cmd {
        Command::Zones { model } => zones::cmd_zones(&model, json),
        Command::Devices => devices::cmd_devices(json),
        Command::Set { assignments } => apply::cmd_set(&assignments, json, config_path),
        Command::Apply => apply::cmd_apply(json, config_path),
        Command::Save { assignments, model } => {
            save::cmd_save(&assignments, &model, json, config_path)
        }
        Command::Encode { assignments, model } => {
            encode::cmd_encode(&assignments, &model, json, config_path)
        }
        Command::Config => config_cmd::cmd_config(json, config_path),
    }
}
