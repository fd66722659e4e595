//! Application configuration: TOML-based, platform-aware paths.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::ResetMode;
use crate::models::ModelProfile;
use crate::protocol::DEFAULT_SETTLE_DELAY_MS;
use crate::session::SessionConfig;

/// First lines of every file written by [`Config::save_to`].
const CONFIG_HEADER: &str =
    "# AlienFX configuration\n# `alienfx save` rewrites this file; comments are not kept.\n\n";

/// Longest settle delay accepted by [`Config::validate`].
pub const MAX_SETTLE_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Pause after the reset packet, in milliseconds. Default: 1.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Send nothing when a run finds no pending colors.
    #[serde(default = "default_true")]
    pub skip_empty: bool,

    /// Reset variant: "on" (all lights on) or "off". Default: "on".
    #[serde(default = "default_reset_mode")]
    pub reset_mode: String,

    /// Preferred device serial number. Empty = first matching device.
    #[serde(default)]
    pub device_serial: String,

    /// Zone name → color, applied by `alienfx apply`.
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_reset_mode() -> String {
    "on".into()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            settle_delay_ms: default_settle_delay_ms(),
            skip_empty: true,
            reset_mode: default_reset_mode(),
            device_serial: String::new(),
            colors: BTreeMap::new(),
        }
    }
}

/// Problems [`Config::validate`] can report.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `reset_mode` is neither "on" nor "off".
    InvalidResetMode(String),
    /// `settle_delay_ms` above [`MAX_SETTLE_DELAY_MS`].
    SettleDelayTooLong(u64),
    /// A `colors` key names no zone of the model.
    UnknownZone(String),
    /// A `colors` value could not be parsed.
    InvalidColor { zone: String, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidResetMode(v) => {
                write!(f, "Invalid reset_mode \"{v}\" (expected \"on\" or \"off\")")
            }
            ValidationError::SettleDelayTooLong(ms) => {
                write!(
                    f,
                    "settle_delay_ms {ms} is too long (max {MAX_SETTLE_DELAY_MS})"
                )
            }
            ValidationError::UnknownZone(zone) => write!(f, "Unknown zone in colors: {zone}"),
            ValidationError::InvalidColor { zone, reason } => {
                write!(f, "Invalid colors[{zone}]: {reason}")
            }
        }
    }
}

/// Parse a `reset_mode` value.
pub fn parse_reset_mode(s: &str) -> Option<ResetMode> {
    match s.trim().to_ascii_lowercase().as_str() {
        "on" => Some(ResetMode::AllLightsOn),
        "off" => Some(ResetMode::AllLightsOff),
        _ => None,
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("alienfx"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// A missing file yields `(defaults, [])`; an unparsable one yields
    /// `(defaults, [warning])`.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Self::default(), vec![]),
            Err(e) => {
                let warning = format!("cannot read config ({}), using defaults: {e}", path.display());
                (Self::default(), vec![warning])
            }
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Write the config to `path`, creating missing parent directories.
    ///
    /// The new contents go to a sibling `.toml.new` file that is then renamed
    /// over `path`, so readers never see a half-written config.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let body = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let staged = path.with_extension("toml.new");
        std::fs::write(&staged, format!("{CONFIG_HEADER}{body}"))?;
        std::fs::rename(&staged, path).inspect_err(|_| {
            let _ = std::fs::remove_file(&staged);
        })
    }

    /// Session tunables from this config. An invalid `reset_mode` falls
    /// back to all-lights-on.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            skip_empty: self.skip_empty,
            reset_mode: parse_reset_mode(&self.reset_mode).unwrap_or_default(),
        }
    }

    /// Validate the whole config, collecting every problem.
    ///
    /// With `model` given, `colors` keys are checked against its zone names.
    pub fn validate(
        &self,
        model: Option<&ModelProfile>,
    ) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if parse_reset_mode(&self.reset_mode).is_none() {
            errors.push(ValidationError::InvalidResetMode(self.reset_mode.clone()));
        }

        if self.settle_delay_ms > MAX_SETTLE_DELAY_MS {
            errors.push(ValidationError::SettleDelayTooLong(self.settle_delay_ms));
        }

        for (zone, value) in &self.colors {
            if let Some(model) = model
                && model.zone(zone).is_none()
            {
                errors.push(ValidationError::UnknownZone(zone.clone()));
            }
            if let Err(e) = crate::led::parse_color(value) {
                errors.push(ValidationError::InvalidColor {
                    zone: zone.clone(),
                    reason: e.to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;

    fn m11x() -> &'static ModelProfile {
        models::model_by_name("m11x").unwrap()
    }

    // ── Defaults ──

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.settle_delay_ms, 1);
        assert!(c.skip_empty);
        assert_eq!(c.reset_mode, "on");
        assert!(c.device_serial.is_empty());
        assert!(c.colors.is_empty());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c, Config::default());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c: Config = toml::from_str("skip_empty = false\n[colors]\nlogo = \"red\"\n").unwrap();
        assert!(!c.skip_empty);
        assert_eq!(c.settle_delay_ms, 1);
        assert_eq!(c.colors.get("logo").map(String::as_str), Some("red"));
    }

    #[test]
    fn wrong_type_is_an_error() {
        let result: std::result::Result<Config, _> = toml::from_str("skip_empty = \"yes\"");
        assert!(result.is_err());
    }

    #[test]
    fn config_path_ends_with_toml() {
        if let Some(path) = Config::path() {
            assert_eq!(path.file_name().unwrap(), "config.toml");
            assert!(path.parent().unwrap().ends_with("alienfx"));
        }
    }

    // ── load / save ──

    #[test]
    fn load_missing_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (c, warnings) = Config::load_from(&dir.path().join("nope.toml"));
        assert_eq!(c, Config::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn load_malformed_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is { not valid toml").unwrap();
        let (c, warnings) = Config::load_from(&path);
        assert_eq!(c, Config::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("config parse error"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let mut c = Config {
            settle_delay_ms: 5,
            reset_mode: "off".into(),
            device_serial: "ABC123".into(),
            ..Config::default()
        };
        c.colors.insert("keyboard".into(), "#00FF00".into());
        c.save_to(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# AlienFX configuration\n"));
        assert!(!path.with_extension("toml.new").exists());

        let (loaded, warnings) = Config::load_from(&path);
        assert!(warnings.is_empty());
        assert_eq!(loaded, c);
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# hand-written\nskip_empty = false\n").unwrap();

        let (mut c, _) = Config::load_from(&path);
        c.colors.insert("logo".into(), "#FF0000".into());
        c.save_to(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("hand-written"));
        let (loaded, warnings) = Config::load_from(&path);
        assert!(warnings.is_empty());
        assert!(!loaded.skip_empty);
        assert_eq!(loaded.colors.get("logo").map(String::as_str), Some("#FF0000"));
    }

    #[test]
    fn save_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let err = Config::default().save_to(&blocker.join("config.toml"));
        assert!(err.is_err());
    }

    // ── session_config ──

    #[test]
    fn session_config_maps_fields() {
        let c = Config {
            settle_delay_ms: 3,
            skip_empty: false,
            reset_mode: "OFF".into(),
            ..Config::default()
        };
        let s = c.session_config();
        assert_eq!(s.settle_delay, Duration::from_millis(3));
        assert!(!s.skip_empty);
        assert_eq!(s.reset_mode, ResetMode::AllLightsOff);
    }

    #[test]
    fn session_config_bad_reset_mode_falls_back() {
        let c = Config {
            reset_mode: "blink".into(),
            ..Config::default()
        };
        assert_eq!(c.session_config().reset_mode, ResetMode::AllLightsOn);
    }

    // ── validate ──

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate(Some(m11x())).is_ok());
    }

    #[test]
    fn validate_collects_all_errors() {
        let mut c = Config {
            settle_delay_ms: 5000,
            reset_mode: "blink".into(),
            ..Config::default()
        };
        c.colors.insert("trunk".into(), "red".into());
        c.colors.insert("logo".into(), "#GG0000".into());
        let errors = c.validate(Some(m11x())).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::InvalidResetMode("blink".into())));
        assert!(errors.contains(&ValidationError::SettleDelayTooLong(5000)));
        assert!(errors.contains(&ValidationError::UnknownZone("trunk".into())));
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::InvalidColor { zone, .. } if zone == "logo"))
        );
    }

    #[test]
    fn validate_without_model_skips_zone_names() {
        let mut c = Config::default();
        c.colors.insert("trunk".into(), "red".into());
        assert!(c.validate(None).is_ok());
    }

    #[test]
    fn validation_error_display() {
        assert_eq!(
            ValidationError::UnknownZone("trunk".into()).to_string(),
            "Unknown zone in colors: trunk"
        );
        assert_eq!(
            ValidationError::SettleDelayTooLong(2000).to_string(),
            "settle_delay_ms 2000 is too long (max 1000)"
        );
    }
}
