//! Unified error type for the alienfx-lib crate.
//!
//! [`AlienfxError`] wraps the module errors (`DeviceError`, `TransportError`,
//! `AttachError`, `UnknownZone`) plus the string-carrying `Config` and
//! `Color` kinds, so `?` works across module boundaries.

use std::fmt;

use crate::controller::AttachError;
use crate::device::{DeviceError, TransportError};
use crate::zones::UnknownZone;

#[derive(Debug)]
pub enum AlienfxError {
    /// Discovery or open failure.
    Device(DeviceError),
    /// A packet could not be delivered.
    Transport(TransportError),
    Attach(AttachError),
    /// Zone lookup failure (unknown id or name).
    Zone(String),
    /// Config file read/write.
    Io(std::io::Error),
    Config(String),
    Color(String),
}

impl fmt::Display for AlienfxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlienfxError::Device(e) => write!(f, "{e}"),
            AlienfxError::Transport(e) => write!(f, "Transport error: {e}"),
            AlienfxError::Attach(e) => write!(f, "{e}"),
            AlienfxError::Zone(e) => write!(f, "Zone error: {e}"),
            AlienfxError::Io(e) => write!(f, "I/O error: {e}"),
            AlienfxError::Config(e) => write!(f, "Config error: {e}"),
            AlienfxError::Color(e) => write!(f, "Color error: {e}"),
        }
    }
}

impl std::error::Error for AlienfxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AlienfxError::Device(e) => Some(e),
            AlienfxError::Transport(e) => Some(e),
            AlienfxError::Attach(e) => Some(e),
            AlienfxError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for AlienfxError {
    fn from(e: DeviceError) -> Self {
        AlienfxError::Device(e)
    }
}

impl From<TransportError> for AlienfxError {
    fn from(e: TransportError) -> Self {
        AlienfxError::Transport(e)
    }
}

impl From<AttachError> for AlienfxError {
    fn from(e: AttachError) -> Self {
        AlienfxError::Attach(e)
    }
}

impl From<UnknownZone> for AlienfxError {
    fn from(e: UnknownZone) -> Self {
        AlienfxError::Zone(e.to_string())
    }
}

impl From<std::io::Error> for AlienfxError {
    fn from(e: std::io::Error) -> Self {
        AlienfxError::Io(e)
    }
}

/// Crate-level Result alias using [`AlienfxError`].
pub type Result<T> = std::result::Result<T, AlienfxError>;
