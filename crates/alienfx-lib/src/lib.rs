//! AlienFX: per-zone RGB lighting for Alienware AlienFX USB controllers.

pub mod command;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod led;
pub mod models;
pub mod protocol;
pub mod session;
pub mod transaction;
pub mod zones;

pub use error::AlienfxError;
