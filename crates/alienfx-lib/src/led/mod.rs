//! LED control points: zone colors and the registry they are published in.

mod color;
mod registry;

pub use color::{format_color, parse_color};
pub use registry::{LedHandle, LedRegistry, MemoryRegistry, RegistryError};
