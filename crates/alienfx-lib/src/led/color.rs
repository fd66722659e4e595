//! Color parsing and formatting for AlienFX zones.
//!
//! Zone colors use the device format `0xRGB`: 4 bits per channel, the
//! exact 12 bits a set-color packet carries.

use crate::protocol::COLOR_MASK;

/// Scale an 8-bit channel to 4 bits, rounding to nearest.
fn to_nibble(v: u8) -> u16 {
    (u16::from(v) * 15 + 127) / 255
}

/// `from_str_radix` tolerates a leading sign; colors must be bare digits.
fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parse a color string into the device format `0xRGB`.
///
/// Accepts:
/// - Hex: `"#FF0000"`, `"FF0000"`, `"#ff0000"` (scaled to 4 bits per channel)
/// - Short hex: `"#F00"`
/// - Raw value: `"0x0F00"` (any 16-bit value; only the low 12 bits reach the device)
/// - Named: `"red"`, `"green"`, `"blue"`, `"white"`, `"orange"`, `"yellow"`, `"purple"`, `"cyan"`, `"off"`
pub fn parse_color(s: &str) -> crate::error::Result<u16> {
    let s = s.trim();

    // Named colors
    match s.to_lowercase().as_str() {
        "red" => return Ok(0x0F00),
        "green" => return Ok(0x00F0),
        "blue" => return Ok(0x000F),
        "white" => return Ok(0x0FFF),
        "orange" => return Ok(0x0F80),
        "yellow" => return Ok(0x0FF0),
        "purple" => return Ok(0x080F),
        "cyan" => return Ok(0x00FF),
        "off" | "black" => return Ok(0x0000),
        _ => {}
    }

    if let Some(raw) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        let invalid = || crate::AlienfxError::Color(format!("Invalid raw color: {s}"));
        if !is_hex(raw) {
            return Err(invalid());
        }
        return u16::from_str_radix(raw, 16).map_err(|_| invalid());
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    let invalid = || crate::AlienfxError::Color(format!("Invalid hex color: {s}"));
    match hex.len() {
        3 | 6 if !is_hex(hex) => Err(invalid()),
        3 if s.starts_with('#') => u16::from_str_radix(hex, 16).map_err(|_| invalid()),
        6 => {
            let val = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
            let [_, r, g, b] = val.to_be_bytes();
            Ok((to_nibble(r) << 8) | (to_nibble(g) << 4) | to_nibble(b))
        }
        _ => Err(crate::AlienfxError::Color(format!(
            "Invalid color: {s} (use #RRGGBB, #RGB, 0xNNN or a color name)"
        ))),
    }
}

/// Format a device color as `#RRGGBB`. Bits above 12 are ignored.
pub fn format_color(val: u16) -> String {
    let val = val & COLOR_MASK;
    let r = ((val >> 8) & 0xF) * 17;
    let g = ((val >> 4) & 0xF) * 17;
    let b = (val & 0xF) * 17;
    format!("#{r:02X}{g:02X}{b:02X}")
}
