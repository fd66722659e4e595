//! Protocol constants for AlienFX lighting controllers.
//!
//! Values follow the command table of the Linux `hid-alienfx` driver for
//! the M11x. Every command is a fixed 9-byte HID output report; byte 0 is
//! the report id, byte 1 the opcode, the rest operation-specific payload
//! padded with zeros.
//!
//! A visible update is a transaction:
//!
//! ```text
//! RESET  (SET_COLOR  LOOP)*  EXECUTE
//! ```
//!
//! The controller is stateful across those packets, so packets from two
//! transactions must never interleave.

// ── Framing ──

/// Fixed size of every command packet.
pub const PACKET_SIZE: usize = 9;

/// HID report id, always the first byte of a packet.
pub const REPORT_ID: u8 = 0x02;

// ── Opcodes (byte 1) ──

/// Set the color of one region. Payload: region (3 bytes BE) + color (2 bytes).
pub const OP_SET_COLOR: u8 = 0x03;

/// Loop mark: closes one region's color definition inside a transaction.
pub const OP_LOOP: u8 = 0x04;

/// Execute: commits the accumulated transaction to the LEDs.
pub const OP_EXECUTE: u8 = 0x05;

/// Reset. Byte 2 selects the variant, see [`RESET_ALL_LIGHTS_ON`].
pub const OP_RESET: u8 = 0x07;

// ── Reset variants (byte 2 of a reset packet) ──

/// Restore and activate all regions. This is the reset every transaction starts with.
pub const RESET_ALL_LIGHTS_ON: u8 = 0x04;

/// Reset with every region switched off.
pub const RESET_ALL_LIGHTS_OFF: u8 = 0x03;

// ── Set-color payload layout ──

/// Offset of the 24-bit big-endian region mask inside a set-color packet.
pub const OFF_REGION: usize = 3;

/// Offset of the 2-byte packed color inside a set-color packet.
pub const OFF_COLOR: usize = 6;

/// Largest region id representable in the 24-bit region field.
pub const MAX_REGION: u32 = 0x00FF_FFFF;

/// Color bits carried by the packing: 4 bits per channel, `0xRGB`.
pub const COLOR_MASK: u16 = 0x0FFF;

// ── Timing ──

/// Default settle interval after the reset packet, in milliseconds.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1;

/// Timeout per USB control transfer in milliseconds.
pub const USB_TIMEOUT_MS: u64 = 1000;

// ── USB HID parameters ──

/// Alienware vendor ID.
pub const ALIENFX_VID: u16 = 0x187C;

/// USB interface class code for HID.
pub const USB_CLASS_HID: u8 = 0x03;

/// HID class request `SET_REPORT`.
pub const HID_REQ_SET_REPORT: u8 = 0x09;

/// HID report type "output", high byte of `wValue` for SET_REPORT.
pub const HID_REPORT_TYPE_OUTPUT: u8 = 0x02;
