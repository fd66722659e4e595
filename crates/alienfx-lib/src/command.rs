//! Command codec: builds the fixed-width packets of the lighting protocol.
//!
//! Every function here is pure and returns a freshly constructed [`Packet`];
//! nothing is shared between calls. The codec knows nothing about
//! transactions, which is the job of [`crate::transaction`].

use std::fmt;

use crate::protocol::*;

/// One 9-byte command packet, ready for the transport.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Packet([u8; PACKET_SIZE]);

impl Packet {
    /// Packet with the report id and opcode set, every other byte zero.
    const fn with_opcode(opcode: u8) -> Self {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[0] = REPORT_ID;
        bytes[1] = opcode;
        Packet(bytes)
    }

    /// Raw bytes as sent on the wire.
    pub fn as_bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.0
    }

    /// Space-separated uppercase hex, e.g. `02 07 04 00 00 00 00 00 00`.
    pub fn to_hex(&self) -> String {
        self.0
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<[u8; PACKET_SIZE]> for Packet {
    fn from(bytes: [u8; PACKET_SIZE]) -> Self {
        Packet(bytes)
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet[{}]", self.to_hex())
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Which reset variant opens a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetMode {
    /// Restore and activate all regions (`02 07 04`).
    #[default]
    AllLightsOn,
    /// Switch every region off (`02 07 03`).
    AllLightsOff,
}

impl ResetMode {
    fn selector(self) -> u8 {
        match self {
            ResetMode::AllLightsOn => RESET_ALL_LIGHTS_ON,
            ResetMode::AllLightsOff => RESET_ALL_LIGHTS_OFF,
        }
    }
}

/// Decoded view of a packet, for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset(ResetMode),
    SetColor { region: u32, color: u16 },
    LoopMark,
    Execute,
}

impl Command {
    /// Encode this command.
    pub fn encode(self) -> Packet {
        match self {
            Command::Reset(mode) => encode_reset_with(mode),
            Command::SetColor { region, color } => encode_set_color(region, color),
            Command::LoopMark => encode_loop_mark(),
            Command::Execute => encode_execute(),
        }
    }

    /// Decode a packet produced by this codec.
    ///
    /// Returns `None` for a foreign report id, an unknown opcode or an
    /// unknown reset selector. The color comes back masked to the 12 bits
    /// the packing carries.
    pub fn decode(packet: &Packet) -> Option<Command> {
        let b = packet.as_bytes();
        if b[0] != REPORT_ID {
            return None;
        }
        match b[1] {
            OP_RESET => match b[2] {
                RESET_ALL_LIGHTS_ON => Some(Command::Reset(ResetMode::AllLightsOn)),
                RESET_ALL_LIGHTS_OFF => Some(Command::Reset(ResetMode::AllLightsOff)),
                _ => None,
            },
            OP_SET_COLOR => {
                let region = u32::from_be_bytes([0, b[OFF_REGION], b[OFF_REGION + 1], b[OFF_REGION + 2]]);
                let color = (u16::from(b[OFF_COLOR]) << 4) | (u16::from(b[OFF_COLOR + 1]) >> 4);
                Some(Command::SetColor { region, color })
            }
            OP_LOOP => Some(Command::LoopMark),
            OP_EXECUTE => Some(Command::Execute),
            _ => None,
        }
    }
}

/// `02 07 04 00 00 00 00 00 00`: restore/activate all regions.
pub fn encode_reset() -> Packet {
    encode_reset_with(ResetMode::AllLightsOn)
}

/// Reset packet with an explicit variant selector in byte 2.
pub fn encode_reset_with(mode: ResetMode) -> Packet {
    let mut p = Packet::with_opcode(OP_RESET);
    p.0[2] = mode.selector();
    p
}

/// `02 03 00 <rHi> <rMid> <rLo> <cHi> <cLo> 00`.
///
/// The region mask goes big-endian into bytes 3..6. The color is split
/// across two bytes: bits 4..12 in byte 6, bits 0..4 in the high nibble of
/// byte 7. Region bits above 24 and color bits above 12 are dropped.
pub fn encode_set_color(region: u32, color: u16) -> Packet {
    let mut p = Packet::with_opcode(OP_SET_COLOR);
    p.0[OFF_REGION] = ((region >> 16) & 0xFF) as u8;
    p.0[OFF_REGION + 1] = ((region >> 8) & 0xFF) as u8;
    p.0[OFF_REGION + 2] = (region & 0xFF) as u8;
    p.0[OFF_COLOR] = ((color >> 4) & 0xFF) as u8;
    p.0[OFF_COLOR + 1] = ((color << 4) & 0xF0) as u8;
    p
}

/// `02 04 00 00 00 00 00 00 00`: end of one region's definition.
pub fn encode_loop_mark() -> Packet {
    Packet::with_opcode(OP_LOOP)
}

/// `02 05 00 00 00 00 00 00 00`: commit the transaction.
pub fn encode_execute() -> Packet {
    Packet::with_opcode(OP_EXECUTE)
}
