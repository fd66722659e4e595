//! Transaction builder: turns drained zone colors into one complete,
//! ordered packet sequence.
//!
//! ```text
//! RESET, (SET_COLOR, LOOP) per zone, EXECUTE
//! ```
//!
//! The leading reset is the only reset of a run; the session sends it,
//! waits the settle interval, then sends the rest.

use crate::command::{self, Packet, ResetMode};
use crate::zones::ZoneColor;

/// One protocol transaction, built fresh for every session run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    packets: Vec<Packet>,
}

impl Transaction {
    /// All packets in send order. Always starts with a reset and ends with execute.
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Never true: even an empty build carries reset + execute.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Number of zones this transaction colors.
    pub fn zone_count(&self) -> usize {
        // reset + execute, then two packets per zone
        (self.packets.len() - 2) / 2
    }
}

/// Build a transaction with the default reset.
pub fn build(zones: &[ZoneColor]) -> Transaction {
    build_with(ResetMode::AllLightsOn, zones)
}

/// Build a transaction opened by the given reset variant.
///
/// Zones are emitted in input order. An empty input still yields
/// `[RESET, EXECUTE]`; whether to send that is the session's decision.
pub fn build_with(reset: ResetMode, zones: &[ZoneColor]) -> Transaction {
    let mut packets = Vec::with_capacity(2 + 2 * zones.len());
    packets.push(command::encode_reset_with(reset));
    for zc in zones {
        packets.push(command::encode_set_color(zc.region, zc.color));
        packets.push(command::encode_loop_mark());
    }
    packets.push(command::encode_execute());
    Transaction { packets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    fn commands(tx: &Transaction) -> Vec<Command> {
        tx.packets().iter().filter_map(Command::decode).collect()
    }

    fn zc(region: u32, color: u16) -> ZoneColor {
        ZoneColor { region, color }
    }

    #[test]
    fn empty_build_is_reset_execute() {
        let tx = build(&[]);
        assert_eq!(
            commands(&tx),
            vec![Command::Reset(ResetMode::AllLightsOn), Command::Execute]
        );
        assert_eq!(tx.zone_count(), 0);
        assert!(!tx.is_empty());
    }

    #[test]
    fn single_zone_build() {
        let tx = build(&[zc(0x0001, 0x0FFF)]);
        assert_eq!(
            commands(&tx),
            vec![
                Command::Reset(ResetMode::AllLightsOn),
                Command::SetColor {
                    region: 0x0001,
                    color: 0x0FFF
                },
                Command::LoopMark,
                Command::Execute,
            ]
        );
        let set = tx.packets()[1].as_bytes();
        assert_eq!(&set[3..6], &[0x00, 0x00, 0x01]);
        assert_eq!(&set[6..8], &[0xFF, 0xF0]);
    }

    #[test]
    fn keeps_input_order() {
        let tx = build(&[zc(0x0100, 1), zc(0x0001, 2), zc(0x0020, 3)]);
        let regions: Vec<u32> = commands(&tx)
            .into_iter()
            .filter_map(|c| match c {
                Command::SetColor { region, .. } => Some(region),
                _ => None,
            })
            .collect();
        assert_eq!(regions, vec![0x0100, 0x0001, 0x0020]);
        assert_eq!(tx.zone_count(), 3);
    }

    #[test]
    fn every_set_color_followed_by_loop_mark() {
        let tx = build(&[zc(0x0001, 0x0F00), zc(0x0020, 0x00F0), zc(0x0040, 0x000F)]);
        let cmds = commands(&tx);
        assert_eq!(cmds.len(), 2 + 2 * 3);
        for pair in cmds[1..cmds.len() - 1].chunks(2) {
            assert!(matches!(pair[0], Command::SetColor { .. }));
            assert_eq!(pair[1], Command::LoopMark);
        }
    }

    #[test]
    fn exactly_one_reset_and_execute() {
        let tx = build(&[zc(0x0001, 1), zc(0x0100, 2)]);
        let cmds = commands(&tx);
        assert_eq!(
            cmds.iter()
                .filter(|c| matches!(c, Command::Reset(_)))
                .count(),
            1
        );
        assert_eq!(cmds.iter().filter(|c| **c == Command::Execute).count(), 1);
        assert!(matches!(cmds.first(), Some(Command::Reset(_))));
        assert_eq!(cmds.last(), Some(&Command::Execute));
    }

    #[test]
    fn reset_variant_selects_first_packet() {
        let tx = build_with(ResetMode::AllLightsOff, &[]);
        assert_eq!(tx.packets()[0].to_hex(), "02 07 03 00 00 00 00 00 00");
    }

    #[test]
    fn two_zone_scenario_bytes() {
        let tx = build(&[zc(0x0001, 0x0FFF), zc(0x0100, 0x0000)]);
        let hex: Vec<String> = tx.packets().iter().map(Packet::to_hex).collect();
        assert_eq!(
            hex,
            vec![
                "02 07 04 00 00 00 00 00 00",
                "02 03 00 00 00 01 FF F0 00",
                "02 04 00 00 00 00 00 00 00",
                "02 03 00 00 01 00 00 00 00",
                "02 04 00 00 00 00 00 00 00",
                "02 05 00 00 00 00 00 00 00",
            ]
        );
    }
}
