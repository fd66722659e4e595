//! `encode` subcommand: dry run: print the transaction a set would send.

use std::path::Path;

use alienfx_lib::command::{Command, ResetMode};
use alienfx_lib::controller::AttachError;
use alienfx_lib::transaction;
use alienfx_lib::zones::ZoneTable;

use super::{EncodeOutput, Result, led, load_config, parse_assignment, resolve_model};

fn describe(cmd: Option<Command>) -> String {
    match cmd {
        Some(Command::Reset(ResetMode::AllLightsOn)) => "reset (all lights on)".into(),
        Some(Command::Reset(ResetMode::AllLightsOff)) => "reset (all lights off)".into(),
        Some(Command::SetColor { region, color }) => {
            format!("set-color 0x{region:06X} {}", led::format_color(color))
        }
        Some(Command::LoopMark) => "loop".into(),
        Some(Command::Execute) => "execute".into(),
        None => "?".into(),
    }
}

pub(super) fn cmd_encode(
    assignments: &[String],
    model: &str,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let model = resolve_model(model)?;
    let config = load_config(config_path).session_config();

    let table =
        ZoneTable::from_descriptors(model.zones).map_err(|_| AttachError::AllocationFailure)?;
    for a in assignments {
        let (zone, color) = parse_assignment(a, model)?;
        if let Some(id) = table.find(zone) {
            table.set_pending(id, color)?;
        }
    }
    let tx = transaction::build_with(config.reset_mode, &table.drain_pending());

    if json {
        return super::print_json(&EncodeOutput {
            model: model.name.to_string(),
            packets: tx.packets().iter().map(|p| p.to_hex()).collect(),
        });
    }

    for p in tx.packets() {
        println!("{}  {}", p.to_hex(), describe(Command::decode(p)));
    }
    Ok(())
}
