//! `devices` subcommand: list connected AlienFX controllers.

use super::{DevicesOutput, Result, device};

pub(super) fn cmd_devices(json: bool) -> Result<()> {
    let devices = device::enumerate_devices();

    if json {
        return super::print_json(&DevicesOutput {
            count: devices.len(),
            devices,
        });
    }

    if devices.is_empty() {
        println!("No AlienFX controllers found.");
        return Ok(());
    }

    println!(
        "Found {} AlienFX controller{}:",
        devices.len(),
        if devices.len() == 1 { "" } else { "s" }
    );
    println!();

    for (i, dev) in devices.iter().enumerate() {
        let model = dev.model.as_deref().unwrap_or("unsupported model");
        println!("  [{}] {} ({model})", i + 1, dev.instance);
        if let Some(ref serial) = dev.serial {
            println!("      Serial: {serial}");
        }
    }

    Ok(())
}
