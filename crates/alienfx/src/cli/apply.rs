//! `set` and `apply` subcommands: push zone colors to the controller.

use std::path::Path;

use alienfx_lib::controller::Controller;
use alienfx_lib::led::MemoryRegistry;
use alienfx_lib::session::RunOutcome;

use super::{
    AlienfxError, ApplyOutput, Config, Result, device, kv, kv_width, led, load_config,
    parse_assignment,
};

/// Open the configured device, send `assignments` in one transaction and
/// detach again.
fn send(config: &Config, assignments: &[String], json: bool) -> Result<()> {
    let opened = device::open_device(&config.device_serial)?;
    let profile = opened.profile;

    let colors = assignments
        .iter()
        .map(|a| parse_assignment(a, profile))
        .collect::<Result<Vec<_>>>()?;

    let mut registry = MemoryRegistry::new();
    let controller = Controller::attach(
        profile,
        &opened.info.instance,
        opened.transport,
        &mut registry,
        config.session_config(),
    )?;

    let zones = controller.session().zones();
    for (name, color) in &colors {
        if let Some(handle) = registry.find_zone(name) {
            zones.set_pending(handle.zone(), *color)?;
        }
    }
    let outcome = controller.session().flush();
    let stats = controller.detach(&mut registry);

    if let RunOutcome::Aborted { sent, error } = outcome {
        log::debug!("aborted after {sent} packet(s)");
        return Err(AlienfxError::Transport(error));
    }

    if json {
        return super::print_json(&ApplyOutput {
            device: opened.info,
            zones: colors.iter().map(|(name, _)| name.to_string()).collect(),
            stats,
        });
    }

    let w = kv_width(&colors.iter().map(|(name, _)| *name).collect::<Vec<_>>());
    println!("{} ({}):", opened.info.model, opened.info.instance);
    for (name, color) in &colors {
        kv(&format!("  {name}"), led::format_color(*color), w + 2);
    }
    Ok(())
}

pub(super) fn cmd_set(assignments: &[String], json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    send(&config, assignments, json)
}

pub(super) fn cmd_apply(json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    if config.colors.is_empty() {
        println!("No colors configured.");
        return Ok(());
    }
    if let Err(errors) = config.validate(None) {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(AlienfxError::Config(msgs.join("; ")));
    }
    let assignments: Vec<String> = config
        .colors
        .iter()
        .map(|(zone, color)| format!("{zone}={color}"))
        .collect();
    send(&config, &assignments, json)
}
