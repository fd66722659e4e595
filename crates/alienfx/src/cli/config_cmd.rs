//! `config` subcommand: show current configuration and file path.

use std::path::Path;

use super::{Config, ConfigOutput, Result, kv, kv_width, led, load_config};

pub(super) fn cmd_config(json: bool, custom_path: Option<&Path>) -> Result<()> {
    let config = load_config(custom_path);
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate(super::models::all_models().first().copied())
    {
        Ok(()) => vec![],
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };

    if json {
        return super::print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            problems,
        });
    }

    let w = kv_width(&[
        "Config file:",
        "  settle_delay_ms:",
        "  skip_empty:",
        "  reset_mode:",
        "  device_serial:",
    ]);

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv("  settle_delay_ms:", config.settle_delay_ms, w);
    kv("  skip_empty:", config.skip_empty, w);
    kv("  reset_mode:", &config.reset_mode, w);
    let serial = if config.device_serial.is_empty() {
        "(first device)"
    } else {
        config.device_serial.as_str()
    };
    kv("  device_serial:", serial, w);

    if !config.colors.is_empty() {
        println!();
        println!("Colors:");
        for (zone, value) in &config.colors {
            let shown = match led::parse_color(value) {
                Ok(c) => format!("{value} -> {}", led::format_color(c)),
                Err(_) => format!("{value} (invalid)"),
            };
            kv(&format!("  {zone}:"), shown, w);
        }
    }

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}
