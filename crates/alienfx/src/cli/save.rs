//! `save` subcommand: store zone colors in the config file for `apply`.

use std::path::Path;

use super::{
    AlienfxError, Config, Result, SaveOutput, kv, kv_width, led, parse_assignment, resolve_model,
};

pub(super) fn cmd_save(
    assignments: &[String],
    model: &str,
    json: bool,
    custom_path: Option<&Path>,
) -> Result<()> {
    let model = resolve_model(model)?;
    let path = custom_path
        .map(Path::to_path_buf)
        .or_else(Config::path)
        .ok_or_else(|| AlienfxError::Config("No config directory".into()))?;

    // Parse everything before touching the file.
    let colors = assignments
        .iter()
        .map(|a| parse_assignment(a, model))
        .collect::<Result<Vec<_>>>()?;

    let (mut config, warnings) = Config::load_from(&path);
    if let Some(w) = warnings.first() {
        return Err(AlienfxError::Config(format!("not overwriting: {w}")));
    }
    for (zone, color) in &colors {
        config
            .colors
            .insert(zone.to_string(), led::format_color(*color));
    }
    config.save_to(&path)?;
    log::debug!("saved {} color(s) to {}", colors.len(), path.display());

    if json {
        return super::print_json(&SaveOutput {
            config_file: path.display().to_string(),
            colors: config.colors,
        });
    }

    println!("Saved to {}:", path.display());
    let w = kv_width(&colors.iter().map(|(name, _)| *name).collect::<Vec<_>>());
    for (name, color) in &colors {
        kv(&format!("  {name}"), led::format_color(*color), w + 2);
    }
    Ok(())
}
