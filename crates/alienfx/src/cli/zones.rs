//! `zones` subcommand: list a model's zones and region masks.

use alienfx_lib::controller::AttachError;
use alienfx_lib::zones::ZoneTable;

use super::{Result, ZonesOutput, resolve_model};

pub(super) fn cmd_zones(model: &str, json: bool) -> Result<()> {
    let model = resolve_model(model)?;
    let zones = ZoneTable::from_descriptors(model.zones)
        .map_err(|_| AttachError::AllocationFailure)?
        .infos();

    if json {
        return super::print_json(&ZonesOutput {
            model: model.name.to_string(),
            vendor_id: model.vendor_id,
            product_id: model.product_id,
            zones,
        });
    }

    println!(
        "{} ({:04X}:{:04X}), {} zones:",
        model.name,
        model.vendor_id,
        model.product_id,
        zones.len()
    );
    println!();
    let w = super::kv_width(&zones.iter().map(|z| z.name.as_str()).collect::<Vec<_>>());
    for z in &zones {
        println!("  {}", super::format_kv(&z.name, format_args!("0x{:06X}", z.region), w));
    }
    Ok(())
}
