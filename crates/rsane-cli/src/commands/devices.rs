// SPDX-License-Identifier: Apache-2.0
//! Devices command implementation.

use anyhow::Result;
use console::style;

use super::common::{OutputFormat, Sane, print_json};

/// Execute the devices command.
pub fn execute(mock: bool, local_only: bool, format: OutputFormat) -> Result<()> {
    let _sane = Sane::start(mock)?;
    let devices = if local_only {
        rsane::get_devices_with(true)?
    } else {
        rsane::get_devices()?
    };

    if format == OutputFormat::Json {
        return print_json(&devices);
    }

    if devices.is_empty() {
        println!("{} No devices found.", style("○").dim());
        return Ok(());
    }

    println!("{} {} device(s):\n", style("SANE").cyan().bold(), devices.len());
    for device in &devices {
        println!("  {} {}", style("●").green(), style(&device.name).bold());
        println!("    {} {} ({})", device.vendor, device.model, device.kind);
    }
    Ok(())
}
