// SPDX-License-Identifier: Apache-2.0
//! Get, set and auto command implementations.

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;

use rsane::{InfoFlags, OptionDescriptor, OptionValue};

use super::common::{OutputFormat, Sane, print_json, resolve_option};

#[derive(Serialize)]
struct ValueReport<'a> {
    device: &'a str,
    index: usize,
    option: &'a str,
    value: Option<&'a OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    info: Option<InfoFlags>,
}

fn report(
    device: &str,
    desc: &OptionDescriptor,
    value: Option<&OptionValue>,
    info: Option<InfoFlags>,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(&ValueReport {
            device,
            index: desc.index,
            option: &desc.name,
            value,
            info,
        });
    }

    let shown = value.map_or_else(|| "-".to_string(), |v| format!("{v}{}", desc.unit.suffix()));
    println!("{} = {}", style(&desc.name).bold(), style(shown).green());
    if let Some(info) = info {
        if info.contains(InfoFlags::INEXACT) {
            println!("  {} device rounded the requested value", style("note:").yellow());
        }
        if info.contains(InfoFlags::RELOAD_OPTIONS) {
            println!("  {} other options may have changed", style("note:").yellow());
        }
    }
    Ok(())
}

/// Execute the get command.
pub fn get(mock: bool, device: &str, option: &str, format: OutputFormat) -> Result<()> {
    let sane = Sane::start(mock)?;
    let session = sane.open(device)?;
    let desc = resolve_option(&session, option)?;
    let value = session
        .get_option_value(desc.index)
        .with_context(|| format!("cannot read '{}'", desc.name))?;
    report(device, &desc, Some(&value), None, format)
}

/// Execute the set command.
pub fn set(mock: bool, device: &str, option: &str, raw: &str, format: OutputFormat) -> Result<()> {
    let sane = Sane::start(mock)?;
    let session = sane.open(device)?;
    let desc = resolve_option(&session, option)?;
    let requested = OptionValue::parse_for(&desc, raw)?;
    let outcome = session
        .set_option_value(desc.index, requested)
        .with_context(|| format!("cannot set '{}'", desc.name))?;
    tracing::info!("set '{}' on '{device}': {}", desc.name, outcome.info);
    report(device, &desc, Some(&outcome.value), Some(outcome.info), format)
}

/// Execute the auto command.
pub fn auto(mock: bool, device: &str, option: &str, format: OutputFormat) -> Result<()> {
    let sane = Sane::start(mock)?;
    let session = sane.open(device)?;
    let desc = resolve_option(&session, option)?;
    let info = session
        .set_option_auto(desc.index)
        .with_context(|| format!("cannot set '{}' automatically", desc.name))?;
    let value = if desc.is_readable() {
        Some(session.get_option_value(desc.index)?)
    } else {
        None
    };
    report(device, &desc, value.as_ref(), Some(info), format)
}
