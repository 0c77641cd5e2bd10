// SPDX-License-Identifier: Apache-2.0
//! Options command implementation.
//!
//! Walks every descriptor of one device, printing group headers, current
//! values of readable options, and their legal values.

use anyhow::Result;
use console::style;
use serde::Serialize;

use rsane::{OptionDescriptor, OptionValue};

use super::common::{OutputFormat, Sane, describe_constraint, print_json};

#[derive(Serialize)]
struct OptionEntry {
    #[serde(flatten)]
    descriptor: OptionDescriptor,
    value: Option<OptionValue>,
}

/// Execute the options command.
pub fn execute(mock: bool, device: &str, format: OutputFormat) -> Result<()> {
    let sane = Sane::start(mock)?;
    let session = sane.open(device)?;

    let mut entries = Vec::new();
    for descriptor in session.options()? {
        let value = if descriptor.is_readable() {
            match session.get_option_value(descriptor.index) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("cannot read option '{}': {e}", descriptor.name);
                    None
                }
            }
        } else {
            None
        };
        entries.push(OptionEntry { descriptor, value });
    }
    session.close()?;

    if format == OutputFormat::Json {
        return print_json(&entries);
    }

    println!("{} options of {}:", style("SANE").cyan().bold(), style(device).bold());
    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &OptionEntry) {
    let desc = &entry.descriptor;
    if desc.is_group() {
        println!();
        println!("  {}", style(&desc.title).cyan().bold());
        return;
    }

    let value = match &entry.value {
        Some(v) => format!("{v}{}", desc.unit.suffix()),
        None if desc.value_type.carries_value() => "-".to_string(),
        None => String::new(),
    };
    let constraint = describe_constraint(desc);
    let line = format!(
        "    [{:>2}] {:<16} {:<7} {:<12} {}",
        desc.index,
        desc.name,
        desc.value_type.to_string(),
        value,
        constraint
    );

    if desc.capabilities.is_active() {
        if desc.is_settable() {
            println!("{line}");
        } else {
            println!("{} {}", line, style("(read-only)").dim());
        }
    } else {
        println!("{} {}", style(line).dim(), style("(inactive)").dim());
    }
}
