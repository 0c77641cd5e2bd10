// SPDX-License-Identifier: Apache-2.0
//! Shared helpers for CLI commands.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

use rsane::mock::MockBackend;
use rsane::{
    Constraint, DeviceSession, Fixed, LibraryVersion, OptionDescriptor, SaneConfig, ValueType,
};

/// How command output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// An initialised SANE library, shut down again on drop.
pub struct Sane {
    pub version: LibraryVersion,
}

impl Sane {
    /// Initialise from the environment, or with the emulated scanners when
    /// `mock` is set.
    pub fn start(mock: bool) -> Result<Self> {
        let version = if mock {
            rsane::init_with(MockBackend::new())
        } else {
            rsane::init_with_config(&SaneConfig::from_env())
        }
        .context("failed to initialise SANE")?;
        tracing::info!("using SANE {version}{}", if mock { " (mock)" } else { "" });
        Ok(Self { version })
    }

    pub fn open(&self, device: &str) -> Result<DeviceSession> {
        rsane::open(device).with_context(|| format!("cannot open '{device}'"))
    }
}

impl Drop for Sane {
    fn drop(&mut self) {
        rsane::exit();
    }
}

/// Resolve `query` as an option index or, failing that, an option name.
pub fn resolve_option(session: &DeviceSession, query: &str) -> Result<OptionDescriptor> {
    if let Ok(index) = query.parse::<usize>() {
        return session
            .get_option_descriptor(index)
            .with_context(|| format!("no option {index} on '{}'", session.device_name()));
    }
    session
        .find_option(query)?
        .ok_or_else(|| anyhow::anyhow!("no option named '{query}' on '{}'", session.device_name()))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}"))?;
    println!("{json}");
    Ok(())
}

/// Human-readable legal values, e.g. `1..1200 step 1` or `Gray|Color`.
pub fn describe_constraint(desc: &OptionDescriptor) -> String {
    let fixed = desc.value_type == ValueType::Fixed;
    let word = |w: i32| {
        if fixed {
            Fixed::from_raw(w).to_string()
        } else {
            w.to_string()
        }
    };
    match &desc.constraint {
        Constraint::None => String::new(),
        Constraint::Range(range) => {
            let mut text = format!("{}..{}", word(range.min), word(range.max));
            if range.quant > 0 {
                text.push_str(&format!(" step {}", word(range.quant)));
            }
            text
        }
        Constraint::WordList(words) => words.iter().map(|&w| word(w)).collect::<Vec<_>>().join("|"),
        Constraint::StringList(items) => items.join("|"),
    }
}
