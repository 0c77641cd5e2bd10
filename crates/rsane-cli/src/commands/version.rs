// SPDX-License-Identifier: Apache-2.0
//! Version command implementation.

use anyhow::Result;
use console::style;
use serde::Serialize;

use super::common::{OutputFormat, Sane, print_json};

#[derive(Serialize)]
struct VersionReport {
    rsane: &'static str,
    /// `None` when libsane could not be loaded.
    sane: Option<String>,
    sane_error: Option<String>,
}

/// Execute the version command.
pub fn execute(mock: bool, format: OutputFormat) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let (sane, sane_error) = match Sane::start(mock) {
        Ok(sane) => (Some(sane.version.to_string()), None),
        Err(e) => (None, Some(format!("{e:#}"))),
    };

    if format == OutputFormat::Json {
        return print_json(&VersionReport {
            rsane: version,
            sane,
            sane_error,
        });
    }

    println!(
        "{} {} - SANE scanner access from Rust",
        style("rsane").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    match (sane, sane_error) {
        (Some(v), _) => println!("libsane:    {}", style(v).green()),
        (None, Some(e)) => println!("libsane:    {} ({e})", style("unavailable").red()),
        (None, None) => {}
    }
    println!("License:    {}", style("Apache-2.0").dim());
    Ok(())
}
