// SPDX-License-Identifier: Apache-2.0
//! rsane command-line interface
//!
//! Lists the scanners SANE can see and reads or changes their options.
//!
//! ```text
//! rsane devices
//! rsane options test:0
//! rsane set test:0 resolution 300
//! rsane --mock --format json get test:0 mode
//! ```

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::OutputFormat;
use commands::{devices, options, values, version};

/// rsane - inspect and configure SANE scanners
#[derive(Parser, Debug)]
#[command(name = "rsane")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Use the built-in emulated scanners instead of libsane
    #[arg(long, env = "RSANE_MOCK", global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available devices
    Devices {
        /// Skip devices reached over the network
        #[arg(long)]
        local_only: bool,
    },

    /// List the options of a device and their current values
    Options {
        /// Device name as printed by `devices`
        device: String,
    },

    /// Print the value of one option
    Get {
        /// Device name
        device: String,

        /// Option name or index
        option: String,
    },

    /// Change the value of one option
    Set {
        /// Device name
        device: String,

        /// Option name or index
        option: String,

        /// New value; comma-separated for array options
        value: String,
    },

    /// Let the device choose the value of an option
    Auto {
        /// Device name
        device: String,

        /// Option name or index
        option: String,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = cli.format;
    let mock = cli.mock;

    // Execute command
    let result = match cli.command {
        Commands::Devices { local_only } => devices::execute(mock, local_only, format),
        Commands::Options { device } => options::execute(mock, &device, format),
        Commands::Get { device, option } => values::get(mock, &device, &option, format),
        Commands::Set {
            device,
            option,
            value,
        } => values::set(mock, &device, &option, &value, format),
        Commands::Auto { device, option } => values::auto(mock, &device, &option, format),
        Commands::Version => version::execute(mock, format),
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
