//! CLI entrypoint for the dynbind host probe.

use std::io;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dynbind_core::{JsonlSink, Verbosity};
use dynbind_harness::report::parse_platform;
use dynbind_harness::{LocateReport, ProbeReport, ProbeRequest};

/// Locate and load native libraries the way dynbind does.
#[derive(Debug, Parser)]
#[command(name = "dynbind-harness")]
#[command(about = "Probe native library resolution on this host")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the candidates for the given names, most preferred first.
    Locate {
        /// Logical library name (repeatable, tried in order).
        #[arg(long = "name", required = true)]
        names: Vec<String>,
        /// Search directory, or several joined by the platform separator.
        #[arg(long)]
        dir: Option<String>,
        /// Naming rules to apply: `windows`, `macos` or `unix`. Default: host.
        #[arg(long)]
        platform: Option<String>,
    },
    /// Load the library and report which symbols it exports.
    Probe {
        /// Human-readable library description used in messages.
        #[arg(long)]
        description: String,
        /// Logical library name (repeatable, tried in order).
        #[arg(long = "name", required = true)]
        names: Vec<String>,
        /// Search directory. Overrides `--env-var`.
        #[arg(long)]
        dir: Option<String>,
        /// Environment variable holding the search directory.
        #[arg(long)]
        env_var: Option<String>,
        /// Symbol to check for (repeatable).
        #[arg(long = "symbol")]
        symbols: Vec<String>,
        /// Also report every bind attempt.
        #[arg(long)]
        verbose: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Locate {
            names,
            dir,
            platform,
        } => {
            let platform = parse_platform(platform.as_deref())?;
            let report = LocateReport::build(&names, dir.as_deref(), platform, None)?;
            println!("{}", report.to_json()?);
        }
        Command::Probe {
            description,
            names,
            dir,
            env_var,
            symbols,
            verbose,
        } => {
            let request = ProbeRequest {
                description,
                names,
                dir,
                env_var,
                symbols,
                sink: Arc::new(JsonlSink::new(io::stderr())),
                verbosity: verbose.then_some(Verbosity::Verbose),
            };
            let report = ProbeReport::run(&request)?;
            println!("{}", report.to_json()?);
        }
    }

    Ok(())
}
