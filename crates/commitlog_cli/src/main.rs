//! Commitlog CLI
//!
//! Command-line tools for file-backed commit log directories.
//!
//! # Commands
//!
//! - `append` - Append one record
//! - `dump` - Print records from an offset onwards
//! - `inspect` - Display per-segment statistics
//! - `verify` - Check every frame of every segment
//! - `compact` - Keep only the latest record per key

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Commit log maintenance and debugging tools.
#[derive(Parser)]
#[command(name = "commitlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Segment size at which the log rolls
    #[arg(global = true, long)]
    max_segment_bytes: Option<u64>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append one record
    Append {
        /// Record key (omit for an unkeyed record)
        #[arg(short, long)]
        key: Option<String>,

        /// Record value
        #[arg(long, required_unless_present = "tombstone")]
        value: Option<String>,

        /// Append a tombstone for the key instead of a value
        #[arg(short, long, requires = "key", conflicts_with = "value")]
        tombstone: bool,
    },

    /// Print records starting at an offset
    Dump {
        /// First offset to print
        #[arg(short, long, default_value = "0")]
        offset: u64,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display per-segment statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify the integrity of every segment
    Verify,

    /// Compact closed segments, keeping the latest record per key
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let options = commands::LogOptions {
        max_segment_bytes: cli.max_segment_bytes,
    };

    match cli.command {
        Commands::Append {
            key,
            value,
            tombstone,
        } => {
            let path = cli.path.ok_or("Log path required for append")?;
            let value = if tombstone { None } else { value };
            commands::append::run(&path, &options, key, value)?;
        }
        Commands::Dump {
            offset,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Log path required for dump")?;
            commands::dump::run(&path, &options, offset, limit, &format)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, &options, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Log path required for verify")?;
            commands::verify::run(&path, &options)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Log path required for compact")?;
            commands::compact::run(&path, &options, dry_run)?;
        }
        Commands::Version => {
            println!("Commitlog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Commitlog Core v{}", commitlog_core::VERSION);
            println!("Frame format v{}", commitlog_core::FORMAT_VERSION);
        }
    }

    Ok(())
}
