//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Per-site focus time tracker.
///
/// Attributes wall-clock time to the focused website, keeps running totals per
/// hostname, and reports focus/distraction split and limit violations.
#[derive(Debug, Parser)]
#[command(name = "st", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the tracker, reading host events as JSON lines from stdin.
    Run,

    /// Show the usage report.
    Report {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show current tracking status.
    Status,

    /// Delete all recorded usage.
    Clear,

    /// Import a JSON object mapping hostnames to stored values.
    Import {
        /// File to read; stdin when omitted.
        path: Option<PathBuf>,
    },

    /// Export all stored values as a JSON object.
    Export,
}
