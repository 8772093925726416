//! CLI command definitions using clap.
//!
//! - watch: keep polling and print every display change (default)
//! - status: fetch once and print the current display

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// wkbar - WaniKani review queue poller
#[derive(Parser, Debug)]
#[command(name = "wkbar")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print announcements as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Poll the review queue and print every display change until Ctrl-C
    Watch,

    /// Fetch the review queue once and print the display line
    Status,
}
