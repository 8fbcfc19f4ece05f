use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cfstats")]
#[command(about = "Cloudflare Pages and Workers request tracker")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON output format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize fresh configuration
    Init,
    /// Set configuration value
    Set {
        /// Configuration key (e.g., thresholds.pages_request_increase)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum HistoryAction {
    /// Show recorded request counts
    Show {
        /// Only this kind (pages or workers)
        #[arg(long)]
        kind: Option<String>,

        /// Only the last N days
        #[arg(long)]
        days: Option<u32>,
    },
    /// Drop entries older than the retention window
    Prune,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Fetch counts, check thresholds, save history and send the report (default)
    Run {
        /// Build and print the report without saving or sending anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect or prune stored history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}
