//! CLI command definitions and parsing
use crate::analyzer::DecayThresholds;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pagedecay",
    version,
    about = "Detect organic search content decay",
    long_about = "pagedecay compares the earlier and recent halves of each page's search \
                  performance history, flags pages whose clicks, impressions or ranking \
                  declined past configurable thresholds, and ranks them by severity."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/pagedecay/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze pages for content decay
    Analyze {
        /// Read page series from a JSON file instead of the store
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Profile to apply (e.g., "aggressive")
        #[arg(short, long)]
        profile: Option<String>,

        /// Maximum pages to load from the store
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only use snapshots within the configured lookback window
        #[arg(long)]
        since_lookback: bool,

        /// Report format
        #[arg(short, long, value_parser = ["table", "markdown", "json"], default_value = "table")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Record decay flags and clear stale ones in the store
        #[arg(long)]
        persist: bool,

        #[command(flatten)]
        overrides: ThresholdArgs,
    },

    /// Import page series from a JSON file into the store
    Import {
        /// JSON file with an array of page series
        file: PathBuf,
    },

    /// Evaluate a single stored page
    Show {
        /// Page identifier
        page_id: String,

        #[command(flatten)]
        overrides: ThresholdArgs,
    },

    /// Show store statistics, flagged pages and recent runs
    Status,

    /// Print the recommendation input for the top decaying pages
    Recommend {
        /// Read page series from a JSON file instead of the store
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Profile to apply (e.g., "aggressive")
        #[arg(short, long)]
        profile: Option<String>,

        /// Number of pages to include (defaults to analysis.top_recommendations)
        #[arg(short = 'n', long)]
        top: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Per-invocation threshold overrides
#[derive(Args, Debug, Default, Clone)]
pub struct ThresholdArgs {
    /// Minimum % decline in clicks to flag decay
    #[arg(long, value_name = "PCT")]
    pub clicks_drop: Option<f64>,

    /// Minimum % decline in impressions to flag decay
    #[arg(long, value_name = "PCT")]
    pub impressions_drop: Option<f64>,

    /// Minimum increase in average position to flag decay
    #[arg(long, value_name = "N")]
    pub position_drop: Option<f64>,

    /// Skip pages whose earlier average clicks fall below this
    #[arg(long, value_name = "N")]
    pub min_previous_clicks: Option<f64>,
}

impl ThresholdArgs {
    /// Overlay any flags that were given onto `thresholds`
    pub fn apply(&self, thresholds: &mut DecayThresholds) {
        if let Some(v) = self.clicks_drop {
            thresholds.clicks_drop_percent = v;
        }
        if let Some(v) = self.impressions_drop {
            thresholds.impressions_drop_percent = v;
        }
        if let Some(v) = self.position_drop {
            thresholds.position_drop_threshold = v;
        }
        if let Some(v) = self.min_previous_clicks {
            thresholds.min_previous_clicks = v;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
