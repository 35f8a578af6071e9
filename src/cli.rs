//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

/// qrtally - edge analytics and promotion redemption for QR-coded venues
#[derive(Parser)]
#[command(name = "qrtally")]
#[command(version)]
#[command(about = "Edge analytics and one-time promotion redemption", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands (default: serve)
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve,

    /// Print the deterministic canonical id for each slug
    GenId {
        #[arg(required = true)]
        slugs: Vec<String>,
    },

    /// Seed alias records from a CSV listing (`slug[,id]`)
    #[cfg(feature = "cli")]
    Seed {
        /// CSV file path
        file: String,

        /// Replace existing aliases that point elsewhere
        #[arg(long)]
        overwrite: bool,
    },

    /// Resolve a slug or id against the configured store
    Resolve { slug: String },

    /// Print a sample configuration file
    ConfigSample {
        /// Output path (default: stdout)
        output: Option<String>,
    },
}
