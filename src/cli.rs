//! Command-line interface definition for Klaxon
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for running a monitoring pass and inspecting the
//! persisted watermark.

use clap::{Parser, Subcommand};

/// Klaxon - webpage change monitor
///
/// Watches a page region for content changes by comparing the live page
/// against its last archived capture, and alerts on meaningful differences.
#[derive(Parser, Debug, Clone)]
#[command(name = "klaxon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Klaxon
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Execute one monitoring run
    Run {
        /// Page URL to watch (overrides site.url from config)
        #[arg(short, long)]
        site: Option<String>,

        /// CSS selector scoping the watched region (overrides config)
        #[arg(long)]
        selector: Option<String>,

        /// Tag or attribute name to prune before comparison
        #[arg(short, long)]
        exclude: Option<String>,
    },

    /// Show the persisted watermark state
    Status,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
