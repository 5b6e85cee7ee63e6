//! Subcommand definitions for compass.

pub mod config;
pub mod render;
pub mod search;

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search every project for resources whose name matches TERM
    Search(SearchArgs),

    /// Find what an IP address belongs to across projects
    #[command(name = "lookup-ip")]
    LookupIp(LookupIpArgs),

    /// Config file commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text to look for in resource names
    #[arg(value_name = "TERM")]
    pub term: String,

    /// Match TERM as an ordered subsequence instead of a substring
    #[arg(long)]
    pub fuzzy: bool,

    #[command(flatten)]
    pub options: SearchOptions,
}

#[derive(Args, Debug)]
pub struct LookupIpArgs {
    /// IPv4 or IPv6 address
    #[arg(value_name = "IP")]
    pub ip: String,

    #[command(flatten)]
    pub options: SearchOptions,
}

/// Flags shared by `search` and `lookup-ip`.
#[derive(Args, Debug, Default)]
pub struct SearchOptions {
    /// Post-filter results: space-separated terms (AND), `a|b` (OR), `-x` (NOT)
    #[arg(short, long, value_name = "EXPR")]
    pub filter: Option<String>,

    /// Restrict the search to these projects (repeatable)
    #[arg(short, long = "project", value_name = "PROJECT")]
    pub projects: Vec<String>,

    /// Maximum number of projects queried at once
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Inventory snapshot to search (overrides config)
    #[arg(long, value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Act on result N (1-based) so its project is searched first next time
    #[arg(long, value_name = "N")]
    pub select: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the config file
    Validate,
    /// Show effective configuration
    Show,
}
