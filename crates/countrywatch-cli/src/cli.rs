//! CLI argument definitions for countrywatch.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `refresh` | Fetch countries and rates, reconcile them into the local store |
//! | `list` | List stored countries with filters, sort and pagination |
//! | `get` | Show one country by name |
//! | `delete` | Delete one country by name |
//! | `status` | Total countries and last refresh time |
//! | `summary` | Print the last published refresh summary |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--home` | `$COUNTRYWATCH_HOME` or `~/.countrywatch` | Data directory |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | `info` | Log filter when `RUST_LOG` is unset |
//!
//! # Examples
//!
//! ```bash
//! countrywatch refresh --timeout-ms 5000
//! countrywatch list --region Africa --sort gdp_desc --limit 10 --pretty
//! countrywatch get nigeria
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Country and exchange-rate refresh CLI.
#[derive(Debug, Parser)]
#[command(
    name = "countrywatch",
    author,
    version,
    about = "Country and exchange-rate refresh CLI",
    long_about = "countrywatch fetches country reference data and USD exchange rates, \
reconciles them into a local DuckDB store with an estimated GDP per country, and serves \
the stored data back as JSON.\n\
\n\
Use 'countrywatch <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Data directory holding the database and the summary artifact.
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log filter used when RUST_LOG is not set (e.g. info, debug).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch both sources and reconcile them into the store.
    Refresh(RefreshArgs),
    /// List stored countries.
    List(ListArgs),
    /// Show one country by name (case-insensitive).
    Get(NameArgs),
    /// Delete one country by name (case-insensitive).
    Delete(NameArgs),
    /// Total stored countries and last refresh time.
    Status,
    /// Print the last published refresh summary.
    Summary,
}

#[derive(Debug, Clone, Args)]
pub struct RefreshArgs {
    /// Per-source fetch timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Maximum number of countries reconciled concurrently.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override the countries endpoint.
    #[arg(long)]
    pub countries_url: Option<String>,

    /// Override the exchange-rate endpoint.
    #[arg(long)]
    pub rates_url: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Exact region match.
    #[arg(long)]
    pub region: Option<String>,

    /// Exact currency code match.
    #[arg(long)]
    pub currency: Option<String>,

    /// gdp_desc, gdp_asc, population_desc, population_asc, name_asc or name_desc.
    #[arg(long, default_value = "name_asc")]
    pub sort: String,

    #[arg(long, default_value_t = 1_000)]
    pub limit: usize,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

#[derive(Debug, Clone, Args)]
pub struct NameArgs {
    /// Country name.
    pub name: String,
}
