//! Command-line interface.

use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pgrange", version, about = "Sharded PostgreSQL proxy and query router")]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "pgrange.toml")]
    pub config: PathBuf,
}
