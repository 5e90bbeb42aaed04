mod clutch_subcommand;
mod db;

use clap::Parser;

pub use clutch_subcommand::{ClutchSubcommand, DbCommand};
pub use db::db_command;

#[derive(Parser, Debug)]
#[command(name = "clutch", about = "Historical match-data harvester for HLTV.org")]
pub struct ClutchCli {
    /// Path to a TOML config file; built-in defaults apply when absent.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: ClutchSubcommand,
}

impl ClutchCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
