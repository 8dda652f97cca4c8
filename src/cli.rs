use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    /// Configuration files, one simulation run each.
    #[clap(value_name = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub configs: Vec<PathBuf>,

    /// Print each run summary as JSON on stdout.
    #[clap(long = "json-summary", env = "MPC_JSON_SUMMARY")]
    pub json_summary: bool,
}
