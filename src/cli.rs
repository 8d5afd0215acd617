use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::fetch::RetryPolicy;
use crate::matching::MatchConfig;

#[derive(Parser, Debug)]
#[command(
    name = "cnes-roster",
    version,
    about = "CNES professional roster parsing and unit phone matching"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
    Parse(ParseArgs),
    Fetch(FetchArgs),
    Merge(MergeArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = ".cache/cnes-roster")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub pdf_path: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long)]
    pub max_pages: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    #[arg(long, default_value = ".cache/cnes-roster")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub input_path: Option<PathBuf>,

    #[arg(long, default_value_t = 30)]
    pub top_roles: usize,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    #[arg(long, default_value = ".cache/cnes-roster")]
    pub cache_root: PathBuf,

    #[arg(long = "unit-id")]
    pub unit_ids: Vec<String>,

    #[arg(long)]
    pub listing_html: Option<PathBuf>,

    #[arg(long)]
    pub units_path: Option<PathBuf>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub only_missing: bool,

    #[arg(long, default_value = "http://cnes2.datasus.gov.br/")]
    pub base_url: String,

    #[arg(long, default_value = "500320")]
    pub municipality_code: String,

    #[arg(long, default_value_t = 2)]
    pub attempts: u32,

    #[arg(long, default_value_t = 1000)]
    pub backoff_ms: u64,

    #[arg(long, default_value_t = 20)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = 800)]
    pub pause_ms: u64,
}

impl FetchArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            backoff: Duration::from_millis(self.backoff_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            pause: Duration::from_millis(self.pause_ms),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(long, default_value = ".cache/cnes-roster")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub units_path: Option<PathBuf>,

    #[arg(long)]
    pub details_path: Option<PathBuf>,

    #[arg(long)]
    pub directory_path: Option<PathBuf>,

    #[arg(long)]
    pub professionals_path: Option<PathBuf>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub skip_db: bool,

    #[arg(long, default_value_t = 0.4)]
    pub match_threshold: f64,

    #[arg(long, default_value_t = 2)]
    pub min_token_len: usize,

    #[arg(long, default_value_t = 0.2)]
    pub substring_bonus: f64,
}

impl MergeArgs {
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            threshold: self.match_threshold,
            min_token_len: self.min_token_len,
            substring_bonus: self.substring_bonus,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/cnes-roster")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}
