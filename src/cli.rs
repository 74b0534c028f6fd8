use std::path::PathBuf;

/// Property price statistics CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "foncier", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the offline batch pipeline (deduplication + statistics)
    Pipeline(PipelineArgs),

    /// Serve the statistics and parcel tile API
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
pub struct PipelineArgs {
    /// Run a single step instead of the full pipeline
    #[arg(long, value_enum)]
    pub step: Option<PipelineStep>,

    /// Data directory (raw feed in, artifacts out)
    #[arg(short, long, default_value = "data", value_hint = clap::ValueHint::DirPath)]
    pub data_dir: PathBuf,

    /// Rebuild the transaction table even if it already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum PipelineStep {
    /// Read the raw feed and write the deduplicated transaction table
    Etl,
    /// Compute the five-level statistics and the top-communes report
    Stats,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    pub addr: String,

    /// Data directory holding the pipeline artifacts
    #[arg(short, long, default_value = "data", value_hint = clap::ValueHint::DirPath)]
    pub data_dir: PathBuf,
}
