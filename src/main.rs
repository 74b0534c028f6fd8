use clap::Parser;

use foncier::cli::{Cli, Commands};
use foncier::commands::{pipeline, serve};

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::Pipeline(args) => pipeline::run(&cli, args),
        Commands::Serve(args) => serve::run(&cli, args),
    }
}
