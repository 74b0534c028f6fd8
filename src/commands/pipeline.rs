use anyhow::{Context, Result};

use crate::cli::{Cli, PipelineArgs, PipelineStep};
use crate::config::Settings;
use crate::io;
use crate::pipeline::dedup;
use crate::pipeline::stats::Aggregator;
use crate::refdata::RefTables;
use crate::store::Store;

pub fn run(_cli: &Cli, args: &PipelineArgs) -> Result<()> {
    let settings = Settings::with_data_dir(&args.data_dir);
    match args.step {
        Some(PipelineStep::Etl) => etl(&settings, args.force),
        Some(PipelineStep::Stats) => stats(&settings),
        None => {
            etl(&settings, args.force)?;
            stats(&settings)
        }
    }
}

/// Read the raw feed and materialize the deduplicated transaction table.
fn etl(settings: &Settings, force: bool) -> Result<()> {
    if settings.transactions_exist() && !force {
        log::info!(
            "[commands::pipeline] transaction table already at {}; skipping (use --force to rebuild)",
            settings.transactions_path().display()
        );
        return Ok(());
    }
    let raw = io::csv::read_raw_feed(&settings.raw_dir())?;
    log::info!("[commands::pipeline] read {} raw lines", raw.height());
    let clean = dedup::deduplicate(raw)?;
    log::info!("[commands::pipeline] {} transactions after deduplication", clean.height());
    std::fs::create_dir_all(&settings.data_dir)
        .with_context(|| format!("[commands::pipeline] Failed to create {}", settings.data_dir.display()))?;
    io::parquet::write_parquet(clean, &settings.transactions_path())
}

/// Compute the five-level statistics set and the top-communes report.
fn stats(settings: &Settings) -> Result<()> {
    let store = Store::open(settings)?;
    let refs = RefTables::load(settings)?;
    let aggregator = Aggregator::new(settings, &refs);

    let (set, names) = aggregator.compute_all(store.scan_transactions()?)?;
    store.write_stats(&set)?;
    log::info!(
        "[commands::pipeline] wrote statistics: {} regions, {} departments, {} cantons, {} communes",
        set.region.len(),
        set.departement.len(),
        set.canton.len(),
        set.commune.len()
    );

    let top = aggregator.top_expensive(&set.commune, &names);
    store.write_top(&top)?;
    log::info!("[commands::pipeline] wrote top-communes report ({} entries)", top.len());
    Ok(())
}
