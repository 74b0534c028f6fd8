use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{Cli, ServeArgs};
use crate::config::Settings;
use crate::serve::{self, AppState};

pub fn run(_cli: &Cli, args: &ServeArgs) -> Result<()> {
    let settings = Settings::with_data_dir(&args.data_dir);
    let state = Arc::new(AppState::new(settings)?);

    let runtime = tokio::runtime::Runtime::new()
        .context("[commands::serve] Failed to start async runtime")?;
    runtime.block_on(serve::run(&args.addr, state))
}
