pub mod cli;
pub mod commands;
pub mod config;
pub mod gateway;
pub mod graphql;
pub mod render;
pub mod store;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

pub use gateway::{GatewayError, SyncGateway, SyncOp};
pub use store::{SyncSummary, TaskStore};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting planner CLI"
    );

    let mut cfg = config::Config::load(cli.plannerrc.as_deref())?;
    cfg.apply_overrides(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value)));
    debug!(files = ?cfg.loaded_files, "configuration resolved");

    let renderer = render::Renderer::new(&cfg)?;

    // Every store operation shares this single cooperative event loop.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start event loop")?;

    runtime.block_on(commands::dispatch(&cfg, &renderer, cli.command))?;

    info!("done");
    Ok(())
}
