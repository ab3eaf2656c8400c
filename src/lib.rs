pub mod analysis;
pub mod cli;
pub mod climb;
pub mod db;
pub mod error;
pub mod export;
pub mod force;
pub mod geometry;
pub mod models;
pub mod replay;
pub mod settings;
pub mod tips;
pub mod utils;

use anyhow::Context;
use clap::Parser;

use cli::Cli;

/// Replay the script named on the command line and print the resulting score reports.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::logging::init_logging();

    log::info!("climb-rocks starting up...");

    let options = cli.replay_options();
    let events = replay::load_script(&cli.script)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let reports = runtime.block_on(replay::replay(events, &options))?;

    for report in &reports {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    if reports.is_empty() {
        log::warn!("no attempt finished during the replay");
    }

    Ok(())
}
