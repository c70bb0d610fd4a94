#![cfg(not(tarpaulin_include))]

use clap::Parser;
use dashboard::{app, config::Config};

/// Main entry point for the dashboard server
///
/// Reads configuration from flags and `DASHBOARD_*` variables, then serves
/// until interrupted. Log verbosity follows `RUST_LOG` (default `info`).
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    app::run(config).await
}
