//! Gauge host process.
//!
//! Runs a balance engine per configured provider. Processes sharing a store
//! directory elect one leader that polls providers; the others display what
//! the leader persisted.

mod app;
mod cli;
mod host;
mod logging;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use gauge_config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	logging::setup_tracing(cli.verbose());

	let config = Config::discover(cli.config.as_deref()).context("loading configuration")?;

	match cli.command {
		Command::Run { .. } => app::run(config).await,
		Command::Show => app::show(&config).await,
		Command::Refresh { id } => app::refresh_once(config, &id).await,
	}
}
