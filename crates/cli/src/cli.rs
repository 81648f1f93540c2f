use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gauge")]
#[command(about = "Provider balance monitor shared across processes")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Configuration file (defaults to the platform config dir)
	#[arg(short, long, value_name = "PATH", global = true)]
	pub config: Option<PathBuf>,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
	/// Run the engines until interrupted
	Run {
		/// Verbose logging
		#[arg(short, long)]
		verbose: bool,
	},
	/// Print persisted balances and the current leader without querying
	Show,
	/// Query one provider now and persist the result
	Refresh {
		/// Provider id, e.g. `deepseek`
		id: String,
	},
}

impl Cli {
	pub fn verbose(&self) -> bool {
		matches!(self.command, Command::Run { verbose: true })
	}
}
