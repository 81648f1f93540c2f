use std::path::PathBuf;

/// Installs the global subscriber.
///
/// `GAUGE_LOG` (falling back to `RUST_LOG`) overrides the filter. With
/// `GAUGE_LOG_DIR` set, events go to `gauge.<pid>.log` in that directory
/// instead of stderr.
pub fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_env("GAUGE_LOG")
			.or_else(|_| EnvFilter::try_from_default_env())
			.unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("gauge=trace,info")
				} else {
					EnvFilter::new("gauge=info,warn")
				}
			})
	};

	if let Some(log_dir) = std::env::var("GAUGE_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("gauge.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_target(true);

			tracing_subscriber::registry().with(filter()).with(file_layer).init();

			tracing::info!(path = ?log_path, "gauge.tracing");
			return;
		}
	}

	tracing_subscriber::registry()
		.with(filter())
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();
}
