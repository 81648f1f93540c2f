//! Wiring of store, election, queries and engines for one process.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use gauge_config::Config;
use gauge_lease::{LEASE_KEY, LeaderElection, LeaseRecord};
use gauge_query::providers::{self, HttpBalanceBackend};
use gauge_query::{BalanceInfo, CredentialProvider, QueryRegistry};
use gauge_status::{
	CachedStatus, EngineContext, ProviderStatusEntity, RefreshOutcome, StatusEngine, StatusItem, StatusRegistry,
	WidgetHost, format_amount,
};
use gauge_store::{FileStore, SharedStore, SharedStoreExt};
use gauge_worker::{Clock, SharedClock, SystemClock};
use tracing::{error, info, warn};

use crate::host::{LayeredCredentials, LogWidgetHost};

/// Everything one gauge process runs.
pub struct App {
	pub config: Config,
	pub process_id: String,
	pub store: Arc<dyn SharedStore>,
	pub clock: SharedClock,
	pub election: LeaderElection,
	pub credentials: Arc<dyn CredentialProvider>,
	pub queries: Arc<QueryRegistry>,
	pub registry: StatusRegistry,
	pub widgets: Arc<dyn WidgetHost>,
}

impl App {
	pub fn build(config: Config, store: Arc<dyn SharedStore>, clock: SharedClock, widgets: Arc<dyn WidgetHost>) -> Self {
		let process_id = config.process_id.clone().unwrap_or_else(generate_process_id);
		let election = LeaderElection::new(Arc::clone(&store), Arc::clone(&clock), config.lease.to_lease_config());
		let credentials: Arc<dyn CredentialProvider> = Arc::new(LayeredCredentials::from_config(&config));
		let queries = Arc::new(QueryRegistry::with_defaults(Arc::clone(&credentials)));

		for entry in &config.providers {
			let Some(base_url) = &entry.base_url else {
				continue;
			};
			match providers::builtin(&entry.id) {
				Some(def) => queries.register(
					entry.id.clone(),
					Arc::new(HttpBalanceBackend::new(def, Arc::clone(&credentials)).with_base_url(base_url.clone())),
				),
				None => warn!(provider = %entry.id, "gauge.provider.base_url_ignored"),
			}
		}

		Self {
			config,
			process_id,
			store,
			clock,
			election,
			credentials,
			queries,
			registry: StatusRegistry::new(),
			widgets,
		}
	}

	pub fn context(&self) -> EngineContext {
		EngineContext {
			store: Arc::clone(&self.store),
			election: self.election.clone(),
			widgets: Arc::clone(&self.widgets),
			clock: Arc::clone(&self.clock),
		}
	}

	/// One engine per enabled provider, or only `only` when given.
	///
	/// Providers whose engine configuration is invalid are logged and skipped.
	pub fn engines(&self, only: Option<&str>) -> Vec<Arc<dyn StatusItem>> {
		let mut engines: Vec<Arc<dyn StatusItem>> = Vec::new();
		for entry in self.config.enabled_providers() {
			if only.is_some_and(|id| id != entry.id) {
				continue;
			}
			if !self.queries.has_handler(&entry.id) {
				warn!(provider = %entry.id, "gauge.provider.no_backend");
			}
			let name = entry.display_name();
			let entity = ProviderStatusEntity::new(
				entry.id.clone(),
				name,
				Arc::clone(&self.queries),
				Arc::clone(&self.credentials),
			)
			.with_settings(entry.settings());
			match StatusEngine::new(self.config.engine.engine_config(&entry.id, name, entry.priority), entity) {
				Ok(engine) => engines.push(Arc::new(engine)),
				Err(error) => error!(provider = %entry.id, %error, "gauge.provider.invalid"),
			}
		}
		engines
	}

	/// Disposes every engine, then leaves the election.
	pub fn shutdown(&self) {
		self.registry.dispose_all();
		self.election.stop();
	}
}

fn generate_process_id() -> String {
	format!("gauge-{}-{}", std::process::id(), uuid::Uuid::new_v4().simple())
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn SharedStore>> {
	let dir = config.store_dir();
	let store = FileStore::open(&dir).with_context(|| format!("opening store at {}", dir.display()))?;
	Ok(Arc::new(store))
}

fn build_app(config: Config) -> anyhow::Result<App> {
	let store = open_store(&config)?;
	Ok(App::build(config, store, Arc::new(SystemClock), Arc::new(LogWidgetHost)))
}

/// `gauge run`: serve until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
	let app = build_app(config)?;
	let leadership = app.election.initialize(app.process_id.clone()).await?;
	info!(process_id = %app.process_id, ?leadership, store = %app.config.store_dir().display(), "gauge.start");

	let report = app.registry.initialize_all(app.engines(None), &app.context()).await;
	if app.registry.is_empty() {
		warn!("gauge.no_providers");
	}
	for (id, error) in &report.failed {
		warn!(entity = %id, %error, "gauge.engine.failed");
	}

	tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
	info!("gauge.shutdown");
	app.shutdown();
	Ok(())
}

/// `gauge refresh <id>`: one manual query, persisted for running processes to adopt.
pub async fn refresh_once(config: Config, id: &str) -> anyhow::Result<()> {
	let app = build_app(config)?;
	let engines = app.engines(Some(id));
	if engines.is_empty() {
		bail!("no enabled provider `{id}`");
	}

	let report = app.registry.initialize_all(engines, &app.context()).await;
	if let Some((_, error)) = report.failed.first() {
		app.shutdown();
		bail!("initializing `{id}`: {error}");
	}

	let outcome = app.registry.refresh(id).await;
	app.shutdown();
	match outcome {
		Some(RefreshOutcome::Updated) => {
			let mut out = String::new();
			write_summary(&app.config, app.store.as_ref(), app.clock.now(), &mut out).await?;
			print!("{out}");
			Ok(())
		}
		Some(RefreshOutcome::Failed(error)) => bail!("refreshing `{id}`: {error}"),
		Some(RefreshOutcome::Skipped(reason)) => bail!("refresh of `{id}` skipped: {reason:?}"),
		None => bail!("no enabled provider `{id}`"),
	}
}

/// `gauge show`: print what the store holds.
pub async fn show(config: &Config) -> anyhow::Result<()> {
	let store = open_store(config)?;
	let mut out = String::new();
	write_summary(config, store.as_ref(), SystemClock.now(), &mut out).await?;
	print!("{out}");
	Ok(())
}

/// Renders the lease owner and each enabled provider's persisted snapshot.
pub async fn write_summary(
	config: &Config,
	store: &dyn SharedStore,
	now: DateTime<Utc>,
	out: &mut String,
) -> anyhow::Result<()> {
	match store.get_json::<LeaseRecord>(LEASE_KEY).await {
		Ok(Some(record)) if record.is_expired(now) => {
			writeln!(out, "leader: none (last {} expired {})", record.owner_id, record.expires_at)?
		}
		Ok(Some(record)) => writeln!(out, "leader: {} (until {})", record.owner_id, record.expires_at)?,
		Ok(None) => writeln!(out, "leader: none")?,
		Err(error) => writeln!(out, "leader: unreadable ({error})")?,
	}

	for entry in config.enabled_providers() {
		let name = entry.display_name();
		let key = config.engine.engine_config(&entry.id, name, entry.priority).cache_key();
		match store.get_json::<CachedStatus<BalanceInfo>>(&key).await {
			Ok(Some(snapshot)) => {
				let amount = format_amount(snapshot.data.balance, &snapshot.data.currency);
				let age = snapshot.age(now).as_secs();
				writeln!(out, "{name:<12} {amount:>12}  updated {} ({age}s ago)", snapshot.timestamp)?;
			}
			Ok(None) => writeln!(out, "{name:<12} {:>12}", "no data")?,
			Err(error) => writeln!(out, "{name:<12} unreadable ({error})")?,
		}
	}
	Ok(())
}
