//! Status cache, refresh engine, and the process-wide engine registry.
//!
//! # Mental model
//!
//! - A [`StatusEntity`] knows how to fetch and present one thing (for example
//!   a provider balance through [`ProviderStatusEntity`]).
//! - A [`StatusEngine`] wraps an entity with everything generic: the in-memory
//!   [`CachedStatus`], its shared-store mirror, refresh policy, debounce, and
//!   the [`StatusWidget`] it drives.
//! - A [`StatusRegistry`] owns all engines of a process and fans lifecycle
//!   operations out to them by id.
//!
//! # Refresh policy
//!
//! - Automatic refreshes skip while the cache is younger than
//!   [`EngineConfig::fresh_threshold`] and never put errors on screen.
//! - Manual refreshes always query and show failures in place of data.
//! - Background refreshes run only in the process holding the lease; other
//!   processes adopt the leader's snapshot from the shared store.
//! - At most one query per entity is in flight.

mod aggregate;
mod cache;
mod config;
mod engine;
mod entity;
mod error;
mod provider;
pub mod testing;
mod widget;

pub use aggregate::{InitReport, StatusItem, StatusRegistry};
pub use cache::{CachedStatus, SnapshotAge};
pub use config::{EngineConfig, MAX_INTERVAL, REFRESH_COMMAND_PREFIX};
pub use engine::{
	CacheAdoption, DEFAULT_UPDATE_DELAY, ERROR_GLYPH, EngineContext, EngineLifecycleState, RefreshOutcome, SkipReason,
	StatusEngine,
};
pub use entity::StatusEntity;
pub use error::{Result, StatusError};
pub use provider::{ProviderSettings, ProviderStatusEntity, currency_symbol, format_amount};
pub use widget::{StatusWidget, WidgetHost};
