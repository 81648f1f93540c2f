//! Shared runtime primitives for gauge services.
//!
//! - [`TaskClass`] tags spawned work for tracing.
//! - [`ScheduledTask`] owns every timer (debounce, cache poll, lease heartbeat)
//!   so owners can cancel deterministically.
//! - [`Clock`] supplies wall-clock time for persisted timestamps.

mod class;
pub mod clock;
mod spawn;
pub mod timer;

pub use class::TaskClass;
pub use clock::{Clock, ManualClock, RuntimeClock, SharedClock, SystemClock};
pub use spawn::{spawn, spawn_blocking};
pub use timer::ScheduledTask;
