//! Cancelable scheduled-task handles.
//!
//! Every timer in the workspace is owned through a [`ScheduledTask`]. Dropping
//! or cancelling the handle stops future firings; a body that is already
//! running is allowed to finish so its owner can decide whether to apply the
//! result.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{TaskClass, spawn};

/// Owned handle to a delayed or repeating task.
///
/// Cancels on drop.
#[derive(Debug)]
pub struct ScheduledTask {
	name: String,
	cancel: CancellationToken,
	join: JoinHandle<()>,
}

impl ScheduledTask {
	/// Returns the diagnostic name given at schedule time.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Stops any future firing of this task.
	pub fn cancel(&self) {
		if !self.cancel.is_cancelled() {
			tracing::trace!(task = %self.name, "timer.cancel");
		}
		self.cancel.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Returns true once the backing task has exited.
	pub fn is_finished(&self) -> bool {
		self.join.is_finished()
	}
}

impl Drop for ScheduledTask {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

/// Runs `fut` once after `delay` unless cancelled first.
pub fn after<F>(class: TaskClass, name: impl Into<String>, delay: Duration, fut: F) -> ScheduledTask
where
	F: Future<Output = ()> + Send + 'static,
{
	let name = name.into();
	let cancel = CancellationToken::new();
	let token = cancel.clone();
	let task_name = name.clone();
	let join = spawn(class, async move {
		tokio::select! {
			biased;
			_ = token.cancelled() => return,
			_ = tokio::time::sleep(delay) => {}
		}
		tracing::trace!(task = %task_name, "timer.fire");
		fut.await;
	});
	ScheduledTask { name, cancel, join }
}

/// Runs `tick` every `period`, first firing one period from now.
///
/// Ticks never overlap: a slow body delays the next firing instead of queueing
/// a burst behind it. A period too long to represent as an [`Instant`] never
/// fires.
pub fn every<F, Fut>(class: TaskClass, name: impl Into<String>, period: Duration, mut tick: F) -> ScheduledTask
where
	F: FnMut() -> Fut + Send + 'static,
	Fut: Future<Output = ()> + Send + 'static,
{
	let name = name.into();
	let cancel = CancellationToken::new();
	let token = cancel.clone();
	let task_name = name.clone();
	let join = spawn(class, async move {
		let Some(first) = Instant::now().checked_add(period) else {
			tracing::debug!(task = %task_name, period_secs = period.as_secs(), "timer.never");
			token.cancelled().await;
			return;
		};
		let mut interval = tokio::time::interval_at(first, period);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			tokio::select! {
				biased;
				_ = token.cancelled() => break,
				_ = interval.tick() => {}
			}
			tracing::trace!(task = %task_name, "timer.tick");
			tick().await;
			if token.is_cancelled() {
				break;
			}
		}
	});
	ScheduledTask { name, cancel, join }
}
