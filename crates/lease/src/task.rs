use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

/// Work executed once per election tick while this process leads.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
	/// Name used in logs.
	fn name(&self) -> &str;

	/// Runs one iteration. Errors are logged and the task stays registered.
	async fn run(&self) -> Result<(), String>;
}

/// Handle identifying a registered [`PeriodicTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "task#{}", self.0)
	}
}

struct FnTask<F> {
	name: String,
	f: F,
}

#[async_trait]
impl<F, Fut> PeriodicTask for FnTask<F>
where
	F: Fn() -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<(), String>> + Send + 'static,
{
	fn name(&self) -> &str {
		&self.name
	}

	async fn run(&self) -> Result<(), String> {
		(self.f)().await
	}
}

/// Wraps a closure as a [`PeriodicTask`].
pub fn task_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn PeriodicTask>
where
	F: Fn() -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<(), String>> + Send + 'static,
{
	Arc::new(FnTask { name: name.into(), f })
}
