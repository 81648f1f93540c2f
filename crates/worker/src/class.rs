/// Shared execution classes used for scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Work triggered directly by the user, such as a manual refresh.
	Interactive,
	/// Timer-driven work that may be skipped or delayed without user impact.
	Background,
	/// Blocking I/O executed on the blocking pool.
	IoBlocking,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
			Self::IoBlocking => "io_blocking",
		}
	}
}
