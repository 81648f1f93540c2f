use thiserror::Error;

/// Misuse of the election service.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeaseError {
	#[error("process id must not be empty")]
	EmptyProcessId,

	#[error("leader election already initialized as {0}")]
	AlreadyInitialized(String),
}
