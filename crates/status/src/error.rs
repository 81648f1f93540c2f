use thiserror::Error;

/// Errors surfaced by status engines and the aggregator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatusError {
	/// Engine configuration failed validation at construction.
	#[error("invalid status config for `{id}`: {reason}")]
	InvalidConfig { id: String, reason: String },

	/// The engine was disposed and cannot be initialized again.
	#[error("status entity `{0}` is disposed")]
	Disposed(String),

	/// Initialization panicked; the entity is left uninitialized.
	#[error("status entity `{0}` panicked during initialization")]
	Panicked(String),

	/// An entity with the same id is already registered.
	#[error("status entity `{0}` is already registered")]
	Duplicate(String),
}

pub type Result<T> = std::result::Result<T, StatusError>;
