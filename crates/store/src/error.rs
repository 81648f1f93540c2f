use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by shared store backends.
#[derive(Debug, Error)]
pub enum StoreError {
	/// Reading or writing a backing file failed.
	#[error("I/O error on {path}: {error}")]
	Io {
		path: PathBuf,
		#[source]
		error: std::io::Error,
	},

	/// A stored value could not be encoded or decoded.
	#[error("invalid JSON under key {key}: {error}")]
	Serde {
		key: String,
		#[source]
		error: serde_json::Error,
	},

	/// The blocking worker running the operation died.
	#[error("store task failed: {0}")]
	Join(String),

	/// The store cannot be reached at all.
	#[error("store unavailable: {0}")]
	Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
