use thiserror::Error;

/// Failure of a single balance query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
	/// No usable API key for the provider.
	#[error("no API key configured for {0}")]
	MissingCredential(String),

	/// The request never produced a response.
	#[error("network error: {0}")]
	Network(String),

	/// The provider answered with a non-success status.
	#[error("HTTP {status}: {body}")]
	Status { status: u16, body: String },

	/// The response body lacked the fields the backend needs.
	#[error("malformed response: {0}")]
	Malformed(String),

	/// A backend reported success but returned no data.
	#[error("backend reported success without data")]
	ContractViolation,
}

pub type Result<T> = std::result::Result<T, QueryError>;
