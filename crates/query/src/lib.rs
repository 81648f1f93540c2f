//! Balance queries against external providers.
//!
//! - [`QueryRegistry`] dispatches a provider id to its [`BalanceBackend`].
//! - [`providers`] holds the built-in HTTP backends.
//! - [`CredentialProvider`] supplies API keys; it is consulted per request and
//!   never cached.

mod backend;
mod credentials;
mod error;
pub mod providers;
mod registry;
mod result;

pub use backend::BalanceBackend;
pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use error::{QueryError, Result};
pub use registry::QueryRegistry;
pub use result::{BalanceInfo, DEFAULT_CURRENCY, QueryResult};
