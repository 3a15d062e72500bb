//! # Token Gateway Library
//!
//! Keeps one bearer credential cached for a tool-serving gateway and executes
//! outbound HTTP calls with it, retrying once after a forced refresh when the
//! upstream answers 401 or 403.
//!
//! Modules:
//! - `cache`: credential cache with single-flight refresh
//! - `sources`: credential fetchers (external command)
//! - `parser`: credential grammar and extraction
//! - `executor`: request execution, endpoint resolution, upstream errors
//! - `errors`: typed errors and their safe messages
//! - `helpers`: error sanitizer and clock
//! - `config`: YAML service configuration
//! - `observability` / `server`: metrics, health and readiness endpoints

pub mod cache;
pub mod config;
pub mod errors;
pub mod executor;
pub mod gateway;
pub mod helpers;
pub mod observability;
pub mod parser;
pub mod server;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::credential::Credential;
pub use crate::cache::credential_cache::CredentialCache;
pub use crate::errors::{safe_error_message, CredentialError, GatewayError, UpstreamError};
pub use crate::executor::request::{RequestExecutor, UpstreamResponse};
pub use crate::gateway::Gateway;
pub use crate::sources::fetch::CredentialFetcher;
