//! Credential sources
//!
//! A fetcher produces raw output that may contain a credential. Extracting the
//! credential from it is the cache's job, not the fetcher's.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::errors::CredentialError;

pub trait CredentialFetcher: Send + Sync + 'static {
    /// Run one fetch. Must be safe to retry and should stop early once `cancel` fires.
    ///
    /// Failures are reported as [`CredentialError::Fetch`] with a fixed prefix and
    /// must not carry the raw output.
    fn execute(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<u8>, CredentialError>> + Send;
}
