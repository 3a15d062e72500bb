use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::credential_cache::CredentialCache;
use crate::config::gateway::ServiceConfig;
use crate::errors::GatewayError;
use crate::executor::request::RequestExecutor;
use crate::sources::command::CommandFetcher;
use crate::sources::fetch::CredentialFetcher;

pub type GatewayCache = CredentialCache<CommandFetcher>;

/// One credential cache shared by an executor per configured upstream.
pub struct Gateway<F = CommandFetcher> {
    cache: Arc<CredentialCache<F>>,
    executors: HashMap<String, RequestExecutor<F>>,
}

impl Gateway<CommandFetcher> {
    pub fn from_config(config: &ServiceConfig) -> Result<Self, GatewayError> {
        Self::with_fetcher(config, CommandFetcher::from_config(&config.credential))
    }
}

impl<F: CredentialFetcher> Gateway<F> {
    pub fn with_fetcher(config: &ServiceConfig, fetcher: F) -> Result<Self, GatewayError> {
        let window = Duration::from_secs(config.credential.freshness_window_seconds);
        let cache = Arc::new(CredentialCache::new(fetcher, window));

        let mut executors = HashMap::with_capacity(config.upstreams.len());
        for (name, upstream) in &config.upstreams {
            let executor = RequestExecutor::from_config(name, upstream, Arc::clone(&cache))?;
            executors.insert(name.to_owned(), executor);
        }
        info!(upstreams = executors.len(), freshness_window_secs = window.as_secs(), "gateway ready");

        Ok(Self { cache, executors })
    }

    pub fn cache(&self) -> &Arc<CredentialCache<F>> {
        &self.cache
    }

    pub fn executor(&self, upstream: &str) -> Result<&RequestExecutor<F>, GatewayError> {
        self.executors
            .get(upstream)
            .ok_or_else(|| GatewayError::Configuration(format!("unknown upstream '{upstream}'")))
    }

    pub fn upstreams(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(String::as_str)
    }
}
