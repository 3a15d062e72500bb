use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::credential::{CachedCredential, Credential};
use crate::errors::CredentialError;
use crate::helpers::sanitize::sanitize;
use crate::helpers::time::{get_instant, system_clock, Clock};
use crate::observability::metrics::get_metrics;
use crate::parser::credential::{extract_credential, is_credential};
use crate::sources::fetch::CredentialFetcher;

static SUCCESS_MSG: &str = "success";
static FETCH_ERROR_MSG: &str = "fetch_error";
static FORMAT_ERROR_MSG: &str = "format_error";

pub type RefreshOutcome = Result<Credential, CredentialError>;

/// Completion signal of the refresh in flight. `None` until the outcome is published.
type RefreshReceiver = watch::Receiver<Option<RefreshOutcome>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Demand {
    Lazy,
    Forced,
}

#[derive(Default)]
struct CacheState {
    cached: Option<CachedCredential>,
    in_flight: Option<RefreshReceiver>,
}

/// Point-in-time view of the cache, safe to expose (no credential value)
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub cached: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age_seconds: Option<i64>,
    pub fresh: bool,
    pub refresh_in_flight: bool,
}

/// Single credential with demand-driven, single-flight refresh.
///
/// Every state transition (freshness check, starting a refresh, publishing its
/// outcome) happens under one lock. The fetch itself runs on a spawned task
/// outside the lock, so a slow fetcher never blocks readers of a fresh value and
/// a caller that gives up never aborts the refresh other callers are waiting on.
pub struct CredentialCache<F> {
    fetcher: Arc<F>,
    clock: Clock,
    freshness_window: TimeDelta,
    state: Arc<Mutex<CacheState>>,
    shutdown: CancellationToken,
}

impl<F: CredentialFetcher> CredentialCache<F> {
    pub fn new(fetcher: F, freshness_window: Duration) -> Self {
        Self::with_clock(fetcher, freshness_window, system_clock())
    }

    pub fn with_clock(fetcher: F, freshness_window: Duration, clock: Clock) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            clock,
            freshness_window: TimeDelta::from_std(freshness_window).unwrap_or(TimeDelta::MAX),
            state: Arc::new(Mutex::new(CacheState::default())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Cached credential if still fresh, otherwise the outcome of a coordinated refresh.
    pub async fn get(&self, cancel: &CancellationToken) -> RefreshOutcome {
        self.obtain(Demand::Lazy, cancel).await
    }

    /// Refresh regardless of freshness. Never falls back to the previous value;
    /// if the refresh fails the previous value is kept but no longer served as fresh.
    pub async fn force_refresh(&self, cancel: &CancellationToken) -> RefreshOutcome {
        self.obtain(Demand::Forced, cancel).await
    }

    /// Install a bootstrap credential as if it had been fetched at `fetched_at`.
    pub async fn seed(&self, value: &str, fetched_at: DateTime<Utc>) -> Result<(), CredentialError> {
        if !is_credential(value) {
            return Err(CredentialError::NotFound);
        }
        let mut state = self.state.lock().await;
        state.cached = Some(CachedCredential::new(Credential::new(value), fetched_at));
        debug!(fetched_at = %fetched_at, "credential cache seeded");
        Ok(())
    }

    pub async fn status(&self) -> CacheStatus {
        let now = (self.clock)();
        let state = self.state.lock().await;
        let cached = state.cached.as_ref();
        CacheStatus {
            cached: cached.is_some(),
            fetched_at: cached.map(|c| c.fetched_at),
            age_seconds: cached.map(|c| c.age(now).num_seconds()),
            fresh: cached.is_some_and(|c| c.is_fresh(now, self.freshness_window)),
            refresh_in_flight: state.in_flight.as_ref().is_some_and(is_live),
        }
    }

    /// Cancel the fetch in flight, if any. Waiters receive its failure.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn obtain(&self, demand: Demand, cancel: &CancellationToken) -> RefreshOutcome {
        let metrics = get_metrics().await;

        let receiver = {
            let mut state = self.state.lock().await;

            if demand == Demand::Lazy {
                let now = (self.clock)();
                if let Some(cached) = state
                    .cached
                    .as_ref()
                    .filter(|cached| cached.is_fresh(now, self.freshness_window))
                {
                    metrics.credential_cache_hits.inc();
                    return Ok(cached.value.clone());
                }
            }

            match state.in_flight.clone().filter(is_live) {
                Some(in_flight) => {
                    metrics.credential_refresh_waiters.inc();
                    debug!(forced = demand == Demand::Forced, "joining credential refresh in flight");
                    in_flight
                }
                None => self.start_refresh(&mut state, demand),
            }
        };

        self.wait_for_outcome(receiver, cancel).await
    }

    /// Must be called with the state lock held. Replaces an abandoned refresh, if any.
    fn start_refresh(&self, state: &mut CacheState, demand: Demand) -> RefreshReceiver {
        let (sender, receiver) = watch::channel(None);
        state.in_flight = Some(receiver.clone());
        info!(
            forced = demand == Demand::Forced,
            has_previous = state.cached.is_some(),
            "starting credential refresh"
        );

        let fetcher = Arc::clone(&self.fetcher);
        let shared = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let outcome = fetch_and_extract(fetcher.as_ref(), &shutdown).await;

            let mut state = shared.lock().await;
            match &outcome {
                Ok(value) => state.cached = Some(CachedCredential::new(value.clone(), clock())),
                Err(_) if demand == Demand::Forced => {
                    if let Some(cached) = state.cached.as_mut() {
                        cached.mark_stale();
                    }
                }
                Err(_) => {}
            }
            state.in_flight = None;
            sender.send_replace(Some(outcome));
        });

        receiver
    }

    async fn wait_for_outcome(&self, mut receiver: RefreshReceiver, cancel: &CancellationToken) -> RefreshOutcome {
        let published = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("caller stopped waiting for credential refresh");
                return Err(CredentialError::Canceled);
            }
            published = receiver.wait_for(Option::is_some) => published.map(|outcome| (*outcome).clone()),
        };

        match published {
            Ok(Some(outcome)) => outcome,
            _ => {
                self.clear_abandoned(&receiver).await;
                Err(CredentialError::Fetch("credential refresh aborted".to_owned()))
            }
        }
    }

    /// The refresh task died before publishing; let the next caller start over.
    async fn clear_abandoned(&self, receiver: &RefreshReceiver) {
        let mut state = self.state.lock().await;
        if state
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.same_channel(receiver))
        {
            warn!("credential refresh ended without publishing an outcome");
            state.in_flight = None;
        }
    }
}

/// A refresh is live until its task publishes or dies. The task clears
/// `in_flight` before publishing, so a closed channel still registered there
/// belongs to a task that died without an outcome.
fn is_live(in_flight: &RefreshReceiver) -> bool {
    in_flight.has_changed().is_ok()
}

async fn fetch_and_extract<F: CredentialFetcher>(fetcher: &F, cancel: &CancellationToken) -> RefreshOutcome {
    let metrics = get_metrics().await;
    let start = get_instant();

    let outcome = match fetcher.execute(cancel).await {
        Ok(raw) => extract_credential(&raw),
        Err(CredentialError::Fetch(reason)) => Err(CredentialError::Fetch(sanitize(&reason).into_owned())),
        Err(err) => Err(err),
    };

    metrics
        .credential_fetch_duration
        .observe(start.elapsed().as_secs_f64());

    match &outcome {
        Ok(credential) => {
            metrics.credential_fetches.with_label_values(&[SUCCESS_MSG]).inc();
            info!(credential_len = credential.len(), "credential refreshed");
        }
        Err(err) => {
            let reason = if err.is_format() { FORMAT_ERROR_MSG } else { FETCH_ERROR_MSG };
            metrics.credential_fetches.with_label_values(&[reason]).inc();
            warn!(error = %err, "credential refresh failed");
        }
    }
    outcome
}
