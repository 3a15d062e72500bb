// tests/common/mod.rs
pub use axum::Router;
pub use tokio::task::JoinHandle;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::errors::CredentialError;
use crate::helpers::time::Clock;
use crate::sources::fetch::CredentialFetcher;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Grammar-valid credential, distinguishable by `label` (identifier chars only).
pub fn credential(label: &str) -> String {
    format!("t1.{label}.{}", "x".repeat(86))
}

/// One scripted fetch result
#[derive(Debug, Clone)]
pub enum Step {
    Output(Vec<u8>),
    Fail(CredentialError),
    Panic,
}

impl Step {
    pub fn credential(label: &str) -> Self {
        Step::Output(format!("issued: {}\n", credential(label)).into_bytes())
    }
}

/// Fetcher replaying a script, counting calls. Clones share state.
#[derive(Clone)]
pub struct ScriptedFetcher {
    calls: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Step>>>,
    delay: Duration,
    gate: Option<Arc<Notify>>,
}

impl ScriptedFetcher {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            delay: Duration::ZERO,
            gate: None,
        }
    }

    /// No scripted steps: every fetch fails.
    pub fn empty() -> Self {
        Self::new(Vec::<Step>::new())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every fetch blocks until [`ScriptedFetcher::release`] is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("fetcher was not called in time");
    }
}

impl CredentialFetcher for ScriptedFetcher {
    async fn execute(&self, _cancel: &CancellationToken) -> Result<Vec<u8>, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Output(raw)) => Ok(raw),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Panic) => panic!("scripted fetcher panic"),
            None => Err(CredentialError::Fetch("script exhausted".to_owned())),
        }
    }
}

/// Clock that only moves when told to
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }

    pub fn clock(&self) -> Clock {
        let now = Arc::clone(&self.0);
        Arc::new(move || *now.lock().unwrap())
    }
}
