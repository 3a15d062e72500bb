use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Injected time source, so freshness can be tested without sleeping.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

pub fn get_instant() -> Instant {
    Instant::now()
}
