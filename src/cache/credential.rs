use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};

/// Bearer credential. `Debug` is redacted; the raw value only leaves
/// through [`Credential::expose`].
#[derive(Debug, Clone)]
pub struct Credential(Arc<SecretString>);

impl Credential {
    pub fn new(value: &str) -> Self {
        Self(Arc::new(SecretString::from(value.to_owned())))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.expose().len()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

/// Cached value and the moment it was fetched
#[derive(Debug, Clone)]
pub struct CachedCredential {
    pub value: Credential,
    pub fetched_at: DateTime<Utc>,
    /// Set once the upstream rejected the value and replacing it failed.
    pub stale: bool,
}

impl CachedCredential {
    pub fn new(value: Credential, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            stale: false,
        }
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.fetched_at)
    }

    /// Fresh while `now - fetched_at < window`, unless marked stale
    pub fn is_fresh(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        !self.stale && self.age(now) < window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_value() {
        let credential = Credential::new("t1.super-secret");
        assert!(!format!("{credential:?}").contains("super-secret"));
        assert_eq!(credential.expose(), "t1.super-secret");
    }

    #[test]
    fn freshness_boundary_is_exclusive() {
        let fetched_at = Utc::now();
        let cached = CachedCredential::new(Credential::new("v"), fetched_at);
        let window = TimeDelta::hours(1);

        assert!(cached.is_fresh(fetched_at + TimeDelta::minutes(59), window));
        assert!(!cached.is_fresh(fetched_at + TimeDelta::hours(1), window));
    }

    #[test]
    fn stale_value_is_never_fresh() {
        let fetched_at = Utc::now();
        let mut cached = CachedCredential::new(Credential::new("v"), fetched_at);
        cached.mark_stale();

        assert!(!cached.is_fresh(fetched_at, TimeDelta::hours(1)));
    }
}
