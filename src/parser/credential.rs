use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::cache::credential::Credential;
use crate::errors::CredentialError;

/// `t1.` + identifier chars + up to two `=` + `.` + exactly 86 identifier chars + up to two `=`
pub const CREDENTIAL_PATTERN: &str = r"t1\.[A-Za-z0-9_-]+={0,2}\.[A-Za-z0-9_-]{86}={0,2}";

static CREDENTIAL_REGEX: OnceLock<Regex> = OnceLock::new();

pub fn credential_regex() -> &'static Regex {
    CREDENTIAL_REGEX.get_or_init(|| Regex::new(CREDENTIAL_PATTERN).expect("credential pattern compiles"))
}

/// Pull the first credential out of raw fetcher output.
///
/// Errors never carry the raw output: it may contain unrelated log lines
/// printed by the external process.
pub fn extract_credential(raw: &[u8]) -> Result<Credential, CredentialError> {
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        return Err(CredentialError::Empty);
    }

    let found = credential_regex()
        .find(&text)
        .ok_or(CredentialError::NotFound)?;

    debug!(output_bytes = raw.len(), credential_len = found.len(), "credential extracted from fetch output");
    Ok(Credential::new(found.as_str()))
}

/// Whether the whole value matches the grammar, used when seeding the cache.
pub fn is_credential(value: &str) -> bool {
    credential_regex()
        .find(value)
        .is_some_and(|m| m.start() == 0 && m.end() == value.len())
}
