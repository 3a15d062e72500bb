use std::borrow::Cow;

use crate::parser::credential::credential_regex;

pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Upper bound for diagnostic snippets kept in upstream errors.
pub const MAX_DETAILS_BYTES: usize = 4096;

const TRUNCATION_MARKER: &str = "...[truncated]";

/// Replace every credential-shaped substring with [`REDACTION_MARKER`].
///
/// Everything else is left as is, and the marker itself never matches the
/// grammar, so running it twice is the same as running it once.
pub fn sanitize(text: &str) -> Cow<'_, str> {
    credential_regex().replace_all(text, REDACTION_MARKER)
}

/// Credential-redacted, control-character-free text of at most `max_bytes`.
///
/// Newlines and tabs survive; other control characters become spaces.
pub fn sanitize_bounded(text: &str, max_bytes: usize) -> String {
    let redacted = sanitize(text);
    let cleaned: String = redacted
        .chars()
        .map(|c| if c.is_control() && c != '\n' && c != '\t' { ' ' } else { c })
        .collect();
    truncate_utf8(cleaned, max_bytes)
}

/// Response body snippet for [`crate::errors::UpstreamError::sanitized_details`].
pub fn sanitize_details(body: &[u8]) -> String {
    sanitize_bounded(&String::from_utf8_lossy(body), MAX_DETAILS_BYTES)
}

fn truncate_utf8(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let (budget, marker) = if max_bytes > TRUNCATION_MARKER.len() {
        (max_bytes - TRUNCATION_MARKER.len(), TRUNCATION_MARKER)
    } else {
        (max_bytes, "")
    };
    let mut cut = budget;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(marker);
    text
}
