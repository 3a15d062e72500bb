//! Outbound HTTP calls with credential injection and a single auth retry.

pub mod endpoint;
pub mod headers;
pub mod request;
pub mod upstream_error;
