//! Credential grammar and extraction from raw fetch output.

pub mod credential;
