pub mod sanitize;
pub mod time;
