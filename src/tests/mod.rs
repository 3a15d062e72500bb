pub mod common;


#[cfg(unix)]
mod command_fetcher;
