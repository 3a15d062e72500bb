pub mod command;
pub mod fetch;
