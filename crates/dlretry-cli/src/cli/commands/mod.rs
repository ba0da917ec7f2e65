//! CLI command handlers, one per file.

mod config;
mod get;
mod stop;

pub use config::run_config;
pub use get::run_get;
pub use stop::run_stop;
