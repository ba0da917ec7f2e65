pub mod config;
pub mod control;
pub mod fetch;
pub mod logging;
pub mod retry;
