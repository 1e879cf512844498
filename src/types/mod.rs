//! Shared types: errors and configuration.

pub mod config;
pub mod errors;

pub use config::BinderConfig;
pub use errors::{Error, Result};
