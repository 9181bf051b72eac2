//! Shared utilities for deepthink
//!
//! This crate provides common functionality used across the deepthink workspace,
//! including logging setup and application-level configuration.

pub mod config;
pub mod logging;

pub use config::{AppConfig, ConfigError, LogConfig, LogFormat};
pub use logging::init_tracing;
