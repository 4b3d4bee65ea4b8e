//! Utility modules.

pub mod config;
pub mod logging;

pub use config::{AuditConfig, RevertScope, SecurityConfig};
pub use logging::LogLevel;
