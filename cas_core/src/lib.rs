//! # CAS Core
//!
//! Shared foundations for code-access security: the permission kind tag,
//! the error hierarchy, frame identifiers and the configuration of a
//! security context.
//!
//! This crate has no notion of concrete permissions or of call stacks. The
//! permission algebra lives in `cas_permission` and stack inspection in
//! `cas_stack`.

pub mod error;
pub mod id;
pub mod kind;
pub mod utils;

// Re-export key items for convenience
pub use error::{ConfigError, DenialReason, Error, PermissionError, SecurityError};
pub use id::{FrameId, Id};
pub use kind::PermissionKind;
pub use utils::{AuditConfig, LogLevel, RevertScope, SecurityConfig};

/// A type alias for Result with our error types
pub type Result<T, E = error::Error> = std::result::Result<T, E>;
