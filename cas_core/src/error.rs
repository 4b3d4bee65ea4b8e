//! Error types for code-access security.
//!
//! This module defines the error hierarchy shared by the permission algebra
//! and the stack-inspection engine. Algebra errors are recoverable argument
//! errors; security errors are either caller contract violations or denials.

use std::fmt;
use thiserror::Error;
use crate::id::FrameId;
use crate::kind::PermissionKind;

/// Root error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by the permission algebra.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("Permission kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        expected: PermissionKind,
        found: PermissionKind,
    },

    #[error("Union of {kind} with {other} is not supported")]
    UnsupportedUnion {
        kind: PermissionKind,
        other: PermissionKind,
    },

    #[error("Invalid permission argument: {0}")]
    InvalidArgument(String),
}

impl PermissionError {
    /// Shorthand for a kind mismatch.
    pub fn mismatch(expected: &PermissionKind, found: &PermissionKind) -> Self {
        Self::KindMismatch {
            expected: expected.clone(),
            found: found.clone(),
        }
    }
}

/// Why a walk stopped at a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The frame denies part of the demanded access.
    ExplicitDeny,

    /// The frame restricts access with a permit-only set that does not cover the demand.
    OutsidePermitOnly,

    /// The frame's grant does not cover the demand.
    NotGranted,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExplicitDeny => write!(f, "explicitly denied"),
            Self::OutsidePermitOnly => write!(f, "outside permit-only set"),
            Self::NotGranted => write!(f, "not granted"),
        }
    }
}

/// Errors raised by stack inspection and frame state changes.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Demand for {kind} permission {permission} failed at frame '{frame_label}' ({frame}): {reason}")]
    Denied {
        /// The demanded permission, rendered for diagnostics.
        permission: String,
        kind: PermissionKind,
        frame: FrameId,
        frame_label: String,
        reason: DenialReason,
    },

    #[error("Permission check for {kind} failed at frame '{frame_label}' ({frame}): {source}")]
    CheckFailed {
        kind: PermissionKind,
        frame: FrameId,
        frame_label: String,
        #[source]
        source: PermissionError,
    },

    #[error("An assertion for {kind} is already active on frame '{frame_label}'")]
    AssertionAlreadyActive {
        kind: PermissionKind,
        frame_label: String,
    },

    #[error("A {overlay} overlay for {kind} is already active on frame '{frame_label}'")]
    OverlayAlreadyActive {
        overlay: &'static str,
        kind: PermissionKind,
        frame_label: String,
    },

    #[error("No active frame on the current call stack")]
    NoActiveFrame,

    #[error("Security context is in use by an ongoing check")]
    ContextBusy,
}

impl SecurityError {
    /// Whether this error is a denial of a demand, as opposed to misuse.
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::Denied { .. } | Self::CheckFailed { .. })
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}
