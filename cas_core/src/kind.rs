//! Permission kinds.
//!
//! A kind is the family identity of a permission. Algebra operations are
//! only defined between permissions of the same kind; the kind tag is what
//! the algebra compares before it looks at any kind-specific state.

use std::fmt;
use serde::{Serialize, Deserialize};

/// The family a permission belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    /// File system access.
    File,

    /// Network endpoint access.
    Network,

    /// A kind supplied by an integrator, identified by name.
    Custom(String),
}

impl PermissionKind {
    /// Create a custom kind.
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// The name of this kind.
    pub fn name(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Network => "network",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(name) => write!(f, "custom:{}", name),
            other => f.write_str(other.name()),
        }
    }
}
