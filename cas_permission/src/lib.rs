//! # CAS Permission
//!
//! `cas_permission` provides the permission algebra of code-access
//! security: a partial order over permission values with copy, union,
//! intersection and subset operations.
//!
//! Key concepts:
//!
//! 1. **Permission**: A typed value granting some category of access. Each
//!    permission has a kind; operations are only defined within a kind.
//!
//! 2. **Bottom**: The permission granting nothing. `is_subset_of(None)`
//!    tests for it and `intersect` returns `None` for it.
//!
//! 3. **Equality**: Derived from the subset relation in both directions,
//!    with failures of untrusted kinds contained as "not equal".
//!
//! 4. **Checks**: The predicates a stack walker evaluates against the deny,
//!    permit-only, assert and grant state of a frame.

pub mod model;
pub mod equality;
pub mod check;

// Re-export key types and traits for convenience
pub use model::{
    default_union, downcast_same_kind, Endpoint, FileAccess, FilePermission, NetworkAccess,
    NetworkHost, NetworkPermission, NetworkPort, Permission, PermissionSet,
};
pub use equality::permissions_equal;
pub use check::CodeAccessCheck;
