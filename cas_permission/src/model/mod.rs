//! Permission models.
//!
//! This module defines the permission trait, permission sets and the
//! reference permission kinds.

pub mod permission;
pub mod file;
pub mod network;
pub mod set;

pub use permission::{default_union, downcast_same_kind, Permission};
pub use file::{FileAccess, FilePermission};
pub use network::{Endpoint, NetworkAccess, NetworkHost, NetworkPermission, NetworkPort};
pub use set::PermissionSet;
