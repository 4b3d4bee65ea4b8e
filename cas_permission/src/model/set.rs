//! Permission sets.
//!
//! A permission set holds at most one permission per kind. Frames use sets
//! for their grants and for each of their overlays.

use std::collections::BTreeMap;
use cas_core::error::PermissionError;
use cas_core::kind::PermissionKind;

use super::permission::Permission;

/// A collection of permissions keyed by kind.
#[derive(Debug, Default)]
pub struct PermissionSet {
    permissions: BTreeMap<PermissionKind, Box<dyn Permission>>,
}

impl PermissionSet {
    /// Create an empty permission set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding copies of the given permissions.
    ///
    /// Permissions of the same kind are merged with `union`.
    pub fn from_permissions<'a>(
        permissions: impl IntoIterator<Item = &'a dyn Permission>,
    ) -> Result<Self, PermissionError> {
        let mut set = Self::new();
        for permission in permissions {
            set.insert(permission)?;
        }
        Ok(set)
    }

    /// Add a copy of `permission`, merging with any permission of the same kind.
    ///
    /// # Arguments
    ///
    /// * `permission` - The permission to add.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the permission was added.
    /// * `Err(PermissionError)` - If the kind cannot merge with the existing entry.
    pub fn insert(&mut self, permission: &dyn Permission) -> Result<(), PermissionError> {
        let kind = permission.kind();
        let merged = match self.permissions.get(&kind) {
            Some(existing) => existing.union(Some(permission))?,
            None => permission.copy(),
        };
        self.permissions.insert(kind, merged);
        Ok(())
    }

    /// Store a copy of `permission`, replacing any permission of the same kind.
    pub fn replace(&mut self, permission: &dyn Permission) -> Option<Box<dyn Permission>> {
        self.permissions.insert(permission.kind(), permission.copy())
    }

    /// Get the permission of `kind`.
    pub fn get(&self, kind: &PermissionKind) -> Option<&dyn Permission> {
        self.permissions.get(kind).map(|permission| &**permission)
    }

    /// Remove the permission of `kind`.
    pub fn remove(&mut self, kind: &PermissionKind) -> Option<Box<dyn Permission>> {
        self.permissions.remove(kind)
    }

    /// Whether a permission of `kind` is present.
    pub fn contains_kind(&self, kind: &PermissionKind) -> bool {
        self.permissions.contains_key(kind)
    }

    /// The kinds present in this set.
    pub fn kinds(&self) -> impl Iterator<Item = &PermissionKind> {
        self.permissions.keys()
    }

    /// Iterate over the permissions in this set.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Permission> {
        self.permissions.values().map(|permission| &**permission)
    }

    /// The number of kinds present.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Remove every permission.
    pub fn clear(&mut self) {
        self.permissions.clear();
    }

    /// Whether every permission in this set is covered by `other`.
    ///
    /// A kind missing from `other` covers only the bottom permission.
    pub fn is_subset_of(&self, other: &PermissionSet) -> Result<bool, PermissionError> {
        for (kind, permission) in &self.permissions {
            if !permission.is_subset_of(other.get(kind))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// A set granting everything granted by either set.
    pub fn union(&self, other: &PermissionSet) -> Result<PermissionSet, PermissionError> {
        let mut merged = self.clone();
        for permission in other.iter() {
            merged.insert(permission)?;
        }
        Ok(merged)
    }

    /// A set granting what is granted by both sets.
    pub fn intersect(&self, other: &PermissionSet) -> Result<PermissionSet, PermissionError> {
        let mut common = Self::new();
        for (kind, permission) in &self.permissions {
            if let Some(shared) = permission.intersect(other.get(kind))? {
                common.permissions.insert(kind.clone(), shared);
            }
        }
        Ok(common)
    }
}

impl Clone for PermissionSet {
    fn clone(&self) -> Self {
        Self {
            permissions: self
                .permissions
                .iter()
                .map(|(kind, permission)| (kind.clone(), permission.copy()))
                .collect(),
        }
    }
}
