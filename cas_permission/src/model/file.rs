//! File permission model.
//!
//! This module defines a reference permission kind for file access. A grant
//! on a path covers that path and everything beneath it.

use std::any::Any;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use bitflags::bitflags;
use serde::{Serialize, Deserialize};
use cas_core::error::PermissionError;
use cas_core::kind::PermissionKind;

use super::permission::{default_union, downcast_same_kind, Permission};

bitflags! {
    /// Operations a file permission can grant on a path.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FileAccess: u8 {
        /// Read file contents.
        const READ           = 0b0000_0001;
        /// Overwrite or truncate files.
        const WRITE          = 0b0000_0010;
        /// Append to files.
        const APPEND         = 0b0000_0100;
        /// Discover the path itself (listing, existence checks).
        const PATH_DISCOVERY = 0b0000_1000;
        /// Every file operation.
        const ALL_ACCESS     = Self::READ.bits()
            | Self::WRITE.bits()
            | Self::APPEND.bits()
            | Self::PATH_DISCOVERY.bits();
    }
}

/// A permission that grants access to files.
///
/// Paths are compared lexically after normalization, so `.` and `..`
/// components cannot reach outside a granted tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FilePermissionRecord")]
pub struct FilePermission {
    /// Whether every operation on every path is granted.
    unrestricted: bool,

    /// Granted operations per path. Never holds empty access sets.
    paths: BTreeMap<PathBuf, FileAccess>,
}

/// Serialized form of a file permission, normalized on load.
#[derive(Deserialize)]
struct FilePermissionRecord {
    #[serde(default)]
    unrestricted: bool,
    #[serde(default)]
    paths: BTreeMap<PathBuf, FileAccess>,
}

impl From<FilePermissionRecord> for FilePermission {
    fn from(record: FilePermissionRecord) -> Self {
        if record.unrestricted {
            return Self::unrestricted();
        }
        record
            .paths
            .into_iter()
            .fold(Self::none(), |permission, (path, access)| permission.with(access, path))
    }
}

/// Resolve `.` and `..` components of `path` without touching the file system.
///
/// `..` at the root stays at the root. A relative path keeps the leading
/// `..` components it cannot resolve.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                },
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {},
                _ => normalized.push(Component::ParentDir),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

impl FilePermission {
    /// Create a file permission granting `access` on each of `paths`.
    ///
    /// # Arguments
    ///
    /// * `access` - The operations granted.
    /// * `paths` - The paths the operations are granted on.
    ///
    /// # Returns
    ///
    /// A new file permission.
    pub fn new<P: AsRef<Path>>(access: FileAccess, paths: impl IntoIterator<Item = P>) -> Self {
        let mut permission = Self::none();
        for path in paths {
            permission.add(access, path);
        }
        permission
    }

    /// Create a file permission granting every operation on every path.
    pub fn unrestricted() -> Self {
        Self {
            unrestricted: true,
            paths: BTreeMap::new(),
        }
    }

    /// Create a file permission granting nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Create a read-only file permission.
    pub fn read_only<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self::new(FileAccess::READ | FileAccess::PATH_DISCOVERY, paths)
    }

    /// Create a read-write file permission.
    pub fn read_write<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self::new(FileAccess::ALL_ACCESS, paths)
    }

    /// Grant `access` on `path` in addition to what is already granted.
    pub fn add(&mut self, access: FileAccess, path: impl AsRef<Path>) {
        if self.unrestricted || access.is_empty() {
            return;
        }
        *self
            .paths
            .entry(normalize_path(path.as_ref()))
            .or_insert_with(FileAccess::empty) |= access;
    }

    /// Builder form of [`FilePermission::add`].
    pub fn with(mut self, access: FileAccess, path: impl AsRef<Path>) -> Self {
        self.add(access, path);
        self
    }

    /// Whether every operation on every path is granted.
    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    /// The explicitly granted paths.
    pub fn paths(&self) -> &BTreeMap<PathBuf, FileAccess> {
        &self.paths
    }

    /// The operations granted on `path`, including those inherited from
    /// granted ancestors.
    pub fn access_for(&self, path: impl AsRef<Path>) -> FileAccess {
        if self.unrestricted {
            return FileAccess::ALL_ACCESS;
        }

        let path = normalize_path(path.as_ref());
        self.paths
            .iter()
            .filter(|(granted, _)| path.starts_with(granted))
            .fold(FileAccess::empty(), |acc, (_, access)| acc | *access)
    }

    fn grants_nothing(&self) -> bool {
        !self.unrestricted && self.paths.is_empty()
    }

    fn boxed_unless_empty(self) -> Option<Box<dyn Permission>> {
        if self.grants_nothing() {
            None
        } else {
            Some(Box::new(self))
        }
    }
}

impl Permission for FilePermission {
    fn kind(&self) -> PermissionKind {
        PermissionKind::File
    }

    fn copy(&self) -> Box<dyn Permission> {
        Box::new(self.clone())
    }

    fn intersect(
        &self,
        other: Option<&dyn Permission>,
    ) -> Result<Option<Box<dyn Permission>>, PermissionError> {
        let Some(other) = other else {
            return Ok(None);
        };
        let other = downcast_same_kind(self, other)?;

        if self.unrestricted {
            return Ok(other.clone().boxed_unless_empty());
        }
        if other.unrestricted {
            return Ok(self.clone().boxed_unless_empty());
        }

        // The common access of two path grants lives on the deeper path.
        let mut common = Self::none();
        for (ours, our_access) in &self.paths {
            for (theirs, their_access) in &other.paths {
                let shared = *our_access & *their_access;
                if ours.starts_with(theirs) {
                    common.add(shared, ours);
                } else if theirs.starts_with(ours) {
                    common.add(shared, theirs);
                }
            }
        }

        Ok(common.boxed_unless_empty())
    }

    fn is_subset_of(&self, other: Option<&dyn Permission>) -> Result<bool, PermissionError> {
        let Some(other) = other else {
            return Ok(self.grants_nothing());
        };
        let other = downcast_same_kind(self, other)?;

        if other.unrestricted {
            return Ok(true);
        }
        if self.unrestricted {
            return Ok(false);
        }

        Ok(self
            .paths
            .iter()
            .all(|(path, access)| other.access_for(path).contains(*access)))
    }

    fn union(&self, other: Option<&dyn Permission>) -> Result<Box<dyn Permission>, PermissionError> {
        let Some(other) = other.filter(|other| self.verify_type(Some(*other))) else {
            return default_union(self, other);
        };
        let other = downcast_same_kind(self, other)?;

        if self.unrestricted || other.unrestricted {
            return Ok(Box::new(Self::unrestricted()));
        }

        let mut merged = self.clone();
        for (path, access) in &other.paths {
            merged.add(*access, path);
        }
        Ok(Box::new(merged))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
