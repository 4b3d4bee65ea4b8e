//! Core permission trait.
//!
//! This module defines the `Permission` trait implemented by every
//! permission kind, together with the default union policy and the
//! kind-checked downcast used by concrete kinds.

use std::any::Any;
use std::fmt::Debug;
use cas_core::error::PermissionError;
use cas_core::kind::PermissionKind;

/// A value representing a revocable capability to perform some access.
///
/// Permissions form a partial order per kind. `is_subset_of(None)` asks
/// whether a permission grants nothing at all (the bottom element), and
/// `intersect` yields `None` when two permissions share no access.
///
/// Implementations must not assume that the argument of `intersect` or
/// `is_subset_of` has their own kind: a foreign kind is reported as a
/// [`PermissionError::KindMismatch`], never a panic.
///
/// Equality of permissions is derived from the subset relation (see
/// [`crate::equality`]). There is intentionally no `Hash` for
/// `dyn Permission`: two equal permissions may have different internal
/// representations, so hash-based sets and maps of permissions are only
/// sound when a kind supplies its own compatible hash.
pub trait Permission: Debug + Send + Sync {
    /// Returns the kind of this permission.
    fn kind(&self) -> PermissionKind;

    /// Returns an independent value equal to this permission.
    fn copy(&self) -> Box<dyn Permission>;

    /// Returns the greatest permission contained in both `self` and `other`.
    ///
    /// # Arguments
    ///
    /// * `other` - The permission to intersect with. `None` grants nothing.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(permission))` - The common access.
    /// * `Ok(None)` - If the two permissions share no access.
    /// * `Err(PermissionError)` - If `other` is of an incompatible kind.
    fn intersect(
        &self,
        other: Option<&dyn Permission>,
    ) -> Result<Option<Box<dyn Permission>>, PermissionError>;

    /// Checks whether every access granted by `self` is granted by `other`.
    ///
    /// # Arguments
    ///
    /// * `other` - The candidate superset. `None` grants nothing, so
    ///   `is_subset_of(None)` holds exactly for the bottom permission.
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - The answer.
    /// * `Err(PermissionError)` - If `other` is of an incompatible kind.
    fn is_subset_of(&self, other: Option<&dyn Permission>) -> Result<bool, PermissionError>;

    /// Returns a permission granting everything granted by `self` or `other`.
    ///
    /// The default implementation only handles `other == None` and rejects
    /// anything else with [`PermissionError::UnsupportedUnion`]. Kinds that
    /// can merge their own values override this.
    fn union(&self, other: Option<&dyn Permission>) -> Result<Box<dyn Permission>, PermissionError> {
        default_union(self, other)
    }

    /// Checks whether `other` is present and of the same kind as `self`.
    fn verify_type(&self, other: Option<&dyn Permission>) -> bool {
        other.is_some_and(|other| other.kind() == self.kind())
    }

    /// Checks whether this permission grants nothing.
    ///
    /// A kind that fails to answer is not considered bottom.
    fn is_bottom(&self) -> bool {
        matches!(self.is_subset_of(None), Ok(true))
    }

    /// Returns self as `Any` for kind-checked downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// The default union policy.
///
/// Merging with nothing yields a copy; merging with any present value is
/// not supported. Kinds that override [`Permission::union`] fall back to
/// this for foreign kinds.
pub fn default_union<P>(
    this: &P,
    other: Option<&dyn Permission>,
) -> Result<Box<dyn Permission>, PermissionError>
where
    P: Permission + ?Sized,
{
    match other {
        None => Ok(this.copy()),
        Some(other) => Err(PermissionError::UnsupportedUnion {
            kind: this.kind(),
            other: other.kind(),
        }),
    }
}

/// Downcasts `other` to the concrete type of `this` after a kind check.
///
/// A value that claims the right kind but has a different representation
/// is rejected as an invalid argument.
pub fn downcast_same_kind<'a, T>(this: &T, other: &'a dyn Permission) -> Result<&'a T, PermissionError>
where
    T: Permission + 'static,
{
    if !this.verify_type(Some(other)) {
        return Err(PermissionError::mismatch(&this.kind(), &other.kind()));
    }

    other.as_any().downcast_ref::<T>().ok_or_else(|| {
        PermissionError::InvalidArgument(format!(
            "{} permission has an unexpected representation",
            other.kind()
        ))
    })
}
