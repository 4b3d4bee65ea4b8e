//! Stack-walk predicates.
//!
//! The stack walker compares a demanded permission with the state a frame
//! holds for the same kind. These predicates are only defined between
//! permissions of one kind; passing another kind is a bug in the walker.

use cas_core::error::PermissionError;

use crate::model::Permission;

/// Predicates evaluated on a demanded permission during a stack walk.
pub trait CodeAccessCheck: Permission {
    /// Whether `grant` covers this demand.
    fn check_demand(&self, grant: Option<&dyn Permission>) -> Result<bool, PermissionError> {
        debug_assert_same_kind(self, grant, "check_demand");
        self.is_subset_of(grant)
    }

    /// Whether this demand stays within a permit-only restriction.
    fn check_permit_only(&self, permitted: Option<&dyn Permission>) -> Result<bool, PermissionError> {
        debug_assert_same_kind(self, permitted, "check_permit_only");
        self.is_subset_of(permitted)
    }

    /// Whether this demand avoids everything in `denied`.
    fn check_deny(&self, denied: Option<&dyn Permission>) -> Result<bool, PermissionError> {
        debug_assert_same_kind(self, denied, "check_deny");
        match self.intersect(denied)? {
            None => Ok(true),
            Some(common) => common.is_subset_of(None),
        }
    }

    /// Whether `asserted` vouches for this demand.
    fn check_assert(&self, asserted: Option<&dyn Permission>) -> Result<bool, PermissionError> {
        debug_assert_same_kind(self, asserted, "check_assert");
        self.is_subset_of(asserted)
    }
}

impl<P: Permission + ?Sized> CodeAccessCheck for P {}

fn debug_assert_same_kind<P>(this: &P, other: Option<&dyn Permission>, check: &str)
where
    P: Permission + ?Sized,
{
    debug_assert!(
        other.map_or(true, |other| other.kind() == this.kind()),
        "{} is not defined for permissions of different kinds",
        check
    );
}
