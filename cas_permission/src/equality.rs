//! Permission equality.
//!
//! Two permissions are equal when each is a subset of the other. Kinds are
//! not trusted to answer the subset question: an error or a panic raised
//! while comparing is contained here and reported as "not equal", because
//! equality is relied upon by lookup code that must not fail.

use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::model::Permission;

/// Compare two optional permissions.
///
/// Absent permissions grant nothing, so an absent permission equals a
/// present one exactly when the present one is bottom.
///
/// # Arguments
///
/// * `a` - The first permission.
/// * `b` - The second permission.
///
/// # Returns
///
/// `true` if each permission is a subset of the other.
pub fn permissions_equal(a: Option<&dyn Permission>, b: Option<&dyn Permission>) -> bool {
    match (a, b) {
        (None, None) => true,
        (None, Some(b)) => contained_subset(b, None),
        (Some(a), None) => contained_subset(a, None),
        (Some(a), Some(b)) => contained_subset(a, Some(b)) && contained_subset(b, Some(a)),
    }
}

fn contained_subset(this: &dyn Permission, other: Option<&dyn Permission>) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| this.is_subset_of(other))) {
        Ok(Ok(answer)) => answer,
        Ok(Err(err)) => {
            debug!(error = %err, "subset check failed during equality comparison");
            false
        },
        Err(_) => {
            warn!("permission kind panicked during equality comparison");
            false
        },
    }
}

impl PartialEq for dyn Permission {
    fn eq(&self, other: &Self) -> bool {
        permissions_equal(Some(self), Some(other))
    }
}
