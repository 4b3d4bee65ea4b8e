//! Call-stack frames.
//!
//! A frame is the security record of one activation in the call chain. It
//! carries a base grant per permission kind and three overlays (deny,
//! permit-only and assert) that the activation can set on itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cas_core::error::{PermissionError, SecurityError};
use cas_core::id::FrameId;
use cas_core::kind::PermissionKind;
use cas_core::utils::RevertScope;
use cas_permission::{Permission, PermissionSet};

/// The base trust of a frame.
#[derive(Debug, Clone)]
pub enum Trust {
    /// Every permission of every kind is granted.
    Full,

    /// Only the permissions in the set are granted.
    Partial(PermissionSet),
}

/// What a frame grants for one kind.
#[derive(Debug, Clone, Copy)]
pub enum Grant<'a> {
    /// Everything of the kind is granted.
    Unrestricted,

    /// The given permission is granted.
    Explicit(&'a dyn Permission),

    /// Nothing of the kind is granted.
    None,
}

impl<'a> Grant<'a> {
    /// Whether this grant covers `permission`.
    pub fn covers(&self, permission: &dyn Permission) -> Result<bool, PermissionError> {
        match self {
            Self::Unrestricted => Ok(true),
            Self::Explicit(granted) => permission.is_subset_of(Some(*granted)),
            Self::None => permission.is_subset_of(None),
        }
    }
}

/// Revokes exactly one assertion, even after it was reverted and the kind
/// asserted again.
#[derive(Debug, Clone)]
pub(crate) struct AssertionHandle {
    kind: PermissionKind,
    revoked: Arc<AtomicBool>,
}

impl AssertionHandle {
    fn new(kind: PermissionKind) -> Self {
        Self {
            kind,
            revoked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn kind(&self) -> &PermissionKind {
        &self.kind
    }

    pub(crate) fn revoke(&self) {
        self.revoked.store(true, Ordering::Release);
    }

    fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }
}

/// The security record of one activation.
#[derive(Debug, Clone)]
pub struct Frame {
    id: FrameId,
    label: String,
    trust: Trust,
    denied: PermissionSet,
    permit_only: Option<PermissionSet>,
    asserted: PermissionSet,
    /// One handle per asserted kind, oldest first.
    assertions: Vec<AssertionHandle>,
}

impl Frame {
    /// Create a frame with the given base trust.
    ///
    /// # Arguments
    ///
    /// * `label` - A name for the code unit, used in diagnostics.
    /// * `trust` - The base trust of the frame.
    ///
    /// # Returns
    ///
    /// A new frame with no overlays.
    pub fn new(label: impl Into<String>, trust: Trust) -> Self {
        Self {
            id: FrameId::new(),
            label: label.into(),
            trust,
            denied: PermissionSet::new(),
            permit_only: None,
            asserted: PermissionSet::new(),
            assertions: Vec::new(),
        }
    }

    /// Create a frame that is granted everything.
    pub fn fully_trusted(label: impl Into<String>) -> Self {
        Self::new(label, Trust::Full)
    }

    /// Create a frame that is granted nothing.
    pub fn untrusted(label: impl Into<String>) -> Self {
        Self::new(label, Trust::Partial(PermissionSet::new()))
    }

    /// Create a frame granted the given set.
    pub fn with_grants(label: impl Into<String>, grants: PermissionSet) -> Self {
        Self::new(label, Trust::Partial(grants))
    }

    /// Add `permission` to the base grant.
    ///
    /// A fully trusted frame is unchanged.
    pub fn grant(mut self, permission: &dyn Permission) -> Result<Self, PermissionError> {
        if let Trust::Partial(grants) = &mut self.trust {
            grants.insert(permission)?;
        }
        Ok(self)
    }

    /// The identifier of this frame.
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// The label of this frame.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The base trust of this frame.
    pub fn trust(&self) -> &Trust {
        &self.trust
    }

    /// What this frame grants for `kind`.
    pub fn grant_for(&self, kind: &PermissionKind) -> Grant<'_> {
        match &self.trust {
            Trust::Full => Grant::Unrestricted,
            Trust::Partial(grants) => match grants.get(kind) {
                Some(granted) => Grant::Explicit(granted),
                None => Grant::None,
            },
        }
    }

    /// The denied overlay for `kind`.
    pub fn denied_for(&self, kind: &PermissionKind) -> Option<&dyn Permission> {
        self.denied.get(kind)
    }

    /// The permit-only restriction of this frame, if one is active.
    ///
    /// While a restriction is active, kinds missing from it are permitted
    /// nothing.
    pub fn permit_only(&self) -> Option<&PermissionSet> {
        self.permit_only.as_ref()
    }

    /// The asserted overlay for `kind`.
    pub fn asserted_for(&self, kind: &PermissionKind) -> Option<&dyn Permission> {
        if self.live_assertion(kind).is_some() {
            self.asserted.get(kind)
        } else {
            None
        }
    }

    /// Whether any assertion is active on this frame.
    pub fn has_assertions(&self) -> bool {
        self.assertions.iter().any(|handle| !handle.is_revoked())
    }

    fn live_assertion(&self, kind: &PermissionKind) -> Option<&AssertionHandle> {
        self.assertions
            .iter()
            .find(|handle| handle.kind() == kind && !handle.is_revoked())
    }

    /// Drop assertions whose handles were revoked.
    fn purge_revoked(&mut self) {
        let asserted = &mut self.asserted;
        self.assertions.retain(|handle| {
            if handle.is_revoked() {
                asserted.remove(handle.kind());
                false
            } else {
                true
            }
        });
    }

    /// Whether any overlay is active on this frame.
    pub fn has_overlays(&self) -> bool {
        self.has_assertions() || !self.denied.is_empty() || self.permit_only.is_some()
    }

    /// Assert a copy of `permission` on this frame.
    ///
    /// # Arguments
    ///
    /// * `permission` - The permission this activation vouches for.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the assertion was set.
    /// * `Err(SecurityError::AssertionAlreadyActive)` - If an assertion of the
    ///   same kind is already active on this frame.
    pub fn set_assert(&mut self, permission: &dyn Permission) -> Result<(), SecurityError> {
        self.set_assert_tracked(permission).map(|_| ())
    }

    /// Assert a copy of `permission` and return the handle that revokes it.
    pub(crate) fn set_assert_tracked(
        &mut self,
        permission: &dyn Permission,
    ) -> Result<AssertionHandle, SecurityError> {
        self.purge_revoked();
        let kind = permission.kind();
        if self.asserted.contains_kind(&kind) {
            return Err(SecurityError::AssertionAlreadyActive {
                kind,
                frame_label: self.label.clone(),
            });
        }
        self.asserted.replace(permission);
        let handle = AssertionHandle::new(kind);
        self.assertions.push(handle.clone());
        Ok(handle)
    }

    /// Clear assertions according to `scope`.
    ///
    /// Returns the number of assertions cleared.
    pub fn revert_assert(&mut self, scope: RevertScope) -> usize {
        self.purge_revoked();
        match scope {
            RevertScope::AllKinds => {
                let cleared = self.assertions.len();
                self.asserted.clear();
                self.assertions.clear();
                cleared
            },
            RevertScope::MostRecent => match self.assertions.last().map(|handle| handle.kind().clone()) {
                Some(kind) => usize::from(self.revert_assert_kind(&kind)),
                None => 0,
            },
        }
    }

    /// Clear the assertion of `kind`. Returns whether one was active.
    pub fn revert_assert_kind(&mut self, kind: &PermissionKind) -> bool {
        self.purge_revoked();
        self.assertions.retain(|handle| handle.kind() != kind);
        self.asserted.remove(kind).is_some()
    }

    /// Deny a copy of `permission` on this frame.
    pub fn set_deny(&mut self, permission: &dyn Permission) -> Result<(), SecurityError> {
        let kind = permission.kind();
        if self.denied.contains_kind(&kind) {
            return Err(SecurityError::OverlayAlreadyActive {
                overlay: "deny",
                kind,
                frame_label: self.label.clone(),
            });
        }
        self.denied.replace(permission);
        Ok(())
    }

    /// Clear every deny overlay.
    pub fn revert_deny(&mut self) {
        self.denied.clear();
    }

    /// Restrict this frame to a copy of `permission` for its kind.
    ///
    /// Restrictions for several kinds accumulate into one permit-only set.
    pub fn set_permit_only(&mut self, permission: &dyn Permission) -> Result<(), SecurityError> {
        let permitted = self.permit_only.get_or_insert_with(PermissionSet::new);
        let kind = permission.kind();
        if permitted.contains_kind(&kind) {
            return Err(SecurityError::OverlayAlreadyActive {
                overlay: "permit-only",
                kind,
                frame_label: self.label.clone(),
            });
        }
        permitted.replace(permission);
        Ok(())
    }

    /// Clear the permit-only restriction.
    pub fn revert_permit_only(&mut self) {
        self.permit_only = None;
    }

    /// Clear every overlay.
    pub fn revert_all(&mut self) {
        self.revert_assert(RevertScope::AllKinds);
        self.revert_deny();
        self.revert_permit_only();
    }
}
