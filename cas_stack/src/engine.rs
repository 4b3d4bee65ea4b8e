//! Stack walking engine.
//!
//! This module decides whether a demanded permission is authorized by a
//! chain of frames. At each frame, innermost first, the walker consults in
//! order: the deny overlay, the permit-only restriction, the assertion and
//! finally the base grant. An explicit deny always wins; an assertion that
//! covers the demand ends the walk successfully.

use cas_core::error::{DenialReason, PermissionError, SecurityError};
use cas_core::id::FrameId;
use cas_permission::{CodeAccessCheck, Permission};
use tracing::{debug, trace};

use crate::frame::{Frame, Grant};
use crate::stack::FrameEnumerator;

/// The successful result of a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Every frame up to the origin authorized the demand.
    Granted {
        /// The number of frames consulted.
        frames_checked: usize,
    },

    /// A frame's assertion covered the demand and ended the walk.
    Truncated {
        /// The asserting frame.
        frame: FrameId,

        /// The label of the asserting frame.
        frame_label: String,

        /// The number of frames consulted, including the asserting frame.
        frames_checked: usize,
    },
}

impl WalkOutcome {
    /// The number of frames consulted.
    pub fn frames_checked(&self) -> usize {
        match self {
            Self::Granted { frames_checked } | Self::Truncated { frames_checked, .. } => *frames_checked,
        }
    }
}

/// What one frame decided.
enum FrameVerdict {
    /// Keep walking outward.
    Continue,

    /// Stop the walk with success.
    Truncate,
}

/// Walks a chain of frames for a demanded permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackWalker;

impl StackWalker {
    /// Create a stack walker.
    pub fn new() -> Self {
        Self
    }

    /// Check `permission` against the frames of `frames` from `start` outward.
    ///
    /// # Arguments
    ///
    /// * `permission` - The demanded permission.
    /// * `frames` - The frame source.
    /// * `start` - How many innermost frames to skip.
    ///
    /// # Returns
    ///
    /// * `Ok(WalkOutcome)` - If the demand is authorized.
    /// * `Err(SecurityError::Denied)` - If a frame rejects the demand.
    /// * `Err(SecurityError::CheckFailed)` - If the permission kind failed to
    ///   answer a check. The walk fails closed.
    pub fn check<E>(
        &self,
        permission: &dyn Permission,
        frames: &E,
        start: usize,
    ) -> Result<WalkOutcome, SecurityError>
    where
        E: FrameEnumerator + ?Sized,
    {
        let mut frames_checked = 0;

        for frame in frames.frames_from(start) {
            frames_checked += 1;
            trace!(frame = frame.label(), kind = %permission.kind(), "evaluating frame");

            match self.evaluate(permission, frame)? {
                FrameVerdict::Continue => {},
                FrameVerdict::Truncate => {
                    debug!(frame = frame.label(), frames_checked, "walk truncated by assertion");
                    return Ok(WalkOutcome::Truncated {
                        frame: frame.id(),
                        frame_label: frame.label().to_string(),
                        frames_checked,
                    });
                },
            }
        }

        debug!(frames_checked, "walk reached the origin");
        Ok(WalkOutcome::Granted { frames_checked })
    }

    fn evaluate(&self, permission: &dyn Permission, frame: &Frame) -> Result<FrameVerdict, SecurityError> {
        let kind = permission.kind();
        let failed = |source: PermissionError| SecurityError::CheckFailed {
            kind: kind.clone(),
            frame: frame.id(),
            frame_label: frame.label().to_string(),
            source,
        };

        if let Some(denied) = frame.denied_for(&kind) {
            if !permission.check_deny(Some(denied)).map_err(failed)? {
                return Err(denial(permission, frame, DenialReason::ExplicitDeny));
            }
        }

        if let Some(permitted) = frame.permit_only() {
            if !permission.check_permit_only(permitted.get(&kind)).map_err(failed)? {
                return Err(denial(permission, frame, DenialReason::OutsidePermitOnly));
            }
        }

        if let Some(asserted) = frame.asserted_for(&kind) {
            if permission.check_assert(Some(asserted)).map_err(failed)? {
                return Ok(FrameVerdict::Truncate);
            }
        }

        let granted = match frame.grant_for(&kind) {
            Grant::Unrestricted => true,
            Grant::Explicit(grant) => permission.check_demand(Some(grant)).map_err(failed)?,
            Grant::None => permission.check_demand(None).map_err(failed)?,
        };

        if granted {
            Ok(FrameVerdict::Continue)
        } else {
            Err(denial(permission, frame, DenialReason::NotGranted))
        }
    }
}

fn denial(permission: &dyn Permission, frame: &Frame, reason: DenialReason) -> SecurityError {
    SecurityError::Denied {
        permission: format!("{:?}", permission),
        kind: permission.kind(),
        frame: frame.id(),
        frame_label: frame.label().to_string(),
        reason,
    }
}
