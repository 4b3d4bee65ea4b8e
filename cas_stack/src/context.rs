//! Security contexts.
//!
//! A security context is the explicit form of "the chain of frames from
//! here outward" for one thread of execution. It owns the call stack, the
//! configuration and the audit trail, and exposes the demand, assert, deny
//! and permit-only operations on its innermost frame.

use cas_core::error::SecurityError;
use cas_core::id::FrameId;
use cas_core::kind::PermissionKind;
use cas_core::utils::SecurityConfig;
use cas_permission::{CodeAccessCheck, Permission};
use tracing::{debug, info, warn};

use crate::audit::{AuditLog, AuditOutcome};
use crate::engine::{StackWalker, WalkOutcome};
use crate::frame::{AssertionHandle, Frame};
use crate::stack::CallStack;

/// The security state of one thread of execution.
#[derive(Debug, Default)]
pub struct SecurityContext {
    stack: CallStack,
    config: SecurityConfig,
    walker: StackWalker,
    audit: Option<AuditLog>,
}

impl SecurityContext {
    /// Create a context with an empty call stack.
    pub fn new(config: SecurityConfig) -> Self {
        let mut context = Self::default();
        context.configure(config);
        context
    }

    /// Create a context over an existing call stack.
    pub fn with_stack(config: SecurityConfig, stack: CallStack) -> Self {
        let mut context = Self::new(config);
        context.stack = stack;
        context
    }

    /// Replace the configuration.
    ///
    /// Enabling auditing starts a fresh audit log; disabling it drops the
    /// current one.
    pub fn configure(&mut self, config: SecurityConfig) {
        self.audit = config
            .audit
            .enabled
            .then(|| AuditLog::new(config.audit.max_entries_per_kind));
        info!(
            revert_scope = ?config.revert_scope,
            demand_skip_frames = config.demand_skip_frames,
            audit = config.audit.enabled,
            "security context configured"
        );
        self.config = config;
    }

    /// The configuration.
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// The call stack.
    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    /// The audit log, if auditing is enabled.
    pub fn audit(&self) -> Option<&AuditLog> {
        self.audit.as_ref()
    }

    /// Enter a new innermost frame.
    pub fn push_frame(&mut self, frame: Frame) -> FrameId {
        debug!(frame = frame.label(), depth = self.stack.depth() + 1, "entering frame");
        self.stack.push(frame)
    }

    /// Leave the innermost frame, dropping its overlays.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    /// Leave the frame `id` and any frame entered after it.
    pub fn leave_frame(&mut self, id: FrameId) -> Option<Frame> {
        self.stack.pop_frame(id)
    }

    /// Demand `permission` from every frame on the stack.
    ///
    /// # Arguments
    ///
    /// * `permission` - The demanded permission.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the demand is authorized.
    /// * `Err(SecurityError)` - A denial carrying the permission, its kind
    ///   and the frame where the walk stopped.
    pub fn demand(&self, permission: &dyn Permission) -> Result<(), SecurityError> {
        // A permission granting nothing is satisfied by any chain
        if matches!(permission.check_demand(None), Ok(true)) {
            self.record(permission, AuditOutcome::Trivial);
            return Ok(());
        }

        match self.walk(permission) {
            Ok(WalkOutcome::Granted { .. }) => {
                self.record(permission, AuditOutcome::Granted);
                Ok(())
            },
            Ok(WalkOutcome::Truncated { frame_label, .. }) => {
                self.record(permission, AuditOutcome::Truncated { frame_label });
                Ok(())
            },
            Err(err) => {
                warn!(kind = %permission.kind(), error = %err, "demand denied");
                let frame_label = match &err {
                    SecurityError::Denied { frame_label, .. }
                    | SecurityError::CheckFailed { frame_label, .. } => Some(frame_label.clone()),
                    _ => None,
                };
                self.record(permission, AuditOutcome::Denied { frame_label, reason: err.to_string() });
                Err(err)
            },
        }
    }

    /// Walk the stack for `permission` without auditing or the bottom fast path.
    pub fn walk(&self, permission: &dyn Permission) -> Result<WalkOutcome, SecurityError> {
        self.walker.check(permission, &self.stack, self.config.demand_skip_frames)
    }

    /// Assert `permission` on the innermost frame.
    ///
    /// Demands that reach this frame and are covered by `permission` succeed
    /// without consulting outer frames, until the assertion is reverted or
    /// the frame is left.
    pub fn assert(&mut self, permission: &dyn Permission) -> Result<(), SecurityError> {
        self.assert_tracked(permission).map(|_| ())
    }

    /// Assert `permission` on the innermost frame and return the handle that
    /// revokes this one assertion.
    pub(crate) fn assert_tracked(&mut self, permission: &dyn Permission) -> Result<AssertionHandle, SecurityError> {
        let frame = self.stack.current_mut().ok_or(SecurityError::NoActiveFrame)?;
        let handle = frame.set_assert_tracked(permission)?;
        debug!(frame = frame.label(), kind = %permission.kind(), "assertion set");
        Ok(handle)
    }

    /// Revert assertions on the innermost frame according to the configured scope.
    ///
    /// Reverting when nothing is asserted, or when no frame is active, does nothing.
    pub fn revert_assert(&mut self) {
        let scope = self.config.revert_scope;
        if let Some(frame) = self.stack.current_mut() {
            let cleared = frame.revert_assert(scope);
            debug!(frame = frame.label(), cleared, "assertions reverted");
        }
    }

    /// Revert the assertion of `kind` on the innermost frame.
    pub fn revert_assert_kind(&mut self, kind: &PermissionKind) {
        if let Some(frame) = self.stack.current_mut() {
            frame.revert_assert_kind(kind);
        }
    }

    /// Deny `permission` on the innermost frame.
    pub fn deny(&mut self, permission: &dyn Permission) -> Result<(), SecurityError> {
        let frame = self.stack.current_mut().ok_or(SecurityError::NoActiveFrame)?;
        frame.set_deny(permission)
    }

    /// Restrict the innermost frame to `permission` for its kind.
    pub fn permit_only(&mut self, permission: &dyn Permission) -> Result<(), SecurityError> {
        let frame = self.stack.current_mut().ok_or(SecurityError::NoActiveFrame)?;
        frame.set_permit_only(permission)
    }

    /// Clear the deny overlays of the innermost frame.
    pub fn revert_deny(&mut self) {
        if let Some(frame) = self.stack.current_mut() {
            frame.revert_deny();
        }
    }

    /// Clear the permit-only restriction of the innermost frame.
    pub fn revert_permit_only(&mut self) {
        if let Some(frame) = self.stack.current_mut() {
            frame.revert_permit_only();
        }
    }

    /// Clear every overlay of the innermost frame.
    pub fn revert_all(&mut self) {
        if let Some(frame) = self.stack.current_mut() {
            frame.revert_all();
        }
    }

    fn record(&self, permission: &dyn Permission, outcome: AuditOutcome) {
        if let Some(audit) = &self.audit {
            audit.record(
                permission.kind(),
                format!("{:?}", permission),
                self.stack.depth(),
                outcome,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_core::utils::RevertScope;
    use cas_permission::{FileAccess, FilePermission, NetworkPermission};

    fn audited() -> SecurityConfig {
        let mut config = SecurityConfig::default();
        config.audit.enabled = true;
        config
    }

    fn write_tmp() -> FilePermission {
        FilePermission::new(FileAccess::WRITE, ["/tmp/out"])
    }

    #[test]
    fn test_operations_need_a_frame() {
        let mut context = SecurityContext::default();
        assert!(matches!(context.assert(&write_tmp()), Err(SecurityError::NoActiveFrame)));
        assert!(matches!(context.deny(&write_tmp()), Err(SecurityError::NoActiveFrame)));
        assert!(matches!(context.permit_only(&write_tmp()), Err(SecurityError::NoActiveFrame)));

        // Reverts are no-ops
        context.revert_assert();
        context.revert_deny();
        context.revert_permit_only();
        context.revert_all();
    }

    #[test]
    fn test_bottom_demand_skips_walk() {
        let mut context = SecurityContext::new(audited());
        context.push_frame(Frame::untrusted("plugin"));

        context.demand(&FilePermission::none()).unwrap();
        let entries = context.audit().unwrap().entries(&PermissionKind::File);
        assert_eq!(entries[0].outcome, AuditOutcome::Trivial);
    }

    #[test]
    fn test_assert_then_revert() {
        let mut context = SecurityContext::default();
        context.push_frame(Frame::untrusted("origin"));
        context.push_frame(Frame::fully_trusted("library"));

        assert!(context.demand(&write_tmp()).is_err());

        context.assert(&FilePermission::read_write(["/tmp"])).unwrap();
        context.demand(&write_tmp()).unwrap();

        context.revert_assert();
        assert!(context.demand(&write_tmp()).is_err());

        // Reverting again is a no-op
        context.revert_assert();
        assert!(context.demand(&write_tmp()).is_err());
    }

    #[test]
    fn test_most_recent_revert_scope() {
        let mut config = SecurityConfig::default();
        config.revert_scope = RevertScope::MostRecent;
        let mut context = SecurityContext::new(config);
        context.push_frame(Frame::untrusted("origin"));
        context.push_frame(Frame::fully_trusted("library"));

        context.assert(&FilePermission::unrestricted()).unwrap();
        context.assert(&NetworkPermission::unrestricted()).unwrap();
        context.revert_assert();

        assert!(context.demand(&NetworkPermission::unrestricted()).is_err());
        context.demand(&write_tmp()).unwrap();
    }

    #[test]
    fn test_leaving_frame_drops_assertion() {
        let mut context = SecurityContext::default();
        context.push_frame(Frame::untrusted("origin"));
        let library = context.push_frame(Frame::fully_trusted("library"));
        context.assert(&FilePermission::unrestricted()).unwrap();

        context.leave_frame(library);
        context.push_frame(Frame::fully_trusted("library"));
        assert!(context.demand(&write_tmp()).is_err());
    }

    #[test]
    fn test_callee_cannot_revert_caller_assertion() {
        let mut context = SecurityContext::default();
        context.push_frame(Frame::untrusted("origin"));
        context.push_frame(Frame::fully_trusted("library"));
        context.assert(&FilePermission::unrestricted()).unwrap();
        let callback = context.push_frame(Frame::fully_trusted("callback"));

        // Reverts from the callee only reach its own frame
        context.revert_assert();
        context.revert_assert_kind(&PermissionKind::File);
        context.revert_all();
        context.demand(&write_tmp()).unwrap();

        context.leave_frame(callback);
        context.revert_assert();
        assert!(context.demand(&write_tmp()).is_err());
    }

    #[test]
    fn test_skipping_past_origin_is_granted() {
        let mut config = SecurityConfig::default();
        config.demand_skip_frames = 5;
        let stack = CallStack::from_chain([Frame::untrusted("inner"), Frame::untrusted("origin")]);
        let context = SecurityContext::with_stack(config, stack);

        assert_eq!(
            context.walk(&FilePermission::unrestricted()).unwrap(),
            WalkOutcome::Granted { frames_checked: 0 }
        );
        context.demand(&write_tmp()).unwrap();
    }

    #[test]
    fn test_audit_records_denials() {
        let mut context = SecurityContext::new(audited());
        context.push_frame(Frame::untrusted("plugin"));

        assert!(context.demand(&write_tmp()).is_err());
        let audit = context.audit().unwrap();
        assert_eq!(audit.denial_count(&PermissionKind::File), 1);
        match &audit.entries(&PermissionKind::File)[0].outcome {
            AuditOutcome::Denied { frame_label, .. } => assert_eq!(frame_label.as_deref(), Some("plugin")),
            other => panic!("expected a denial, got {:?}", other),
        }
    }

    #[test]
    fn test_reconfigure_toggles_audit() {
        let mut context = SecurityContext::default();
        assert!(context.audit().is_none());
        context.configure(audited());
        assert!(context.audit().is_some());
        context.configure(SecurityConfig::default());
        assert!(context.audit().is_none());
    }
}
