//! Ambient, thread-local security context.
//!
//! Application code rarely threads a `SecurityContext` through every call.
//! This module keeps one context per thread and exposes the demand and
//! assert operations as free functions over it. Frames are entered with
//! [`enter_frame`] and left when the returned [`FrameScope`] is dropped, on
//! every exit path including unwinding.

use std::cell::RefCell;
use std::marker::PhantomData;

use cas_core::error::SecurityError;
use cas_core::id::FrameId;
use cas_core::kind::PermissionKind;
use cas_core::utils::SecurityConfig;
use cas_permission::Permission;
use tracing::{debug, warn};

use crate::context::SecurityContext;
use crate::frame::{AssertionHandle, Frame};

thread_local! {
    static CURRENT: RefCell<SecurityContext> = RefCell::new(SecurityContext::default());

    /// Frames whose scope was dropped while the context was busy.
    static PENDING_LEAVES: RefCell<Vec<FrameId>> = const { RefCell::new(Vec::new()) };
}

/// Leave frames queued while the context was busy, if it is free now.
fn apply_pending_leaves(cell: &RefCell<SecurityContext>) {
    let pending = PENDING_LEAVES
        .try_with(|pending| pending.try_borrow_mut().map(|mut pending| std::mem::take(&mut *pending)))
        .ok()
        .and_then(Result::ok)
        .unwrap_or_default();
    if pending.is_empty() {
        return;
    }

    match cell.try_borrow_mut() {
        Ok(mut context) => {
            for id in pending {
                debug!(frame = %id, "leaving frame queued while the context was busy");
                context.leave_frame(id);
            }
        },
        Err(_) => requeue_leaves(pending),
    }
}

fn requeue_leaves(ids: Vec<FrameId>) {
    let queued = PENDING_LEAVES.try_with(|pending| {
        pending
            .try_borrow_mut()
            .map(|mut pending| pending.extend(ids.iter().copied()))
            .is_ok()
    });
    if !matches!(queued, Ok(true)) {
        warn!(frames = ids.len(), "frames could not be queued for leaving");
    }
}

fn with_context<R>(f: impl FnOnce(&SecurityContext) -> R) -> Result<R, SecurityError> {
    CURRENT
        .try_with(|cell| {
            apply_pending_leaves(cell);
            let context = cell.try_borrow().map_err(|_| SecurityError::ContextBusy)?;
            Ok(f(&context))
        })
        .map_err(|_| SecurityError::ContextBusy)?
}

fn with_context_mut<R>(f: impl FnOnce(&mut SecurityContext) -> R) -> Result<R, SecurityError> {
    CURRENT
        .try_with(|cell| {
            apply_pending_leaves(cell);
            let mut context = cell.try_borrow_mut().map_err(|_| SecurityError::ContextBusy)?;
            Ok(f(&mut context))
        })
        .map_err(|_| SecurityError::ContextBusy)?
}

/// Leaves its frame when dropped.
///
/// A scope belongs to the thread that entered the frame and cannot be sent
/// to another one.
#[must_use = "the frame is left as soon as the scope is dropped"]
#[derive(Debug)]
pub struct FrameScope {
    id: FrameId,
    _thread_bound: PhantomData<*const ()>,
}

impl FrameScope {
    /// The identifier of the entered frame.
    pub fn id(&self) -> FrameId {
        self.id
    }
}

impl Drop for FrameScope {
    fn drop(&mut self) {
        let id = self.id;
        match with_context_mut(|context| context.leave_frame(id).is_some()) {
            Ok(true) => {},
            Ok(false) => debug!(frame = %id, "frame already left"),
            Err(_) => {
                warn!(frame = %id, "security context busy, frame will be left on next access");
                requeue_leaves(vec![id]);
            },
        }
    }
}

/// Reverts one assertion when dropped.
///
/// The scope only revokes the assertion it created. If that assertion was
/// already reverted and the kind asserted again, the newer assertion stays.
/// Revoking needs no access to the context, so it also takes effect when
/// the scope is dropped during a check.
#[must_use = "the assertion is reverted as soon as the scope is dropped"]
#[derive(Debug)]
pub struct AssertScope {
    handle: AssertionHandle,
    _thread_bound: PhantomData<*const ()>,
}

impl AssertScope {
    /// The kind of the asserted permission.
    pub fn kind(&self) -> &PermissionKind {
        self.handle.kind()
    }
}

impl Drop for AssertScope {
    fn drop(&mut self) {
        self.handle.revoke();
        debug!(kind = %self.handle.kind(), "scoped assertion revoked");
    }
}

/// Replace the configuration of this thread's context.
pub fn configure(config: SecurityConfig) -> Result<(), SecurityError> {
    with_context_mut(|context| context.configure(config))
}

/// Drop every frame of this thread's context, keeping its configuration.
pub fn reset() -> Result<(), SecurityError> {
    with_context_mut(|context| {
        *context = SecurityContext::new(context.config().clone());
    })
}

/// Run `f` against this thread's context.
pub fn with_current<R>(f: impl FnOnce(&SecurityContext) -> R) -> Result<R, SecurityError> {
    with_context(f)
}

/// Enter `frame` as the innermost frame of this thread.
pub fn enter_frame(frame: Frame) -> Result<FrameScope, SecurityError> {
    let id = with_context_mut(|context| context.push_frame(frame))?;
    Ok(FrameScope {
        id,
        _thread_bound: PhantomData,
    })
}

/// Run `f` inside `frame`.
pub fn scoped<R>(frame: Frame, f: impl FnOnce() -> R) -> Result<R, SecurityError> {
    let _scope = enter_frame(frame)?;
    Ok(f())
}

/// Demand `permission` from every frame of this thread.
///
/// # Arguments
///
/// * `permission` - The demanded permission.
///
/// # Returns
///
/// * `Ok(())` - If the demand is authorized.
/// * `Err(SecurityError)` - If a frame rejects it.
pub fn demand(permission: &dyn Permission) -> Result<(), SecurityError> {
    with_context(|context| context.demand(permission))?
}

/// Assert `permission` on the innermost frame of this thread.
pub fn assert(permission: &dyn Permission) -> Result<(), SecurityError> {
    with_context_mut(|context| context.assert(permission))?
}

/// Assert `permission` on the innermost frame until the returned scope is dropped.
pub fn assert_scoped(permission: &dyn Permission) -> Result<AssertScope, SecurityError> {
    let handle = with_context_mut(|context| context.assert_tracked(permission))??;
    Ok(AssertScope {
        handle,
        _thread_bound: PhantomData,
    })
}

/// Revert assertions on the innermost frame of this thread.
pub fn revert_assert() -> Result<(), SecurityError> {
    with_context_mut(SecurityContext::revert_assert)
}

/// Revert the assertion of `kind` on the innermost frame of this thread.
pub fn revert_assert_kind(kind: &PermissionKind) -> Result<(), SecurityError> {
    with_context_mut(|context| context.revert_assert_kind(kind))
}

/// Deny `permission` on the innermost frame of this thread.
pub fn deny(permission: &dyn Permission) -> Result<(), SecurityError> {
    with_context_mut(|context| context.deny(permission))?
}

/// Restrict the innermost frame of this thread to `permission` for its kind.
pub fn permit_only(permission: &dyn Permission) -> Result<(), SecurityError> {
    with_context_mut(|context| context.permit_only(permission))?
}

/// Clear the deny overlays of the innermost frame of this thread.
pub fn revert_deny() -> Result<(), SecurityError> {
    with_context_mut(SecurityContext::revert_deny)
}

/// Clear the permit-only restriction of the innermost frame of this thread.
pub fn revert_permit_only() -> Result<(), SecurityError> {
    with_context_mut(SecurityContext::revert_permit_only)
}

/// Clear every overlay of the innermost frame of this thread.
pub fn revert_all() -> Result<(), SecurityError> {
    with_context_mut(SecurityContext::revert_all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use cas_core::error::PermissionError;
    use cas_permission::{FileAccess, FilePermission};

    fn write_tmp() -> FilePermission {
        FilePermission::new(FileAccess::WRITE, ["/tmp/out"])
    }

    fn depth() -> usize {
        with_current(|context| context.stack().depth()).unwrap()
    }

    #[test]
    fn test_frame_scope_leaves_frame() {
        reset().unwrap();
        {
            let _origin = enter_frame(Frame::untrusted("origin")).unwrap();
            assert_eq!(depth(), 1);
            assert!(demand(&write_tmp()).is_err());
        }
        assert_eq!(depth(), 0);
        demand(&write_tmp()).unwrap();
    }

    #[test]
    fn test_frame_scope_leaves_frame_on_unwind() {
        reset().unwrap();
        let _origin = enter_frame(Frame::untrusted("origin")).unwrap();

        let result = std::panic::catch_unwind(|| {
            let _library = enter_frame(Frame::fully_trusted("library")).unwrap();
            assert(&FilePermission::unrestricted()).unwrap();
            panic!("library failed");
        });

        assert!(result.is_err());
        assert_eq!(depth(), 1);
        assert!(demand(&write_tmp()).is_err());
    }

    #[test]
    fn test_assert_scope_reverts_one_kind() {
        reset().unwrap();
        let _origin = enter_frame(Frame::untrusted("origin")).unwrap();
        let _library = enter_frame(Frame::fully_trusted("library")).unwrap();

        {
            let scope = assert_scoped(&FilePermission::read_write(["/tmp"])).unwrap();
            assert_eq!(scope.kind(), &PermissionKind::File);
            demand(&write_tmp()).unwrap();
        }
        assert!(demand(&write_tmp()).is_err());

        // The same kind can be asserted again once reverted
        assert(&FilePermission::read_write(["/tmp"])).unwrap();
        revert_assert().unwrap();
        revert_assert().unwrap();
    }

    #[test]
    fn test_assert_scope_dropped_while_context_busy() {
        reset().unwrap();
        let _origin = enter_frame(Frame::untrusted("origin")).unwrap();
        let _library = enter_frame(Frame::fully_trusted("library")).unwrap();

        let scope = assert_scoped(&FilePermission::unrestricted()).unwrap();
        demand(&write_tmp()).unwrap();
        with_current(|_| drop(scope)).unwrap();

        assert!(demand(&write_tmp()).is_err());
        with_current(|context| assert!(!context.stack().current().unwrap().has_assertions())).unwrap();
    }

    #[test]
    fn test_stale_assert_scope_keeps_newer_assertion() {
        reset().unwrap();
        let _origin = enter_frame(Frame::untrusted("origin")).unwrap();
        let _library = enter_frame(Frame::fully_trusted("library")).unwrap();

        let scope = assert_scoped(&FilePermission::read_write(["/tmp"])).unwrap();
        revert_assert().unwrap();
        assert(&FilePermission::unrestricted()).unwrap();

        drop(scope);
        demand(&write_tmp()).unwrap();
    }

    #[test]
    fn test_frame_scope_dropped_while_context_busy() {
        reset().unwrap();
        let _origin = enter_frame(Frame::untrusted("origin")).unwrap();
        let library = enter_frame(Frame::fully_trusted("library")).unwrap();
        assert(&FilePermission::unrestricted()).unwrap();

        with_current(|_| drop(library)).unwrap();

        assert!(demand(&write_tmp()).is_err());
        assert_eq!(depth(), 1);
    }

    #[test]
    fn test_demand_without_frame_is_granted() {
        reset().unwrap();
        assert_eq!(depth(), 0);
        demand(&write_tmp()).unwrap();
        demand(&FilePermission::unrestricted()).unwrap();
    }

    #[test]
    fn test_scoped_and_misuse() {
        reset().unwrap();
        assert!(matches!(assert(&write_tmp()), Err(SecurityError::NoActiveFrame)));
        assert!(matches!(assert_scoped(&write_tmp()), Err(SecurityError::NoActiveFrame)));

        let denied = scoped(Frame::untrusted("plugin"), || demand(&write_tmp())).unwrap();
        assert!(denied.unwrap_err().is_denial());
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_contexts_are_per_thread() {
        reset().unwrap();
        let _origin = enter_frame(Frame::untrusted("origin")).unwrap();
        assert!(demand(&write_tmp()).is_err());

        let other = std::thread::spawn(|| {
            let before = depth();
            (before, demand(&write_tmp()).is_ok())
        })
        .join()
        .unwrap();

        assert_eq!(other, (0, true));
        assert_eq!(depth(), 1);
    }

    #[test]
    fn test_reentrant_mutation_is_rejected() {
        #[derive(Debug, Clone)]
        struct Reentrant;

        impl Permission for Reentrant {
            fn kind(&self) -> PermissionKind {
                PermissionKind::custom("reentrant")
            }

            fn copy(&self) -> Box<dyn Permission> {
                Box::new(self.clone())
            }

            fn intersect(&self, _: Option<&dyn Permission>) -> Result<Option<Box<dyn Permission>>, PermissionError> {
                Ok(None)
            }

            // Reports itself as bottom only if the context refused the nested assert
            fn is_subset_of(&self, _: Option<&dyn Permission>) -> Result<bool, PermissionError> {
                Ok(matches!(assert(&FilePermission::none()), Err(SecurityError::ContextBusy)))
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        reset().unwrap();
        let _origin = enter_frame(Frame::untrusted("origin")).unwrap();
        demand(&Reentrant).unwrap();
        with_current(|context| assert!(!context.stack().current().unwrap().has_assertions())).unwrap();
    }

    #[test]
    fn test_deny_and_permit_only_reverts() {
        reset().unwrap();
        let _host = enter_frame(Frame::fully_trusted("host")).unwrap();

        deny(&FilePermission::new(FileAccess::WRITE, ["/tmp"])).unwrap();
        assert!(demand(&write_tmp()).is_err());
        revert_deny().unwrap();
        demand(&write_tmp()).unwrap();

        permit_only(&FilePermission::read_only(["/srv"])).unwrap();
        assert!(demand(&write_tmp()).is_err());
        revert_permit_only().unwrap();
        demand(&write_tmp()).unwrap();

        deny(&FilePermission::unrestricted()).unwrap();
        permit_only(&FilePermission::none()).unwrap();
        revert_all().unwrap();
        demand(&write_tmp()).unwrap();
    }
}
