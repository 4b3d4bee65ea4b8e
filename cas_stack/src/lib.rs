//! # CAS Stack
//!
//! `cas_stack` enforces code-access permissions by inspecting the chain of
//! active callers when a privileged operation is attempted, rather than
//! only the immediate caller.
//!
//! Key concepts:
//!
//! 1. **Frame**: The security record of one activation. It carries a base
//!    grant and the deny, permit-only and assert overlays the activation set
//!    on itself.
//!
//! 2. **Demand**: Walks frames from the innermost outward. Every frame must
//!    authorize the demanded permission unless an assertion ends the walk.
//!
//! 3. **Assert**: A frame vouches for a permission on behalf of its callers,
//!    so walks reaching it stop there.
//!
//! 4. **Security Context**: The call stack, configuration and audit trail
//!    of one thread. It can be held explicitly or used through the ambient
//!    thread-local functions of this crate.
//!
//! ```
//! use cas_permission::{FileAccess, FilePermission};
//! use cas_stack::Frame;
//!
//! let _origin = cas_stack::enter_frame(Frame::untrusted("plugin")).unwrap();
//! let _library = cas_stack::enter_frame(Frame::fully_trusted("logger")).unwrap();
//!
//! let append = FilePermission::new(FileAccess::APPEND, ["/var/log/app.log"]);
//! assert!(cas_stack::demand(&append).is_err());
//!
//! cas_stack::assert(&append).unwrap();
//! assert!(cas_stack::demand(&append).is_ok());
//! ```

pub mod frame;
pub mod stack;
pub mod engine;
pub mod audit;
pub mod context;
pub mod ambient;

// Re-export key types for convenience
pub use frame::{Frame, Grant, Trust};
pub use stack::{CallStack, FrameEnumerator};
pub use engine::{StackWalker, WalkOutcome};
pub use audit::{AuditEntry, AuditLog, AuditOutcome};
pub use context::SecurityContext;
pub use ambient::{
    assert, assert_scoped, configure, demand, deny, enter_frame, permit_only, reset,
    revert_all, revert_assert, revert_assert_kind, revert_deny, revert_permit_only, scoped,
    with_current, AssertScope, FrameScope,
};
