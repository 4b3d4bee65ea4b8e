//! Call-stack model.
//!
//! A call stack is the ordered chain of frames from the origin of execution
//! to the currently executing activation. Walks see it innermost first.

use cas_core::id::FrameId;
use tracing::warn;

use crate::frame::Frame;

/// A source of frames for a stack walk.
///
/// Implementations enumerate frames starting `start` activations away from
/// the innermost one, moving outward toward the origin.
pub trait FrameEnumerator {
    /// Frames from `start` outward. `start == 0` is the innermost frame.
    fn frames_from(&self, start: usize) -> Box<dyn Iterator<Item = &Frame> + '_>;
}

/// The chain of active frames of one thread of execution.
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    /// Frames, outermost first.
    frames: Vec<Frame>,
}

impl CallStack {
    /// Create an empty call stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a call stack from frames listed innermost first, the order in
    /// which a walk visits them.
    pub fn from_chain(chain: impl IntoIterator<Item = Frame>) -> Self {
        let mut frames: Vec<Frame> = chain.into_iter().collect();
        frames.reverse();
        Self { frames }
    }

    /// Enter a new innermost frame.
    pub fn push(&mut self, frame: Frame) -> FrameId {
        let id = frame.id();
        self.frames.push(frame);
        id
    }

    /// Leave the innermost frame.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Leave the frame `id`.
    ///
    /// Frames entered after it cannot outlive it and are dropped as well.
    /// Returns the frame, or `None` if it is not on the stack.
    pub fn pop_frame(&mut self, id: FrameId) -> Option<Frame> {
        let position = self.frames.iter().rposition(|frame| frame.id() == id)?;
        if position + 1 != self.frames.len() {
            warn!(
                frame = %id,
                abandoned = self.frames.len() - position - 1,
                "frame left while inner frames were still active"
            );
        }
        let mut removed = self.frames.split_off(position);
        Some(removed.swap_remove(0))
    }

    /// The innermost frame.
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// The innermost frame, mutably.
    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// The number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame is active.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterate over frames innermost first.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev()
    }
}

impl FrameEnumerator for CallStack {
    fn frames_from(&self, start: usize) -> Box<dyn Iterator<Item = &Frame> + '_> {
        Box::new(self.frames.iter().rev().skip(start))
    }
}
