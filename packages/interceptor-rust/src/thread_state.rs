//! Per-thread interception state.
//!
//! Every inbound request that reaches `receive_request_service_contexts`
//! pushes one [`RequestFrame`] on the calling thread's stack; the matching
//! server send point (`send_reply`, `send_exception`, `send_other`) pops it.
//! ORB dispatch is strictly nested per thread, so the stack depth mirrors
//! the depth of nested inbound calls on that thread.
//!
//! If the receive point fails, the send point never runs; [`FrameGuard`]
//! pops the frame on that path instead.

use std::cell::RefCell;

use tracing::warn;

use crate::stack::LifoStack;

/// Whether a transaction context has to be attached to the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMarker {
    Reply,
    NoReply,
}

/// Whether the request imported a proper context or the null context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMarker {
    Proper,
    Null,
}

/// Interception state of one in-flight inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame {
    pub reply: ReplyMarker,
    pub context: ContextMarker,
}

impl RequestFrame {
    /// Initial frame: reply expected iff a context was received, context
    /// provisionally proper.
    #[must_use]
    pub fn on_receive(context_received: bool) -> Self {
        Self {
            reply: if context_received {
                ReplyMarker::Reply
            } else {
                ReplyMarker::NoReply
            },
            context: ContextMarker::Proper,
        }
    }
}

thread_local! {
    static FRAMES: RefCell<LifoStack<RequestFrame>> = const { RefCell::new(LifoStack::new()) };
}

/// Pushes a frame for a newly received request.
pub fn push_frame(frame: RequestFrame) {
    FRAMES.with(|frames| frames.borrow_mut().push(frame));
}

/// Pops the innermost frame. An empty stack yields `None` and a warning.
pub fn pop_frame() -> Option<RequestFrame> {
    let frame = FRAMES.with(|frames| frames.borrow_mut().pop());
    if frame.is_none() {
        warn!("interception stack underflow: send point without matching receive point");
    }
    frame
}

/// Returns a copy of the innermost frame.
#[must_use]
pub fn peek_frame() -> Option<RequestFrame> {
    FRAMES.with(|frames| frames.borrow().peek().copied())
}

/// Number of frames on the current thread.
#[must_use]
pub fn depth() -> usize {
    FRAMES.with(|frames| frames.borrow().len())
}

/// `true` if the innermost inbound request on this thread carried the null
/// context. Containers use it to decide whether to start a local
/// transaction.
#[must_use]
pub fn is_tx_ctx_null() -> bool {
    peek_frame().is_some_and(|f| f.context == ContextMarker::Null)
}

/// Suppresses the reply context for the innermost request.
pub fn mark_no_reply() {
    with_top_frame(|f| f.reply = ReplyMarker::NoReply);
}

/// Records that the innermost request carried the null context.
pub fn mark_null_context() {
    with_top_frame(|f| f.context = ContextMarker::Null);
}

/// Applies `edit` to the innermost frame, if any.
pub fn with_top_frame(edit: impl FnOnce(&mut RequestFrame)) {
    FRAMES.with(|frames| {
        if let Some(top) = frames.borrow_mut().peek_mut() {
            edit(top);
        }
    });
}

// ---------------------------------------------------------------------------
// FrameGuard
// ---------------------------------------------------------------------------

/// Pushes a frame and pops it again on drop unless [`FrameGuard::keep`] is
/// called.
#[derive(Debug)]
#[must_use = "dropping the guard pops the frame immediately"]
pub struct FrameGuard {
    armed: bool,
}

impl FrameGuard {
    pub fn push(frame: RequestFrame) -> Self {
        push_frame(frame);
        Self { armed: true }
    }

    /// Leaves the frame on the stack for the send point to pop.
    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if self.armed {
            pop_frame();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
