//! Cancellable, self-rescheduling render loop.
//!
//! Each frame invokes [`CallSurface::render`] and then requests the next frame
//! from the [`FrameHost`], but only while the token that started the chain is
//! still the active one. `stop` clears the token and cancels the pending
//! request, so at most one chain is ever alive.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::{BridgeResult, CallSurface};

/// Callback invoked on the next animation frame.
pub type FrameCallback = Box<dyn FnOnce()>;

/// Host identifier of a requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub i32);

/// The host's per-frame timing primitive.
pub trait FrameHost {
    /// Run `callback` once on the next frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot schedule frames.
    fn request_frame(&self, callback: FrameCallback) -> BridgeResult<FrameHandle>;

    /// Cancel a frame request that has not run yet.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Opaque handle identifying one frame chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLoopToken(u64);

#[derive(Default)]
struct LoopState {
    active: Option<RenderLoopToken>,
    pending: Option<FrameHandle>,
    issued: u64,
    frames: u64,
}

struct SchedulerInner {
    surface: CallSurface,
    host: Rc<dyn FrameHost>,
    state: RefCell<LoopState>,
}

/// Drives `render` once per host frame between `start` and `stop`.
#[derive(Clone)]
pub struct RenderScheduler {
    inner: Rc<SchedulerInner>,
}

impl RenderScheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub fn new(surface: CallSurface, host: Rc<dyn FrameHost>) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                surface,
                host,
                state: RefCell::new(LoopState::default()),
            }),
        }
    }

    /// Start the frame chain. Does nothing if already running.
    pub fn start(&self) {
        let token = {
            let mut state = self.inner.state.borrow_mut();
            if state.active.is_some() {
                return;
            }
            state.issued += 1;
            let token = RenderLoopToken(state.issued);
            state.active = Some(token);
            token
        };
        tracing::debug!("Render loop started ({token:?})");
        SchedulerInner::schedule(&self.inner, token);
    }

    /// Stop the frame chain and cancel any pending frame.
    pub fn stop(&self) {
        let pending = {
            let mut state = self.inner.state.borrow_mut();
            if state.active.take().is_none() {
                return;
            }
            state.pending.take()
        };
        if let Some(handle) = pending {
            self.inner.host.cancel_frame(handle);
        }
        tracing::debug!("Render loop stopped");
    }

    /// Whether a frame chain is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.state.borrow().active.is_some()
    }

    /// Token of the active chain, if any.
    #[must_use]
    pub fn token(&self) -> Option<RenderLoopToken> {
        self.inner.state.borrow().active
    }

    /// Frames rendered since creation.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.inner.state.borrow().frames
    }
}

impl SchedulerInner {
    fn is_active(&self, token: RenderLoopToken) -> bool {
        self.state.borrow().active == Some(token)
    }

    fn schedule(this: &Rc<Self>, token: RenderLoopToken) {
        let weak: Weak<Self> = Rc::downgrade(this);
        let callback: FrameCallback = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.tick(token);
            }
        });

        match this.host.request_frame(callback) {
            Ok(handle) => this.state.borrow_mut().pending = Some(handle),
            Err(err) => {
                tracing::warn!("Cannot schedule render frame, stopping loop: {err}");
                let mut state = this.state.borrow_mut();
                if state.active == Some(token) {
                    state.active = None;
                }
            }
        }
    }

    fn tick(self: Rc<Self>, token: RenderLoopToken) {
        {
            let mut state = self.state.borrow_mut();
            if state.active != Some(token) {
                return;
            }
            state.pending = None;
        }

        self.surface.render();
        self.state.borrow_mut().frames += 1;

        if self.is_active(token) {
            Self::schedule(&self, token);
        }
    }
}

impl std::fmt::Debug for RenderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("RenderScheduler")
            .field("active", &state.active)
            .field("frames", &state.frames)
            .finish_non_exhaustive()
    }
}
