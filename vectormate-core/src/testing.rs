//! Headless doubles for the engine, the frame clock and the module host.
//!
//! Used by the unit tests, the integration tests and the replay harness to run
//! the bridge without a browser.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::EngineOps;
use crate::loader::{EngineFactory, EngineInstance, ModuleHost};
use crate::scheduler::{FrameCallback, FrameHandle, FrameHost};
use crate::{BridgeError, BridgeResult};

/// One recorded engine call, arguments in engine units.
///
/// Serializes as `{"op": <exported name>, "args": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args")]
#[allow(missing_docs)]
pub enum EngineCall {
    #[serde(rename = "initialize_canvas")]
    InitializeCanvas { width: u32, height: u32 },
    #[serde(rename = "render")]
    Render,
    #[serde(rename = "on_mouse_down")]
    MouseDown { x: f32, y: f32, button: i16 },
    #[serde(rename = "on_mouse_move")]
    MouseMove { x: f32, y: f32 },
    #[serde(rename = "on_mouse_up")]
    MouseUp { x: f32, y: f32, button: i16 },
    #[serde(rename = "on_key_down")]
    KeyDown(String),
    #[serde(rename = "resize_canvas")]
    Resize { width: u32, height: u32 },
    #[serde(rename = "set_canvas_background")]
    Background([u8; 4]),
    #[serde(rename = "set_grid_settings")]
    Grid { show: bool, size: u32, color: [u8; 4] },
    #[serde(rename = "set_zoom_level")]
    Zoom(f32),
    #[serde(rename = "zoom_at_point")]
    ZoomAt { zoom: f32, x: f32, y: f32 },
}

impl EngineCall {
    /// Exported operation name of this call.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::InitializeCanvas { .. } => "initialize_canvas",
            Self::Render => "render",
            Self::MouseDown { .. } => "on_mouse_down",
            Self::MouseMove { .. } => "on_mouse_move",
            Self::MouseUp { .. } => "on_mouse_up",
            Self::KeyDown(_) => "on_key_down",
            Self::Resize { .. } => "resize_canvas",
            Self::Background(_) => "set_canvas_background",
            Self::Grid { .. } => "set_grid_settings",
            Self::Zoom(_) => "set_zoom_level",
            Self::ZoomAt { .. } => "zoom_at_point",
        }
    }
}

#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<EngineCall>,
    failing: HashSet<&'static str>,
    panicking: HashSet<&'static str>,
}

/// Engine double that records every call. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    recorder: Rc<RefCell<Recorder>>,
}

impl RecordingEngine {
    /// Create an engine with an empty call log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.recorder.borrow().calls.clone()
    }

    /// Recorded calls of one operation.
    #[must_use]
    pub fn calls_to(&self, op: &str) -> Vec<EngineCall> {
        self.recorder
            .borrow()
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .cloned()
            .collect()
    }

    /// Drain the recorded calls.
    pub fn take_calls(&self) -> Vec<EngineCall> {
        std::mem::take(&mut self.recorder.borrow_mut().calls)
    }

    /// Make `op` return an error after recording it.
    pub fn fail_on(&self, op: &'static str) {
        self.recorder.borrow_mut().failing.insert(op);
    }

    /// Make `op` panic after recording it.
    pub fn panic_on(&self, op: &'static str) {
        self.recorder.borrow_mut().panicking.insert(op);
    }

    fn record(&self, call: EngineCall) -> BridgeResult<()> {
        let op = call.op();
        let (fail, panic) = {
            let mut recorder = self.recorder.borrow_mut();
            recorder.calls.push(call);
            (recorder.failing.contains(op), recorder.panicking.contains(op))
        };
        if panic {
            panic!("recording engine asked to panic in {op}");
        }
        if fail {
            return Err(BridgeError::engine(op, "recording engine asked to fail"));
        }
        Ok(())
    }
}

impl EngineOps for RecordingEngine {
    fn initialize_canvas(&mut self, width: u32, height: u32) -> BridgeResult<()> {
        self.record(EngineCall::InitializeCanvas { width, height })
    }

    fn render(&mut self) -> BridgeResult<()> {
        self.record(EngineCall::Render)
    }

    fn on_mouse_down(&mut self, x: f32, y: f32, button: i16) -> BridgeResult<()> {
        self.record(EngineCall::MouseDown { x, y, button })
    }

    fn on_mouse_move(&mut self, x: f32, y: f32) -> BridgeResult<()> {
        self.record(EngineCall::MouseMove { x, y })
    }

    fn on_mouse_up(&mut self, x: f32, y: f32, button: i16) -> BridgeResult<()> {
        self.record(EngineCall::MouseUp { x, y, button })
    }

    fn on_key_down(&mut self, key: &str) -> BridgeResult<()> {
        self.record(EngineCall::KeyDown(key.to_string()))
    }

    fn resize_canvas(&mut self, width: u32, height: u32) -> BridgeResult<()> {
        self.record(EngineCall::Resize { width, height })
    }

    fn set_canvas_background(&mut self, r: u8, g: u8, b: u8, a: u8) -> BridgeResult<()> {
        self.record(EngineCall::Background([r, g, b, a]))
    }

    fn set_grid_settings(&mut self, show: bool, size: u32, color: [u8; 4]) -> BridgeResult<()> {
        self.record(EngineCall::Grid { show, size, color })
    }

    fn set_zoom_level(&mut self, zoom: f32) -> BridgeResult<()> {
        self.record(EngineCall::Zoom(zoom))
    }

    fn zoom_at_point(&mut self, zoom: f32, x: f32, y: f32) -> BridgeResult<()> {
        self.record(EngineCall::ZoomAt { zoom, x, y })
    }
}

#[derive(Default)]
struct FrameQueue {
    next_id: i32,
    queued: Vec<(FrameHandle, FrameCallback)>,
    cancelled: u32,
}

/// Frame clock advanced by hand. Each [`ManualFrameHost::run_frame`] call is
/// one animation frame.
#[derive(Clone, Default)]
pub struct ManualFrameHost {
    queue: Rc<RefCell<FrameQueue>>,
}

impl ManualFrameHost {
    /// Create a frame host with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().queued.len()
    }

    /// Number of frame requests cancelled so far.
    #[must_use]
    pub fn cancelled(&self) -> u32 {
        self.queue.borrow().cancelled
    }

    /// Run every callback queued before this frame started. Returns how many ran.
    pub fn run_frame(&self) -> usize {
        let due = std::mem::take(&mut self.queue.borrow_mut().queued);
        let count = due.len();
        for (_, callback) in due {
            callback();
        }
        count
    }
}

impl FrameHost for ManualFrameHost {
    fn request_frame(&self, callback: FrameCallback) -> BridgeResult<FrameHandle> {
        let mut queue = self.queue.borrow_mut();
        queue.next_id += 1;
        let handle = FrameHandle(queue.next_id);
        queue.queued.push((handle, callback));
        Ok(handle)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let mut queue = self.queue.borrow_mut();
        let before = queue.queued.len();
        queue.queued.retain(|(queued, _)| *queued != handle);
        if queue.queued.len() != before {
            queue.cancelled += 1;
        }
    }
}

/// Future that returns `Pending` a fixed number of times before completing.
///
/// Sleeps yield once per virtual millisecond, so concurrent sleeps finish in
/// the order of their durations.
struct Yield(u32);

impl Future for Yield {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 == 0 {
            Poll::Ready(())
        } else {
            self.0 -= 1;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

#[derive(Default)]
struct FakeHostState {
    registry: Option<RecordingEngine>,
    on_script_load: Option<RecordingEngine>,
    injected: u32,
    instantiations: u32,
    sleeps: u32,
    fail_instantiation: bool,
    hang_instantiation: bool,
    hang_script_load: bool,
    /// `None` means the runtime never reports ready.
    ready_after_polls: Option<u32>,
}

/// Module host double with a scriptable global registry.
#[derive(Clone)]
pub struct FakeModuleHost {
    state: Rc<RefCell<FakeHostState>>,
}

impl FakeModuleHost {
    /// Host whose registry holds no factory and whose script registers nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeHostState {
                ready_after_polls: Some(0),
                ..FakeHostState::default()
            })),
        }
    }

    /// Host whose registry already holds a factory producing `engine`.
    #[must_use]
    pub fn with_factory(engine: RecordingEngine) -> Self {
        let host = Self::empty();
        host.state.borrow_mut().registry = Some(engine);
        host
    }

    /// Register a factory producing `engine` once the script loads.
    pub fn register_on_script_load(&self, engine: RecordingEngine) {
        self.state.borrow_mut().on_script_load = Some(engine);
    }

    /// Make every instantiation fail.
    pub fn fail_instantiation(&self) {
        self.state.borrow_mut().fail_instantiation = true;
    }

    /// Make every instantiation wait forever.
    pub fn hang_instantiation(&self) {
        self.state.borrow_mut().hang_instantiation = true;
    }

    /// Make the script load wait forever.
    pub fn hang_script_load(&self) {
        self.state.borrow_mut().hang_script_load = true;
    }

    /// Report runtime-ready only after `polls` negative checks.
    pub fn set_ready_after_polls(&self, polls: u32) {
        self.state.borrow_mut().ready_after_polls = Some(polls);
    }

    /// Never report runtime-ready.
    pub fn never_ready(&self) {
        self.state.borrow_mut().ready_after_polls = None;
    }

    /// Number of scripts injected.
    #[must_use]
    pub fn injected_scripts(&self) -> u32 {
        self.state.borrow().injected
    }

    /// Number of factory instantiations.
    #[must_use]
    pub fn factory_instantiations(&self) -> u32 {
        self.state.borrow().instantiations
    }

    /// Number of ready-poll sleeps.
    #[must_use]
    pub fn sleeps(&self) -> u32 {
        self.state.borrow().sleeps
    }
}

struct FakeFactory {
    engine: RecordingEngine,
    state: Rc<RefCell<FakeHostState>>,
}

#[async_trait(?Send)]
impl EngineFactory<()> for FakeFactory {
    async fn instantiate(&self, _target: &()) -> BridgeResult<Box<dyn EngineInstance>> {
        let (fail, hang, ready_after) = {
            let mut state = self.state.borrow_mut();
            state.instantiations += 1;
            (state.fail_instantiation, state.hang_instantiation, state.ready_after_polls)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Yield(1).await;
        if fail {
            return Err(BridgeError::Instantiate("factory rejected".to_string()));
        }
        Ok(Box::new(FakeInstance {
            engine: self.engine.clone(),
            polls_left: Cell::new(ready_after),
        }))
    }
}

struct FakeInstance {
    engine: RecordingEngine,
    polls_left: Cell<Option<u32>>,
}

impl EngineInstance for FakeInstance {
    fn runtime_ready(&self) -> bool {
        match self.polls_left.get() {
            Some(0) => true,
            Some(n) => {
                self.polls_left.set(Some(n - 1));
                false
            }
            None => false,
        }
    }

    fn into_ops(self: Box<Self>) -> Box<dyn EngineOps> {
        Box::new(self.engine)
    }
}

#[async_trait(?Send)]
impl ModuleHost for FakeModuleHost {
    type Target = ();

    fn find_factory(&self, _name: &str) -> Option<Box<dyn EngineFactory<()>>> {
        let engine = self.state.borrow().registry.clone()?;
        Some(Box::new(FakeFactory {
            engine,
            state: Rc::clone(&self.state),
        }))
    }

    fn inject_script(&self, _src: &str) -> BridgeResult<()> {
        self.state.borrow_mut().injected += 1;
        Ok(())
    }

    async fn script_loaded(&self, _src: &str) -> BridgeResult<()> {
        let hang = self.state.borrow().hang_script_load;
        if hang {
            std::future::pending::<()>().await;
        }
        Yield(1).await;
        let mut state = self.state.borrow_mut();
        if let Some(engine) = state.on_script_load.take() {
            state.registry = Some(engine);
        }
        Ok(())
    }

    async fn sleep(&self, ms: u32) {
        self.state.borrow_mut().sleeps += 1;
        Yield(ms.max(1)).await;
    }
}
