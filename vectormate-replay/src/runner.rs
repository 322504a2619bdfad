//! Headless replay of a script against a recording engine.

use std::rc::Rc;

use serde::Serialize;
use vectormate_core::testing::{EngineCall, FakeModuleHost, ManualFrameHost, RecordingEngine};
use vectormate_core::{
    BridgeStatus, CanvasOrigin, EditorOptions, EditorSession, KeyInput, KeyRoute, LoadOutcome,
    Rgba, WheelInput,
};

use crate::script::{ReplayScript, ReplayStep};
use crate::{EngineMode, ReplayConfig};

/// Everything observed while running a script.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    /// Outcome of the last `start` step, if any.
    pub outcome: Option<LoadOutcome>,
    /// Engine calls in the order the engine received them.
    pub calls: Vec<EngineCall>,
    /// Key routing decisions, one per `key` step.
    pub key_routes: Vec<String>,
    /// Steps rejected by input validation.
    pub rejected: Vec<String>,
    /// Bridge state after the last step.
    pub status: BridgeStatus,
}

/// A headless editor session driven by script steps.
pub struct ReplayRunner {
    session: EditorSession<FakeModuleHost>,
    engine: RecordingEngine,
    frames: ManualFrameHost,
    outcome: Option<LoadOutcome>,
    key_routes: Vec<String>,
    rejected: Vec<String>,
}

impl ReplayRunner {
    /// Build a session whose engine availability follows `config.engine`.
    #[must_use]
    pub fn new(config: &ReplayConfig, options: EditorOptions) -> Self {
        let engine = RecordingEngine::new();
        let host = match config.engine {
            EngineMode::Present => FakeModuleHost::with_factory(engine.clone()),
            EngineMode::Late => {
                let host = FakeModuleHost::empty();
                host.register_on_script_load(engine.clone());
                host
            }
            EngineMode::Missing => FakeModuleHost::empty(),
        };
        if config.ready_polls > 0 {
            host.set_ready_after_polls(config.ready_polls);
        }

        let frames = ManualFrameHost::new();
        let session = EditorSession::new(host, Rc::new(frames.clone()), options);
        Self {
            session,
            engine,
            frames,
            outcome: None,
            key_routes: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// The underlying session.
    #[must_use]
    pub fn session(&self) -> &EditorSession<FakeModuleHost> {
        &self.session
    }

    /// Run every step in order. Invalid input is recorded, not fatal.
    pub async fn run(&mut self, script: &ReplayScript) {
        for (index, step) in script.steps.iter().enumerate() {
            tracing::debug!("Step {index}: {step:?}");
            self.step(step).await;
        }
    }

    /// Advance the frame clock by `count` frames.
    pub fn run_frames(&self, count: u32) {
        for _ in 0..count {
            self.frames.run_frame();
        }
    }

    async fn step(&mut self, step: &ReplayStep) {
        let store = self.session.store();
        let router = self.session.router();
        match step {
            ReplayStep::Start => {
                let outcome = self.session.start(()).await;
                tracing::info!("Engine load finished: {outcome:?}");
                self.outcome = Some(outcome);
            }
            ReplayStep::Stop => self.session.stop(),
            ReplayStep::Frames { count } => self.run_frames(*count),
            ReplayStep::MouseDown { x, y, button } => {
                router.mouse_down(*x, *y, *button);
            }
            ReplayStep::MouseMove { x, y } => {
                router.mouse_move(*x, *y);
            }
            ReplayStep::MouseUp { x, y, button } => {
                router.mouse_up(*x, *y, *button);
            }
            ReplayStep::Key { key, ctrl, alt, meta, shift, region } => {
                let route = router.key_down(&KeyInput {
                    key: key.clone(),
                    ctrl: *ctrl,
                    alt: *alt,
                    meta: *meta,
                    shift: *shift,
                    origin: region.clone(),
                });
                self.key_routes.push(describe_route(key, route));
            }
            ReplayStep::Wheel { x, y, delta_y } => {
                router.wheel(&WheelInput {
                    client_x: *x,
                    client_y: *y,
                    delta_y: *delta_y,
                });
            }
            ReplayStep::Layout { left, top, width, height } => {
                router.on_layout(CanvasOrigin::new(*left, *top), *width, *height);
                self.session.on_engine_ready();
            }
            ReplayStep::RegisterRegion { id } => {
                router.register_region(id.clone());
            }
            ReplayStep::UnregisterRegion { id } => {
                router.unregister_region(id);
            }
            ReplayStep::SetSize { width, height } => store.set_size(*width, *height),
            ReplayStep::SetSizeFields { width, height } => store.set_size_fields(width, height),
            ReplayStep::SetBackground { color } => {
                if let Err(err) = store.set_background_str(color) {
                    self.reject(err.to_string());
                }
            }
            ReplayStep::SetShowGrid { show } => store.set_show_grid(*show),
            ReplayStep::ToggleGrid => store.toggle_grid(),
            ReplayStep::SetGridSize { size } => store.set_grid_size(*size),
            ReplayStep::SetGridSizeField { text } => store.set_grid_size_field(text),
            ReplayStep::SetGridColor { color } => match color.parse::<Rgba>() {
                Ok(color) => store.set_grid_color(color),
                Err(err) => self.reject(err.to_string()),
            },
            ReplayStep::SetZoom { zoom } => store.set_zoom_level(*zoom),
            ReplayStep::ZoomAt { zoom, x, y } => store.zoom_at_point(*zoom, *x, *y),
        }
    }

    fn reject(&mut self, reason: String) {
        tracing::warn!("Rejected step: {reason}");
        self.rejected.push(reason);
    }

    /// Consume the runner and collect what happened.
    #[must_use]
    pub fn finish(self) -> ReplayReport {
        ReplayReport {
            outcome: self.outcome,
            calls: self.engine.take_calls(),
            key_routes: self.key_routes,
            rejected: self.rejected,
            status: self.session.status(),
        }
    }
}

fn describe_route(key: &str, route: KeyRoute) -> String {
    match route {
        KeyRoute::Ignored => format!("{key}: ignored"),
        KeyRoute::Handled(action) => format!("{key}: handled ({action:?})"),
        KeyRoute::Forwarded => format!("{key}: forwarded"),
    }
}
