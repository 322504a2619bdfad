//! Fault-isolating call surface over the engine operation table.
//!
//! [`CallSurface`] is a cheap, clonable handle to the session's single
//! [`EngineBinding`]. Every consumer (config store, event router, render
//! scheduler) holds a clone; the module loader publishes the bound table
//! through [`CallSurface::bind`] exactly once.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::engine::{EngineBinding, EngineOps, StubEngine};
use crate::{BridgeError, BridgeResult, Rgba};

/// Typed, never-failing facade over the engine's exported operations.
#[derive(Clone, Default)]
pub struct CallSurface {
    binding: Rc<RefCell<EngineBinding>>,
    bound: Rc<Cell<bool>>,
    failures: Rc<Cell<u64>>,
}

impl CallSurface {
    /// Create an unbound surface (stub table active).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a surface already bound to the given engine.
    #[must_use]
    pub fn bound(engine: Box<dyn EngineOps>) -> Self {
        Self {
            binding: Rc::new(RefCell::new(EngineBinding::Bound(engine))),
            bound: Rc::new(Cell::new(true)),
            failures: Rc::default(),
        }
    }

    /// Publish a fully wrapped engine table.
    ///
    /// Returns `false` and leaves the current table in place if an engine is
    /// already bound; there is no downgrade or replacement.
    pub fn bind(&self, engine: Box<dyn EngineOps>) -> bool {
        let Ok(mut binding) = self.binding.try_borrow_mut() else {
            tracing::warn!("Engine bind attempted during an engine call; ignored");
            return false;
        };
        if binding.is_bound() {
            tracing::warn!("Engine already bound; keeping the existing table");
            return false;
        }
        *binding = EngineBinding::Bound(engine);
        self.bound.set(true);
        tracing::info!("Engine bound to call surface");
        true
    }

    /// Whether a real engine is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    /// Number of engine calls that failed or panicked and were swallowed.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.get()
    }

    fn dispatch<F>(&self, op: &'static str, call: F)
    where
        F: FnOnce(&mut dyn EngineOps) -> BridgeResult<()>,
    {
        let Ok(mut binding) = self.binding.try_borrow_mut() else {
            tracing::warn!("Dropped re-entrant engine call `{op}`");
            return;
        };

        let result = match &mut *binding {
            EngineBinding::Unbound => call(&mut StubEngine),
            EngineBinding::Bound(engine) => {
                match panic::catch_unwind(AssertUnwindSafe(|| call(engine.as_mut()))) {
                    Ok(result) => result,
                    Err(payload) => Err(BridgeError::engine(op, panic_message(payload.as_ref()))),
                }
            }
        };

        if let Err(err) = result {
            self.failures.set(self.failures.get() + 1);
            tracing::warn!("Swallowed engine failure: {err}");
        }
    }

    /// Create the engine canvas.
    pub fn initialize_canvas(&self, width: u32, height: u32) {
        self.dispatch("initialize_canvas", |e| e.initialize_canvas(width, height));
    }

    /// Draw one frame. A no-op while unbound.
    pub fn render(&self) {
        self.dispatch("render", |e| e.render());
    }

    /// Forward a pointer press in canvas-local coordinates.
    pub fn on_mouse_down(&self, x: f32, y: f32, button: i16) {
        self.dispatch("on_mouse_down", |e| e.on_mouse_down(x, y, button));
    }

    /// Forward a pointer move in canvas-local coordinates.
    pub fn on_mouse_move(&self, x: f32, y: f32) {
        self.dispatch("on_mouse_move", |e| e.on_mouse_move(x, y));
    }

    /// Forward a pointer release in canvas-local coordinates.
    pub fn on_mouse_up(&self, x: f32, y: f32, button: i16) {
        self.dispatch("on_mouse_up", |e| e.on_mouse_up(x, y, button));
    }

    /// Forward a raw key identifier.
    pub fn on_key_down(&self, key: &str) {
        self.dispatch("on_key_down", |e| e.on_key_down(key));
    }

    /// Resize the engine canvas.
    pub fn resize_canvas(&self, width: u32, height: u32) {
        self.dispatch("resize_canvas", |e| e.resize_canvas(width, height));
    }

    /// Set the canvas background. Alpha is scaled to `0..=255` here.
    pub fn set_canvas_background(&self, color: Rgba) {
        let [r, g, b, a] = color.to_engine();
        self.dispatch("set_canvas_background", |e| {
            e.set_canvas_background(r, g, b, a)
        });
    }

    /// Set the complete grid parameter set. Alpha is scaled to `0..=255` here.
    pub fn set_grid_settings(&self, show: bool, size: u32, color: Rgba) {
        let color = color.to_engine();
        self.dispatch("set_grid_settings", |e| {
            e.set_grid_settings(show, size, color)
        });
    }

    /// Set the zoom percentage.
    pub fn set_zoom_level(&self, zoom: f32) {
        self.dispatch("set_zoom_level", |e| e.set_zoom_level(zoom));
    }

    /// Set the zoom percentage around a canvas-local anchor.
    pub fn zoom_at_point(&self, zoom: f32, x: f32, y: f32) {
        self.dispatch("zoom_at_point", |e| e.zoom_at_point(zoom, x, y));
    }
}

impl std::fmt::Debug for CallSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSurface")
            .field("bound", &self.is_bound())
            .field("failures", &self.failures.get())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "engine panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, RecordingEngine};

    #[test]
    fn test_unbound_surface_accepts_every_call() {
        let surface = CallSurface::new();
        assert!(!surface.is_bound());

        surface.initialize_canvas(800, 600);
        surface.render();
        surface.on_mouse_down(1.0, 1.0, 0);
        surface.on_mouse_move(2.0, 2.0);
        surface.on_mouse_up(3.0, 3.0, 0);
        surface.on_key_down("a");
        surface.resize_canvas(10, 10);
        surface.set_canvas_background(Rgba::opaque(1, 2, 3));
        surface.set_grid_settings(true, 20, Rgba::opaque(4, 5, 6));
        surface.set_zoom_level(100.0);
        surface.zoom_at_point(200.0, 5.0, 5.0);

        assert_eq!(surface.failure_count(), 0);
    }

    #[test]
    fn test_bound_surface_passes_calls_through() {
        let engine = RecordingEngine::new();
        let surface = CallSurface::bound(Box::new(engine.clone()));

        surface.render();
        surface.on_key_down("ArrowUp");

        assert_eq!(
            engine.calls(),
            vec![EngineCall::Render, EngineCall::KeyDown("ArrowUp".to_string())]
        );
    }

    #[test]
    fn test_background_alpha_is_converted_at_the_call() {
        let engine = RecordingEngine::new();
        let surface = CallSurface::bound(Box::new(engine.clone()));

        surface.set_canvas_background(Rgba::new(240, 240, 240, 1.0));

        assert_eq!(
            engine.calls(),
            vec![EngineCall::Background([240, 240, 240, 255])]
        );
    }

    #[test]
    fn test_engine_errors_are_swallowed_and_counted() {
        let engine = RecordingEngine::new();
        engine.fail_on("render");
        let surface = CallSurface::bound(Box::new(engine.clone()));

        surface.render();
        surface.render();
        surface.on_mouse_move(1.0, 1.0);

        assert_eq!(surface.failure_count(), 2);
        assert_eq!(engine.calls().len(), 3);
    }

    #[test]
    fn test_engine_panics_are_contained() {
        let engine = RecordingEngine::new();
        engine.panic_on("resize_canvas");
        let surface = CallSurface::bound(Box::new(engine.clone()));

        surface.resize_canvas(100, 100);
        surface.render();

        assert_eq!(surface.failure_count(), 1);
        assert_eq!(engine.calls().last(), Some(&EngineCall::Render));
    }

    #[test]
    fn test_bind_is_one_directional() {
        let surface = CallSurface::new();
        let first = RecordingEngine::new();
        let second = RecordingEngine::new();

        assert!(surface.bind(Box::new(first.clone())));
        assert!(!surface.bind(Box::new(second.clone())));

        surface.render();
        assert_eq!(first.calls(), vec![EngineCall::Render]);
        assert!(second.calls().is_empty());
    }

    #[test]
    fn test_clones_share_the_binding() {
        let surface = CallSurface::new();
        let consumer = surface.clone();
        let engine = RecordingEngine::new();

        surface.bind(Box::new(engine.clone()));

        assert!(consumer.is_bound());
        consumer.render();
        assert_eq!(engine.calls(), vec![EngineCall::Render]);
    }

    /// Engine whose `render` calls back into the surface it is bound to.
    struct ReentrantEngine {
        inner: RecordingEngine,
        surface: CallSurface,
        replacement: RecordingEngine,
        bind_result: Rc<Cell<Option<bool>>>,
    }

    impl EngineOps for ReentrantEngine {
        fn initialize_canvas(&mut self, width: u32, height: u32) -> BridgeResult<()> {
            self.inner.initialize_canvas(width, height)
        }

        fn render(&mut self) -> BridgeResult<()> {
            self.surface.on_key_down("nested");
            let bound = self.surface.bind(Box::new(self.replacement.clone()));
            self.bind_result.set(Some(bound));
            self.inner.render()
        }

        fn on_mouse_down(&mut self, x: f32, y: f32, button: i16) -> BridgeResult<()> {
            self.inner.on_mouse_down(x, y, button)
        }

        fn on_mouse_move(&mut self, x: f32, y: f32) -> BridgeResult<()> {
            self.inner.on_mouse_move(x, y)
        }

        fn on_mouse_up(&mut self, x: f32, y: f32, button: i16) -> BridgeResult<()> {
            self.inner.on_mouse_up(x, y, button)
        }

        fn on_key_down(&mut self, key: &str) -> BridgeResult<()> {
            self.inner.on_key_down(key)
        }

        fn resize_canvas(&mut self, width: u32, height: u32) -> BridgeResult<()> {
            self.inner.resize_canvas(width, height)
        }

        fn set_canvas_background(&mut self, r: u8, g: u8, b: u8, a: u8) -> BridgeResult<()> {
            self.inner.set_canvas_background(r, g, b, a)
        }

        fn set_grid_settings(&mut self, show: bool, size: u32, color: [u8; 4]) -> BridgeResult<()> {
            self.inner.set_grid_settings(show, size, color)
        }

        fn set_zoom_level(&mut self, zoom: f32) -> BridgeResult<()> {
            self.inner.set_zoom_level(zoom)
        }

        fn zoom_at_point(&mut self, zoom: f32, x: f32, y: f32) -> BridgeResult<()> {
            self.inner.zoom_at_point(zoom, x, y)
        }
    }

    #[test]
    fn test_reentrant_calls_are_dropped() {
        let surface = CallSurface::new();
        let inner = RecordingEngine::new();
        let replacement = RecordingEngine::new();
        let bind_result = Rc::new(Cell::new(None));
        surface.bind(Box::new(ReentrantEngine {
            inner: inner.clone(),
            surface: surface.clone(),
            replacement: replacement.clone(),
            bind_result: Rc::clone(&bind_result),
        }));

        surface.render();

        // The outer call completes; the nested key and bind never land.
        assert_eq!(inner.calls(), vec![EngineCall::Render]);
        assert_eq!(bind_result.get(), Some(false));
        assert_eq!(surface.failure_count(), 0);

        // The original table is still the active one.
        surface.on_key_down("after");
        assert_eq!(
            inner.calls(),
            vec![EngineCall::Render, EngineCall::KeyDown("after".to_string())]
        );
        assert!(replacement.calls().is_empty());
    }
}
