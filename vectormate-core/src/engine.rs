//! The exported operation set of the canvas engine.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 CallSurface                   │
//! ├──────────────────────┬───────────────────────┤
//! │ EngineBinding::Bound │ EngineBinding::Unbound │
//! │ (compiled engine)    │ (StubEngine)           │
//! └──────────────────────┴───────────────────────┘
//! ```

use crate::BridgeResult;

/// Raw operations exported by the engine module.
///
/// Arguments are already in engine units: canvas-local pixel coordinates,
/// byte color channels and zoom percentages in `[10, 1000]`. Implementations
/// report failures through the returned result; the call surface logs and
/// discards them.
pub trait EngineOps {
    /// Create the engine canvas with the given dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn initialize_canvas(&mut self, width: u32, height: u32) -> BridgeResult<()>;

    /// Draw one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn render(&mut self) -> BridgeResult<()>;

    /// Pointer button pressed at canvas-local coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn on_mouse_down(&mut self, x: f32, y: f32, button: i16) -> BridgeResult<()>;

    /// Pointer moved to canvas-local coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn on_mouse_move(&mut self, x: f32, y: f32) -> BridgeResult<()>;

    /// Pointer button released at canvas-local coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn on_mouse_up(&mut self, x: f32, y: f32, button: i16) -> BridgeResult<()>;

    /// Raw key identifier pressed on the canvas.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn on_key_down(&mut self, key: &str) -> BridgeResult<()>;

    /// Resize the engine canvas. Both dimensions are at least 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn resize_canvas(&mut self, width: u32, height: u32) -> BridgeResult<()>;

    /// Set the canvas background, all channels in `0..=255`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn set_canvas_background(&mut self, r: u8, g: u8, b: u8, a: u8) -> BridgeResult<()>;

    /// Set grid visibility, spacing (always > 0) and line color.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn set_grid_settings(&mut self, show: bool, size: u32, color: [u8; 4]) -> BridgeResult<()>;

    /// Set the zoom percentage around the viewport center.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn set_zoom_level(&mut self, zoom: f32) -> BridgeResult<()>;

    /// Set the zoom percentage keeping the canvas-local anchor fixed.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine call fails.
    fn zoom_at_point(&mut self, zoom: f32, x: f32, y: f32) -> BridgeResult<()>;
}

/// Fallback table used while no engine is bound.
///
/// Every operation succeeds. Configuration and input calls are logged at debug
/// level; `render` does nothing at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubEngine;

impl EngineOps for StubEngine {
    fn initialize_canvas(&mut self, width: u32, height: u32) -> BridgeResult<()> {
        tracing::debug!("stub: initialize_canvas({width}, {height})");
        Ok(())
    }

    fn render(&mut self) -> BridgeResult<()> {
        Ok(())
    }

    fn on_mouse_down(&mut self, x: f32, y: f32, button: i16) -> BridgeResult<()> {
        tracing::debug!("stub: on_mouse_down({x}, {y}, {button})");
        Ok(())
    }

    fn on_mouse_move(&mut self, _x: f32, _y: f32) -> BridgeResult<()> {
        Ok(())
    }

    fn on_mouse_up(&mut self, x: f32, y: f32, button: i16) -> BridgeResult<()> {
        tracing::debug!("stub: on_mouse_up({x}, {y}, {button})");
        Ok(())
    }

    fn on_key_down(&mut self, key: &str) -> BridgeResult<()> {
        tracing::debug!("stub: on_key_down({key:?})");
        Ok(())
    }

    fn resize_canvas(&mut self, width: u32, height: u32) -> BridgeResult<()> {
        tracing::debug!("stub: resize_canvas({width}, {height})");
        Ok(())
    }

    fn set_canvas_background(&mut self, r: u8, g: u8, b: u8, a: u8) -> BridgeResult<()> {
        tracing::debug!("stub: set_canvas_background({r}, {g}, {b}, {a})");
        Ok(())
    }

    fn set_grid_settings(&mut self, show: bool, size: u32, color: [u8; 4]) -> BridgeResult<()> {
        tracing::debug!("stub: set_grid_settings({show}, {size}, {color:?})");
        Ok(())
    }

    fn set_zoom_level(&mut self, zoom: f32) -> BridgeResult<()> {
        tracing::debug!("stub: set_zoom_level({zoom})");
        Ok(())
    }

    fn zoom_at_point(&mut self, zoom: f32, x: f32, y: f32) -> BridgeResult<()> {
        tracing::debug!("stub: zoom_at_point({zoom}, {x}, {y})");
        Ok(())
    }
}

/// Which operation table the call surface dispatches to.
#[derive(Default)]
pub enum EngineBinding {
    /// No engine yet; the stub table is active.
    #[default]
    Unbound,
    /// A fully wrapped engine instance.
    Bound(Box<dyn EngineOps>),
}

impl EngineBinding {
    /// Whether a real engine is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }
}

impl std::fmt::Debug for EngineBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbound => f.write_str("Unbound"),
            Self::Bound(_) => f.write_str("Bound(..)"),
        }
    }
}
