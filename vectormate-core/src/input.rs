//! Input routing from host events to engine calls.
//!
//! Pointer events are translated into canvas-local coordinates and passed
//! through 1:1. Keyboard events go through a routing decision: ignored when
//! they originate in an interactive UI region, handled locally when they match
//! a reserved binding, forwarded to the engine otherwise.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_ZOOM;
use crate::{CallSurface, ConfigStore};

/// On-screen position of the render target's top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasOrigin {
    /// Left edge in client coordinates.
    pub left: f64,
    /// Top edge in client coordinates.
    pub top: f64,
}

impl CanvasOrigin {
    /// Create an origin.
    #[must_use]
    pub fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }
}

/// A pointer event in canvas-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    /// Horizontal position relative to the canvas origin.
    pub x: f32,
    /// Vertical position relative to the canvas origin.
    pub y: f32,
    /// Host button index.
    pub button: i16,
}

impl PointerSample {
    /// Translate client coordinates by the canvas origin.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_client(client_x: f64, client_y: f64, button: i16, origin: CanvasOrigin) -> Self {
        Self {
            x: (client_x - origin.left) as f32,
            y: (client_y - origin.top) as f32,
            button,
        }
    }
}

/// A key press as seen by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyInput {
    /// Raw key identifier (`"g"`, `"ArrowUp"`, `" "`).
    pub key: String,
    /// Control held.
    pub ctrl: bool,
    /// Alt held.
    pub alt: bool,
    /// Meta held.
    pub meta: bool,
    /// Shift held.
    pub shift: bool,
    /// Interactive region the event originated in, if any.
    pub origin: Option<String>,
}

impl KeyInput {
    /// A key press with no modifiers targeting the canvas.
    #[must_use]
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Mark the event as originating in `region`.
    #[must_use]
    pub fn from_region(mut self, region: impl Into<String>) -> Self {
        self.origin = Some(region.into());
        self
    }

    fn has_command_modifier(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

/// Editor actions bound to reserved keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiAction {
    /// Flip grid visibility.
    ToggleGrid,
    /// Increase zoom by one step.
    ZoomIn,
    /// Decrease zoom by one step.
    ZoomOut,
    /// Return to 100%.
    ResetZoom,
}

/// A reserved key and the action it triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    /// Key identifier matched exactly.
    pub key: String,
    /// Action to run.
    pub action: UiAction,
}

impl KeyBinding {
    fn new(key: &str, action: UiAction) -> Self {
        Self {
            key: key.to_string(),
            action,
        }
    }
}

/// Outcome of routing one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRoute {
    /// Left to the UI region it came from.
    Ignored,
    /// Handled by the editor; the host should suppress the default action.
    Handled(UiAction),
    /// Passed to the engine.
    Forwarded,
}

impl KeyRoute {
    /// Whether the host should call `preventDefault` on the event.
    #[must_use]
    pub fn prevents_default(self) -> bool {
        matches!(self, Self::Handled(_))
    }
}

/// Input routing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterOptions {
    /// Keys handled by the editor instead of the engine.
    pub key_bindings: Vec<KeyBinding>,
    /// Zoom factor exponent per wheel delta unit.
    pub wheel_sensitivity: f32,
    /// Zoom around the pointer instead of the viewport origin.
    pub anchor_wheel_zoom: bool,
    /// Percentage added or removed by the zoom keys.
    pub zoom_step: f32,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            key_bindings: vec![
                KeyBinding::new("g", UiAction::ToggleGrid),
                KeyBinding::new("G", UiAction::ToggleGrid),
                KeyBinding::new("+", UiAction::ZoomIn),
                KeyBinding::new("=", UiAction::ZoomIn),
                KeyBinding::new("-", UiAction::ZoomOut),
                KeyBinding::new("0", UiAction::ResetZoom),
            ],
            wheel_sensitivity: 0.001,
            anchor_wheel_zoom: true,
            zoom_step: 25.0,
        }
    }
}

/// A wheel event in client coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WheelInput {
    /// Pointer x in client coordinates.
    pub client_x: f64,
    /// Pointer y in client coordinates.
    pub client_y: f64,
    /// Vertical scroll delta; positive scrolls down (zooms out).
    pub delta_y: f64,
}

/// Routes host input into the config store and the call surface.
#[derive(Debug)]
pub struct EventRouter {
    surface: CallSurface,
    store: ConfigStore,
    options: RouterOptions,
    origin: Cell<CanvasOrigin>,
    regions: RefCell<HashSet<String>>,
}

impl EventRouter {
    /// Create a router with no interactive regions and a zero origin.
    #[must_use]
    pub fn new(surface: CallSurface, store: ConfigStore, options: RouterOptions) -> Self {
        Self {
            surface,
            store,
            options,
            origin: Cell::new(CanvasOrigin::default()),
            regions: RefCell::new(HashSet::new()),
        }
    }

    /// Routing settings.
    #[must_use]
    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    /// Record the render target's current on-screen origin.
    pub fn set_origin(&self, origin: CanvasOrigin) {
        self.origin.set(origin);
    }

    /// Current canvas origin.
    #[must_use]
    pub fn origin(&self) -> CanvasOrigin {
        self.origin.get()
    }

    /// Mark `id` as a UI-owned region whose key events stay out of the engine.
    pub fn register_region(&self, id: impl Into<String>) -> bool {
        self.regions.borrow_mut().insert(id.into())
    }

    /// Forget a UI region.
    pub fn unregister_region(&self, id: &str) -> bool {
        self.regions.borrow_mut().remove(id)
    }

    /// Whether `id` is a registered UI region.
    #[must_use]
    pub fn is_interactive(&self, id: &str) -> bool {
        self.regions.borrow().contains(id)
    }

    /// Translate client coordinates using the current origin.
    #[must_use]
    pub fn to_canvas(&self, client_x: f64, client_y: f64, button: i16) -> PointerSample {
        PointerSample::from_client(client_x, client_y, button, self.origin.get())
    }

    /// Forward a pointer press.
    pub fn mouse_down(&self, client_x: f64, client_y: f64, button: i16) -> PointerSample {
        let sample = self.to_canvas(client_x, client_y, button);
        self.surface.on_mouse_down(sample.x, sample.y, sample.button);
        sample
    }

    /// Forward a pointer move.
    pub fn mouse_move(&self, client_x: f64, client_y: f64) -> PointerSample {
        let sample = self.to_canvas(client_x, client_y, 0);
        self.surface.on_mouse_move(sample.x, sample.y);
        sample
    }

    /// Forward a pointer release.
    pub fn mouse_up(&self, client_x: f64, client_y: f64, button: i16) -> PointerSample {
        let sample = self.to_canvas(client_x, client_y, button);
        self.surface.on_mouse_up(sample.x, sample.y, sample.button);
        sample
    }

    /// Decide where a key event goes without acting on it.
    #[must_use]
    pub fn classify_key(&self, input: &KeyInput) -> KeyRoute {
        if let Some(region) = input.origin.as_deref() {
            if self.is_interactive(region) {
                return KeyRoute::Ignored;
            }
        }
        if !input.has_command_modifier() {
            if let Some(binding) = self.options.key_bindings.iter().find(|b| b.key == input.key) {
                return KeyRoute::Handled(binding.action);
            }
        }
        KeyRoute::Forwarded
    }

    /// Route a key event and act on the decision.
    pub fn key_down(&self, input: &KeyInput) -> KeyRoute {
        let route = self.classify_key(input);
        match route {
            KeyRoute::Ignored => {}
            KeyRoute::Handled(action) => self.apply(action),
            KeyRoute::Forwarded => self.surface.on_key_down(&input.key),
        }
        route
    }

    /// Run an editor action.
    pub fn apply(&self, action: UiAction) {
        tracing::debug!("UI action {action:?}");
        let zoom = self.store.snapshot().zoom_level;
        match action {
            UiAction::ToggleGrid => self.store.toggle_grid(),
            UiAction::ZoomIn => self.store.set_zoom_level(zoom + self.options.zoom_step),
            UiAction::ZoomOut => self.store.set_zoom_level(zoom - self.options.zoom_step),
            UiAction::ResetZoom => self.store.set_zoom_level(DEFAULT_ZOOM),
        }
    }

    /// Zoom from a wheel event. Returns the stored zoom level afterwards.
    ///
    /// The host must call `preventDefault` on the event.
    #[allow(clippy::cast_possible_truncation)]
    pub fn wheel(&self, input: &WheelInput) -> f32 {
        let current = self.store.snapshot().zoom_level;
        if input.delta_y == 0.0 || !input.delta_y.is_finite() {
            return current;
        }
        let factor = (-input.delta_y * f64::from(self.options.wheel_sensitivity)).exp() as f32;
        let target = current * factor;
        if self.options.anchor_wheel_zoom {
            let sample = self.to_canvas(input.client_x, input.client_y, 0);
            self.store.zoom_at_point(target, sample.x, sample.y);
        } else {
            self.store.set_zoom_level(target);
        }
        self.store.snapshot().zoom_level
    }

    /// React to a layout change of the render target.
    pub fn on_layout(&self, origin: CanvasOrigin, width: i64, height: i64) {
        self.set_origin(origin);
        self.store.set_size(width, height);
    }
}
