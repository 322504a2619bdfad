//! Reactive canvas configuration store.
//!
//! [`ConfigStore`] is the single writer of [`CanvasConfig`]. Every setter
//! validates its input, stores the result, then pushes the complete parameter
//! set of the affected subsystem to the [`CallSurface`], so the engine's copy
//! of the settings always matches the stored one. Listeners registered with
//! [`ConfigStore::subscribe`] see the new snapshot after each change.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{BridgeError, BridgeResult, CallSurface, Rgba};

/// Smallest zoom percentage.
pub const MIN_ZOOM: f32 = 10.0;

/// Largest zoom percentage.
pub const MAX_ZOOM: f32 = 1000.0;

/// Zoom percentage of an unscaled canvas.
pub const DEFAULT_ZOOM: f32 = 100.0;

/// Canvas settings mirrored into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasConfig {
    /// Canvas width in pixels, at least 1.
    pub width: u32,
    /// Canvas height in pixels, at least 1.
    pub height: u32,
    /// Background color.
    pub background: Rgba,
    /// Whether the grid is drawn.
    pub show_grid: bool,
    /// Grid spacing in pixels. May be zero or negative while being edited.
    pub grid_size: i32,
    /// Grid line color.
    pub grid_color: Rgba,
    /// Zoom percentage in `[MIN_ZOOM, MAX_ZOOM]`.
    pub zoom_level: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            background: Rgba::opaque(240, 240, 240),
            show_grid: true,
            grid_size: 20,
            grid_color: Rgba::opaque(220, 220, 220),
            zoom_level: DEFAULT_ZOOM,
        }
    }
}

impl CanvasConfig {
    /// Bring externally supplied values (presets, JSON) inside their bounds.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.width = self.width.max(1);
        self.height = self.height.max(1);
        self.zoom_level = clamp_zoom(self.zoom_level).unwrap_or(DEFAULT_ZOOM);
        self.background = self.background.clamped();
        self.grid_color = self.grid_color.clamped();
        self
    }

    /// Grid spacing the engine may be told about, if any.
    #[must_use]
    pub fn engine_grid_size(&self) -> Option<u32> {
        u32::try_from(self.grid_size).ok().filter(|size| *size > 0)
    }
}

/// Clamp a zoom percentage into `[MIN_ZOOM, MAX_ZOOM]`. `NaN` is rejected.
#[must_use]
pub fn clamp_zoom(zoom: f32) -> Option<f32> {
    if zoom.is_nan() {
        None
    } else {
        Some(zoom.clamp(MIN_ZOOM, MAX_ZOOM))
    }
}

/// Parse an integer input field.
///
/// An empty (or whitespace-only) field counts as zero.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidNumber`] if the text is not an integer.
pub fn parse_int_field(text: &str) -> BridgeResult<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<i64>()
        .map_err(|_| BridgeError::InvalidNumber(text.to_string()))
}

fn floor_dimension(value: i64) -> u32 {
    u32::try_from(value.max(1)).unwrap_or(u32::MAX)
}

/// Handle returned by [`ConfigStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Listener = Rc<dyn Fn(&CanvasConfig)>;

struct StoreInner {
    surface: CallSurface,
    config: RefCell<CanvasConfig>,
    listeners: RefCell<Vec<(Subscription, Listener)>>,
    next_subscription: Cell<u64>,
}

/// Single source of truth for the canvas configuration.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Rc<StoreInner>,
}

impl ConfigStore {
    /// Create a store with default settings.
    #[must_use]
    pub fn new(surface: CallSurface) -> Self {
        Self::with_config(surface, CanvasConfig::default())
    }

    /// Create a store starting from `config`, sanitized.
    ///
    /// Nothing is sent to the engine; use [`ConfigStore::sync_engine`] once
    /// the engine is ready.
    #[must_use]
    pub fn with_config(surface: CallSurface, config: CanvasConfig) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                surface,
                config: RefCell::new(config.sanitized()),
                listeners: RefCell::new(Vec::new()),
                next_subscription: Cell::new(0),
            }),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn snapshot(&self) -> CanvasConfig {
        self.inner.config.borrow().clone()
    }

    /// Register a listener called with the new snapshot after every change.
    pub fn subscribe(&self, listener: impl Fn(&CanvasConfig) + 'static) -> Subscription {
        let id = self.inner.next_subscription.get() + 1;
        self.inner.next_subscription.set(id);
        let subscription = Subscription(id);
        self.inner
            .listeners
            .borrow_mut()
            .push((subscription, Rc::new(listener)));
        subscription
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    fn update(&self, apply: impl FnOnce(&mut CanvasConfig)) -> CanvasConfig {
        let mut config = self.inner.config.borrow_mut();
        apply(&mut config);
        config.clone()
    }

    fn notify(&self, snapshot: &CanvasConfig) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }

    fn push_grid(&self, config: &CanvasConfig) {
        if let Some(size) = config.engine_grid_size() {
            self.inner
                .surface
                .set_grid_settings(config.show_grid, size, config.grid_color);
        }
    }

    /// Set the canvas size, flooring each dimension to 1.
    pub fn set_size(&self, width: i64, height: i64) {
        let (width, height) = (floor_dimension(width), floor_dimension(height));
        let snapshot = self.update(|c| {
            c.width = width;
            c.height = height;
        });
        self.inner.surface.resize_canvas(width, height);
        self.notify(&snapshot);
    }

    /// Set the size from raw input fields.
    ///
    /// An empty field counts as zero (and floors to 1); a malformed field keeps
    /// the stored dimension.
    pub fn set_size_fields(&self, width: &str, height: &str) {
        let current = self.snapshot();
        let width = parse_int_field(width).unwrap_or_else(|err| {
            tracing::debug!("Keeping width {}: {err}", current.width);
            i64::from(current.width)
        });
        let height = parse_int_field(height).unwrap_or_else(|err| {
            tracing::debug!("Keeping height {}: {err}", current.height);
            i64::from(current.height)
        });
        self.set_size(width, height);
    }

    /// Set the background color. Alpha is clamped into `[0, 1]`.
    pub fn set_background(&self, color: Rgba) {
        let snapshot = self.update(|c| c.background = color.clamped());
        self.inner.surface.set_canvas_background(snapshot.background);
        self.notify(&snapshot);
    }

    /// Set the background from a color string.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidColor`] if the string does not parse; the
    /// store and the engine are left untouched.
    pub fn set_background_str(&self, color: &str) -> BridgeResult<()> {
        self.set_background(color.parse()?);
        Ok(())
    }

    /// Show or hide the grid.
    pub fn set_show_grid(&self, show: bool) {
        let snapshot = self.update(|c| c.show_grid = show);
        self.push_grid(&snapshot);
        self.notify(&snapshot);
    }

    /// Flip grid visibility.
    pub fn toggle_grid(&self) {
        let show = !self.inner.config.borrow().show_grid;
        self.set_show_grid(show);
    }

    /// Set the grid spacing.
    ///
    /// Any value is stored; the engine is only told when it is positive.
    pub fn set_grid_size(&self, size: i32) {
        let snapshot = self.update(|c| c.grid_size = size);
        self.push_grid(&snapshot);
        self.notify(&snapshot);
    }

    /// Set the grid spacing from a raw input field.
    ///
    /// An empty field stores zero; a malformed one keeps the stored value.
    pub fn set_grid_size_field(&self, text: &str) {
        match parse_int_field(text) {
            Ok(value) => {
                let size = i32::try_from(value)
                    .unwrap_or(if value < 0 { i32::MIN } else { i32::MAX });
                self.set_grid_size(size);
            }
            Err(err) => tracing::debug!("Keeping grid size: {err}"),
        }
    }

    /// Set the grid line color. Alpha is clamped into `[0, 1]`.
    pub fn set_grid_color(&self, color: Rgba) {
        let snapshot = self.update(|c| c.grid_color = color.clamped());
        self.push_grid(&snapshot);
        self.notify(&snapshot);
    }

    /// Set the zoom percentage, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    ///
    /// `NaN` is ignored.
    pub fn set_zoom_level(&self, zoom: f32) {
        let Some(zoom) = clamp_zoom(zoom) else {
            tracing::debug!("Ignoring NaN zoom level");
            return;
        };
        let snapshot = self.update(|c| c.zoom_level = zoom);
        self.inner.surface.set_zoom_level(zoom);
        self.notify(&snapshot);
    }

    /// Set the zoom percentage around a canvas-local anchor point.
    ///
    /// `NaN` is ignored.
    pub fn zoom_at_point(&self, zoom: f32, x: f32, y: f32) {
        let Some(zoom) = clamp_zoom(zoom) else {
            tracing::debug!("Ignoring NaN zoom level");
            return;
        };
        let snapshot = self.update(|c| c.zoom_level = zoom);
        self.inner.surface.zoom_at_point(zoom, x, y);
        self.notify(&snapshot);
    }

    /// Push every stored setting to the engine.
    ///
    /// Used after the engine binds so that changes made while it was absent
    /// are not lost.
    pub fn sync_engine(&self) {
        let config = self.snapshot();
        let surface = &self.inner.surface;
        surface.resize_canvas(config.width, config.height);
        surface.set_canvas_background(config.background);
        self.push_grid(&config);
        surface.set_zoom_level(config.zoom_level);
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("config", &*self.inner.config.borrow())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, RecordingEngine};

    fn store() -> (ConfigStore, RecordingEngine) {
        let engine = RecordingEngine::new();
        let surface = CallSurface::bound(Box::new(engine.clone()));
        (ConfigStore::new(surface), engine)
    }

    #[test]
    fn test_defaults_match_editor_startup() {
        let config = CanvasConfig::default();
        assert_eq!((config.width, config.height), (1920, 1080));
        assert_eq!(config.background, Rgba::opaque(240, 240, 240));
        assert!(config.show_grid);
        assert_eq!(config.grid_size, 20);
        assert!((config.zoom_level - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_set_size_floors_to_one() {
        let (store, engine) = store();
        store.set_size(0, -5);

        let config = store.snapshot();
        assert_eq!((config.width, config.height), (1, 1));
        assert_eq!(
            engine.calls(),
            vec![EngineCall::Resize { width: 1, height: 1 }]
        );
    }

    #[test]
    fn test_grid_size_is_stored_as_given_and_forwarded_only_when_positive() {
        let (store, engine) = store();

        for size in [0, 1, 5, 0, 64] {
            engine.take_calls();
            store.set_grid_size(size);
            assert_eq!(store.snapshot().grid_size, size);
            assert_eq!(engine.calls_to("set_grid_settings").len(), usize::from(size > 0));
        }

        engine.take_calls();
        store.set_grid_size(-3);
        assert_eq!(store.snapshot().grid_size, -3);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_grid_calls_carry_the_full_parameter_set() {
        let (store, engine) = store();
        store.set_grid_color(Rgba::new(10, 20, 30, 0.5));
        store.set_show_grid(false);
        store.set_grid_size(32);

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Grid { show: true, size: 20, color: [10, 20, 30, 128] },
                EngineCall::Grid { show: false, size: 20, color: [10, 20, 30, 128] },
                EngineCall::Grid { show: false, size: 32, color: [10, 20, 30, 128] },
            ]
        );
    }

    #[test]
    fn test_show_grid_is_withheld_while_size_invalid() {
        let (store, engine) = store();
        store.set_grid_size(0);
        store.set_show_grid(false);

        assert!(!store.snapshot().show_grid);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_zoom_is_clamped_before_store_and_engine() {
        let (store, engine) = store();

        for (input, expected) in [(5.0, 10.0), (5000.0, 1000.0), (250.0, 250.0), (-1.0, 10.0)] {
            store.set_zoom_level(input);
            assert!((store.snapshot().zoom_level - expected).abs() < f32::EPSILON);
            assert_eq!(engine.take_calls(), vec![EngineCall::Zoom(expected)]);
        }
    }

    #[test]
    fn test_nan_zoom_is_ignored() {
        let (store, engine) = store();
        store.set_zoom_level(f32::NAN);
        store.zoom_at_point(f32::NAN, 1.0, 1.0);
        assert!((store.snapshot().zoom_level - DEFAULT_ZOOM).abs() < f32::EPSILON);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_zoom_at_point_forwards_anchor() {
        let (store, engine) = store();
        store.zoom_at_point(2000.0, 40.0, 30.0);

        assert!((store.snapshot().zoom_level - MAX_ZOOM).abs() < f32::EPSILON);
        assert_eq!(
            engine.calls(),
            vec![EngineCall::ZoomAt { zoom: 1000.0, x: 40.0, y: 30.0 }]
        );
    }

    #[test]
    fn test_background_string_is_parsed_locally() {
        let (store, engine) = store();
        store.set_background_str("rgba(0, 0, 255, 0.5)").unwrap();
        assert_eq!(store.snapshot().background, Rgba::new(0, 0, 255, 0.5));
        assert_eq!(engine.take_calls(), vec![EngineCall::Background([0, 0, 255, 128])]);

        let err = store.set_background_str("blue").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidColor(_)));
        assert_eq!(store.snapshot().background, Rgba::new(0, 0, 255, 0.5));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_grid_size_field_rules() {
        let (store, _engine) = store();

        store.set_grid_size_field("12");
        assert_eq!(store.snapshot().grid_size, 12);

        store.set_grid_size_field("abc");
        assert_eq!(store.snapshot().grid_size, 12);

        store.set_grid_size_field("");
        assert_eq!(store.snapshot().grid_size, 0);
    }

    #[test]
    fn test_size_fields_keep_last_valid_value() {
        let (store, _engine) = store();
        store.set_size_fields("800", "oops");
        let config = store.snapshot();
        assert_eq!((config.width, config.height), (800, 1080));

        store.set_size_fields("", "600");
        let config = store.snapshot();
        assert_eq!((config.width, config.height), (1, 600));
    }

    #[test]
    fn test_parse_int_field_cases() {
        assert_eq!(parse_int_field("").unwrap(), 0);
        assert_eq!(parse_int_field("  42 ").unwrap(), 42);
        assert_eq!(parse_int_field("-7").unwrap(), -7);
        assert!(matches!(parse_int_field("4.5"), Err(BridgeError::InvalidNumber(_))));
    }

    #[test]
    fn test_listeners_see_each_snapshot() {
        let (store, _engine) = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let subscription = store.subscribe(move |config| sink.borrow_mut().push(config.grid_size));

        store.set_grid_size(8);
        store.set_grid_size(0);
        assert!(store.unsubscribe(subscription));
        store.set_grid_size(4);

        assert_eq!(*seen.borrow(), vec![8, 0]);
        assert!(!store.unsubscribe(subscription));
    }

    #[test]
    fn test_listener_may_call_back_into_the_store() {
        let (store, _engine) = store();
        let reentrant = store.clone();
        store.subscribe(move |config| {
            if config.grid_size < 0 {
                reentrant.set_grid_size(1);
            }
        });

        store.set_grid_size(-1);
        assert_eq!(store.snapshot().grid_size, 1);
    }

    #[test]
    fn test_sync_engine_pushes_everything() {
        let surface = CallSurface::new();
        let store = ConfigStore::new(surface.clone());
        store.set_zoom_level(150.0);
        store.set_show_grid(false);

        let engine = RecordingEngine::new();
        surface.bind(Box::new(engine.clone()));
        store.sync_engine();

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Resize { width: 1920, height: 1080 },
                EngineCall::Background([240, 240, 240, 255]),
                EngineCall::Grid { show: false, size: 20, color: [220, 220, 220, 255] },
                EngineCall::Zoom(150.0),
            ]
        );
    }

    #[test]
    fn test_presets_are_sanitized() {
        let config: CanvasConfig =
            serde_json::from_str(r#"{"width":0,"zoomLevel":9000,"showGrid":false}"#).unwrap();
        let store = ConfigStore::with_config(CallSurface::new(), config);
        let config = store.snapshot();
        assert_eq!(config.width, 1);
        assert_eq!(config.height, 1080);
        assert!(!config.show_grid);
        assert!((config.zoom_level - MAX_ZOOM).abs() < f32::EPSILON);
    }

    #[test]
    fn test_preset_alpha_matches_engine_alpha() {
        let config: CanvasConfig = serde_json::from_str(
            r#"{"background":{"r":0,"g":0,"b":0,"a":2.0},"gridColor":{"r":9,"g":9,"b":9,"a":-1.0}}"#,
        )
        .unwrap();
        let engine = RecordingEngine::new();
        let surface = CallSurface::bound(Box::new(engine.clone()));
        let store = ConfigStore::with_config(surface, config);

        let config = store.snapshot();
        assert!((config.background.a - 1.0).abs() < f32::EPSILON);
        assert!(config.grid_color.a.abs() < f32::EPSILON);

        store.sync_engine();
        let [.., alpha] = config.background.to_engine();
        assert!(engine.calls().contains(&EngineCall::Background([0, 0, 0, alpha])));
        assert!(engine.calls().contains(&EngineCall::Grid {
            show: true,
            size: 20,
            color: [9, 9, 9, 0]
        }));
    }

    #[test]
    fn test_setters_clamp_out_of_range_alpha() {
        let store = ConfigStore::new(CallSurface::new());
        store.set_background(Rgba { r: 1, g: 2, b: 3, a: 7.5 });
        store.set_grid_color(Rgba { r: 1, g: 2, b: 3, a: f32::NAN });

        let config = store.snapshot();
        assert!((config.background.a - 1.0).abs() < f32::EPSILON);
        assert!((config.grid_color.a - 1.0).abs() < f32::EPSILON);
    }
}
