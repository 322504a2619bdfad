//! # VectorMate WASM Application
//!
//! Browser host for the VectorMate bridge: loads the compiled engine module,
//! binds its exports, drives `requestAnimationFrame` and forwards DOM input.
//!
//! ## Usage
//!
//! Build for WASM:
//! ```bash
//! wasm-pack build --target web vectormate-app
//! ```
//!
//! Then import in JavaScript:
//! ```javascript
//! import init, { EditorApp } from './pkg/vectormate_app.js';
//!
//! await init();
//! const app = new EditorApp('canvas');
//! await app.start();          // "bound" or "stub"; the editor works either way
//! app.setGridSize(32);
//! app.unmount();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dom;
pub mod engine;
pub mod error;
pub mod host;
pub mod logging;

use std::collections::HashMap;
use std::rc::Rc;

use js_sys::{Function, Promise};
use vectormate_core::{EditorOptions, EditorSession, Rgba, Subscription, UiAction};
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

pub use dom::DomBindings;
pub use error::{AppError, AppResult};
pub use host::{BrowserHost, WindowFrameHost};

/// Region id registered at startup so `data-interactive-panel="true"` markup
/// is treated as UI-owned.
pub const DEFAULT_PANEL_REGION: &str = "true";

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init_wasm() {
    console_error_panic_hook::set_once();
    logging::init_console_logging();
    tracing::info!("VectorMate WASM initialized");
}

fn find_canvas(canvas_id: &str) -> AppResult<(web_sys::Window, HtmlCanvasElement)> {
    let window = web_sys::window().ok_or(AppError::NoWindow)?;
    let document = window.document().ok_or(AppError::NoDocument)?;
    let canvas = document
        .get_element_by_id(canvas_id)
        .ok_or_else(|| AppError::CanvasNotFound(canvas_id.to_string()))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| AppError::NotACanvas(canvas_id.to_string()))?;
    Ok((window, canvas))
}

/// Editor bridge bound to one `<canvas>` element.
#[wasm_bindgen]
pub struct EditorApp {
    canvas: HtmlCanvasElement,
    session: Rc<EditorSession<BrowserHost>>,
    bindings: Option<DomBindings>,
    subscriptions: HashMap<u32, Subscription>,
    next_subscription: u32,
}

#[wasm_bindgen]
impl EditorApp {
    /// Create an editor for the canvas with the given element id.
    ///
    /// `options_json` is an optional JSON `EditorOptions` document.
    ///
    /// # Errors
    ///
    /// Returns an error if the canvas is missing, the options are malformed or
    /// the DOM listeners cannot be attached.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str, options_json: Option<String>) -> Result<EditorApp, JsValue> {
        let (window, canvas) = find_canvas(canvas_id)?;
        let options = match options_json.as_deref() {
            Some(json) => EditorOptions::from_json(json).map_err(AppError::from)?,
            None => EditorOptions::default(),
        };

        let session = Rc::new(EditorSession::new(
            BrowserHost::new(window.clone()),
            Rc::new(WindowFrameHost::new(window.clone())),
            options,
        ));
        session.router().register_region(DEFAULT_PANEL_REGION);

        let after_layout: Rc<dyn Fn()> = {
            let session = Rc::clone(&session);
            Rc::new(move || {
                session.on_engine_ready();
            })
        };
        let bindings = DomBindings::attach(&window, &canvas, session.router(), after_layout)?;

        Ok(Self {
            canvas,
            session,
            bindings: Some(bindings),
            subscriptions: HashMap::new(),
            next_subscription: 0,
        })
    }

    /// Load the engine and start rendering.
    ///
    /// The promise resolves to `"bound"` or `"stub"` and never rejects.
    #[must_use]
    pub fn start(&self) -> Promise {
        let session = Rc::clone(&self.session);
        let canvas = self.canvas.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            let outcome = session.start(canvas).await;
            Ok(JsValue::from_str(if outcome.is_bound() { "bound" } else { "stub" }))
        })
    }

    /// Stop the render loop.
    pub fn stop(&self) {
        self.session.stop();
    }

    /// Stop rendering and detach every DOM listener.
    pub fn unmount(&mut self) {
        self.session.stop();
        self.bindings.take();
    }

    /// Whether the compiled engine is bound.
    #[wasm_bindgen(js_name = isBound)]
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.session.surface().is_bound()
    }

    /// Bridge status as JSON.
    #[wasm_bindgen(js_name = statusJson)]
    #[must_use]
    pub fn status_json(&self) -> String {
        serde_json::to_string(&self.session.status()).unwrap_or_default()
    }

    /// Current canvas configuration as JSON.
    #[wasm_bindgen(js_name = configJson)]
    #[must_use]
    pub fn config_json(&self) -> String {
        serde_json::to_string(&self.session.store().snapshot()).unwrap_or_default()
    }

    /// Set the canvas size. Values below 1 become 1.
    #[wasm_bindgen(js_name = setSize)]
    pub fn set_size(&self, width: i32, height: i32) {
        self.session.store().set_size(i64::from(width), i64::from(height));
    }

    /// Set the canvas size from raw input field text.
    #[wasm_bindgen(js_name = setSizeFields)]
    pub fn set_size_fields(&self, width: &str, height: &str) {
        self.session.store().set_size_fields(width, height);
    }

    /// Set the background from an `rgb(...)`/`rgba(...)` string.
    ///
    /// # Errors
    ///
    /// Returns an error if the color string is malformed.
    #[wasm_bindgen(js_name = setBackground)]
    pub fn set_background(&self, color: &str) -> Result<(), JsValue> {
        self.session
            .store()
            .set_background_str(color)
            .map_err(|err| AppError::from(err).into())
    }

    /// Show or hide the grid.
    #[wasm_bindgen(js_name = setShowGrid)]
    pub fn set_show_grid(&self, show: bool) {
        self.session.store().set_show_grid(show);
    }

    /// Flip grid visibility.
    #[wasm_bindgen(js_name = toggleGrid)]
    pub fn toggle_grid(&self) {
        self.session.router().apply(UiAction::ToggleGrid);
    }

    /// Set the grid spacing.
    #[wasm_bindgen(js_name = setGridSize)]
    pub fn set_grid_size(&self, size: i32) {
        self.session.store().set_grid_size(size);
    }

    /// Set the grid spacing from raw input field text.
    #[wasm_bindgen(js_name = setGridSizeField)]
    pub fn set_grid_size_field(&self, text: &str) {
        self.session.store().set_grid_size_field(text);
    }

    /// Set the grid color from an `rgb(...)`/`rgba(...)` string.
    ///
    /// # Errors
    ///
    /// Returns an error if the color string is malformed.
    #[wasm_bindgen(js_name = setGridColor)]
    pub fn set_grid_color(&self, color: &str) -> Result<(), JsValue> {
        let color = color.parse::<Rgba>().map_err(AppError::from)?;
        self.session.store().set_grid_color(color);
        Ok(())
    }

    /// Set the zoom percentage (clamped to 10..=1000).
    #[wasm_bindgen(js_name = setZoomLevel)]
    pub fn set_zoom_level(&self, zoom: f32) {
        self.session.store().set_zoom_level(zoom);
    }

    /// Zoom around a canvas-local point.
    #[wasm_bindgen(js_name = zoomAtPoint)]
    pub fn zoom_at_point(&self, zoom: f32, x: f32, y: f32) {
        self.session.store().zoom_at_point(zoom, x, y);
    }

    /// Zoom in by one step.
    #[wasm_bindgen(js_name = zoomIn)]
    pub fn zoom_in(&self) {
        self.session.router().apply(UiAction::ZoomIn);
    }

    /// Zoom out by one step.
    #[wasm_bindgen(js_name = zoomOut)]
    pub fn zoom_out(&self) {
        self.session.router().apply(UiAction::ZoomOut);
    }

    /// Return to 100%.
    #[wasm_bindgen(js_name = resetZoom)]
    pub fn reset_zoom(&self) {
        self.session.router().apply(UiAction::ResetZoom);
    }

    /// Mark a UI region id; key events from it stay out of the engine.
    #[wasm_bindgen(js_name = registerRegion)]
    pub fn register_region(&self, id: &str) -> bool {
        self.session.router().register_region(id)
    }

    /// Forget a UI region id.
    #[wasm_bindgen(js_name = unregisterRegion)]
    pub fn unregister_region(&self, id: &str) -> bool {
        self.session.router().unregister_region(id)
    }

    /// Call `callback` with the configuration JSON after every change.
    /// Returns a key for [`EditorApp::off_config_change`].
    #[wasm_bindgen(js_name = onConfigChange)]
    pub fn on_config_change(&mut self, callback: Function) -> u32 {
        let subscription = self.session.store().subscribe(move |config| {
            let json = serde_json::to_string(config).unwrap_or_default();
            if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                tracing::warn!("Config listener threw: {}", error::describe(&err));
            }
        });
        self.next_subscription += 1;
        self.subscriptions.insert(self.next_subscription, subscription);
        self.next_subscription
    }

    /// Remove a listener added with [`EditorApp::on_config_change`].
    #[wasm_bindgen(js_name = offConfigChange)]
    pub fn off_config_change(&mut self, key: u32) -> bool {
        self.subscriptions
            .remove(&key)
            .is_some_and(|subscription| self.session.store().unsubscribe(subscription))
    }
}

impl Drop for EditorApp {
    fn drop(&mut self) {
        self.session.stop();
    }
}
