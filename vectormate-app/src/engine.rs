//! Engine table built from an instantiated Emscripten module.

use js_sys::{Array, Function, Reflect};
use vectormate_core::{BridgeError, BridgeResult, EngineInstance, EngineOps};
use wasm_bindgen::{JsCast, JsValue};

use crate::error::describe;

const NUMBER: &str = "number";
const STRING: &str = "string";
const BOOLEAN: &str = "boolean";

/// Wrapped engine exports. Built all at once so a partial table never exists.
pub struct JsEngine {
    initialize_canvas: Function,
    render: Function,
    on_mouse_down: Function,
    on_mouse_move: Function,
    on_mouse_up: Function,
    on_key_down: Function,
    resize_canvas: Function,
    set_canvas_background: Function,
    set_grid_settings: Function,
    set_zoom_level: Function,
    zoom_at_point: Function,
}

fn cwrap(instance: &JsValue, cwrap: &Function, name: &str, args: &[&str]) -> BridgeResult<Function> {
    let arg_types: Array = args.iter().map(|ty| JsValue::from_str(ty)).collect();
    let wrapped = cwrap
        .call3(instance, &JsValue::from_str(name), &JsValue::NULL, &arg_types)
        .map_err(|err| BridgeError::Instantiate(format!("cwrap({name}): {}", describe(&err))))?;
    wrapped
        .dyn_into::<Function>()
        .map_err(|_| BridgeError::Instantiate(format!("cwrap({name}) did not return a function")))
}

impl JsEngine {
    /// Wrap every export of `instance` through its `cwrap` helper.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Instantiate`] if `cwrap` is missing or any export
    /// cannot be wrapped.
    pub fn wrap(instance: &JsValue) -> BridgeResult<Self> {
        let helper = Reflect::get(instance, &JsValue::from_str("cwrap"))
            .ok()
            .and_then(|value| value.dyn_into::<Function>().ok())
            .ok_or_else(|| BridgeError::Instantiate("module does not expose cwrap".to_string()))?;
        let wrap = |name: &str, args: &[&str]| cwrap(instance, &helper, name, args);

        Ok(Self {
            initialize_canvas: wrap("initialize_canvas", &[NUMBER, NUMBER])?,
            render: wrap("render", &[])?,
            on_mouse_down: wrap("on_mouse_down", &[NUMBER, NUMBER, NUMBER])?,
            on_mouse_move: wrap("on_mouse_move", &[NUMBER, NUMBER])?,
            on_mouse_up: wrap("on_mouse_up", &[NUMBER, NUMBER, NUMBER])?,
            on_key_down: wrap("on_key_down", &[STRING])?,
            resize_canvas: wrap("resize_canvas", &[NUMBER, NUMBER])?,
            set_canvas_background: wrap("set_canvas_background", &[NUMBER; 4])?,
            set_grid_settings: wrap(
                "set_grid_settings",
                &[BOOLEAN, NUMBER, NUMBER, NUMBER, NUMBER, NUMBER],
            )?,
            set_zoom_level: wrap("set_zoom_level", &[NUMBER])?,
            zoom_at_point: wrap("zoom_at_point", &[NUMBER, NUMBER, NUMBER])?,
        })
    }
}

fn invoke(op: &'static str, export: &Function, args: &[JsValue]) -> BridgeResult<()> {
    let args: Array = args.iter().collect();
    export
        .apply(&JsValue::NULL, &args)
        .map(|_| ())
        .map_err(|err| BridgeError::engine(op, describe(&err)))
}

fn num(value: impl Into<f64>) -> JsValue {
    JsValue::from_f64(value.into())
}

impl EngineOps for JsEngine {
    fn initialize_canvas(&mut self, width: u32, height: u32) -> BridgeResult<()> {
        invoke("initialize_canvas", &self.initialize_canvas, &[num(width), num(height)])
    }

    fn render(&mut self) -> BridgeResult<()> {
        invoke("render", &self.render, &[])
    }

    fn on_mouse_down(&mut self, x: f32, y: f32, button: i16) -> BridgeResult<()> {
        invoke("on_mouse_down", &self.on_mouse_down, &[num(x), num(y), num(button)])
    }

    fn on_mouse_move(&mut self, x: f32, y: f32) -> BridgeResult<()> {
        invoke("on_mouse_move", &self.on_mouse_move, &[num(x), num(y)])
    }

    fn on_mouse_up(&mut self, x: f32, y: f32, button: i16) -> BridgeResult<()> {
        invoke("on_mouse_up", &self.on_mouse_up, &[num(x), num(y), num(button)])
    }

    fn on_key_down(&mut self, key: &str) -> BridgeResult<()> {
        invoke("on_key_down", &self.on_key_down, &[JsValue::from_str(key)])
    }

    fn resize_canvas(&mut self, width: u32, height: u32) -> BridgeResult<()> {
        invoke("resize_canvas", &self.resize_canvas, &[num(width), num(height)])
    }

    fn set_canvas_background(&mut self, r: u8, g: u8, b: u8, a: u8) -> BridgeResult<()> {
        invoke(
            "set_canvas_background",
            &self.set_canvas_background,
            &[num(r), num(g), num(b), num(a)],
        )
    }

    fn set_grid_settings(&mut self, show: bool, size: u32, color: [u8; 4]) -> BridgeResult<()> {
        let [r, g, b, a] = color;
        invoke(
            "set_grid_settings",
            &self.set_grid_settings,
            &[JsValue::from_bool(show), num(size), num(r), num(g), num(b), num(a)],
        )
    }

    fn set_zoom_level(&mut self, zoom: f32) -> BridgeResult<()> {
        invoke("set_zoom_level", &self.set_zoom_level, &[num(zoom)])
    }

    fn zoom_at_point(&mut self, zoom: f32, x: f32, y: f32) -> BridgeResult<()> {
        invoke("zoom_at_point", &self.zoom_at_point, &[num(zoom), num(x), num(y)])
    }
}

/// A resolved module instance whose runtime may still be starting.
pub struct JsEngineInstance {
    instance: JsValue,
    engine: JsEngine,
}

impl JsEngineInstance {
    /// Wrap a resolved module instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the exports cannot be wrapped.
    pub fn new(instance: JsValue) -> BridgeResult<Self> {
        let engine = JsEngine::wrap(&instance)?;
        Ok(Self { instance, engine })
    }
}

impl EngineInstance for JsEngineInstance {
    /// Reads the module's `calledRun` flag. Builds that do not export it are
    /// ready once the factory promise resolves.
    fn runtime_ready(&self) -> bool {
        Reflect::get(&self.instance, &JsValue::from_str("calledRun"))
            .ok()
            .and_then(|flag| flag.as_bool())
            .unwrap_or(true)
    }

    fn into_ops(self: Box<Self>) -> Box<dyn EngineOps> {
        Box::new(self.engine)
    }
}
