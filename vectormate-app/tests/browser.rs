//! Browser tests for the WASM host.
//!
//! Run with `wasm-pack test --headless --firefox vectormate-app`.

#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Function, Object, Reflect};
use vectormate_app::dom::interactive_region;
use vectormate_app::engine::{JsEngine, JsEngineInstance};
use vectormate_app::logging::{init_console_logging, CONSOLE_LEVEL};
use vectormate_app::{BrowserHost, EditorApp};
use vectormate_core::{
    BridgeError, CallSurface, ConfigStore, EngineInstance, EngineOps, EventRouter, ModuleHost,
    RouterOptions,
};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

/// Module object whose `cwrap` returns functions that log `[name, ...args]`
/// into `module.calls`.
fn fake_module() -> Object {
    let module = Object::new();
    Reflect::set(&module, &"calls".into(), &Array::new()).unwrap();
    let cwrap = Function::new_with_args(
        "name, ret, types",
        "const module = this; \
         return function(...args) { \
             if (name === module.throwOn) { throw new Error('boom'); } \
             module.calls.push([name, ...args]); \
         };",
    );
    Reflect::set(&module, &"cwrap".into(), &cwrap).unwrap();
    module
}

fn calls(module: &Object) -> Vec<String> {
    let calls: Array = Reflect::get(module, &"calls".into()).unwrap().unchecked_into();
    calls
        .iter()
        .map(|call| {
            let call: Array = call.unchecked_into();
            call.join(",").into()
        })
        .collect()
}

fn attach_canvas(id: &str) {
    let document = web_sys::window().unwrap().document().unwrap();
    let canvas = document.create_element("canvas").unwrap();
    canvas.set_id(id);
    document.body().unwrap().append_child(&canvas).unwrap();
}

#[wasm_bindgen_test]
fn test_js_engine_forwards_engine_units() {
    let module = fake_module();
    let mut engine = JsEngine::wrap(&module).unwrap();

    engine.initialize_canvas(800, 600).unwrap();
    engine.set_grid_settings(true, 20, [220, 220, 220, 255]).unwrap();
    engine.on_key_down("ArrowUp").unwrap();

    assert_eq!(
        calls(&module),
        vec![
            "initialize_canvas,800,600".to_string(),
            "set_grid_settings,true,20,220,220,220,255".to_string(),
            "on_key_down,ArrowUp".to_string(),
        ]
    );
}

#[wasm_bindgen_test]
fn test_js_engine_reports_thrown_errors() {
    let module = fake_module();
    Reflect::set(&module, &"throwOn".into(), &"render".into()).unwrap();
    let mut engine = JsEngine::wrap(&module).unwrap();

    let err = engine.render().unwrap_err();
    assert!(matches!(err, BridgeError::Engine { op: "render", .. }));
}

#[wasm_bindgen_test]
fn test_module_without_cwrap_is_rejected() {
    let err = JsEngine::wrap(&Object::new()).err().unwrap();
    assert!(matches!(err, BridgeError::Instantiate(_)));
}

#[wasm_bindgen_test]
fn test_runtime_ready_follows_called_run() {
    let module = fake_module();
    Reflect::set(&module, &"calledRun".into(), &JsValue::FALSE).unwrap();
    let instance = JsEngineInstance::new(module.clone().into()).unwrap();
    assert!(!instance.runtime_ready());

    Reflect::set(&module, &"calledRun".into(), &JsValue::TRUE).unwrap();
    assert!(instance.runtime_ready());
}

#[wasm_bindgen_test]
fn test_browser_host_finds_registered_factory() {
    let window = web_sys::window().unwrap();
    let host = BrowserHost::new(window.clone());
    assert!(host.find_factory("VectorMateTestFactory").is_none());

    Reflect::set(
        &window,
        &"VectorMateTestFactory".into(),
        &Function::new_no_args("return {};"),
    )
    .unwrap();
    assert!(host.has_factory("VectorMateTestFactory"));
    assert!(host.find_factory("VectorMateTestFactory").is_some());
}

#[wasm_bindgen_test]
fn test_editor_app_works_without_engine() {
    attach_canvas("vm-test-canvas");
    let app = EditorApp::new("vm-test-canvas", None).unwrap();

    app.set_zoom_level(5.0);
    app.set_grid_size_field("abc");
    assert!(app.set_background("not a color").is_err());

    let config: serde_json::Value = serde_json::from_str(&app.config_json()).unwrap();
    assert_eq!(config["zoomLevel"], 10.0);
    assert_eq!(config["gridSize"], 20);
    assert!(!app.is_bound());
}

#[wasm_bindgen_test]
fn test_editor_app_rejects_missing_canvas() {
    assert!(EditorApp::new("no-such-canvas", None).is_err());
}

#[wasm_bindgen_test]
async fn test_start_without_factory_resolves_stub() {
    attach_canvas("vm-test-canvas-start");
    let options = r#"{"loader":{"factoryName":"MissingFactory","scriptPath":"/missing-engine.js"}}"#;
    let app = EditorApp::new("vm-test-canvas-start", Some(options.to_string())).unwrap();

    let outcome = wasm_bindgen_futures::JsFuture::from(app.start()).await.unwrap();
    assert_eq!(outcome.as_string().as_deref(), Some("stub"));
    app.stop();
}

// ============================================================================
// Host services
// ============================================================================

#[wasm_bindgen_test]
async fn test_browser_host_sleep_resolves() {
    let host = BrowserHost::new(web_sys::window().unwrap());
    let before = js_sys::Date::now();
    host.sleep(20).await;
    assert!(js_sys::Date::now() - before >= 15.0);
}

#[wasm_bindgen_test]
fn test_console_logging_installs_once() {
    init_console_logging();
    init_console_logging();
    assert_eq!(log::max_level(), CONSOLE_LEVEL.to_level_filter());
    tracing::debug!("console logging reachable from tracing");
}

// ============================================================================
// Interactive regions
// ============================================================================

fn router_with_default_region() -> EventRouter {
    let surface = CallSurface::new();
    let store = ConfigStore::new(surface.clone());
    let router = EventRouter::new(surface, store, RouterOptions::default());
    router.register_region("true");
    router
}

fn nested_panels() -> web_sys::Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let outer = document.create_element("div").unwrap();
    outer.set_attribute("data-interactive-panel", "true").unwrap();
    let inner = document.create_element("div").unwrap();
    inner.set_attribute("data-interactive-panel", "false").unwrap();
    let input = document.create_element("input").unwrap();
    inner.append_child(&input).unwrap();
    outer.append_child(&inner).unwrap();
    document.body().unwrap().append_child(&outer).unwrap();
    input
}

#[wasm_bindgen_test]
fn test_unregistered_inner_marker_does_not_release_keys() {
    let router = router_with_default_region();
    let input = nested_panels();

    assert_eq!(interactive_region(&input, &router).as_deref(), Some("true"));
}

#[wasm_bindgen_test]
fn test_element_outside_panels_has_no_region() {
    let router = router_with_default_region();
    let document = web_sys::window().unwrap().document().unwrap();
    let loose = document.create_element("span").unwrap();
    document.body().unwrap().append_child(&loose).unwrap();

    assert!(interactive_region(&loose, &router).is_none());
}
