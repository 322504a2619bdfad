//! Browser implementation of the module host and the frame clock.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use gloo_timers::future::TimeoutFuture;
use js_sys::{Function, Object, Promise, Reflect};
use vectormate_core::{
    BridgeError, BridgeResult, EngineFactory, EngineInstance, FrameCallback, FrameHandle,
    FrameHost, ModuleHost,
};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{HtmlCanvasElement, HtmlScriptElement, Window};

use crate::engine::JsEngineInstance;
use crate::error::describe;

/// Global-registry factory (`window[factory_name]`).
struct JsFactory {
    factory: Function,
}

#[async_trait(?Send)]
impl EngineFactory<HtmlCanvasElement> for JsFactory {
    async fn instantiate(
        &self,
        canvas: &HtmlCanvasElement,
    ) -> BridgeResult<Box<dyn EngineInstance>> {
        let module_options = Object::new();
        Reflect::set(&module_options, &JsValue::from_str("canvas"), canvas)
            .map_err(|err| BridgeError::Instantiate(describe(&err)))?;

        let returned = self
            .factory
            .call1(&JsValue::NULL, &module_options)
            .map_err(|err| BridgeError::Instantiate(describe(&err)))?;
        let instance = match returned.dyn_into::<Promise>() {
            Ok(promise) => JsFuture::from(promise)
                .await
                .map_err(|err| BridgeError::Instantiate(describe(&err)))?,
            Err(instance) => instance,
        };

        Ok(Box::new(JsEngineInstance::new(instance)?))
    }
}

/// Loads the engine script into the page and looks up its factory.
pub struct BrowserHost {
    window: Window,
    scripts: RefCell<HashMap<String, Promise>>,
}

impl BrowserHost {
    /// Create a host over `window`.
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self {
            window,
            scripts: RefCell::new(HashMap::new()),
        }
    }

    /// Whether the engine factory is currently registered on `window`.
    #[must_use]
    pub fn has_factory(&self, name: &str) -> bool {
        Reflect::get(&self.window, &JsValue::from_str(name))
            .is_ok_and(|value| value.is_function())
    }
}

#[async_trait(?Send)]
impl ModuleHost for BrowserHost {
    type Target = HtmlCanvasElement;

    fn find_factory(&self, name: &str) -> Option<Box<dyn EngineFactory<HtmlCanvasElement>>> {
        let factory = Reflect::get(&self.window, &JsValue::from_str(name))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        Some(Box::new(JsFactory { factory }))
    }

    fn inject_script(&self, src: &str) -> BridgeResult<()> {
        let document = self
            .window
            .document()
            .ok_or_else(|| BridgeError::Script("no document".to_string()))?;
        let script = document
            .create_element("script")
            .map_err(|err| BridgeError::Script(describe(&err)))?
            .dyn_into::<HtmlScriptElement>()
            .map_err(|_| BridgeError::Script("created element is not a script".to_string()))?;
        script.set_src(src);
        script.set_async(true);

        // Hook the handlers before the element is attached so the load event
        // cannot be missed.
        let loaded = Promise::new(&mut |resolve, reject| {
            script.set_onload(Some(&resolve));
            script.set_onerror(Some(&reject));
        });

        let parent = document
            .body()
            .map(web_sys::Node::from)
            .or_else(|| document.document_element().map(web_sys::Node::from))
            .ok_or_else(|| BridgeError::Script("no element to attach the script to".to_string()))?;
        parent
            .append_child(&script)
            .map_err(|err| BridgeError::Script(describe(&err)))?;

        self.scripts.borrow_mut().insert(src.to_string(), loaded);
        Ok(())
    }

    async fn script_loaded(&self, src: &str) -> BridgeResult<()> {
        let Some(loaded) = self.scripts.borrow().get(src).cloned() else {
            return Ok(());
        };
        JsFuture::from(loaded)
            .await
            .map(|_| ())
            .map_err(|_| BridgeError::Script(format!("{src} failed to load")))
    }

    async fn sleep(&self, ms: u32) {
        TimeoutFuture::new(ms).await;
    }
}

type RafClosure = Closure<dyn FnMut(f64)>;

/// `requestAnimationFrame` frame clock.
pub struct WindowFrameHost {
    window: Window,
    pending: Rc<RefCell<HashMap<i32, RafClosure>>>,
}

impl WindowFrameHost {
    /// Create a frame host over `window`.
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self {
            window,
            pending: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

impl FrameHost for WindowFrameHost {
    fn request_frame(&self, callback: FrameCallback) -> BridgeResult<FrameHandle> {
        let id_slot: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let id_for_cb = Rc::clone(&id_slot);
        let pending_for_cb = Rc::clone(&self.pending);
        let mut callback = Some(callback);

        let cb = Closure::wrap(Box::new(move |_ts: f64| {
            // Keep our own closure alive until the callback has returned.
            let _this = id_for_cb
                .get()
                .and_then(|id| pending_for_cb.borrow_mut().remove(&id));
            if let Some(callback) = callback.take() {
                callback();
            }
        }) as Box<dyn FnMut(f64)>);

        let id = self
            .window
            .request_animation_frame(cb.as_ref().unchecked_ref())
            .map_err(|err| BridgeError::Host(describe(&err)))?;
        id_slot.set(Some(id));
        self.pending.borrow_mut().insert(id, cb);
        Ok(FrameHandle(id))
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if self.pending.borrow_mut().remove(&handle.0).is_some() {
            let _ = self.window.cancel_animation_frame(handle.0);
        }
    }
}
