//! DOM listeners feeding the event router.

use std::rc::Rc;

use vectormate_core::{CanvasOrigin, EventRouter, KeyInput, WheelInput};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, Element, Event, EventTarget, HtmlCanvasElement, KeyboardEvent,
    MouseEvent, ResizeObserver, WheelEvent, Window,
};

use crate::error::{AppError, AppResult};

/// Attribute marking an element subtree as a UI-owned region. Its value is
/// the region id checked against the router's registry.
pub const INTERACTIVE_ATTR: &str = "data-interactive-panel";

/// Smallest canvas width applied on layout changes.
pub const MIN_CANVAS_WIDTH: f64 = 800.0;

/// Smallest canvas height applied on layout changes.
pub const MIN_CANVAS_HEIGHT: f64 = 600.0;

type EventClosure = Closure<dyn FnMut(Event)>;

struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: EventClosure,
}

/// Listeners and the resize observer attached for one editor.
///
/// Everything is detached when this value is dropped.
pub struct DomBindings {
    listeners: Vec<Listener>,
    observer: ResizeObserver,
    _on_resize: Closure<dyn FnMut()>,
}

/// On-screen origin of the canvas.
#[must_use]
pub fn canvas_origin(canvas: &HtmlCanvasElement) -> CanvasOrigin {
    let rect = canvas.get_bounding_client_rect();
    CanvasOrigin::new(rect.left(), rect.top())
}

/// Id of the nearest ancestor region of `element` that `router` has
/// registered as interactive.
///
/// Marked ancestors whose id is not registered (for example
/// `data-interactive-panel="false"`) are skipped, so an unregistered inner
/// marker never releases keys from a registered outer panel.
#[must_use]
pub fn interactive_region(element: &Element, router: &EventRouter) -> Option<String> {
    let selector = format!("[{INTERACTIVE_ATTR}]");
    let mut current = element.clone();
    loop {
        let panel = current.closest(&selector).ok()??;
        if let Some(id) = panel
            .get_attribute(INTERACTIVE_ATTR)
            .filter(|id| router.is_interactive(id))
        {
            return Some(id);
        }
        current = panel.parent_element()?;
    }
}

fn key_origin(event: &KeyboardEvent, router: &EventRouter) -> Option<String> {
    let element = event.target()?.dyn_into::<Element>().ok()?;
    interactive_region(&element, router)
}

fn key_input(event: &KeyboardEvent, router: &EventRouter) -> KeyInput {
    KeyInput {
        key: event.key(),
        ctrl: event.ctrl_key(),
        alt: event.alt_key(),
        meta: event.meta_key(),
        shift: event.shift_key(),
        origin: key_origin(event, router),
    }
}

fn mouse_handler(
    canvas: &HtmlCanvasElement,
    router: &Rc<EventRouter>,
    forward: fn(&EventRouter, &MouseEvent),
) -> EventClosure {
    let canvas = canvas.clone();
    let router = Rc::clone(router);
    Closure::wrap(Box::new(move |event: Event| {
        if let Some(event) = event.dyn_ref::<MouseEvent>() {
            router.set_origin(canvas_origin(&canvas));
            forward(&router, event);
        }
    }) as Box<dyn FnMut(Event)>)
}

impl DomBindings {
    /// Attach pointer, wheel, context-menu and resize handling to `canvas` and
    /// keyboard handling to `window`.
    ///
    /// `after_layout` runs after every size change has been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a listener cannot be attached.
    pub fn attach(
        window: &Window,
        canvas: &HtmlCanvasElement,
        router: &Rc<EventRouter>,
        after_layout: Rc<dyn Fn()>,
    ) -> AppResult<Self> {
        let mut listeners = Vec::new();
        let canvas_target: &EventTarget = canvas.as_ref();

        let pointer: [(&'static str, fn(&EventRouter, &MouseEvent)); 3] = [
            ("mousedown", |router, e| {
                router.mouse_down(f64::from(e.client_x()), f64::from(e.client_y()), e.button());
            }),
            ("mousemove", |router, e| {
                router.mouse_move(f64::from(e.client_x()), f64::from(e.client_y()));
            }),
            ("mouseup", |router, e| {
                router.mouse_up(f64::from(e.client_x()), f64::from(e.client_y()), e.button());
            }),
        ];
        for (kind, forward) in pointer {
            let closure = mouse_handler(canvas, router, forward);
            listeners.push(Self::listen(canvas_target, kind, closure)?);
        }

        let context_menu = Closure::wrap(Box::new(|event: Event| {
            event.prevent_default();
        }) as Box<dyn FnMut(Event)>);
        listeners.push(Self::listen(canvas_target, "contextmenu", context_menu)?);

        let wheel = {
            let canvas = canvas.clone();
            let router = Rc::clone(router);
            Closure::wrap(Box::new(move |event: Event| {
                let Some(event) = event.dyn_ref::<WheelEvent>() else {
                    return;
                };
                event.prevent_default();
                router.set_origin(canvas_origin(&canvas));
                router.wheel(&WheelInput {
                    client_x: f64::from(event.client_x()),
                    client_y: f64::from(event.client_y()),
                    delta_y: event.delta_y(),
                });
            }) as Box<dyn FnMut(Event)>)
        };
        let options = AddEventListenerOptions::new();
        options.set_passive(false);
        canvas_target
            .add_event_listener_with_callback_and_add_event_listener_options(
                "wheel",
                wheel.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(|err| AppError::dom(&err))?;
        listeners.push(Listener {
            target: canvas_target.clone(),
            kind: "wheel",
            closure: wheel,
        });

        let key_down = {
            let router = Rc::clone(router);
            Closure::wrap(Box::new(move |event: Event| {
                let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                    return;
                };
                if router.key_down(&key_input(event, &router)).prevents_default() {
                    event.prevent_default();
                }
            }) as Box<dyn FnMut(Event)>)
        };
        listeners.push(Self::listen(window.as_ref(), "keydown", key_down)?);

        let on_resize = {
            let canvas = canvas.clone();
            let router = Rc::clone(router);
            Closure::wrap(Box::new(move || {
                let rect = canvas.get_bounding_client_rect();
                let width = rect.width().max(MIN_CANVAS_WIDTH).round();
                let height = rect.height().max(MIN_CANVAS_HEIGHT).round();
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let (width, height) = (width as u32, height as u32);
                canvas.set_width(width);
                canvas.set_height(height);
                router.on_layout(
                    CanvasOrigin::new(rect.left(), rect.top()),
                    i64::from(width),
                    i64::from(height),
                );
                after_layout();
            }) as Box<dyn FnMut()>)
        };
        let observer = ResizeObserver::new(on_resize.as_ref().unchecked_ref())
            .map_err(|err| AppError::dom(&err))?;
        observer.observe(canvas);

        Ok(Self {
            listeners,
            observer,
            _on_resize: on_resize,
        })
    }

    fn listen(target: &EventTarget, kind: &'static str, closure: EventClosure) -> AppResult<Listener> {
        target
            .add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())
            .map_err(|err| AppError::dom(&err))?;
        Ok(Listener {
            target: target.clone(),
            kind,
            closure,
        })
    }
}

impl Drop for DomBindings {
    fn drop(&mut self) {
        self.observer.disconnect();
        for listener in &self.listeners {
            let _ = listener
                .target
                .remove_event_listener_with_callback(listener.kind, listener.closure.as_ref().unchecked_ref());
        }
    }
}
