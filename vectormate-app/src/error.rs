//! Errors raised while wiring the editor into the page.

use thiserror::Error;
use vectormate_core::BridgeError;
use wasm_bindgen::JsValue;

/// Result type for browser setup.
pub type AppResult<T> = Result<T, AppError>;

/// Errors that can occur while setting up the browser host.
#[derive(Debug, Error)]
pub enum AppError {
    /// No global `window`.
    #[error("No window object")]
    NoWindow,

    /// The window has no document.
    #[error("No document object")]
    NoDocument,

    /// No element with the requested id.
    #[error("Canvas element '{0}' not found")]
    CanvasNotFound(String),

    /// The element exists but is not a `<canvas>`.
    #[error("Element '{0}' is not a canvas")]
    NotACanvas(String),

    /// A DOM call threw.
    #[error("DOM error: {0}")]
    Dom(String),

    /// Bridge-level failure (options, color parsing).
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl AppError {
    /// Wrap a thrown JS value.
    #[must_use]
    pub fn dom(err: &JsValue) -> Self {
        Self::Dom(describe(err))
    }
}

impl From<AppError> for JsValue {
    fn from(err: AppError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Best-effort text for a thrown JS value.
pub(crate) fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(value, &JsValue::from_str("message"))
                .ok()
                .and_then(|message| message.as_string())
        })
        .unwrap_or_else(|| format!("{value:?}"))
}
