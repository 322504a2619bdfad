//! Replay script format.
//!
//! A script is a JSON document with optional editor options and a list of
//! steps. Each step is one host event or one setter call:
//!
//! ```json
//! {
//!   "options": { "canvas": { "gridSize": 16 } },
//!   "steps": [
//!     { "action": "start" },
//!     { "action": "layout", "left": 200, "top": 48, "width": 1280, "height": 720 },
//!     { "action": "mouse_down", "x": 300, "y": 100, "button": 0 },
//!     { "action": "key", "key": "g" },
//!     { "action": "frames", "count": 2 }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use vectormate_core::EditorOptions;

use crate::{ReplayError, ReplayResult};

/// One scripted action. Pointer coordinates are client coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ReplayStep {
    /// Load the engine, initialize it and start the render loop.
    Start,
    /// Stop the render loop.
    Stop,
    /// Advance the frame clock.
    Frames { count: u32 },
    MouseDown { x: f64, y: f64, #[serde(default)] button: i16 },
    MouseMove { x: f64, y: f64 },
    MouseUp { x: f64, y: f64, #[serde(default)] button: i16 },
    /// Key press; `region` names the UI region it originated in.
    Key {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        alt: bool,
        #[serde(default)]
        meta: bool,
        #[serde(default)]
        shift: bool,
        #[serde(default)]
        region: Option<String>,
    },
    Wheel { x: f64, y: f64, delta_y: f64 },
    /// Render target moved or resized.
    Layout { left: f64, top: f64, width: i64, height: i64 },
    RegisterRegion { id: String },
    UnregisterRegion { id: String },
    SetSize { width: i64, height: i64 },
    SetSizeFields { width: String, height: String },
    SetBackground { color: String },
    SetShowGrid { show: bool },
    ToggleGrid,
    SetGridSize { size: i32 },
    SetGridSizeField { text: String },
    SetGridColor { color: String },
    SetZoom { zoom: f32 },
    ZoomAt { zoom: f32, x: f32, y: f32 },
}

/// A parsed replay script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayScript {
    /// Options embedded in the script, overriding the options file.
    pub options: Option<EditorOptions>,
    /// Steps in execution order.
    pub steps: Vec<ReplayStep>,
}

impl ReplayScript {
    /// Parse a script from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a script.
    pub fn from_json(json: &str) -> ReplayResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a script file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> ReplayResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
