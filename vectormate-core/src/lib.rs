//! # VectorMate Core
//!
//! Bridge between the editor shell and the compiled VectorMate canvas engine.
//! Host-agnostic: the browser crate and the replay harness plug in their own
//! module host and frame clock.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               EditorSession                 │
//! ├──────────────────────┬──────────────────────┤
//! │  ConfigStore         │  EventRouter         │
//! │  - Size, background  │  - Pointer transform │
//! │  - Grid, zoom        │  - Key routing       │
//! │  - Subscriptions     │  - Wheel zoom        │
//! ├──────────────────────┴──────────────────────┤
//! │  RenderScheduler     │  ModuleLoader        │
//! ├─────────────────────────────────────────────┤
//! │  CallSurface (stub or bound engine table)   │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod loader;
pub mod scheduler;
pub mod session;
pub mod surface;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use color::Rgba;
pub use config::{
    parse_int_field, CanvasConfig, ConfigStore, Subscription, DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM,
};
pub use engine::{EngineBinding, EngineOps, StubEngine};
pub use error::{BridgeError, BridgeResult};
pub use input::{
    CanvasOrigin, EventRouter, KeyBinding, KeyInput, KeyRoute, PointerSample, RouterOptions,
    UiAction, WheelInput,
};
pub use loader::{
    EngineFactory, EngineInstance, LoadFuture, LoadOutcome, LoaderOptions, ModuleHost,
    ModuleLoader,
};
pub use scheduler::{FrameCallback, FrameHandle, FrameHost, RenderLoopToken, RenderScheduler};
pub use session::{BridgeStatus, EditorOptions, EditorSession};
pub use surface::CallSurface;

/// Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
