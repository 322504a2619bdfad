//! Editor session wiring.
//!
//! An [`EditorSession`] owns one [`CallSurface`] and hands clones of it to the
//! config store, the event router, the render scheduler and the module loader.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::CanvasConfig;
use crate::input::RouterOptions;
use crate::loader::{LoadOutcome, LoaderOptions, ModuleHost, ModuleLoader};
use crate::scheduler::FrameHost;
use crate::{BridgeResult, CallSurface, ConfigStore, EventRouter, RenderScheduler};

/// Everything needed to build a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    /// Initial canvas settings.
    pub canvas: CanvasConfig,
    /// Engine discovery and readiness settings.
    pub loader: LoaderOptions,
    /// Input routing settings.
    pub router: RouterOptions,
}

impl EditorOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Snapshot of the bridge for debug displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    /// A real engine is bound.
    pub bound: bool,
    /// An engine load is in flight.
    pub loading: bool,
    /// The render loop is running.
    pub running: bool,
    /// Frames rendered so far.
    pub frames: u64,
    /// Engine failures swallowed so far.
    pub engine_failures: u64,
    /// Current canvas settings.
    pub config: CanvasConfig,
}

/// One editor's bridge: loader, call surface, store, router and scheduler.
pub struct EditorSession<H: ModuleHost> {
    surface: CallSurface,
    store: ConfigStore,
    router: Rc<EventRouter>,
    scheduler: RenderScheduler,
    loader: ModuleLoader<H>,
    initialized: Cell<bool>,
}

impl<H: ModuleHost + 'static> EditorSession<H> {
    /// Build an unbound session.
    #[must_use]
    pub fn new(host: H, frames: Rc<dyn FrameHost>, options: EditorOptions) -> Self {
        let surface = CallSurface::new();
        let store = ConfigStore::with_config(surface.clone(), options.canvas);
        let router = EventRouter::new(surface.clone(), store.clone(), options.router);
        let scheduler = RenderScheduler::new(surface.clone(), frames);
        let loader = ModuleLoader::new(host, surface.clone(), options.loader);
        Self {
            surface,
            store,
            router: Rc::new(router),
            scheduler,
            loader,
            initialized: Cell::new(false),
        }
    }

    /// The shared call surface.
    #[must_use]
    pub fn surface(&self) -> &CallSurface {
        &self.surface
    }

    /// The configuration store.
    #[must_use]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// The input router, shareable with host event handlers.
    #[must_use]
    pub fn router(&self) -> &Rc<EventRouter> {
        &self.router
    }

    /// The render scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    /// The module loader.
    #[must_use]
    pub fn loader(&self) -> &ModuleLoader<H> {
        &self.loader
    }

    /// Load the engine, initialize it if bound, then start rendering.
    ///
    /// Always leaves the render loop running; with no engine it simply draws
    /// nothing.
    pub async fn start(&self, target: H::Target) -> LoadOutcome {
        let outcome = self.loader.load(target).await;
        if outcome.is_bound() {
            self.on_engine_ready();
        }
        self.scheduler.start();
        outcome
    }

    /// Stop rendering. Call when the canvas unmounts.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Create the engine canvas and push every stored setting.
    ///
    /// Runs once per session; returns `false` if the engine is not bound or
    /// was already initialized.
    pub fn on_engine_ready(&self) -> bool {
        if !self.surface.is_bound() || self.initialized.replace(true) {
            return false;
        }
        let config = self.store.snapshot();
        tracing::info!("Initializing engine canvas {}x{}", config.width, config.height);
        self.surface.initialize_canvas(config.width, config.height);
        self.store.sync_engine();
        true
    }

    /// Current bridge state.
    #[must_use]
    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            bound: self.surface.is_bound(),
            loading: self.loader.is_loading(),
            running: self.scheduler.is_running(),
            frames: self.scheduler.frame_count(),
            engine_failures: self.surface.failure_count(),
            config: self.store.snapshot(),
        }
    }
}

impl<H: ModuleHost> std::fmt::Debug for EditorSession<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("surface", &self.surface)
            .field("store", &self.store)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
