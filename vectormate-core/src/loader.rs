//! Asynchronous, idempotent engine module loading.
//!
//! The loader looks the engine factory up in the host's global registry,
//! injects the loading script when it is absent, instantiates the factory
//! against the render target and polls the instance until its runtime reports
//! ready. Only then is the wrapped table published to the [`CallSurface`].
//!
//! The script wait, the instantiation and the ready polling all share one
//! deadline of `ready_timeout_ms`.
//!
//! Any failure leaves the surface unbound. The returned future always resolves,
//! so the editor keeps working on the stub table.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::{self, Either, FutureExt, LocalBoxFuture, Shared};
use serde::{Deserialize, Serialize};

use crate::engine::EngineOps;
use crate::{BridgeError, BridgeResult, CallSurface};

/// Default global registry name of the engine factory.
pub const DEFAULT_FACTORY_NAME: &str = "VectorMateModule";

/// Default path of the engine loading script.
pub const DEFAULT_SCRIPT_PATH: &str = "/vectormate.js";

/// Options controlling engine discovery and the ready wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderOptions {
    /// Global registry slot holding the engine factory.
    pub factory_name: String,
    /// Script that registers the factory when loaded.
    pub script_path: String,
    /// Deadline for the whole load, including the script and the
    /// runtime-ready signal, in milliseconds.
    pub ready_timeout_ms: u32,
    /// Interval between runtime-ready polls, in milliseconds.
    pub poll_interval_ms: u32,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            factory_name: DEFAULT_FACTORY_NAME.to_string(),
            script_path: DEFAULT_SCRIPT_PATH.to_string(),
            ready_timeout_ms: 10_000,
            poll_interval_ms: 50,
        }
    }
}

/// An instantiated engine that may still be starting its runtime.
pub trait EngineInstance {
    /// Whether the engine runtime has signalled it is ready for calls.
    fn runtime_ready(&self) -> bool;

    /// Hand over the complete operation table.
    fn into_ops(self: Box<Self>) -> Box<dyn EngineOps>;
}

/// Factory creating engine instances bound to a render target.
#[async_trait(?Send)]
pub trait EngineFactory<T> {
    /// Instantiate the engine against `target`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Instantiate`] if the factory fails.
    async fn instantiate(&self, target: &T) -> BridgeResult<Box<dyn EngineInstance>>;
}

/// Host environment services the loader depends on.
#[async_trait(?Send)]
pub trait ModuleHost {
    /// Render target handed to the engine factory.
    type Target: Clone + 'static;

    /// Look up the engine factory in the global registry.
    fn find_factory(&self, name: &str) -> Option<Box<dyn EngineFactory<Self::Target>>>;

    /// Start loading the script at `src`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Script`] if the script cannot be injected.
    fn inject_script(&self, src: &str) -> BridgeResult<()>;

    /// Wait until the script at `src` has loaded.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Script`] if the script fails to load.
    async fn script_loaded(&self, src: &str) -> BridgeResult<()>;

    /// Suspend for roughly `ms` milliseconds.
    async fn sleep(&self, ms: u32);
}

/// Result of a load attempt. Both outcomes leave the editor usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadOutcome {
    /// The engine is bound to the call surface.
    Bound,
    /// The engine is unavailable; the stub table stays active.
    Stub,
}

impl LoadOutcome {
    /// Whether a real engine is bound.
    #[must_use]
    pub fn is_bound(self) -> bool {
        self == Self::Bound
    }
}

/// Future returned by [`ModuleLoader::load`]; clones resolve identically.
pub type LoadFuture = Shared<LocalBoxFuture<'static, LoadOutcome>>;

struct LoaderInner<H: ModuleHost> {
    host: H,
    surface: CallSurface,
    options: LoaderOptions,
    script_requested: Cell<bool>,
    in_flight: RefCell<Option<LoadFuture>>,
    instantiations: Cell<u32>,
}

/// Loads the engine module once and publishes it to the call surface.
pub struct ModuleLoader<H: ModuleHost> {
    inner: Rc<LoaderInner<H>>,
}

impl<H: ModuleHost> Clone for ModuleLoader<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: ModuleHost + 'static> ModuleLoader<H> {
    /// Create a loader publishing into `surface`.
    #[must_use]
    pub fn new(host: H, surface: CallSurface, options: LoaderOptions) -> Self {
        Self {
            inner: Rc::new(LoaderInner {
                host,
                surface,
                options,
                script_requested: Cell::new(false),
                in_flight: RefCell::new(None),
                instantiations: Cell::new(0),
            }),
        }
    }

    /// The host services this loader uses.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// Number of factory instantiations attempted so far.
    #[must_use]
    pub fn instantiations(&self) -> u32 {
        self.inner.instantiations.get()
    }

    /// Whether a load attempt is currently in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.in_flight.borrow().is_some()
    }

    /// Load the engine against `target`.
    ///
    /// Calls made while an attempt is in flight share it; calls made after a
    /// successful bind resolve immediately. A failed attempt resolves to
    /// [`LoadOutcome::Stub`] and a later call may try again.
    pub fn load(&self, target: H::Target) -> LoadFuture {
        if self.inner.surface.is_bound() {
            return future::ready(LoadOutcome::Bound).boxed_local().shared();
        }

        if let Some(pending) = self.inner.in_flight.borrow().as_ref() {
            tracing::debug!("Engine load already in flight; joining it");
            return pending.clone();
        }

        let inner = Rc::clone(&self.inner);
        let attempt = async move {
            let outcome = match Self::attempt_until_deadline(&inner, &target).await {
                Ok(engine) => {
                    inner.surface.bind(engine);
                    if inner.surface.is_bound() {
                        LoadOutcome::Bound
                    } else {
                        LoadOutcome::Stub
                    }
                }
                Err(err) => {
                    tracing::warn!("Engine unavailable, continuing with stub table: {err}");
                    LoadOutcome::Stub
                }
            };
            inner.in_flight.borrow_mut().take();
            outcome
        }
        .boxed_local()
        .shared();

        *self.inner.in_flight.borrow_mut() = Some(attempt.clone());
        attempt
    }

    async fn attempt_until_deadline(
        inner: &LoaderInner<H>,
        target: &H::Target,
    ) -> BridgeResult<Box<dyn EngineOps>> {
        let timeout_ms = inner.options.ready_timeout_ms;
        let attempt = Self::attempt(inner, target);
        let deadline = inner.host.sleep(timeout_ms);
        futures::pin_mut!(attempt);

        match future::select(attempt, deadline).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => Err(BridgeError::ReadyTimeout(timeout_ms)),
        }
    }

    async fn attempt(
        inner: &LoaderInner<H>,
        target: &H::Target,
    ) -> BridgeResult<Box<dyn EngineOps>> {
        let options = &inner.options;
        let factory = match inner.host.find_factory(&options.factory_name) {
            Some(factory) => factory,
            None => {
                if inner.script_requested.get() {
                    tracing::debug!("Engine script already requested; not injecting again");
                } else {
                    tracing::info!("Injecting engine script {}", options.script_path);
                    inner.host.inject_script(&options.script_path)?;
                    inner.script_requested.set(true);
                    inner.host.script_loaded(&options.script_path).await?;
                }
                inner
                    .host
                    .find_factory(&options.factory_name)
                    .ok_or_else(|| BridgeError::FactoryMissing(options.factory_name.clone()))?
            }
        };

        inner.instantiations.set(inner.instantiations.get() + 1);
        let instance = factory.instantiate(target).await?;

        let mut waited = 0;
        while !instance.runtime_ready() {
            if waited >= options.ready_timeout_ms {
                return Err(BridgeError::ReadyTimeout(options.ready_timeout_ms));
            }
            inner.host.sleep(options.poll_interval_ms).await;
            waited = waited.saturating_add(options.poll_interval_ms.max(1));
        }

        Ok(instance.into_ops())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, FakeModuleHost, RecordingEngine};

    fn loader(host: FakeModuleHost) -> (ModuleLoader<FakeModuleHost>, CallSurface) {
        let surface = CallSurface::new();
        let options = LoaderOptions {
            ready_timeout_ms: 100,
            poll_interval_ms: 10,
            ..LoaderOptions::default()
        };
        (ModuleLoader::new(host, surface.clone(), options), surface)
    }

    #[tokio::test]
    async fn test_binds_factory_already_in_registry() {
        let engine = RecordingEngine::new();
        let host = FakeModuleHost::with_factory(engine.clone());
        let (loader, surface) = loader(host);

        assert_eq!(loader.load(()).await, LoadOutcome::Bound);
        assert!(surface.is_bound());
        assert_eq!(loader.host().injected_scripts(), 0);

        surface.render();
        assert_eq!(engine.calls(), vec![EngineCall::Render]);
    }

    #[tokio::test]
    async fn test_concurrent_loads_instantiate_once() {
        let host = FakeModuleHost::with_factory(RecordingEngine::new());
        host.set_ready_after_polls(3);
        let (loader, _surface) = loader(host);

        let first = loader.load(());
        let second = loader.load(());
        assert!(loader.is_loading());

        let (a, b) = futures::join!(first, second);
        assert_eq!(a, LoadOutcome::Bound);
        assert_eq!(b, LoadOutcome::Bound);
        assert_eq!(loader.host().factory_instantiations(), 1);
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn test_repeated_load_after_bind_skips_factory() {
        let host = FakeModuleHost::with_factory(RecordingEngine::new());
        let (loader, _surface) = loader(host);

        loader.load(()).await;
        loader.load(()).await;

        assert_eq!(loader.host().factory_instantiations(), 1);
    }

    #[tokio::test]
    async fn test_injects_script_when_factory_missing() {
        let host = FakeModuleHost::empty();
        host.register_on_script_load(RecordingEngine::new());
        let (loader, surface) = loader(host);

        assert_eq!(loader.load(()).await, LoadOutcome::Bound);
        assert_eq!(loader.host().injected_scripts(), 1);
        assert!(surface.is_bound());
    }

    #[tokio::test]
    async fn test_missing_factory_degrades_to_stub_and_injects_once() {
        let host = FakeModuleHost::empty();
        let (loader, surface) = loader(host);

        assert_eq!(loader.load(()).await, LoadOutcome::Stub);
        assert_eq!(loader.load(()).await, LoadOutcome::Stub);

        assert!(!surface.is_bound());
        assert_eq!(loader.host().injected_scripts(), 1);
        surface.render();
    }

    #[tokio::test]
    async fn test_instantiation_failure_degrades_to_stub() {
        let host = FakeModuleHost::with_factory(RecordingEngine::new());
        host.fail_instantiation();
        let (loader, surface) = loader(host);

        assert_eq!(loader.load(()).await, LoadOutcome::Stub);
        assert!(!surface.is_bound());
    }

    #[tokio::test]
    async fn test_ready_timeout_leaves_surface_unbound() {
        let host = FakeModuleHost::with_factory(RecordingEngine::new());
        host.never_ready();
        let (loader, surface) = loader(host);

        assert_eq!(loader.load(()).await, LoadOutcome::Stub);
        assert!(!surface.is_bound());
        // Ten ready polls plus the load deadline.
        assert_eq!(loader.host().sleeps(), 11);
    }

    #[tokio::test]
    async fn test_unsettled_instantiation_hits_deadline() {
        let host = FakeModuleHost::with_factory(RecordingEngine::new());
        host.hang_instantiation();
        let (loader, surface) = loader(host);

        assert_eq!(loader.load(()).await, LoadOutcome::Stub);
        assert!(!surface.is_bound());
        assert!(!loader.is_loading());
        assert_eq!(loader.host().factory_instantiations(), 1);

        // The hung attempt is gone, so a retry starts a fresh one.
        assert_eq!(loader.load(()).await, LoadOutcome::Stub);
        assert_eq!(loader.host().factory_instantiations(), 2);
    }

    #[tokio::test]
    async fn test_unsettled_script_load_hits_deadline() {
        let host = FakeModuleHost::empty();
        host.register_on_script_load(RecordingEngine::new());
        host.hang_script_load();
        let (loader, surface) = loader(host);

        assert_eq!(loader.load(()).await, LoadOutcome::Stub);
        assert!(!surface.is_bound());
        assert!(!loader.is_loading());
        assert_eq!(loader.host().injected_scripts(), 1);
        assert_eq!(loader.host().factory_instantiations(), 0);
    }

    #[tokio::test]
    async fn test_nothing_is_published_before_ready() {
        let host = FakeModuleHost::with_factory(RecordingEngine::new());
        host.set_ready_after_polls(2);
        let (loader, surface) = loader(host);

        let pending = loader.load(());
        assert!(!surface.is_bound());
        pending.await;
        assert!(surface.is_bound());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: LoaderOptions =
            serde_json::from_str(r#"{"scriptPath":"/engine.js"}"#).unwrap();
        assert_eq!(options.script_path, "/engine.js");
        assert_eq!(options.factory_name, DEFAULT_FACTORY_NAME);
        assert_eq!(options.poll_interval_ms, 50);
    }
}
