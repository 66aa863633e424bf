//! # Context Wiring
//!
//! Start-up of the two long-running roles:
//!
//! ```text
//!  page realm (Firefox)        content script               background worker
//! ┌──────────────────┐      ┌───────────────────┐        ┌────────────────────┐
//! │ BridgeClient     │ bus  │ ContentScriptRelay│ native │ BackgroundWorker   │
//! │ (PostMessageBus) │─────▶│ (BusResponder +   │───────▶│ Dispatcher         │
//! │                  │◀─────│  NativeForwarder) │◀───────│ HandlerRegistry    │
//! └──────────────────┘      └───────────────────┘        └────────────────────┘
//! ```
//!
//! Every other context talks to the background worker over native
//! messaging directly.

use crate::config::{BridgeConfig, ConfigError};
use crate::dispatcher::Dispatcher;
use crate::fetch::{FetchError, Fetcher, HttpFetcher};
use crate::handlers::ExtensionVersionHandler;
use crate::native::{NativeForwarder, NativeMessaging, NativeMessenger};
use crate::registry::{HandlerRegistry, HandlerRegistryBuilder, RegistryError};
use bridge_bus::{BusResponder, PageChannel, RequestSink};
use bridge_types::ExtensionVersion;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Start-up errors
#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("could not build fetch client: {0}")]
    Fetch(#[from] FetchError),
}

/// The privileged context: owns the registry and answers every request.
pub struct BackgroundWorker {
    extension_id: String,
    native: NativeMessaging,
    dispatcher: Arc<Dispatcher>,
    fetcher: Arc<dyn Fetcher>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundWorker {
    /// Validate `config`, build the registry and start listening for native
    /// messages under `config.extension_id`.
    ///
    /// `register` adds the extension's handlers; it gets the shared fetch
    /// primitive to hand to them. `EXTENSION_VERSION` is always registered.
    pub fn start<F>(
        config: &BridgeConfig,
        native: &NativeMessaging,
        register: F,
    ) -> Result<Self, WiringError>
    where
        F: FnOnce(&mut HandlerRegistryBuilder, &Arc<dyn Fetcher>) -> Result<(), RegistryError>,
    {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.backend_url.as_str())?);
        Self::start_with_fetcher(config, native, fetcher, register)
    }

    /// [`start`](Self::start) with a caller-supplied fetch primitive.
    pub fn start_with_fetcher<F>(
        config: &BridgeConfig,
        native: &NativeMessaging,
        fetcher: Arc<dyn Fetcher>,
        register: F,
    ) -> Result<Self, WiringError>
    where
        F: FnOnce(&mut HandlerRegistryBuilder, &Arc<dyn Fetcher>) -> Result<(), RegistryError>,
    {
        config.validate()?;

        let mut builder = HandlerRegistry::builder();
        builder.register(ExtensionVersion, ExtensionVersionHandler::new())?;
        register(&mut builder, &fetcher)?;
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(builder.build())));

        let inbox = native.listen(config.extension_id.as_str(), config.native_queue);
        let native_task = dispatcher.spawn_native(inbox);

        info!(extension_id = %config.extension_id, "Background worker started");
        Ok(Self {
            extension_id: config.extension_id.clone(),
            native: native.clone(),
            dispatcher,
            fetcher,
            tasks: Mutex::new(vec![native_task]),
        })
    }

    /// Also answer bus requests posted on `page` directly.
    pub fn serve_page(&self, page: &PageChannel) {
        let sink: Arc<dyn RequestSink> = Arc::clone(&self.dispatcher) as Arc<dyn RequestSink>;
        let task = BusResponder::new(page, sink).spawn();
        self.tasks.lock().push(task);
        debug!("Background worker serving a page channel");
    }

    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Stop listening. Requests already being handled still get their
    /// reply; queued and later ones fail on the caller's side.
    pub async fn shutdown(self) {
        self.native.unlisten(&self.extension_id);
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
        info!(extension_id = %self.extension_id, "Background worker stopped");
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

/// The content-script side of the Firefox page-realm path: answers bus
/// requests by forwarding them to the background worker.
pub struct ContentScriptRelay {
    task: JoinHandle<()>,
}

impl ContentScriptRelay {
    pub fn start(page: &PageChannel, messenger: NativeMessenger, extension_id: impl Into<String>) -> Self {
        let extension_id = extension_id.into();
        info!(%extension_id, "Content-script relay started");
        let forwarder: Arc<dyn RequestSink> = Arc::new(NativeForwarder::new(messenger, extension_id));
        Self {
            task: BusResponder::new(page, forwarder).spawn(),
        }
    }

    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
        info!("Content-script relay stopped");
    }
}
