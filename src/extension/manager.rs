// ! High-level extension manager
// !
// ! Module wires configuration, a host, the load list and the hot reload
// ! coordinator together.

use crate::core::error::{ExtensionError, ExtensionResult};
use crate::core::logging::{ErrorContext, ErrorLogger};
use crate::extension::coordinator::{ChangeDispatcher, HotReloadCoordinator};
use crate::extension::filter::PathFilter;
use crate::extension::host::{ExtensionHost, Importer};
use crate::extension::load_list::LoadListBuilder;
#[cfg(feature = "native-watch")]
use crate::extension::native::NativeTrigger;
use crate::extension::poller::Poller;
use crate::extension::resolver::ExtensionResolver;
use crate::extension::types::{ExtensionId, LoadList};
use crate::extension::{ExtensionEvent, ReloadConfig, SharedEventHandlers};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Options for [`ExtensionManager::load_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadAllOptions {
    /// Reload extensions that are already loaded instead of skipping them
    pub reload: bool,

    /// Leave out the configured `included_extensions`
    pub exclude_included: bool,
}

/// Outcome of [`ExtensionManager::load_all`]
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Extensions loaded
    pub loaded: Vec<ExtensionId>,

    /// Extensions reloaded
    pub reloaded: Vec<ExtensionId>,

    /// Extensions left alone because they were already loaded
    pub skipped: Vec<ExtensionId>,

    /// Extensions whose load or reload failed
    pub failed: Vec<(ExtensionId, ExtensionError)>,
}

impl LoadReport {
    /// Whether every extension came up
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Handle to a running hot reload task
///
/// Dropping the handle leaves the task running; call
/// [`shutdown`](Self::shutdown) to stop it.
#[derive(Debug)]
pub struct HotReloadHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl HotReloadHandle {
    /// Whether the coordinator task is still alive
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop watching and wait for the change-set in flight to finish
    pub async fn shutdown(self) -> ExtensionResult<()> {
        self.token.cancel();
        self.task
            .await
            .map_err(|e| ExtensionError::internal(format!("hot reload task failed: {e}")))
    }
}

/// Extension manager
pub struct ExtensionManager<H: ExtensionHost + 'static> {
    /// Watcher configuration
    config: ReloadConfig,

    /// Host doing the actual loading
    host: Arc<H>,

    /// Load list shared with the coordinator
    load_list: Arc<RwLock<LoadListBuilder>>,

    /// Event handlers
    event_handlers: SharedEventHandlers,

    /// Cancellation token of the running coordinator, if any
    hot_reload: Mutex<Option<CancellationToken>>,
}

impl<H: ExtensionHost + 'static> ExtensionManager<H> {
    /// Create a manager for `host`, validating `config`
    pub fn new(config: ReloadConfig, host: Arc<H>) -> ExtensionResult<Self> {
        config.validate()?;

        let importer: Arc<dyn Importer> = host.clone();
        let mut builder = LoadListBuilder::new(importer)
            .with_filter(PathFilter::from_rules(&config.ignore))
            .with_source_suffixes(config.source_suffixes.clone());
        if let Some(ids) = config.load_list.as_ref() {
            builder.replace(ids.iter().map(ExtensionId::new).collect());
        }

        Ok(Self {
            config,
            host,
            load_list: Arc::new(RwLock::new(builder)),
            event_handlers: Arc::new(RwLock::new(Vec::new())),
            hot_reload: Mutex::new(None),
        })
    }

    /// The configuration in use
    pub fn config(&self) -> &ReloadConfig {
        &self.config
    }

    /// The host extensions are loaded into
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// The load list as of the last rebuild
    pub async fn load_list(&self) -> LoadList {
        self.load_list.read().await.load_list().clone()
    }

    /// Rebuild the load list, or take it verbatim from configuration when hardcoded
    pub async fn rebuild_load_list(&self) -> LoadList {
        let list = if self.config.is_hardcoding_load_list() {
            let list: LoadList = self
                .config
                .load_list
                .iter()
                .flatten()
                .map(ExtensionId::new)
                .collect();
            self.load_list.write().await.replace(list.clone());
            list
        } else {
            self.load_list
                .write()
                .await
                .build(&self.config.extension_paths)
                .await
        };

        info!("Load list holds {} extension(s)", list.len());
        self.emit_event(ExtensionEvent::LoadListRebuilt { size: list.len() })
            .await;
        list
    }

    /// Rebuild the load list and bring every extension on it up
    ///
    /// Failures are isolated per extension and collected in the report.
    pub async fn load_all(&self, options: LoadAllOptions) -> LoadReport {
        let mut ids = self.rebuild_load_list().await;
        if !options.exclude_included {
            for id in &self.config.included_extensions {
                ids.push(ExtensionId::new(id.as_str()));
            }
        }

        let mut report = LoadReport::default();
        for id in ids {
            let loaded = self.host.is_loaded(&id).await;
            if loaded && !options.reload {
                debug!("{} is already loaded", id);
                report.skipped.push(id);
                continue;
            }

            let (operation, result) = if loaded {
                ("reload", self.host.reload(&id).await)
            } else {
                ("load", self.host.load(&id).await)
            };

            match result {
                Ok(()) if loaded => {
                    self.emit_event(ExtensionEvent::Reloaded { id: id.clone() })
                        .await;
                    report.reloaded.push(id);
                }
                Ok(()) => {
                    self.emit_event(ExtensionEvent::Loaded { id: id.clone() })
                        .await;
                    report.loaded.push(id);
                }
                Err(e) => {
                    let context = ErrorContext::new(operation)
                        .with_extension(id.as_str())
                        .with_component("manager");
                    ErrorLogger::log_error(&e, &context);
                    self.emit_event(ExtensionEvent::Failed {
                        id: id.clone(),
                        operation: operation.to_string(),
                        error: e.to_string(),
                    })
                    .await;
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            "Loaded {} extension(s), reloaded {}, {} failed",
            report.loaded.len(),
            report.reloaded.len(),
            report.failed.len()
        );
        report
    }

    /// Start watching the extension roots on a background task
    ///
    /// Requires `hot_reload` and no hardcoded load list. Only one coordinator
    /// may run at a time.
    pub async fn start_hot_reload(&self) -> ExtensionResult<HotReloadHandle> {
        if !self.config.hot_reload {
            return Err(ExtensionError::config("hot reload is disabled"));
        }
        if self.config.is_hardcoding_load_list() {
            return Err(ExtensionError::config(
                "hot reload is unavailable with a hardcoded load list",
            ));
        }

        let mut active = self.hot_reload.lock().await;
        if active.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return Err(ExtensionError::AlreadyLoaded("hot reload".to_string()));
        }

        let coordinator = HotReloadCoordinator::new(self.poller()?, self.dispatcher());
        let token = CancellationToken::new();
        let task = tokio::spawn(coordinator.run_until_cancelled(token.clone()));
        *active = Some(token.clone());

        info!("Hot reload started");
        Ok(HotReloadHandle { token, task })
    }

    /// Dispatcher sharing this manager's host, load list and event handlers
    pub fn dispatcher(&self) -> ChangeDispatcher {
        let host: Arc<dyn ExtensionHost> = self.host.clone();
        let resolver = ExtensionResolver::new(self.config.extension_paths.clone())
            .with_source_suffixes(self.config.source_suffixes.iter().cloned());
        ChangeDispatcher::new(host, resolver, self.load_list.clone())
            .with_event_handlers(self.event_handlers.clone())
    }

    fn poller(&self) -> ExtensionResult<Poller> {
        let roots = self.config.extension_paths.clone();
        let filter = PathFilter::from_rules(&self.config.ignore);
        let poller = Poller::with_filter(roots, self.config.poll_interval(), filter);

        if !self.config.native_watch {
            return Ok(poller);
        }

        #[cfg(feature = "native-watch")]
        let poller = poller.with_native_trigger(NativeTrigger::new(&self.config.extension_paths)?);

        #[cfg(not(feature = "native-watch"))]
        tracing::warn!("native_watch is set but the native-watch feature is disabled, polling only");

        Ok(poller)
    }

    /// Add an event handler
    pub async fn on_event<F>(&self, handler: F)
    where
        F: Fn(ExtensionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.write().await.push(Box::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExtensionEvent) {
        let handlers = self.event_handlers.read().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }
}
