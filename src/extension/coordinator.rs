// ! Hot reload coordinator
// !
// ! Module consumes the poller's change-sets and turns them into host
// ! load/unload/reload calls, one change-set at a time.

use crate::core::error::{ExtensionError, ExtensionResult};
use crate::core::logging::ErrorContext;
use crate::extension::host::ExtensionHost;
use crate::extension::load_list::LoadListBuilder;
use crate::extension::poller::Poller;
use crate::extension::resolver::ExtensionResolver;
use crate::extension::types::{ChangeSet, ExtensionId, LoadList};
use crate::extension::{ExtensionEvent, SharedEventHandlers};
use futures::StreamExt;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What one change-set did to the host
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Extensions loaded
    pub loaded: Vec<ExtensionId>,
    /// Extensions unloaded
    pub unloaded: Vec<ExtensionId>,
    /// Extensions reloaded
    pub reloaded: Vec<ExtensionId>,
    /// Host calls that failed
    pub failed: Vec<(ExtensionId, ExtensionError)>,
    /// The load list rebuilt after the change-set was applied
    pub load_list: LoadList,
}

impl DispatchReport {
    /// Whether every host call succeeded
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Applies change-sets to a host
///
/// Every host call is isolated: a failure is logged with the extension id,
/// recorded in the report and never propagated.
pub struct ChangeDispatcher {
    host: Arc<dyn ExtensionHost>,
    resolver: ExtensionResolver,
    load_list: Arc<RwLock<LoadListBuilder>>,
    event_handlers: SharedEventHandlers,
}

impl ChangeDispatcher {
    /// Create a dispatcher
    pub fn new(
        host: Arc<dyn ExtensionHost>,
        resolver: ExtensionResolver,
        load_list: Arc<RwLock<LoadListBuilder>>,
    ) -> Self {
        Self {
            host,
            resolver,
            load_list,
            event_handlers: SharedEventHandlers::default(),
        }
    }

    /// Deliver lifecycle events to `handlers`
    pub fn with_event_handlers(mut self, handlers: SharedEventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Apply one change-set, then rebuild the load list
    pub async fn process(&self, changes: &ChangeSet) -> DispatchReport {
        let mut report = DispatchReport::default();
        let loaded_before = self.host.loaded_extensions().await;
        let listed_before = self.load_list.read().await.load_list().clone();

        // Extensions to load once the rebuilt list confirms they import
        let mut pending: BTreeSet<ExtensionId> = BTreeSet::new();

        for path in &changes.created {
            if let Some(id) = self.resolver.resolve(path, false) {
                info!("loading new extension {}", id);
                self.load(&id, path, &mut report).await;
            } else if let Some(resolved) = self.resolver.resolve_extension(path, true) {
                // A subfile of a loaded extension is not a new extension. A subfile of an
                // unknown one means a whole directory extension just appeared.
                if !loaded_before.contains(&resolved.id) && !listed_before.contains(&resolved.id) {
                    pending.insert(resolved.id);
                }
            } else {
                debug!("ignoring created path {:?} outside every root", path);
            }
        }

        for path in &changes.deleted {
            let Some(resolved) = self.resolver.resolve_extension(path, true) else {
                debug!("ignoring deleted path {:?} outside every root", path);
                continue;
            };
            if !self.host.is_loaded(&resolved.id).await {
                continue;
            }
            info!("unloading deleted extension {}", resolved.id);
            let unloaded = self.unload(&resolved.id, path, &mut report).await;
            // Only a subfile went away; bring the extension back if it still imports
            if unloaded && resolved.boundary != *path && resolved.boundary.exists() {
                pending.insert(resolved.id);
            }
        }

        let mut reloaded: BTreeSet<ExtensionId> = BTreeSet::new();
        for path in &changes.updated {
            let Some(id) = self.resolver.resolve(path, true) else {
                debug!("ignoring updated path {:?} outside every root", path);
                continue;
            };
            if pending.contains(&id) || !reloaded.insert(id.clone()) {
                continue;
            }
            info!("reloading extension {}", id);
            self.reload(&id, path, &mut report).await;
        }

        report.load_list = self.rebuild_load_list().await;

        for id in pending {
            if report.load_list.contains(&id) && !self.host.is_loaded(&id).await {
                info!("loading extension {} after load list rebuild", id);
                self.load(&id, Path::new(""), &mut report).await;
            }
        }

        report
    }

    async fn rebuild_load_list(&self) -> LoadList {
        let list = self
            .load_list
            .write()
            .await
            .build(self.resolver.roots())
            .await;
        self.emit(ExtensionEvent::LoadListRebuilt { size: list.len() })
            .await;
        list
    }

    async fn load(&self, id: &ExtensionId, path: &Path, report: &mut DispatchReport) {
        let result = self.host.load(id).await;
        if self.settle("load", id, path, result, report).await {
            report.loaded.push(id.clone());
            self.emit(ExtensionEvent::Loaded { id: id.clone() }).await;
        }
    }

    /// Returns whether this call took the extension down
    async fn unload(&self, id: &ExtensionId, path: &Path, report: &mut DispatchReport) -> bool {
        let result = match self.host.unload(id).await {
            // Already gone, e.g. the host unloaded it itself
            Err(ExtensionError::NotLoaded(_)) => {
                debug!("{} was already unloaded", id);
                return false;
            }
            other => other,
        };
        if !self.settle("unload", id, path, result, report).await {
            return false;
        }
        report.unloaded.push(id.clone());
        self.emit(ExtensionEvent::Unloaded { id: id.clone() }).await;
        true
    }

    async fn reload(&self, id: &ExtensionId, path: &Path, report: &mut DispatchReport) {
        let result = self.host.reload(id).await;
        if self.settle("reload", id, path, result, report).await {
            report.reloaded.push(id.clone());
            self.emit(ExtensionEvent::Reloaded { id: id.clone() }).await;
        }
    }

    /// Log and record a failed host call. Returns whether the call succeeded.
    async fn settle(
        &self,
        operation: &str,
        id: &ExtensionId,
        path: &Path,
        result: ExtensionResult<()>,
        report: &mut DispatchReport,
    ) -> bool {
        let Err(error) = result else {
            return true;
        };

        let mut context = ErrorContext::new(operation)
            .with_extension(id.as_str())
            .with_component("coordinator");
        if !path.as_os_str().is_empty() {
            context = context.with_path(path);
        }
        error.log_with_context(&context);

        self.emit(ExtensionEvent::Failed {
            id: id.clone(),
            operation: operation.to_string(),
            error: error.to_string(),
        })
        .await;
        report.failed.push((id.clone(), error));
        false
    }

    async fn emit(&self, event: ExtensionEvent) {
        let handlers = self.event_handlers.read().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }
}

/// Drives a [`Poller`] and applies every change-set it yields
///
/// Change-sets are handled strictly one after another: the next poll does not
/// start before the previous change-set, including the load list rebuild, is
/// fully applied.
pub struct HotReloadCoordinator {
    poller: Poller,
    dispatcher: ChangeDispatcher,
}

impl HotReloadCoordinator {
    /// Create a coordinator
    pub fn new(poller: Poller, dispatcher: ChangeDispatcher) -> Self {
        Self { poller, dispatcher }
    }

    /// The dispatcher applying change-sets
    pub fn dispatcher(&self) -> &ChangeDispatcher {
        &self.dispatcher
    }

    /// Run until the task driving this future is dropped
    pub async fn run(self) {
        self.run_until_cancelled(CancellationToken::new()).await;
    }

    /// Run until `token` is cancelled
    ///
    /// Cancellation is only observed while waiting for the next change-set;
    /// a change-set that is being applied always finishes first.
    pub async fn run_until_cancelled(self, token: CancellationToken) {
        let Self { poller, dispatcher } = self;
        info!("Hot reload watching {:?}", poller.roots());

        let changes = poller.watch();
        tokio::pin!(changes);

        loop {
            let change_set = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                next = changes.next() => match next {
                    Some(change_set) => change_set,
                    None => break,
                },
            };

            let report = dispatcher.process(&change_set).await;
            debug!(
                loaded = report.loaded.len(),
                unloaded = report.unloaded.len(),
                reloaded = report.reloaded.len(),
                failed = report.failed.len(),
                "change-set applied"
            );
        }

        info!("Hot reload stopped");
    }
}
