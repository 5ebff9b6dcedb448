// ! Host collaborator interfaces and the extension lifecycle
// !
// ! The host owns the actual code-loading primitive. This module only defines
// ! what the watcher needs from it, plus the lifecycle contract extensions
// ! implement.

use crate::core::error::{ExtensionError, ExtensionResult};
use crate::extension::types::ExtensionId;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Outcome of a successful trial import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPointPresence {
    /// The unit exposes the registration hook; it is an extension
    Present,
    /// The unit imported fine but is incidental code, not an extension
    Missing,
}

/// Trial-imports candidates to see whether they are extensions
#[async_trait]
pub trait Importer: Send + Sync {
    /// Import `id` without registering it
    ///
    /// An `Err` means the unit could not be imported at all (e.g. it is
    /// mid-edit); `Ok(Missing)` means it imported but has no entry point.
    async fn try_import(&self, id: &ExtensionId) -> ExtensionResult<EntryPointPresence>;
}

/// Load, unload and reload extensions in a running host
#[async_trait]
pub trait ExtensionHost: Importer {
    /// Load and set up an extension
    async fn load(&self, id: &ExtensionId) -> ExtensionResult<()>;

    /// Tear down and unload an extension
    async fn unload(&self, id: &ExtensionId) -> ExtensionResult<()>;

    /// Reload an extension
    ///
    /// Defaults to unload-then-load; an extension that was not loaded is
    /// simply loaded.
    async fn reload(&self, id: &ExtensionId) -> ExtensionResult<()> {
        match self.unload(id).await {
            Ok(()) | Err(ExtensionError::NotLoaded(_)) => {}
            Err(e) => return Err(e),
        }
        self.load(id).await
    }

    /// Identifiers of the extensions currently loaded
    async fn loaded_extensions(&self) -> BTreeSet<ExtensionId>;

    /// Whether `id` is currently loaded
    async fn is_loaded(&self, id: &ExtensionId) -> bool {
        self.loaded_extensions().await.contains(id)
    }
}

/// Lifecycle implemented by every extension
#[async_trait]
pub trait Extension: Send + Sync {
    /// Human readable extension name
    fn name(&self) -> &str;

    /// Called once after the extension is loaded
    async fn setup(&mut self, _ctx: &mut ExtensionContext) -> ExtensionResult<()> {
        Ok(())
    }

    /// Custom cleanup, called when the extension is unloaded
    ///
    /// The framework's own teardown runs regardless of what this does.
    async fn on_unload(&mut self) -> ExtensionResult<()> {
        Ok(())
    }
}

/// Framework-owned state of one loaded extension instance
///
/// Background work started through the context is cancelled on unload, so an
/// extension cannot leak tasks past its own lifetime.
#[derive(Debug)]
pub struct ExtensionContext {
    id: ExtensionId,
    tasks: Vec<JoinHandle<()>>,
}

impl ExtensionContext {
    /// Context for the extension `id`
    pub fn new(id: ExtensionId) -> Self {
        Self {
            id,
            tasks: Vec::new(),
        }
    }

    /// The extension this context belongs to
    pub fn id(&self) -> &ExtensionId {
        &self.id
    }

    /// Number of background tasks still registered
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Run `future` in the background for as long as the extension is loaded
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(future));
    }

    /// Run `job` every `interval` for as long as the extension is loaded
    ///
    /// The first run happens after one full interval.
    pub fn every<F, Fut>(&mut self, interval: Duration, mut job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                job().await;
            }
        });
    }

    /// Cancel everything registered through this context
    pub fn teardown(&mut self) {
        if !self.tasks.is_empty() {
            debug!("cancelling {} task(s) of {}", self.tasks.len(), self.id);
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for ExtensionContext {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Run both halves of an unload: framework teardown, then the extension's hook
///
/// Teardown always happens, even if the hook fails; the hook's error is
/// returned afterwards.
pub async fn shutdown_extension(
    id: &ExtensionId,
    extension: &mut dyn Extension,
    ctx: &mut ExtensionContext,
) -> ExtensionResult<()> {
    ctx.teardown();
    extension
        .on_unload()
        .await
        .map_err(|e| ExtensionError::unload_failed(id.as_str(), e.to_string()))
}
