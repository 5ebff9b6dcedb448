// ! Native filesystem notifications used as a poll trigger
// !
// ! The poller still computes every change-set by diffing snapshots; native
// ! events only shorten the wait before the next tick.

use crate::core::error::{ExtensionError, ExtensionResult};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Delay after the first native event so a burst of writes lands in one tick
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(50);

/// Wakes the poller when the OS reports activity under a watch root
pub struct NativeTrigger {
    // Kept alive for as long as the trigger exists
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<()>,
    settle: Duration,
}

impl NativeTrigger {
    /// Watch every existing root recursively
    ///
    /// Roots that do not exist yet are skipped with a warning; the poller still
    /// picks them up on its regular interval.
    pub fn new(roots: &[PathBuf]) -> ExtensionResult<Self> {
        let (tx, events) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(_) => {
                    // The receiver is gone once the trigger is dropped
                    let _ = tx.send(());
                }
                Err(e) => error!("Native watch error: {}", e),
            }
        })
        .map_err(|e| ExtensionError::watch(format!("Failed to create watcher: {e}")))?;

        for root in roots {
            if !root.is_dir() {
                warn!("Not watching missing root {:?} natively", root);
                continue;
            }
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| ExtensionError::watch(format!("Failed to watch {root:?}: {e}")))?;
            debug!("Native watch on {:?}", root);
        }

        Ok(Self {
            _watcher: watcher,
            events,
            settle: DEFAULT_SETTLE,
        })
    }

    /// Set the settle delay
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Wait for a native event or the fallback interval, whichever comes first
    pub async fn wait(&mut self, fallback: Duration) {
        tokio::select! {
            received = self.events.recv() => {
                if received.is_some() {
                    tokio::time::sleep(self.settle).await;
                    while self.events.try_recv().is_ok() {}
                } else {
                    tokio::time::sleep(fallback).await;
                }
            }
            _ = tokio::time::sleep(fallback) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::Poller;
    use futures::StreamExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_native_trigger_wakes_poller_early() {
        let dir = TempDir::new().unwrap();
        let roots = vec![dir.path().to_path_buf()];
        let trigger = NativeTrigger::new(&roots).unwrap();
        let poller =
            Poller::new(roots, Duration::from_secs(30)).with_native_trigger(trigger);

        let path = dir.path().join("greet.ext");
        let writer = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                std::fs::write(path, "").unwrap();
            })
        };

        let mut changes = Box::pin(poller.watch());
        let first = tokio::time::timeout(Duration::from_secs(10), changes.next())
            .await
            .unwrap()
            .unwrap();
        assert!(first.created.contains(&path));
        writer.await.unwrap();
    }
}
