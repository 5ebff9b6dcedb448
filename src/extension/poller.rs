// ! Polling filesystem watcher
// !
// ! Module diffs successive snapshots of the watch roots and turns the
// ! differences into change-sets.

use crate::extension::filter::PathFilter;
#[cfg(feature = "native-watch")]
use crate::extension::native::NativeTrigger;
use crate::extension::snapshot::SnapshotBuilder;
use crate::extension::types::{ChangeSet, Snapshot};
use futures::Stream;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Default delay between two polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A crude, timer-based watcher for file creation, modification and deletion
///
/// The initial snapshot is taken on construction, so files that already exist
/// never show up as created.
///
/// ```rust,no_run
/// use ext_reload::extension::Poller;
/// use futures::StreamExt;
/// use std::time::Duration;
///
/// # async fn demo() {
/// let poller = Poller::new(vec!["exts".into()], Duration::from_millis(500));
/// let mut changes = Box::pin(poller.watch());
/// while let Some(change_set) = changes.next().await {
///     println!("created: {:?}", change_set.created);
/// }
/// # }
/// ```
pub struct Poller {
    roots: Vec<PathBuf>,
    interval: Duration,
    builder: SnapshotBuilder,
    current: Snapshot,
    #[cfg(feature = "native-watch")]
    trigger: Option<NativeTrigger>,
}

impl Poller {
    /// Create a poller over `roots` using the default path filter
    pub fn new(roots: Vec<PathBuf>, interval: Duration) -> Self {
        Self::with_filter(roots, interval, PathFilter::default())
    }

    /// Create a poller over `roots` using `filter`
    pub fn with_filter(roots: Vec<PathBuf>, interval: Duration, filter: PathFilter) -> Self {
        let mut builder = SnapshotBuilder::new(filter);
        let current = builder.build(&roots);

        debug!("Watching {:?} every {:?}", roots, interval);
        debug!("Initial state holds {} files", current.len());

        Self {
            roots,
            interval,
            builder,
            current,
            #[cfg(feature = "native-watch")]
            trigger: None,
        }
    }

    /// Wake up early whenever the OS reports a change under the roots
    #[cfg(feature = "native-watch")]
    pub fn with_native_trigger(mut self, trigger: NativeTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Watched roots
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Delay between polls
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The snapshot the next tick is diffed against
    pub fn snapshot(&self) -> &Snapshot {
        &self.current
    }

    /// Take a new snapshot and diff it against the current one
    ///
    /// Returns `None` when nothing changed. The current snapshot is only
    /// replaced once the new one is fully built.
    pub fn tick(&mut self) -> Option<ChangeSet> {
        let next = self.builder.build(&self.roots);
        let changes = ChangeSet::between(&self.current, &next)?;
        self.current = next;
        Some(changes)
    }

    /// Lazy, infinite sequence of change-sets
    ///
    /// Each step sleeps for the interval, then ticks; empty ticks are skipped.
    /// The poller is consumed, so a sequence cannot be restarted once dropped.
    pub fn watch(self) -> impl Stream<Item = ChangeSet> + Send {
        futures::stream::unfold(self, |mut poller| async move {
            loop {
                poller.wait().await;
                if let Some(changes) = poller.tick() {
                    debug!(
                        created = changes.created.len(),
                        deleted = changes.deleted.len(),
                        updated = changes.updated.len(),
                        "yielding changes"
                    );
                    return Some((changes, poller));
                }
            }
        })
    }

    async fn wait(&mut self) {
        #[cfg(feature = "native-watch")]
        if let Some(trigger) = self.trigger.as_mut() {
            trigger.wait(self.interval).await;
            return;
        }

        tokio::time::sleep(self.interval).await;
    }
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("roots", &self.roots)
            .field("interval", &self.interval)
            .field("files", &self.current.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn touch(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_tick_without_changes_is_idempotent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("greet.ext"), "").unwrap();

        let mut poller = Poller::new(vec![dir.path().to_path_buf()], DEFAULT_POLL_INTERVAL);
        assert!(poller.tick().is_none());
        assert!(poller.tick().is_none());
        assert_eq!(poller.snapshot().len(), 1);
    }

    #[test]
    fn test_tick_reports_created_then_settles() {
        let dir = TempDir::new().unwrap();
        let mut poller = Poller::new(vec![dir.path().to_path_buf()], DEFAULT_POLL_INTERVAL);

        let path = dir.path().join("greet.ext");
        fs::write(&path, "").unwrap();

        let changes = poller.tick().unwrap();
        assert_eq!(changes.created.iter().collect::<Vec<_>>(), vec![&path]);
        assert!(changes.deleted.is_empty());
        assert!(changes.updated.is_empty());
        assert!(poller.tick().is_none());
    }

    #[test]
    fn test_tick_reports_mtime_change_in_either_direction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("greet.ext");
        fs::write(&path, "").unwrap();
        touch(&path, 2_000_000);

        let mut poller = Poller::new(vec![dir.path().to_path_buf()], DEFAULT_POLL_INTERVAL);

        touch(&path, 1_000_000);
        let changes = poller.tick().unwrap();
        assert!(changes.updated.contains(&path));
        assert!(changes.created.is_empty());
    }

    #[tokio::test]
    async fn test_watch_skips_empty_ticks() {
        let dir = TempDir::new().unwrap();
        let poller = Poller::new(vec![dir.path().to_path_buf()], Duration::from_millis(20));
        let path = dir.path().join("late.ext");

        let writer = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(90)).await;
                fs::write(path, "").unwrap();
            })
        };

        let mut changes = Box::pin(poller.watch());
        let first = changes.next().await.unwrap();
        assert!(first.created.contains(&path));
        writer.await.unwrap();
    }
}
