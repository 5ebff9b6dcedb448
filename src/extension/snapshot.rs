// ! Filesystem snapshots of the watch roots

use crate::extension::filter::PathFilter;
use crate::extension::types::Snapshot;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Builds [`Snapshot`]s of every accepted file under a set of roots
///
/// A root that is missing or unreadable contributes nothing. The warning for it
/// is logged once when it goes missing, not on every poll.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    filter: PathFilter,
    missing_roots: HashSet<PathBuf>,
}

impl SnapshotBuilder {
    /// Create a builder using `filter`
    pub fn new(filter: PathFilter) -> Self {
        Self {
            filter,
            missing_roots: HashSet::new(),
        }
    }

    /// The path filter applied to entries
    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    /// Roots that were missing during the last build
    pub fn missing_roots(&self) -> impl Iterator<Item = &Path> {
        self.missing_roots.iter().map(PathBuf::as_path)
    }

    /// Scan all roots and record the mtime of every accepted file
    pub fn build(&mut self, roots: &[PathBuf]) -> Snapshot {
        let mut snapshot = Snapshot::empty();

        for root in roots {
            if !root.is_dir() {
                if self.missing_roots.insert(root.clone()) {
                    warn!(
                        "Watch root {:?} is missing or not a directory, treating it as empty",
                        root
                    );
                }
                continue;
            }
            if self.missing_roots.remove(root) {
                info!("Watch root {:?} is available again", root);
            }

            snapshot.extend(self.scan_root(root));
        }

        snapshot
    }

    fn scan_root(&self, root: &Path) -> Vec<(PathBuf, SystemTime)> {
        let mut entries = Vec::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| self.accepts_entry(root, entry));

        for entry in walker {
            // Entries can vanish between listing and stat; skip them.
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata().map(|m| m.modified()) {
                Ok(Ok(modified)) => entries.push((entry.into_path(), modified)),
                Ok(Err(e)) => debug!("No mtime for {:?}: {}", entry.path(), e),
                Err(e) => debug!("Cannot stat {:?}: {}", entry.path(), e),
            }
        }

        entries
    }

    fn accepts_entry(&self, root: &Path, entry: &DirEntry) -> bool {
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        self.filter.accept(relative)
    }
}
