// ! Extension system types
// !
// ! Identifiers, filesystem snapshots, change-sets and the load list.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Dotted identifier naming one loadable extension (e.g. `greet`, `pkg`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionId(String);

impl ExtensionId {
    /// Delimiter between path segments of an identifier
    pub const DELIMITER: char = '.';

    /// Wrap an identifier string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExtensionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ExtensionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ExtensionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Immutable mapping of watched file path to last modification time
///
/// Two snapshots are equal when they hold the same paths with the same mtimes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<PathBuf, SystemTime>,
}

impl Snapshot {
    /// An empty snapshot
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of files in the snapshot
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no files
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Modification time recorded for `path`
    pub fn modified(&self, path: &Path) -> Option<SystemTime> {
        self.entries.get(path).copied()
    }

    /// Whether `path` is part of the snapshot
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// All recorded paths, in sorted order
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// All `(path, mtime)` entries, in sorted path order
    pub fn iter(&self) -> impl Iterator<Item = (&Path, SystemTime)> {
        self.entries.iter().map(|(p, t)| (p.as_path(), *t))
    }
}

impl FromIterator<(PathBuf, SystemTime)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (PathBuf, SystemTime)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<(PathBuf, SystemTime)> for Snapshot {
    fn extend<I: IntoIterator<Item = (PathBuf, SystemTime)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

/// Paths that changed between two consecutive snapshots
///
/// The three sets are pairwise disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Paths present now but not before
    pub created: BTreeSet<PathBuf>,
    /// Paths present before but not now
    pub deleted: BTreeSet<PathBuf>,
    /// Paths present in both with a different mtime
    pub updated: BTreeSet<PathBuf>,
}

impl ChangeSet {
    /// Diff two snapshots. Returns `None` when they are equal.
    ///
    /// An mtime that moved backwards still counts as an update.
    pub fn between(old: &Snapshot, new: &Snapshot) -> Option<Self> {
        if old == new {
            return None;
        }

        let deleted = old
            .paths()
            .filter(|p| !new.contains(p))
            .map(Path::to_path_buf)
            .collect();
        let created = new
            .paths()
            .filter(|p| !old.contains(p))
            .map(Path::to_path_buf)
            .collect();
        let updated = new
            .iter()
            .filter(|(path, mtime)| old.modified(path).is_some_and(|before| before != *mtime))
            .map(|(path, _)| path.to_path_buf())
            .collect();

        Some(Self {
            created,
            deleted,
            updated,
        })
    }

    /// Whether all three sets are empty
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }

    /// Total number of changed paths
    pub fn len(&self) -> usize {
        self.created.len() + self.deleted.len() + self.updated.len()
    }
}

/// Ordered, duplicate-free list of extensions believed loadable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadList {
    ids: Vec<ExtensionId>,
}

impl LoadList {
    /// An empty load list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` unless it is already present. Returns whether it was added.
    pub fn push(&mut self, id: ExtensionId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Whether `id` is in the list
    pub fn contains(&self, id: &ExtensionId) -> bool {
        self.ids.contains(id)
    }

    /// Number of extensions in the list
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate over the ids in order
    pub fn iter(&self) -> std::slice::Iter<'_, ExtensionId> {
        self.ids.iter()
    }

    /// The ids as a slice
    pub fn as_slice(&self) -> &[ExtensionId] {
        &self.ids
    }
}

impl FromIterator<ExtensionId> for LoadList {
    fn from_iter<I: IntoIterator<Item = ExtensionId>>(iter: I) -> Self {
        let mut list = Self::new();
        for id in iter {
            list.push(id);
        }
        list
    }
}

impl<'a> IntoIterator for &'a LoadList {
    type Item = &'a ExtensionId;
    type IntoIter = std::slice::Iter<'a, ExtensionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

impl IntoIterator for LoadList {
    type Item = ExtensionId;
    type IntoIter = std::vec::IntoIter<ExtensionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}
