// ! Load list construction
// !
// ! Module discovers extension candidates under the watch roots and keeps
// ! the ones that import and expose an entry point.

use crate::extension::filter::PathFilter;
use crate::extension::host::{EntryPointPresence, Importer};
use crate::extension::resolver::ExtensionResolver;
use crate::extension::types::{ExtensionId, LoadList};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Builds the authoritative [`LoadList`]
///
/// A candidate that fails to import is kept if it was in the previous list,
/// so an extension someone is halfway through editing stays queued for a
/// retry instead of being dropped. That check only asks "was it listed
/// before", not "did it ever import", so a list seeded through
/// [`with_previous`](Self::with_previous) can keep an extension that never
/// worked.
pub struct LoadListBuilder {
    importer: Arc<dyn Importer>,
    filter: PathFilter,
    source_suffixes: Vec<String>,
    current: LoadList,
}

impl LoadListBuilder {
    /// Create a builder importing through `importer`
    pub fn new(importer: Arc<dyn Importer>) -> Self {
        Self {
            importer,
            filter: PathFilter::default(),
            source_suffixes: vec!["ext".to_string()],
            current: LoadList::new(),
        }
    }

    /// Use `filter` for candidate discovery
    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Source suffixes stripped when naming candidates
    pub fn with_source_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.source_suffixes = suffixes;
        self
    }

    /// Seed the previous list, e.g. one persisted by the host
    pub fn with_previous(mut self, previous: LoadList) -> Self {
        self.current = previous;
        self
    }

    /// The list produced by the last build
    pub fn load_list(&self) -> &LoadList {
        &self.current
    }

    /// Replace the list wholesale without discovery (hardcoded lists)
    pub fn replace(&mut self, list: LoadList) {
        self.current = list;
    }

    /// Candidate ids: direct, accepted children of every root, in root then name order
    pub fn candidates(&self, roots: &[PathBuf]) -> Vec<ExtensionId> {
        let resolver = ExtensionResolver::new(roots.to_vec())
            .with_source_suffixes(self.source_suffixes.iter().cloned());
        let mut candidates = LoadList::new();

        for root in roots {
            if !root.is_dir() {
                warn!("Cannot build load list: {:?} is not a directory.", root);
                continue;
            }

            let children = WalkDir::new(root)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        debug!("Skipping unreadable entry under {:?}: {}", root, e);
                        None
                    }
                });

            for child in children {
                let name = child.file_name().to_string_lossy();
                if !self.filter.accept_name(&name) {
                    continue;
                }
                if let Some(id) = resolver.extension_id(root, child.path()) {
                    candidates.push(id);
                }
            }
        }

        candidates.into_iter().collect()
    }

    /// Rediscover candidates and atomically replace the load list
    pub async fn build(&mut self, roots: &[PathBuf]) -> LoadList {
        let mut next = LoadList::new();

        for id in self.candidates(roots) {
            match self.importer.try_import(&id).await {
                Ok(EntryPointPresence::Present) => {
                    next.push(id);
                }
                Ok(EntryPointPresence::Missing) => {
                    debug!("{} has no entry point, not an extension", id);
                }
                Err(e) if self.current.contains(&id) => {
                    warn!(
                        "{} has failed to load, but it will be retained in the load list \
                         because it was previously included: {}",
                        id, e
                    );
                    next.push(id);
                }
                Err(e) => {
                    error!("Excluding {} from the load list: {}", id, e);
                }
            }
        }

        debug!("Load list rebuilt with {} extension(s)", next.len());
        self.current = next;
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ExtensionError, ExtensionResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct ScriptedImporter {
        outcomes: Mutex<HashMap<String, ExtensionResult<EntryPointPresence>>>,
    }

    impl ScriptedImporter {
        fn set(&self, id: &str, outcome: ExtensionResult<EntryPointPresence>) {
            self.outcomes
                .lock()
                .unwrap()
                .insert(id.to_string(), outcome);
        }
    }

    #[async_trait]
    impl Importer for ScriptedImporter {
        async fn try_import(&self, id: &ExtensionId) -> ExtensionResult<EntryPointPresence> {
            self.outcomes
                .lock()
                .unwrap()
                .get(id.as_str())
                .cloned()
                .unwrap_or(Ok(EntryPointPresence::Present))
        }
    }

    fn ids(list: &LoadList) -> Vec<&str> {
        list.iter().map(ExtensionId::as_str).collect()
    }

    #[test]
    fn test_candidates_are_direct_children() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join("greet.ext"), "").unwrap();
        fs::write(root.join("notes.log"), "").unwrap();
        fs::create_dir_all(root.join("pkg/inner")).unwrap();
        fs::write(root.join("pkg/inner/deep.ext"), "").unwrap();
        fs::create_dir_all(root.join("__pycache__")).unwrap();

        let builder = LoadListBuilder::new(Arc::new(ScriptedImporter::default()));
        let candidates = builder.candidates(&[root]);

        assert_eq!(
            candidates,
            vec![ExtensionId::from("greet"), ExtensionId::from("pkg")]
        );
    }

    #[tokio::test]
    async fn test_entry_point_required() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("greet.ext"), "").unwrap();
        fs::write(dir.path().join("util.ext"), "").unwrap();

        let importer = Arc::new(ScriptedImporter::default());
        importer.set("util", Ok(EntryPointPresence::Missing));

        let mut builder = LoadListBuilder::new(importer);
        let list = builder.build(&[dir.path().to_path_buf()]).await;
        assert_eq!(ids(&list), vec!["greet"]);
    }

    #[tokio::test]
    async fn test_previously_listed_extension_is_retained() {
        let dir = TempDir::new().unwrap();
        let roots = vec![dir.path().to_path_buf()];
        fs::write(dir.path().join("greet.ext"), "").unwrap();

        let importer = Arc::new(ScriptedImporter::default());
        let mut builder = LoadListBuilder::new(importer.clone());
        assert_eq!(ids(&builder.build(&roots).await), vec!["greet"]);

        importer.set("greet", Err(ExtensionError::import_failed("greet", "syntax")));
        assert_eq!(ids(&builder.build(&roots).await), vec!["greet"]);
        // retention carries across consecutive failing builds
        assert_eq!(ids(&builder.build(&roots).await), vec!["greet"]);
    }

    #[tokio::test]
    async fn test_missing_root_yields_empty_list() {
        let dir = TempDir::new().unwrap();
        let mut builder = LoadListBuilder::new(Arc::new(ScriptedImporter::default()));
        let list = builder.build(&[dir.path().join("nope")]).await;
        assert!(list.is_empty());
    }
}
