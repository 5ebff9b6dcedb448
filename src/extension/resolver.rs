// ! Maps changed paths to the extension they belong to
// !
// ! A watch root's direct children are extension boundaries: a file directly
// ! under a root is an extension on its own, and a directory directly under a
// ! root is a multi-file extension owning everything beneath it.

use crate::extension::types::ExtensionId;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Result of resolving a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExtension {
    /// Identifier of the owning extension
    pub id: ExtensionId,
    /// The boundary entry (direct child of `root`) defining the extension
    pub boundary: PathBuf,
    /// The watch root the boundary sits in
    pub root: PathBuf,
}

/// Resolves filesystem paths to extension identifiers
#[derive(Debug, Clone)]
pub struct ExtensionResolver {
    roots: Vec<PathBuf>,
    source_suffixes: Vec<String>,
}

impl ExtensionResolver {
    /// Create a resolver over `roots`, stripping the default `ext` suffix
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            source_suffixes: vec!["ext".to_string()],
        }
    }

    /// Replace the source suffixes stripped from identifiers (without leading dot)
    pub fn with_source_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    /// Watch roots this resolver knows about
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `path` to its extension id
    ///
    /// With `resolve_subfiles` off, only boundary entries resolve; a path deeper
    /// inside an extension yields `None`. Paths outside every root yield `None`.
    pub fn resolve(&self, path: &Path, resolve_subfiles: bool) -> Option<ExtensionId> {
        self.resolve_extension(path, resolve_subfiles)
            .map(|resolved| resolved.id)
    }

    /// Like [`resolve`](Self::resolve), also returning the boundary and root
    pub fn resolve_extension(
        &self,
        path: &Path,
        resolve_subfiles: bool,
    ) -> Option<ResolvedExtension> {
        if let Some(root) = self.root_of_boundary(path) {
            return self.resolved(root, path);
        }

        if !resolve_subfiles {
            return None;
        }

        // Walk up until we reach the entry sitting directly under a root,
        // e.g. `exts/currency/wallet/db.ext` -> `exts/currency`.
        for ancestor in path.ancestors().skip(1) {
            if let Some(root) = self.root_of_boundary(ancestor) {
                let resolved = self.resolved(root, ancestor)?;
                debug!("resolved extension {} from path {:?}", resolved.id, path);
                return Some(resolved);
            }
        }

        debug!("{:?} is outside every extension root", path);
        None
    }

    /// Whether `path` is an extension boundary (a direct child of a root)
    pub fn is_boundary(&self, path: &Path) -> bool {
        self.root_of_boundary(path).is_some()
    }

    /// Derive the id of a boundary entry relative to its root
    pub fn extension_id(&self, root: &Path, boundary: &Path) -> Option<ExtensionId> {
        let relative = boundary.strip_prefix(root).ok()?;
        let mut segments: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let last = segments.last_mut()?;
        if let Some(stem) = self.strip_source_suffix(last) {
            *last = stem;
        }
        if last.is_empty() {
            return None;
        }

        Some(ExtensionId::new(
            segments.join(&ExtensionId::DELIMITER.to_string()),
        ))
    }

    fn resolved(&self, root: &Path, boundary: &Path) -> Option<ResolvedExtension> {
        Some(ResolvedExtension {
            id: self.extension_id(root, boundary)?,
            boundary: boundary.to_path_buf(),
            root: root.to_path_buf(),
        })
    }

    fn root_of_boundary(&self, path: &Path) -> Option<&Path> {
        let parent = path.parent()?;
        self.roots
            .iter()
            .map(PathBuf::as_path)
            .find(|root| *root == parent)
    }

    fn strip_source_suffix(&self, name: &str) -> Option<String> {
        self.source_suffixes.iter().find_map(|suffix| {
            name.strip_suffix(suffix.as_str())
                .and_then(|rest| rest.strip_suffix('.'))
                .map(str::to_string)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ExtensionResolver {
        ExtensionResolver::new(vec![PathBuf::from("exts")])
    }

    #[test]
    fn test_top_level_file_is_extension() {
        let id = resolver().resolve(Path::new("exts/greet.ext"), false);
        assert_eq!(id, Some(ExtensionId::from("greet")));
    }

    #[test]
    fn test_top_level_directory_is_extension() {
        let id = resolver().resolve(Path::new("exts/pkg"), false);
        assert_eq!(id, Some(ExtensionId::from("pkg")));
    }

    #[test]
    fn test_subfile_resolves_to_owner() {
        let resolver = resolver();
        for path in [
            "exts/pkg/__boot.ext",
            "exts/pkg/helper.ext",
            "exts/pkg/db/models/user.ext",
        ] {
            assert_eq!(
                resolver.resolve(Path::new(path), true),
                Some(ExtensionId::from("pkg")),
                "{path}"
            );
        }
    }

    #[test]
    fn test_subfile_without_resolution_is_none() {
        assert_eq!(resolver().resolve(Path::new("exts/pkg/helper.ext"), false), None);
    }

    #[test]
    fn test_outside_roots_is_none() {
        let resolver = resolver();
        assert_eq!(resolver.resolve(Path::new("other/greet.ext"), true), None);
        assert_eq!(resolver.resolve(Path::new("exts"), true), None);
        assert_eq!(resolver.resolve(Path::new("/"), true), None);
    }

    #[test]
    fn test_only_known_suffixes_are_stripped() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve(Path::new("exts/notes.txt"), false),
            Some(ExtensionId::from("notes.txt"))
        );

        let resolver = resolver.with_source_suffixes(["so", "dylib"]);
        assert_eq!(
            resolver.resolve(Path::new("exts/greet.so"), false),
            Some(ExtensionId::from("greet"))
        );
    }

    #[test]
    fn test_multiple_roots() {
        let resolver = ExtensionResolver::new(vec![
            PathBuf::from("exts"),
            PathBuf::from("vendor/exts"),
        ]);
        let resolved = resolver
            .resolve_extension(Path::new("vendor/exts/pkg/a/b.ext"), true)
            .unwrap();
        assert_eq!(resolved.id, ExtensionId::from("pkg"));
        assert_eq!(resolved.boundary, PathBuf::from("vendor/exts/pkg"));
        assert_eq!(resolved.root, PathBuf::from("vendor/exts"));
    }

    #[test]
    fn test_nested_root_prefers_nearest_boundary() {
        // `exts/pkg` is a boundary of `exts`, while `exts/pkg/plugins` is itself a root
        let resolver = ExtensionResolver::new(vec![
            PathBuf::from("exts"),
            PathBuf::from("exts/pkg/plugins"),
        ]);
        assert_eq!(
            resolver.resolve(Path::new("exts/pkg/plugins/inner/x.ext"), true),
            Some(ExtensionId::from("inner"))
        );
    }
}
