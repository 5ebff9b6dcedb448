//! Dynamic library extension host
//!
//! Module loads extensions compiled as shared libraries from the watch roots.
//! A library is an extension when it exports the `_ext_reload_setup` symbol,
//! usually through [`export_extension!`](crate::export_extension).

use crate::core::error::{ExtensionError, ExtensionResult};
use crate::extension::config::ReloadConfig;
use crate::extension::host::{
    EntryPointPresence, Extension, ExtensionContext, ExtensionHost, Importer, shutdown_extension,
};
use crate::extension::types::ExtensionId;
use async_trait::async_trait;
use libloading::{Library, Symbol};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Symbol every extension library exports
pub const SETUP_SYMBOL: &[u8] = b"_ext_reload_setup\0";

type CreateFn = unsafe extern "C" fn() -> *mut Box<dyn Extension>;

/// Loaded library information
///
/// Fields drop in declaration order: the instance and its context go away
/// before the library that holds their code.
struct LoadedLibrary {
    /// Extension instance
    instance: Box<dyn Extension>,

    /// Framework state of the instance
    context: ExtensionContext,

    /// Path to the library file
    path: PathBuf,

    /// The dynamic library
    #[allow(dead_code)]
    library: Library,
}

/// Host loading extensions from shared libraries
pub struct DylibHost {
    /// Extension roots
    roots: Vec<PathBuf>,

    /// Library suffixes, without the leading dot
    suffixes: Vec<String>,

    /// File stem of a directory extension's entry library
    entry_stem: String,

    /// Loaded libraries
    loaded: RwLock<BTreeMap<ExtensionId, LoadedLibrary>>,
}

impl DylibHost {
    /// Create a host over `roots` using the platform's library suffix
    pub fn new(roots: Vec<PathBuf>) -> Self {
        let suffix = if cfg!(windows) {
            "dll"
        } else if cfg!(target_os = "macos") {
            "dylib"
        } else {
            "so"
        };

        Self {
            roots,
            suffixes: vec![suffix.to_string()],
            entry_stem: "__boot".to_string(),
            loaded: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a host from the watcher configuration
    pub fn from_config(config: &ReloadConfig) -> Self {
        Self {
            roots: config.extension_paths.clone(),
            suffixes: config.source_suffixes.clone(),
            entry_stem: config.entry_stem.clone(),
            loaded: RwLock::new(BTreeMap::new()),
        }
    }

    /// Find the library file of an extension
    ///
    /// Looks for `<root>/<id>.<suffix>` first, then for the entry library of a
    /// directory extension, `<root>/<id>/<entry_stem>.<suffix>`.
    pub fn find_library(&self, id: &ExtensionId) -> Option<PathBuf> {
        for root in &self.roots {
            for suffix in &self.suffixes {
                let path = root.join(format!("{id}.{suffix}"));
                if path.is_file() {
                    return Some(path);
                }

                let path = root
                    .join(id.as_str())
                    .join(format!("{}.{suffix}", self.entry_stem));
                if path.is_file() {
                    return Some(path);
                }
            }
        }

        None
    }

    /// Library path of a loaded extension
    pub async fn library_path(&self, id: &ExtensionId) -> Option<PathBuf> {
        self.loaded.read().await.get(id).map(|l| l.path.clone())
    }

    fn open(&self, id: &ExtensionId) -> ExtensionResult<(PathBuf, Library)> {
        let path = self
            .find_library(id)
            .ok_or_else(|| ExtensionError::NotFound(id.to_string()))?;

        debug!("Opening library {:?}", path);
        // SAFETY: loading a library runs its initialisers; extension roots
        // are trusted by the host that configured them.
        let library = unsafe { Library::new(&path) }.map_err(|e| {
            error!("Failed to open library {:?}: {}", path, e);
            ExtensionError::import_failed(id.as_str(), e.to_string())
        })?;

        Ok((path, library))
    }
}

/// Create an extension instance from an opened library
fn instantiate(id: &ExtensionId, library: &Library) -> ExtensionResult<Box<dyn Extension>> {
    // SAFETY: the symbol is produced by `export_extension!` with this exact signature.
    let create_fn: Symbol<CreateFn> = unsafe { library.get(SETUP_SYMBOL) }.map_err(|_| {
        ExtensionError::InvalidExtension(format!("{id} does not export _ext_reload_setup"))
    })?;

    // SAFETY: the pointer comes from `Box::into_raw` in `export_extension!`.
    unsafe {
        let raw_box = create_fn();
        if raw_box.is_null() {
            return Err(ExtensionError::load_failed(
                id.as_str(),
                "extension creation returned null",
            ));
        }
        Ok(*Box::from_raw(raw_box))
    }
}

#[async_trait]
impl Importer for DylibHost {
    async fn try_import(&self, id: &ExtensionId) -> ExtensionResult<EntryPointPresence> {
        let (_, library) = self.open(id).map_err(|e| match e {
            ExtensionError::NotFound(_) => {
                ExtensionError::import_failed(id.as_str(), "no library found")
            }
            other => other,
        })?;

        // SAFETY: the symbol is only looked up, never called.
        let present = unsafe { library.get::<CreateFn>(SETUP_SYMBOL) }.is_ok();
        Ok(if present {
            EntryPointPresence::Present
        } else {
            EntryPointPresence::Missing
        })
    }
}

#[async_trait]
impl ExtensionHost for DylibHost {
    async fn load(&self, id: &ExtensionId) -> ExtensionResult<()> {
        let mut loaded = self.loaded.write().await;
        if loaded.contains_key(id) {
            return Err(ExtensionError::AlreadyLoaded(id.to_string()));
        }

        let (path, library) = self.open(id)?;
        let mut instance = instantiate(id, &library)?;
        let mut context = ExtensionContext::new(id.clone());

        if let Err(e) = instance.setup(&mut context).await {
            drop(context);
            drop(instance);
            drop(library);
            return Err(ExtensionError::load_failed(id.as_str(), e.to_string()));
        }

        info!("Loaded extension {} from {:?}", id, path);
        loaded.insert(
            id.clone(),
            LoadedLibrary {
                instance,
                context,
                path,
                library,
            },
        );
        Ok(())
    }

    async fn unload(&self, id: &ExtensionId) -> ExtensionResult<()> {
        let mut entry = self
            .loaded
            .write()
            .await
            .remove(id)
            .ok_or_else(|| ExtensionError::NotLoaded(id.to_string()))?;

        let result = shutdown_extension(id, entry.instance.as_mut(), &mut entry.context).await;
        info!("Unloaded extension {} ({:?})", id, entry.path);
        result
    }

    async fn loaded_extensions(&self) -> BTreeSet<ExtensionId> {
        self.loaded.read().await.keys().cloned().collect()
    }
}

/// Macro to export an extension from a `cdylib` crate
#[macro_export]
macro_rules! export_extension {
    ($extension_type:ty) => {
        /// Extension creation function with C ABI
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn _ext_reload_setup()
        -> *mut Box<dyn $crate::extension::Extension> {
            let extension: Box<dyn $crate::extension::Extension> =
                Box::new(<$extension_type>::default());
            Box::into_raw(Box::new(extension))
        }
    };
}
