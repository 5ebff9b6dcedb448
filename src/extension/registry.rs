// ! In-process extension host backed by a compiled registry
// !
// ! Extensions are registered as factories keyed by their id. Trial import
// ! runs the factory; loading additionally runs `setup` and keeps the
// ! instance until it is unloaded.

use crate::core::error::{ExtensionError, ExtensionResult};
use crate::extension::host::{
    EntryPointPresence, Extension, ExtensionContext, ExtensionHost, Importer, shutdown_extension,
};
use crate::extension::types::ExtensionId;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Creates a fresh extension instance
pub type ExtensionFactory = Arc<dyn Fn() -> ExtensionResult<Box<dyn Extension>> + Send + Sync>;

/// A registered unit: either an extension factory or plain code without an entry point
#[derive(Clone)]
enum Registration {
    Extension(ExtensionFactory),
    Module,
}

/// A loaded extension and the framework state that goes with it
struct LoadedExtension {
    instance: Box<dyn Extension>,
    context: ExtensionContext,
}

/// Host keeping extensions in a compiled registry
pub struct RegistryHost {
    registrations: RwLock<HashMap<ExtensionId, Registration>>,
    loaded: RwLock<BTreeMap<ExtensionId, LoadedExtension>>,
}

impl RegistryHost {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(HashMap::new()),
            loaded: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register an extension factory under `id`, replacing any previous one
    pub async fn register<F>(&self, id: impl Into<ExtensionId>, factory: F)
    where
        F: Fn() -> ExtensionResult<Box<dyn Extension>> + Send + Sync + 'static,
    {
        let id = id.into();
        debug!("Registering extension factory {}", id);
        self.registrations
            .write()
            .await
            .insert(id, Registration::Extension(Arc::new(factory)));
    }

    /// Register `id` as importable code that is not an extension
    pub async fn register_module(&self, id: impl Into<ExtensionId>) {
        self.registrations
            .write()
            .await
            .insert(id.into(), Registration::Module);
    }

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            registered: self.registrations.read().await.len(),
            loaded: self.loaded.read().await.len(),
        }
    }

    async fn factory(&self, id: &ExtensionId) -> ExtensionResult<ExtensionFactory> {
        match self.registrations.read().await.get(id) {
            Some(Registration::Extension(factory)) => Ok(factory.clone()),
            Some(Registration::Module) => Err(ExtensionError::InvalidExtension(format!(
                "{id} has no entry point"
            ))),
            None => Err(ExtensionError::NotFound(id.to_string())),
        }
    }
}

impl Default for RegistryHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Importer for RegistryHost {
    async fn try_import(&self, id: &ExtensionId) -> ExtensionResult<EntryPointPresence> {
        let registration = self.registrations.read().await.get(id).cloned();
        match registration {
            Some(Registration::Extension(factory)) => {
                factory().map_err(|e| ExtensionError::import_failed(id.as_str(), e.to_string()))?;
                Ok(EntryPointPresence::Present)
            }
            Some(Registration::Module) => Ok(EntryPointPresence::Missing),
            None => Err(ExtensionError::import_failed(
                id.as_str(),
                "no such module in the registry",
            )),
        }
    }
}

#[async_trait]
impl ExtensionHost for RegistryHost {
    async fn load(&self, id: &ExtensionId) -> ExtensionResult<()> {
        let mut loaded = self.loaded.write().await;
        if loaded.contains_key(id) {
            return Err(ExtensionError::AlreadyLoaded(id.to_string()));
        }

        let factory = self.factory(id).await?;
        let mut instance =
            factory().map_err(|e| ExtensionError::load_failed(id.as_str(), e.to_string()))?;
        let mut context = ExtensionContext::new(id.clone());

        if let Err(e) = instance.setup(&mut context).await {
            context.teardown();
            return Err(ExtensionError::load_failed(id.as_str(), e.to_string()));
        }

        info!("Loaded extension {} ({})", id, instance.name());
        loaded.insert(id.clone(), LoadedExtension { instance, context });
        Ok(())
    }

    async fn unload(&self, id: &ExtensionId) -> ExtensionResult<()> {
        let removed = self.loaded.write().await.remove(id);
        let Some(LoadedExtension {
            mut instance,
            mut context,
        }) = removed
        else {
            return Err(ExtensionError::NotLoaded(id.to_string()));
        };

        let result = shutdown_extension(id, instance.as_mut(), &mut context).await;
        info!("Unloaded extension {}", id);
        result
    }

    async fn loaded_extensions(&self) -> BTreeSet<ExtensionId> {
        self.loaded.read().await.keys().cloned().collect()
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of registered units
    pub registered: usize,

    /// Number of loaded extensions
    pub loaded: usize,
}
