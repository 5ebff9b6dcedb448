//! Extension change detection and hot reload
//!
//! This module watches one or more extension roots and keeps a running host in
//! sync with what is on disk. It provides:
//!
//! - Polling snapshots with forbidden-path filtering
//! - Resolution of changed files to the extension owning them
//! - A load list of every importable extension, tolerant of half-edited files
//! - A coordinator turning change-sets into load/unload/reload calls
//! - A manager wiring all of it to a configuration

pub mod config;
pub mod coordinator;
pub mod filter;
pub mod host;
pub mod load_list;
#[cfg(feature = "dylib")]
pub mod loader;
pub mod manager;
#[cfg(feature = "native-watch")]
pub mod native;
pub mod poller;
pub mod registry;
pub mod resolver;
pub mod snapshot;
pub mod types;


pub use config::{IgnoreRules, ReloadConfig};
pub use coordinator::{ChangeDispatcher, DispatchReport, HotReloadCoordinator};
pub use filter::PathFilter;
pub use host::{
    EntryPointPresence, Extension, ExtensionContext, ExtensionHost, Importer, shutdown_extension,
};
pub use load_list::LoadListBuilder;
#[cfg(feature = "dylib")]
pub use loader::DylibHost;
pub use manager::{ExtensionManager, HotReloadHandle, LoadAllOptions, LoadReport};
#[cfg(feature = "native-watch")]
pub use native::NativeTrigger;
pub use poller::{DEFAULT_POLL_INTERVAL, Poller};
pub use registry::{ExtensionFactory, RegistryHost, RegistryStats};
pub use resolver::{ExtensionResolver, ResolvedExtension};
pub use snapshot::SnapshotBuilder;
pub use types::*;

// Re-export the macro
#[cfg(feature = "dylib")]
pub use crate::export_extension;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Extension lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionEvent {
    /// Extension was loaded
    Loaded { id: ExtensionId },

    /// Extension was unloaded
    Unloaded { id: ExtensionId },

    /// Extension was reloaded
    Reloaded { id: ExtensionId },

    /// A host call for the extension failed
    Failed {
        id: ExtensionId,
        operation: String,
        error: String,
    },

    /// The load list was rebuilt
    LoadListRebuilt { size: usize },
}

/// Type alias for event handlers to reduce complexity
pub type EventHandlers = Vec<Box<dyn Fn(ExtensionEvent) + Send + Sync>>;

/// Event handlers shared between the manager and a running coordinator
pub type SharedEventHandlers = Arc<RwLock<EventHandlers>>;
