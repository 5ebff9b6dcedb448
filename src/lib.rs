// Copyright (c) 2025 ext-reload Contributors
// SPDX-License-Identifier: MIT

//! # ext-reload
//!
//! Change detection and extension resolution for hot-reloading extensions
//! in a long-running host process.
//!
//! The crate polls one or more extension roots, turns filesystem changes into
//! change-sets, maps every changed path to the extension that owns it and asks
//! the host to load, unload or reload that extension. Alongside it keeps a load
//! list of every importable extension that tolerates half-edited files.
// !
//! ## Features
//!
//! - **Polling snapshots**: Portable mtime-based change detection with forbidden-path filtering
//! - **Boundary resolution**: Files and directories directly under a root are extensions
//! - **Resilient load list**: Extensions that break mid-edit stay queued for a retry
//! - **Failure isolation**: A failing extension never stops the watcher
//! - **Native wake-ups**: Optional OS notifications via the `native-watch` feature
//! - **Dynamic libraries**: Optional shared-library host via the `dylib` feature
// !
//! ## Quick Start
//!
//! ```rust,no_run
//! use ext_reload::prelude::*;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Extension for Greeter {
//!     fn name(&self) -> &str {
//!         "greet"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ExtensionResult<()> {
//!     let host = Arc::new(RegistryHost::new());
//!     host.register("greet", || Ok(Box::new(Greeter) as Box<dyn Extension>))
//!         .await;
//!
//!     let config = ReloadConfig::for_path("./exts").with_hot_reload();
//!     let manager = ExtensionManager::new(config, host)?;
//!
//!     manager.load_all(LoadAllOptions::default()).await;
//!     let handle = manager.start_hot_reload().await?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.shutdown().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`core`]: Error types and structured error logging
//! - [`extension`]: Snapshots, polling, resolution, load list, hosts and the coordinator

pub mod core;
pub mod extension;

// Re-export commonly used types for convenience
pub use core::error::{ExtensionError, ExtensionResult};
#[cfg(feature = "tracing-subscriber")]
pub use core::logging::init_logging;

/// Prelude module for convenient imports
///
/// Module re-exports the most commonly used types and traits for easy access.
/// Use `use ext_reload::prelude::*;` to import everything you need.
pub mod prelude {
    // Core types
    pub use crate::core::error::{ExtensionError, ExtensionResult};
    pub use crate::core::logging::{ErrorContext, ErrorLogger};

    // Watching and resolution
    pub use crate::extension::{
        ChangeSet, ExtensionId, ExtensionResolver, LoadList, PathFilter, Poller, Snapshot,
    };

    // Hosts and lifecycle
    pub use crate::extension::{
        EntryPointPresence, Extension, ExtensionContext, ExtensionEvent, ExtensionHost, Importer,
        RegistryHost,
    };

    // Orchestration
    pub use crate::extension::{
        ExtensionManager, HotReloadCoordinator, HotReloadHandle, LoadAllOptions, LoadListBuilder,
        ReloadConfig,
    };

    #[cfg(feature = "dylib")]
    pub use crate::extension::DylibHost;

    // Essential external types
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
