//! Core building blocks shared by the extension machinery
//!
//! This module contains the crate's error type and the structured logging
//! used to report failures without interrupting the watcher.

pub mod error;
pub mod logging;

// Re-export commonly used items
pub use error::{ExtensionError, ExtensionResult};
pub use logging::{ErrorContext, ErrorLogLevel, ErrorLogger};
