// ! Error types for extension lifecycle management
// !
// ! Module defines all error types raised while watching extension roots,
// ! importing candidates and driving host load/unload/reload calls.

use thiserror::Error;

/// The main error type for the crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    /// Trial import of an extension failed (e.g. a half-written file)
    #[error("Failed to import extension {id}: {reason}")]
    ImportFailed { id: String, reason: String },

    /// The host could not load an extension
    #[error("Failed to load extension {id}: {reason}")]
    LoadFailed { id: String, reason: String },

    /// The host could not unload an extension
    #[error("Failed to unload extension {id}: {reason}")]
    UnloadFailed { id: String, reason: String },

    /// No extension with this identifier is known to the host
    #[error("Extension not found: {0}")]
    NotFound(String),

    /// The extension is already loaded
    #[error("Extension already loaded: {0}")]
    AlreadyLoaded(String),

    /// The extension is not currently loaded
    #[error("Extension not loaded: {0}")]
    NotLoaded(String),

    /// The candidate is not a valid extension for this host
    #[error("Invalid extension: {0}")]
    InvalidExtension(String),

    /// I/O errors from the standard library
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration could not be parsed or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// The filesystem watcher could not be set up
    #[error("Watch error: {0}")]
    Watch(String),

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ExtensionError {
    fn from(err: std::io::Error) -> Self {
        ExtensionError::Io(err.to_string())
    }
}

impl From<walkdir::Error> for ExtensionError {
    fn from(err: walkdir::Error) -> Self {
        ExtensionError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ExtensionError {
    fn from(err: serde_yaml::Error) -> Self {
        ExtensionError::Config(err.to_string())
    }
}

/// Result type alias for extension operations
pub type ExtensionResult<T> = Result<T, ExtensionError>;

impl ExtensionError {
    /// Create a new import error
    pub fn import_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ImportFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a new load error
    pub fn load_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a new unload error
    pub fn unload_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnloadFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new watch error
    pub fn watch<S: Into<String>>(message: S) -> Self {
        Self::Watch(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// The extension this error is about, if any
    pub fn extension_id(&self) -> Option<&str> {
        match self {
            ExtensionError::ImportFailed { id, .. }
            | ExtensionError::LoadFailed { id, .. }
            | ExtensionError::UnloadFailed { id, .. } => Some(id),
            ExtensionError::NotFound(id)
            | ExtensionError::AlreadyLoaded(id)
            | ExtensionError::NotLoaded(id) => Some(id),
            _ => None,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors are expected to go away on their own, usually once
    /// whoever is editing an extension finishes saving it.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ExtensionError::ImportFailed { .. } => true,
            ExtensionError::LoadFailed { .. } => true,
            ExtensionError::UnloadFailed { .. } => true,
            ExtensionError::NotFound(_) => false,
            ExtensionError::AlreadyLoaded(_) => true,
            ExtensionError::NotLoaded(_) => true,
            ExtensionError::InvalidExtension(_) => false,
            ExtensionError::Io(_) => true,
            ExtensionError::Config(_) => false,
            ExtensionError::Watch(_) => false,
            ExtensionError::Internal(_) => false,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ExtensionError::ImportFailed { .. } => "import",
            ExtensionError::LoadFailed { .. } => "load",
            ExtensionError::UnloadFailed { .. } => "unload",
            ExtensionError::NotFound(_) => "not_found",
            ExtensionError::AlreadyLoaded(_) => "state",
            ExtensionError::NotLoaded(_) => "state",
            ExtensionError::InvalidExtension(_) => "validation",
            ExtensionError::Io(_) => "io",
            ExtensionError::Config(_) => "config",
            ExtensionError::Watch(_) => "watch",
            ExtensionError::Internal(_) => "internal",
        }
    }
}
