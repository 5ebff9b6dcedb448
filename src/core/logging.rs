// ! Structured logging for extension lifecycle failures
// !
// ! Module provides structured error logging with categorization and
// ! context preservation, plus a helper to install a subscriber.

use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{Level, error, info, span, warn};

use crate::core::error::ExtensionError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLogLevel {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but the watch loop can continue
    Error,
    /// Warnings about potential issues, usually transient
    Warning,
    /// Informational error context
    Info,
}

impl From<&ExtensionError> for ErrorLogLevel {
    fn from(error: &ExtensionError) -> Self {
        match error {
            ExtensionError::Internal(_) => ErrorLogLevel::Critical,

            ExtensionError::LoadFailed { .. }
            | ExtensionError::UnloadFailed { .. }
            | ExtensionError::InvalidExtension(_)
            | ExtensionError::Config(_)
            | ExtensionError::Watch(_) => ErrorLogLevel::Error,

            // Mid-edit imports and vanishing directories are expected
            ExtensionError::ImportFailed { .. } | ExtensionError::Io(_) => ErrorLogLevel::Warning,

            ExtensionError::NotFound(_)
            | ExtensionError::AlreadyLoaded(_)
            | ExtensionError::NotLoaded(_) => ErrorLogLevel::Info,
        }
    }
}

/// Extended error context for logging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Operation being performed when the error occurred
    pub operation: String,
    /// Extension identifier, if the error concerns one extension
    pub extension: Option<String>,
    /// Filesystem path that triggered the operation
    pub path: Option<PathBuf>,
    /// Component reporting the error (poller, coordinator, ...)
    pub component: Option<String>,
    /// Additional context data
    pub extra: HashMap<String, Value>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            operation: "unknown".to_string(),
            extension: None,
            path: None,
            component: None,
            extra: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    /// Set the extension identifier
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Set the triggering path
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set component identifier
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Add extra context data
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Structured error logger
pub struct ErrorLogger;

impl ErrorLogger {
    /// Log an error with full context
    pub fn log_error(error: &ExtensionError, context: &ErrorContext) {
        let category = error.category();
        let recoverable = error.is_recoverable();
        let extension = context
            .extension
            .as_deref()
            .or_else(|| error.extension_id())
            .unwrap_or("-");

        let log_data = json!({
            "error_category": category,
            "error_recoverable": recoverable,
            "error_message": error.to_string(),
            "operation": context.operation,
            "extension": extension,
            "path": context.path.as_ref().map(|p| p.display().to_string()),
            "component": context.component,
            "extra_context": context.extra,
        });
        let details = serde_json::to_string(&log_data).unwrap_or_default();

        match ErrorLogLevel::from(error) {
            ErrorLogLevel::Critical => {
                error!(
                    target: "ext_reload_errors",
                    error_category = category,
                    operation = context.operation.as_str(),
                    extension,
                    "CRITICAL: {} - {}",
                    error,
                    details
                );
            }
            ErrorLogLevel::Error => {
                error!(
                    target: "ext_reload_errors",
                    error_category = category,
                    operation = context.operation.as_str(),
                    extension,
                    "{} - {}",
                    error,
                    details
                );
            }
            ErrorLogLevel::Warning => {
                warn!(
                    target: "ext_reload_errors",
                    error_category = category,
                    operation = context.operation.as_str(),
                    extension,
                    "{} - {}",
                    error,
                    details
                );
            }
            ErrorLogLevel::Info => {
                info!(
                    target: "ext_reload_errors",
                    error_category = category,
                    operation = context.operation.as_str(),
                    extension,
                    "{} - {}",
                    error,
                    details
                );
            }
        }
    }

    /// Create a logging span for an operation
    pub fn create_operation_span(operation: &str, context: &ErrorContext) -> tracing::Span {
        span!(
            Level::INFO,
            "ext_reload_operation",
            operation = operation,
            extension = context.extension.as_deref(),
            component = context.component.as_deref(),
        )
    }
}

impl ExtensionError {
    /// Log this error with structured context
    pub fn log_with_context(&self, context: &ErrorContext) {
        ErrorLogger::log_error(self, context);
    }

    /// Log this error with basic context
    pub fn log_error(&self, operation: &str) {
        ErrorLogger::log_error(self, &ErrorContext::new(operation));
    }
}

/// Install a `fmt` subscriber driven by `RUST_LOG`, falling back to `default_filter`.
///
/// Calling this more than once is harmless; later calls are ignored.
#[cfg(feature = "tracing-subscriber")]
pub fn init_logging(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
