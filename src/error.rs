//! Unified error hierarchy for quickhealth
//!
//! Fetch-level failures are absorbed by the orchestrator (logged, then treated as
//! empty collections), so most of these variants only surface at the source
//! boundary, in configuration handling, or while exporting results.

use crate::export::ExportError;
use crate::models::SampleCategory;
use thiserror::Error;

/// Top-level error type for all quickhealth operations
#[derive(Debug, Error)]
pub enum HealthError {
    /// The sample store cannot be queried at all
    #[error("Sample source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single fetch against the sample source failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Per-request fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Query for one category failed
    #[error("Fetching {category} failed: {reason}")]
    Failed {
        category: SampleCategory,
        reason: String,
    },

    /// Beat-to-beat query for one heartbeat series failed
    #[error("Malformed heartbeat series {series}: {reason}")]
    MalformedSeries { series: String, reason: String },
}

/// Result type alias for quickhealth operations
pub type Result<T> = std::result::Result<T, HealthError>;

impl HealthError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HealthError::Fetch(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            HealthError::SourceUnavailable(_) => {
                "Health data is not available on this device.".to_string()
            }
            HealthError::Fetch(FetchError::Failed { category, .. }) => {
                format!("Could not read {} data; it is shown as no data.", category)
            }
            HealthError::Configuration(reason) => {
                format!("Invalid configuration: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error that prevents the operation
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
