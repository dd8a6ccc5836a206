//! Typed failures of the workbench lifecycle (boot, load, run).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkbenchError>;

/// Errors reported by workbench operations.
///
/// Every variant maps to a short status line (see [`WorkbenchError::status_line`]);
/// the `Display` text is the detailed message shown in the output pane.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkbenchError {
    #[error("Engine boot failed: {0}")]
    EngineBoot(String),

    #[error("Engine boot timed out after {secs}s")]
    EngineBootTimeout { secs: u64 },

    /// Manifest request failed; `status` is None for transport failures.
    #[error("Manifest fetch failed ({}) for {url}: {message}", status_text(.status))]
    ManifestFetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Manifest at {url} is not valid: {message}")]
    ManifestParse { url: String, message: String },

    #[error("Failed to register view '{view}': {message}")]
    ViewRegistration { view: String, message: String },

    #[error("Dataset load timed out after {secs}s")]
    LoadTimeout { secs: u64 },

    #[error("Dataset not loaded")]
    NotLoaded,

    #[error("{0}")]
    QueryExecution(String),

    #[error("A query is already running")]
    Busy,

    #[error("The SQL buffer is read-only in showcase mode")]
    ReadOnlyBuffer,
}

fn status_text(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "network error".to_string(),
    }
}

impl WorkbenchError {
    /// Short text for the status line.
    pub fn status_line(&self) -> &'static str {
        match self {
            Self::EngineBoot(_) | Self::EngineBootTimeout { .. } => "Engine boot failed.",
            Self::ManifestFetch { .. }
            | Self::ManifestParse { .. }
            | Self::ViewRegistration { .. }
            | Self::LoadTimeout { .. } => "Load failed.",
            Self::NotLoaded => "Dataset not loaded.",
            Self::QueryExecution(_) => "Query failed",
            Self::Busy => "Query already running.",
            Self::ReadOnlyBuffer => "SQL is read-only in showcase mode.",
        }
    }

    /// True for failures of the load step (manifest, views, load timeout).
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::ManifestFetch { .. }
                | Self::ManifestParse { .. }
                | Self::ViewRegistration { .. }
                | Self::LoadTimeout { .. }
        )
    }
}
