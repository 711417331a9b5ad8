//! Error types for the replication service.

use thiserror::Error;

/// Errors that can occur while replicating filer changes.
#[derive(Debug, Error)]
pub enum ReplError {
    /// Configuration is missing or malformed.
    #[error("configuration error: {msg}")]
    Config {
        /// Error message describing the issue.
        msg: String,
    },

    /// A notification input or sink rejected its configuration section.
    #[error("failed to initialize {kind} for {name}: {msg}")]
    InitFailed {
        /// Plugin family ("notification input" or "sink").
        kind: &'static str,
        /// Registered name of the plugin.
        name: String,
        /// Error message reported by the plugin.
        msg: String,
    },

    /// No notification input is enabled in the configuration.
    #[error("no notification input enabled; available: {available:?}")]
    NoNotificationInput {
        /// Registered notification input names.
        available: Vec<String>,
    },

    /// The sink writes into the subtree the source observes.
    #[error("recursive replication! source directory {source_dir} includes the sink directory {sink_dir}")]
    RecursiveReplication {
        /// Directory observed on the source filer.
        source_dir: String,
        /// Directory written on the sink filer.
        sink_dir: String,
    },

    /// Reading the next change notification failed.
    #[error("receive {key}: {msg}")]
    Receive {
        /// Key of the failed notification, or its stream position if no key was readable.
        key: String,
        /// Error message describing the issue.
        msg: String,
    },

    /// A sink operation failed.
    #[error("sink {op} {key}: {msg}")]
    Sink {
        /// Sink operation that failed.
        op: &'static str,
        /// Key the operation targeted.
        key: String,
        /// Error message describing the issue.
        msg: String,
    },

    /// Fetching chunk content from the source failed.
    #[error("fetch chunk {file_id}: {msg}")]
    Fetch {
        /// Chunk file id.
        file_id: String,
        /// Error message describing the issue.
        msg: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML decoding error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ReplError {
    /// Build a configuration error from any message.
    pub fn config(msg: impl Into<String>) -> Self {
        ReplError::Config { msg: msg.into() }
    }

    /// True for errors that must stop the process at startup.
    ///
    /// Configuration and topology problems cannot correct themselves, while
    /// receive, fetch and sink failures only affect the message at hand.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReplError::Config { .. }
                | ReplError::InitFailed { .. }
                | ReplError::NoNotificationInput { .. }
                | ReplError::RecursiveReplication { .. }
                | ReplError::Toml(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReplError>;
