use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Narrow view of the analytical store used by loading and maintenance
#[async_trait]
pub trait Store: Send + Sync {
    /// Database used for table names without a prefix
    fn database(&self) -> &str;

    /// Run a statement, discarding any result body
    async fn execute(&self, statement: &str) -> Result<(), StoreError>;

    /// Run a read statement and decode its JSON result
    async fn fetch_json(&self, statement: &str) -> Result<Value, StoreError>;

    /// Submit a bulk-load artifact (header line plus rows) streamed from disk
    async fn import_file(&self, path: &Path) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid store URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store returned status {status}: {message}")]
    Server { status: u16, message: String },
}
