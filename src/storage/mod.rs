//! Storage backends
//!
//! One contract, [`StorageBackend`], with a local-filesystem and a Google
//! Drive implementation. A process picks exactly one at start-up
//! ([`open_backend`]) and hands the resulting handle to every consumer.
//!
//! Reads never fail: a missing, unreadable or corrupt object comes back as an
//! empty record, `None` or `false`. Writes surface every unrecoverable error.

pub mod drive;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

pub use drive::DriveBackend;
pub use local::LocalBackend;

/// A structured document: one JSON object per file
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Shared handle to the process's backend
pub type StorageHandle = Arc<dyn StorageBackend>;

/// Content type used when uploading records
pub const RECORD_CONTENT_TYPE: &str = "application/json";

/// Content type used when uploading blobs
pub const BLOB_CONTENT_TYPE: &str = "text/plain";

/// The seven-operation storage contract
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Backend type name ("local", "drive")
    fn backend_type(&self) -> &'static str;

    /// Load a record from the data root; empty when absent, unreadable or malformed
    async fn load_record(&self, name: &str) -> Record;

    /// Replace a record atomically
    async fn save_record(&self, name: &str, record: &Record) -> StorageResult<()>;

    /// Read a blob relative to the shared root; `None` when absent or unreadable
    async fn read_blob(&self, path: &str) -> Option<String>;

    /// Create or replace a blob
    async fn write_blob(&self, path: &str, content: &str) -> StorageResult<()>;

    /// Append to a blob, creating it when absent
    async fn append_blob(&self, path: &str, content: &str) -> StorageResult<()>;

    /// Root-relative paths of blobs in `directory` whose names match `pattern`,
    /// newest-first (descending by name)
    async fn list_blobs(&self, directory: &str, pattern: &str) -> Vec<String>;

    /// Whether a blob exists; `false` on any doubt
    async fn exists(&self, path: &str) -> bool;
}

/// Serialize a record the way it is stored on disk and in Drive
pub(crate) fn encode_record(name: &str, record: &Record) -> StorageResult<String> {
    serde_json::to_string_pretty(record).map_err(|source| StorageError::Malformed {
        path: name.to_string(),
        source,
    })
}

/// Parse stored record text; anything but a JSON object is malformed
pub(crate) fn decode_record(name: &str, text: &str) -> StorageResult<Record> {
    serde_json::from_str(text).map_err(|source| StorageError::Malformed {
        path: name.to_string(),
        source,
    })
}

/// Decode text as UTF-8, falling back to Latin-1 for legacy files
pub(crate) fn decode_text(path: &str, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = path, error = %e.utf8_error(), "Content is not UTF-8, decoding as Latin-1");
            e.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

/// Sort listing results newest-first
pub(crate) fn sort_newest_first(paths: &mut [String]) {
    paths.sort_unstable_by(|a, b| b.cmp(a));
}

/// Build the backend selected by `config`
pub async fn open_backend(config: &StorageConfig) -> StorageResult<StorageHandle> {
    let backend: StorageHandle = match config {
        StorageConfig::Local(settings) => Arc::new(LocalBackend::new(
            settings.data_dir.clone(),
            settings.shared_root.clone(),
        )),
        StorageConfig::Drive(settings) => Arc::new(DriveBackend::connect(settings).await?),
    };
    info!(backend = backend.backend_type(), "Storage backend initialized");
    Ok(backend)
}

/// A backend built on first use
///
/// Concurrent first callers share one initialization; a failed attempt is not
/// cached, so the next call tries again.
pub struct LazyStorage {
    config: StorageConfig,
    backend: OnceCell<StorageHandle>,
}

impl LazyStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            backend: OnceCell::new(),
        }
    }

    /// Wrap an already constructed backend
    pub fn with_backend(config: StorageConfig, backend: StorageHandle) -> Self {
        Self {
            config,
            backend: OnceCell::new_with(Some(backend)),
        }
    }

    /// The backend, constructing it if this is the first call
    pub async fn get(&self) -> StorageResult<StorageHandle> {
        self.backend
            .get_or_try_init(|| open_backend(&self.config))
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.initialized()
    }
}
