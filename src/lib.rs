//! Memory Store - storage layer for the assistant memory service
//!
//! Persists structured records (JSON documents) and free-form text blobs
//! either on a local, usually synced, filesystem or in a Google Drive shared
//! drive, behind one async contract.

pub mod cache;
pub mod config;
pub mod context;
pub mod drive;
pub mod error;
pub mod glob;
pub mod path;
pub mod storage;

pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use path::RelativePath;
pub use storage::{
    open_backend, DriveBackend, LazyStorage, LocalBackend, Record, StorageBackend, StorageHandle,
};
