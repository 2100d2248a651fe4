//! Local filesystem backend
//!
//! Records live under a data directory, blobs under a shared root (commonly a
//! synced or mounted folder). Every write goes to a sibling temp file that is
//! renamed over the destination, so readers see either the old or the new
//! content and never a torn file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, error, info, warn};

use super::{
    decode_record, decode_text, encode_record, sort_newest_first, Record, StorageBackend,
};
use crate::error::{StorageError, StorageResult};
use crate::glob::GlobPattern;
use crate::path::RelativePath;

/// Prefix and suffix of in-flight temp files; both are skipped by listings
const TEMP_PREFIX: &str = ".";
const TEMP_SUFFIX: &str = ".tmp";

/// Filesystem implementation of [`StorageBackend`]
pub struct LocalBackend {
    /// Root for records
    data_dir: PathBuf,
    /// Root for blobs
    shared_root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at `data_dir`
    ///
    /// `shared_root` defaults to the parent of `data_dir`. Neither root has to
    /// exist: the data directory is created best-effort, and a missing shared
    /// root only makes blob operations come back empty.
    pub fn new(data_dir: PathBuf, shared_root: Option<PathBuf>) -> Self {
        let shared_root = shared_root.unwrap_or_else(|| {
            data_dir
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| data_dir.clone())
        });

        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            error!(
                data_dir = %data_dir.display(),
                error = %e,
                "Failed to create data directory"
            );
        }

        if !shared_root.is_dir() {
            warn!(
                shared_root = %shared_root.display(),
                "Shared root does not exist (share not mounted?), blob operations will find nothing"
            );
        }

        info!(
            data_dir = %data_dir.display(),
            shared_root = %shared_root.display(),
            "Local storage ready"
        );

        Self {
            data_dir,
            shared_root,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn shared_root(&self) -> &Path {
        &self.shared_root
    }

    fn record_path(&self, name: &str) -> StorageResult<PathBuf> {
        file_path(&self.data_dir, name)
    }

    fn blob_path(&self, path: &str) -> StorageResult<PathBuf> {
        file_path(&self.shared_root, path)
    }

    /// Writes into an unmounted share would silently land on the local disk
    async fn require_shared_root(&self) -> StorageResult<()> {
        match fs::metadata(&self.shared_root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StorageError::NotFound(self.shared_root.display().to_string())),
            Err(e) => Err(StorageError::from_io(self.shared_root.display().to_string(), e)),
        }
    }
}

/// Resolve `raw` under `root`; the root itself is not a file
fn file_path(root: &Path, raw: &str) -> StorageResult<PathBuf> {
    let relative = RelativePath::parse(raw)?;
    if relative.is_root() {
        return Err(StorageError::InvalidPath(raw.to_string()));
    }
    Ok(relative.to_native(root))
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)
}

/// Read a file, mapping "absent" to `Ok(None)`
async fn read_optional(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::from_io(path.display().to_string(), e)),
    }
}

/// Replace `path` with `data` via temp file + rename
async fn write_atomic(path: PathBuf, data: Vec<u8>) -> StorageResult<()> {
    let target = path.display().to_string();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &data))
        .await
        .map_err(|e| StorageError::Io {
            path: target,
            source: io::Error::other(e),
        })?
}

fn write_atomic_blocking(path: &Path, data: &[u8]) -> StorageResult<()> {
    let target = path.display().to_string();
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::InvalidPath(target.clone()))?;

    std::fs::create_dir_all(parent)
        .map_err(|e| StorageError::from_io(parent.display().to_string(), e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(parent)
        .map_err(|e| StorageError::from_io(parent.display().to_string(), e))?;

    tmp.write_all(data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| StorageError::from_io(target.clone(), e))?;

    // Dropping the NamedTempFile on any error above removes the temp file
    tmp.persist(path)
        .map_err(|e| StorageError::from_io(target.clone(), e.error))?;

    debug!(path = %target, size = data.len(), "Wrote file atomically");
    Ok(())
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn backend_type(&self) -> &'static str {
        "local"
    }

    async fn load_record(&self, name: &str) -> Record {
        let path = match self.record_path(name) {
            Ok(path) => path,
            Err(e) => {
                warn!(record = name, error = %e, "Invalid record name");
                return Record::new();
            }
        };

        let bytes = match read_optional(&path).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(record = name, "Record not found, using empty");
                return Record::new();
            }
            Err(e) => {
                warn!(record = name, error = %e, "Failed to read record");
                return Record::new();
            }
        };

        match decode_record(name, &decode_text(name, bytes)) {
            Ok(record) => record,
            Err(e) => {
                error!(record = name, error = %e, "Record is corrupt, treating as empty");
                Record::new()
            }
        }
    }

    async fn save_record(&self, name: &str, record: &Record) -> StorageResult<()> {
        let path = self.record_path(name)?;
        let text = encode_record(name, record)?;
        write_atomic(path, text.into_bytes()).await?;
        debug!(record = name, keys = record.len(), "Saved record");
        Ok(())
    }

    async fn read_blob(&self, path: &str) -> Option<String> {
        let native = match self.blob_path(path) {
            Ok(native) => native,
            Err(e) => {
                warn!(path = path, error = %e, "Invalid blob path");
                return None;
            }
        };

        match read_optional(&native).await {
            Ok(Some(bytes)) => Some(decode_text(path, bytes)),
            Ok(None) => None,
            Err(e) => {
                warn!(path = path, error = %e, "Failed to read blob");
                None
            }
        }
    }

    async fn write_blob(&self, path: &str, content: &str) -> StorageResult<()> {
        let native = self.blob_path(path)?;
        self.require_shared_root().await?;
        write_atomic(native, content.as_bytes().to_vec()).await
    }

    async fn append_blob(&self, path: &str, content: &str) -> StorageResult<()> {
        let native = self.blob_path(path)?;
        self.require_shared_root().await?;

        // An unreadable existing file is an error: treating it as empty would
        // overwrite its content
        let mut combined = match read_optional(&native).await? {
            Some(bytes) => decode_text(path, bytes),
            None => String::new(),
        };
        combined.push_str(content);

        write_atomic(native, combined.into_bytes()).await
    }

    async fn list_blobs(&self, directory: &str, pattern: &str) -> Vec<String> {
        let (dir, glob) = match (RelativePath::parse(directory), GlobPattern::new(pattern)) {
            (Ok(dir), Ok(glob)) => (dir, glob),
            (Err(e), _) | (_, Err(e)) => {
                warn!(directory = directory, pattern = pattern, error = %e, "Invalid listing request");
                return Vec::new();
            }
        };

        let native = dir.to_native(&self.shared_root);
        let mut entries = match fs::read_dir(&native).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(directory = directory, error = %e, "Directory not listable");
                return Vec::new();
            }
        };

        let mut paths = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(directory = directory, error = %e, "Directory scan interrupted");
                    break;
                }
            };

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if is_temp_name(name) || !glob.matches(name) {
                continue;
            }
            // Follow symlinks: a linked file counts as a file
            match fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => {}
                _ => continue,
            }
            if let Ok(relative) = dir.join(name) {
                paths.push(relative.as_str().to_string());
            }
        }

        sort_newest_first(&mut paths);
        debug!(
            directory = directory,
            pattern = glob.as_str(),
            count = paths.len(),
            "Listed blobs"
        );
        paths
    }

    async fn exists(&self, path: &str) -> bool {
        match self.blob_path(path) {
            Ok(native) => fs::try_exists(native).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
