//! Google Drive backend
//!
//! Content on a shared drive is addressed by opaque ids, so every relative
//! path is resolved in two steps: folder segments from the drive root down
//! (cached per prefix), then the file name inside the last folder (cached per
//! path). Folders are never created; writing below a missing folder fails.

use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::{
    decode_record, decode_text, encode_record, sort_newest_first, Record, StorageBackend,
    BLOB_CONTENT_TYPE, RECORD_CONTENT_TYPE,
};
use crate::cache::PathIdCache;
use crate::config::{DriveSelector, DriveSettings};
use crate::drive::{children_query, DriveClient, DriveError, FOLDER_MIME_TYPE};
use crate::error::{StorageError, StorageResult};
use crate::glob::GlobPattern;
use crate::path::RelativePath;

/// Drive implementation of [`StorageBackend`]
pub struct DriveBackend {
    client: DriveClient,
    /// Shared drive id; also the id of its root folder
    drive_id: String,
    /// Folder holding records, relative to the drive root
    records_folder: RelativePath,
    ids: PathIdCache,
}

impl DriveBackend {
    /// Authenticate and locate the shared drive
    ///
    /// Both failures are fatal: a backend that cannot reach its drive is a
    /// configuration problem, not a per-call one.
    pub async fn connect(settings: &DriveSettings) -> StorageResult<Self> {
        let client = DriveClient::authorize(settings.credentials.clone(), settings.client.clone())
            .await
            .map_err(|e| StorageError::Configuration(format!("Drive authentication failed: {}", e)))?;

        let drive_id = match &settings.drive {
            DriveSelector::Id(id) => id.clone(),
            DriveSelector::Name(name) => client.find_shared_drive(name).await.map_err(|e| {
                StorageError::Configuration(format!("Shared drive '{}' not accessible: {}", name, e))
            })?,
        };

        Self::with_client(client, drive_id, &settings.records_folder)
    }

    /// Wrap an already authorized client
    pub fn with_client(
        client: DriveClient,
        drive_id: impl Into<String>,
        records_folder: &str,
    ) -> StorageResult<Self> {
        let drive_id = drive_id.into();
        let records_folder = RelativePath::parse(records_folder)?;
        info!(
            drive_id = %drive_id,
            records_folder = %records_folder,
            "Drive storage ready"
        );

        Ok(Self {
            client,
            drive_id,
            records_folder,
            ids: PathIdCache::new(),
        })
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }

    pub fn drive_id(&self) -> &str {
        &self.drive_id
    }

    pub fn records_folder(&self) -> &RelativePath {
        &self.records_folder
    }

    pub fn id_cache(&self) -> &PathIdCache {
        &self.ids
    }

    /// Id of the folder at `folder_path`; the empty path is the drive root
    pub async fn resolve_folder_id(&self, folder_path: &str) -> StorageResult<String> {
        self.folder_id(&RelativePath::parse(folder_path)?).await
    }

    /// Id of the file at `path`, or `None` when it (or its folder) is absent
    pub async fn resolve_file_id(&self, path: &str) -> StorageResult<Option<String>> {
        self.file_id(&RelativePath::parse(path)?).await
    }

    async fn folder_id(&self, path: &RelativePath) -> StorageResult<String> {
        if path.is_root() {
            return Ok(self.drive_id.clone());
        }

        let mut parent_id = self.drive_id.clone();
        let mut prefix = RelativePath::root();
        for segment in path.segments() {
            prefix = prefix.join(segment)?;
            if let Some(id) = self.ids.folder(prefix.as_str()) {
                parent_id = id;
                continue;
            }

            let found = self
                .client
                .find_child(&self.drive_id, &parent_id, segment, Some(FOLDER_MIME_TYPE))
                .await?;
            match found {
                Some(folder) => {
                    self.ids.insert_folder(prefix.as_str(), &folder.id);
                    parent_id = folder.id;
                }
                None => {
                    debug!(path = %path, missing = segment, "Folder segment not found");
                    return Err(StorageError::FolderNotFound {
                        path: path.to_string(),
                        missing: segment.to_string(),
                    });
                }
            }
        }

        Ok(parent_id)
    }

    async fn file_id(&self, path: &RelativePath) -> StorageResult<Option<String>> {
        match self.ids.file(path.as_str()) {
            Some(id) => Ok(Some(id)),
            None => self.lookup_file(path).await,
        }
    }

    /// Resolve a file id from the API, bypassing the file cache
    async fn lookup_file(&self, path: &RelativePath) -> StorageResult<Option<String>> {
        let (parent, name) = path.split_parent();
        let Some(name) = name else {
            return Ok(None);
        };

        let parent_id = match self.folder_id(&parent).await {
            Ok(id) => id,
            Err(StorageError::FolderNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let found = self
            .client
            .find_file(&self.drive_id, &parent_id, name)
            .await?;

        Ok(found.map(|file| {
            self.ids.insert_file(path.as_str(), &file.id);
            file.id
        }))
    }

    /// Run `op` against the id of the file at `path`
    ///
    /// `Ok(None)` when the file does not exist. A not-found answer for a
    /// cached id evicts it and retries once with a fresh lookup.
    async fn with_file_id<T, F, Fut>(&self, path: &RelativePath, op: F) -> StorageResult<Option<T>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, DriveError>>,
    {
        let (id, cached) = match self.ids.file(path.as_str()) {
            Some(id) => (id, true),
            None => match self.lookup_file(path).await? {
                Some(id) => (id, false),
                None => return Ok(None),
            },
        };

        match op(id).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => {
                self.ids.evict_file(path.as_str());
                if !cached {
                    // Removed between lookup and use
                    return Ok(None);
                }
                warn!(path = %path, "Cached file id is stale, resolving again");
                match self.lookup_file(path).await? {
                    Some(id) => Ok(Some(op(id).await?)),
                    None => Ok(None),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_text(&self, path: &RelativePath) -> StorageResult<Option<String>> {
        let bytes = self
            .with_file_id(path, |id| async move { self.client.download(&id).await })
            .await?;
        Ok(bytes.map(|bytes| decode_text(path.as_str(), bytes)))
    }

    /// Whether `path` names a file or a folder
    ///
    /// A cached file id is confirmed against the API; a stale one is evicted
    /// and the path looked up again.
    async fn entry_exists(&self, path: &RelativePath) -> StorageResult<bool> {
        if let Some(id) = self.ids.file(path.as_str()) {
            match self.client.file_metadata(&id).await {
                Ok(_) => return Ok(true),
                Err(e) if e.is_not_found() => {
                    warn!(path = %path, "Cached file id is stale, resolving again");
                    self.ids.evict_file(path.as_str());
                }
                Err(e) => return Err(e.into()),
            }
        }

        if self.lookup_file(path).await?.is_some() {
            return Ok(true);
        }

        match self.folder_id(path).await {
            Ok(_) => Ok(true),
            Err(StorageError::FolderNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Update the file in place when it exists, otherwise create it
    async fn upsert(&self, path: &RelativePath, data: &[u8], content_type: &str) -> StorageResult<()> {
        let (parent, name) = path.split_parent();
        let name = name.ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;

        let updated = self
            .with_file_id(path, |id| async move {
                self.client.update_content(&id, data, content_type).await
            })
            .await?;
        if updated.is_some() {
            debug!(path = %path, size = data.len(), "Updated existing file");
            return Ok(());
        }

        let parent_id = self.folder_id(&parent).await?;
        let file = self
            .client
            .create_file(name, &parent_id, data, content_type)
            .await?;
        self.ids.insert_file(path.as_str(), &file.id);
        Ok(())
    }

    fn record_path(&self, name: &str) -> StorageResult<RelativePath> {
        let path = self.records_folder.join(name)?;
        if path == self.records_folder {
            return Err(StorageError::InvalidPath(name.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl StorageBackend for DriveBackend {
    fn backend_type(&self) -> &'static str {
        "drive"
    }

    async fn load_record(&self, name: &str) -> Record {
        let path = match self.record_path(name) {
            Ok(path) => path,
            Err(e) => {
                warn!(record = name, error = %e, "Invalid record name");
                return Record::new();
            }
        };

        match self.read_text(&path).await {
            Ok(Some(text)) => match decode_record(name, &text) {
                Ok(record) => record,
                Err(e) => {
                    error!(record = name, error = %e, "Record is corrupt, treating as empty");
                    Record::new()
                }
            },
            Ok(None) => {
                debug!(record = name, "Record not found, using empty");
                Record::new()
            }
            Err(e) => {
                warn!(record = name, error = %e, "Failed to load record");
                Record::new()
            }
        }
    }

    async fn save_record(&self, name: &str, record: &Record) -> StorageResult<()> {
        let path = self.record_path(name)?;
        let text = encode_record(name, record)?;
        self.upsert(&path, text.as_bytes(), RECORD_CONTENT_TYPE).await?;
        debug!(record = name, keys = record.len(), "Saved record");
        Ok(())
    }

    async fn read_blob(&self, path: &str) -> Option<String> {
        let relative = match RelativePath::parse(path) {
            Ok(relative) => relative,
            Err(e) => {
                warn!(path = path, error = %e, "Invalid blob path");
                return None;
            }
        };

        match self.read_text(&relative).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = path, error = %e, "Failed to read blob");
                None
            }
        }
    }

    async fn write_blob(&self, path: &str, content: &str) -> StorageResult<()> {
        let relative = RelativePath::parse(path)?;
        self.upsert(&relative, content.as_bytes(), BLOB_CONTENT_TYPE).await
    }

    async fn append_blob(&self, path: &str, content: &str) -> StorageResult<()> {
        let relative = RelativePath::parse(path)?;
        // A failed read must not be mistaken for an empty file
        let mut combined = self.read_text(&relative).await?.unwrap_or_default();
        combined.push_str(content);
        self.upsert(&relative, combined.as_bytes(), BLOB_CONTENT_TYPE).await
    }

    async fn list_blobs(&self, directory: &str, pattern: &str) -> Vec<String> {
        let (dir, glob) = match (RelativePath::parse(directory), GlobPattern::new(pattern)) {
            (Ok(dir), Ok(glob)) => (dir, glob),
            (Err(e), _) | (_, Err(e)) => {
                warn!(directory = directory, pattern = pattern, error = %e, "Invalid listing request");
                return Vec::new();
            }
        };

        let folder_id = match self.folder_id(&dir).await {
            Ok(id) => id,
            Err(e) if e.is_not_found() => {
                debug!(directory = directory, "Directory not found, nothing to list");
                return Vec::new();
            }
            Err(e) => {
                warn!(directory = directory, error = %e, "Failed to resolve directory");
                return Vec::new();
            }
        };

        let query = children_query(&folder_id, glob.contains_hint());
        let mut page_token: Option<String> = None;
        let mut paths = Vec::new();

        loop {
            let page = match self
                .client
                .list_files(&self.drive_id, &query, page_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(directory = directory, error = %e, "Listing failed");
                    return Vec::new();
                }
            };

            for file in page.files {
                if file.name.contains('/') {
                    continue;
                }
                let Ok(child) = dir.join(&file.name) else {
                    continue;
                };
                if file.is_folder() {
                    self.ids.insert_folder(child.as_str(), &file.id);
                    continue;
                }
                self.ids.insert_file(child.as_str(), &file.id);
                if glob.matches(&file.name) {
                    paths.push(child.as_str().to_string());
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        sort_newest_first(&mut paths);
        paths.dedup();
        debug!(
            directory = directory,
            pattern = glob.as_str(),
            count = paths.len(),
            "Listed blobs"
        );
        paths
    }

    async fn exists(&self, path: &str) -> bool {
        let Ok(relative) = RelativePath::parse(path) else {
            return false;
        };
        if relative.is_root() {
            return false;
        }
        match self.entry_exists(&relative).await {
            Ok(found) => found,
            Err(e) => {
                debug!(path = path, error = %e, "Existence check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::{ClientOptions, Credentials};

    fn backend() -> DriveBackend {
        let client = DriveClient::new(
            Credentials::AccessToken("test-token".into()),
            ClientOptions {
                base_url: "http://127.0.0.1:9".into(),
                max_retries: 0,
                ..Default::default()
            },
        )
        .unwrap();
        DriveBackend::with_client(client, "drive-1", "mcp-data").unwrap()
    }

    #[tokio::test]
    async fn test_root_folder_is_drive_id() {
        let backend = backend();
        assert_eq!(backend.resolve_folder_id("").await.unwrap(), "drive-1");
        assert_eq!(backend.resolve_folder_id("/").await.unwrap(), "drive-1");
    }

    #[tokio::test]
    async fn test_cached_ids_skip_the_network() {
        let backend = backend();
        backend.id_cache().insert_folder("logs", "folder-logs");
        backend.id_cache().insert_file("logs/a.md", "file-a");

        assert_eq!(backend.resolve_folder_id("logs/").await.unwrap(), "folder-logs");
        assert_eq!(
            backend.resolve_file_id("logs//a.md").await.unwrap().as_deref(),
            Some("file-a")
        );
        // A cached file id is confirmed before it counts; unreachable means no
        assert!(!backend.exists("logs/a.md").await);
    }

    #[test]
    fn test_record_paths_live_under_records_folder() {
        let backend = backend();
        assert_eq!(
            backend.record_path("tasks.json").unwrap().as_str(),
            "mcp-data/tasks.json"
        );
        assert!(backend.record_path("").is_err());
        assert!(backend.record_path("../secrets.json").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_api_degrades_reads() {
        let backend = backend();
        assert!(backend.load_record("tasks.json").await.is_empty());
        assert_eq!(backend.read_blob("logs/a.md").await, None);
        assert!(!backend.exists("logs/a.md").await);
        assert!(backend.list_blobs("logs", "*.md").await.is_empty());
        assert!(backend.write_blob("logs/a.md", "x").await.is_err());
    }
}
