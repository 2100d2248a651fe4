//! Google Drive v3 API Client
//!
//! Provides authenticated access to a shared drive: child lookups, paginated
//! listings, chunked downloads and content uploads.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info, warn};

use super::auth::{Credentials, TokenProvider};
use super::errors::DriveError;
use super::types::{
    child_query, escape_query_value, file_query, CreateMetadata, DriveFile, DriveList, FileList,
};

/// Production API host
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// HTTP client timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retries for retryable errors
const MAX_RETRIES: u32 = 3;

/// First backoff delay, doubled on each retry
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Maximum number of recent errors to track
const MAX_ERROR_HISTORY: usize = 10;

/// Page size requested from files.list
const PAGE_SIZE: &str = "100";

/// Fields requested for file resources
const FILE_FIELDS: &str = "id,name,mimeType";

/// Fields requested for listings
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType)";

/// Upper bound on download buffer pre-allocation
const MAX_PREALLOCATION: u64 = 1 << 20;

/// Health status values
pub const HEALTH_HEALTHY: u8 = 0;
pub const HEALTH_DEGRADED: u8 = 1;
pub const HEALTH_UNHEALTHY: u8 = 2;

/// A recent error entry for tracking
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub timestamp: u64,
    pub operation: String,
    pub target: String,
    pub error: String,
}

/// Tunables for the HTTP client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API host, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries after the first attempt for retryable errors
    pub max_retries: u32,
    /// Delay before the first retry
    pub retry_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
        }
    }
}

/// Drive API client for making authenticated requests
#[derive(Clone)]
pub struct DriveClient {
    /// HTTP client for making requests
    http_client: Client,
    /// API host
    base_url: String,
    /// Bearer token source
    tokens: Arc<TokenProvider>,
    max_retries: u32,
    retry_delay: Duration,
    /// Connection health (0=healthy, 1=degraded, 2=unhealthy)
    health: Arc<AtomicU8>,
    /// Recent error log
    error_log: Arc<Mutex<VecDeque<ErrorEntry>>>,
}

impl DriveClient {
    /// Build a client without contacting the API
    pub fn new(credentials: Credentials, options: ClientOptions) -> Result<Self, DriveError> {
        let http_client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| DriveError::Request(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            tokens: Arc::new(TokenProvider::new(credentials, http_client.clone())),
            http_client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            max_retries: options.max_retries,
            retry_delay: options.retry_delay,
            health: Arc::new(AtomicU8::new(HEALTH_HEALTHY)),
            error_log: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_ERROR_HISTORY))),
        })
    }

    /// Build a client and obtain a first token, so bad credentials fail here
    pub async fn authorize(
        credentials: Credentials,
        options: ClientOptions,
    ) -> Result<Self, DriveError> {
        info!(base_url = %options.base_url, "Authorizing with Drive API...");
        let client = Self::new(credentials, options)?;
        client.tokens.token().await?;
        info!("Drive authorization successful");
        Ok(client)
    }

    /// Execute an operation with retry logic and exponential backoff
    async fn with_retry<F, Fut, T>(&self, operation: &str, target: &str, f: F) -> Result<T, DriveError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DriveError>>,
    {
        for attempt in 0..=self.max_retries {
            match f().await {
                Ok(result) => {
                    self.health.store(HEALTH_HEALTHY, Ordering::Relaxed);
                    return Ok(result);
                }
                Err(e) => {
                    let is_auth_expired = matches!(e, DriveError::AuthExpired);
                    let retryable =
                        e.is_retryable() && !(is_auth_expired && !self.tokens.can_refresh());

                    if !retryable || attempt == self.max_retries {
                        match e {
                            DriveError::Network(_) | DriveError::Timeout => {
                                self.health.store(HEALTH_UNHEALTHY, Ordering::Relaxed)
                            }
                            DriveError::RateLimited | DriveError::Server(_, _) => {
                                self.health.store(HEALTH_DEGRADED, Ordering::Relaxed)
                            }
                            _ => {}
                        }
                        // A missing object is an answer, not a fault
                        if !e.is_not_found() {
                            self.log_error(operation, target, &e.to_string());
                        }
                        return Err(e);
                    }

                    if is_auth_expired {
                        warn!(operation = operation, "Auth expired, refreshing token...");
                        self.tokens.invalidate().await;
                    }

                    let delay = self.retry_delay * 2u32.pow(attempt);
                    warn!(
                        operation = operation,
                        attempt = attempt + 1,
                        max = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying Drive operation"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        unreachable!()
    }

    /// Attach a bearer token, send, and map non-success statuses
    async fn execute(&self, request: RequestBuilder) -> Result<Response, DriveError> {
        let token = self.tokens.token().await?;
        let response = request.bearer_auth(token).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::from_status(status, &body));
        }

        Ok(response)
    }

    /// Log an error to the error history ring buffer
    fn log_error(&self, operation: &str, target: &str, error: &str) {
        let entry = ErrorEntry {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            operation: operation.to_string(),
            target: target.to_string(),
            error: error.to_string(),
        };

        let mut log = self.error_log.lock().unwrap_or_else(PoisonError::into_inner);
        if log.len() >= MAX_ERROR_HISTORY {
            log.pop_front();
        }
        log.push_back(entry);
    }

    /// Get connection health status string
    pub fn health_status(&self) -> &'static str {
        match self.health.load(Ordering::Relaxed) {
            HEALTH_HEALTHY => "healthy",
            HEALTH_DEGRADED => "degraded",
            _ => "unhealthy",
        }
    }

    /// Get recent errors
    pub fn recent_errors(&self) -> Vec<ErrorEntry> {
        self.error_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.base_url)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/drive/v3/files/{}", self.base_url, urlencoding::encode(file_id))
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.base_url)
    }

    /// Look up a shared drive id by its display name
    pub async fn find_shared_drive(&self, name: &str) -> Result<String, DriveError> {
        let query = format!("name = '{}'", escape_query_value(name));
        let query = query.as_str();
        let list = self
            .with_retry("find_shared_drive", name, || async move {
                let request = self
                    .http_client
                    .get(format!("{}/drive/v3/drives", self.base_url))
                    .query(&[("q", query), ("fields", "drives(id,name)")]);
                Ok(self.execute(request).await?.json::<DriveList>().await?)
            })
            .await?;

        let drive = list
            .drives
            .into_iter()
            .next()
            .ok_or_else(|| DriveError::NotFound(format!("shared drive '{}'", name)))?;

        info!(name = name, drive_id = %drive.id, "Found shared drive");
        Ok(drive.id)
    }

    /// Fetch one page of files.list for `query` within `drive_id`
    pub async fn list_files(
        &self,
        drive_id: &str,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        debug!(query = query, page_token = ?page_token, "Listing files from Drive");

        self.with_retry("list_files", query, || async move {
            let mut params = vec![
                ("q", query),
                ("corpora", "drive"),
                ("driveId", drive_id),
                ("includeItemsFromAllDrives", "true"),
                ("supportsAllDrives", "true"),
                ("spaces", "drive"),
                ("fields", LIST_FIELDS),
                ("pageSize", PAGE_SIZE),
            ];
            if let Some(token) = page_token {
                params.push(("pageToken", token));
            }
            let request = self.http_client.get(self.files_url()).query(&params);
            Ok(self.execute(request).await?.json::<FileList>().await?)
        })
        .await
    }

    /// First child of `parent_id` named exactly `name`, optionally of a MIME type
    pub async fn find_child(
        &self,
        drive_id: &str,
        parent_id: &str,
        name: &str,
        mime_type: Option<&str>,
    ) -> Result<Option<DriveFile>, DriveError> {
        let query = child_query(parent_id, name, mime_type);
        let list = self.list_files(drive_id, &query, None).await?;
        Ok(list.files.into_iter().next())
    }

    /// First non-folder child of `parent_id` named exactly `name`
    pub async fn find_file(
        &self,
        drive_id: &str,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<DriveFile>, DriveError> {
        let query = file_query(parent_id, name);
        let list = self.list_files(drive_id, &query, None).await?;
        Ok(list.files.into_iter().next())
    }

    /// Metadata of a file by id; `NotFound` once it is gone
    pub async fn file_metadata(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        self.with_retry("file_metadata", file_id, || async move {
            let request = self
                .http_client
                .get(self.file_url(file_id))
                .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")]);
            Ok(self.execute(request).await?.json::<DriveFile>().await?)
        })
        .await
    }

    /// Download file content, reading the body chunk by chunk
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        let data = self
            .with_retry("download", file_id, || async move {
                let request = self
                    .http_client
                    .get(self.file_url(file_id))
                    .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
                let mut response = self.execute(request).await?;

                let mut buffer = Vec::with_capacity(preallocation(response.content_length()));
                while let Some(chunk) = response.chunk().await? {
                    buffer.extend_from_slice(&chunk);
                }
                Ok::<_, DriveError>(buffer)
            })
            .await?;

        debug!(file_id = file_id, size = data.len(), "Downloaded file from Drive");
        Ok(data)
    }

    /// Replace the content of an existing file
    pub async fn update_content(
        &self,
        file_id: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<DriveFile, DriveError> {
        info!(
            file_id = file_id,
            size = data.len(),
            content_type = content_type,
            "Updating file content in Drive"
        );

        self.with_retry("update_content", file_id, || async move {
            let request = self
                .http_client
                .patch(format!(
                    "{}/{}",
                    self.upload_url(),
                    urlencoding::encode(file_id)
                ))
                .query(&[
                    ("uploadType", "media"),
                    ("supportsAllDrives", "true"),
                    ("fields", FILE_FIELDS),
                ])
                .header("Content-Type", content_type)
                .body(data.to_vec());
            Ok(self.execute(request).await?.json::<DriveFile>().await?)
        })
        .await
    }

    /// Create a new file named `name` inside `parent_id`
    pub async fn create_file(
        &self,
        name: &str,
        parent_id: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<DriveFile, DriveError> {
        let metadata = serde_json::to_string(&CreateMetadata {
            name,
            parents: [parent_id],
        })
        .map_err(|e| DriveError::Request(format!("cannot encode metadata: {}", e)))?;
        let boundary = multipart_boundary();
        let body = multipart_related(&metadata, data, content_type, &boundary);
        let body = body.as_slice();
        let multipart_type = format!("multipart/related; boundary={}", boundary);
        let multipart_type = multipart_type.as_str();

        info!(
            name = name,
            parent_id = parent_id,
            size = data.len(),
            "Creating file in Drive"
        );

        let file = self
            .with_retry("create_file", name, || async move {
                let request = self
                    .http_client
                    .post(self.upload_url())
                    .query(&[
                        ("uploadType", "multipart"),
                        ("supportsAllDrives", "true"),
                        ("fields", FILE_FIELDS),
                    ])
                    .header("Content-Type", multipart_type)
                    .body(body.to_vec());
                Ok(self.execute(request).await?.json::<DriveFile>().await?)
            })
            .await?;

        info!(name = name, file_id = %file.id, "File created in Drive");
        Ok(file)
    }
}

/// Boundary string unlikely to appear in uploaded text
/// Download buffer capacity; Content-Length is only a hint
fn preallocation(content_length: Option<u64>) -> usize {
    content_length.unwrap_or(0).min(MAX_PREALLOCATION) as usize
}

fn multipart_boundary() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("memory_store_{:x}", nanos)
}

/// Assemble a multipart/related body: JSON metadata part, then the media part
fn multipart_related(metadata: &str, data: &[u8], content_type: &str, boundary: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + data.len() + 256);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
            b = boundary,
            m = metadata,
            t = content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_layout() {
        let body = multipart_related(r#"{"name":"a.md"}"#, b"hello", "text/plain", "XYZ");
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text,
            "--XYZ\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"name\":\"a.md\"}\r\n\
             --XYZ\r\nContent-Type: text/plain\r\n\r\nhello\r\n--XYZ--\r\n"
        );
    }

    #[test]
    fn test_create_metadata_serialization() {
        let json = serde_json::to_string(&CreateMetadata {
            name: "tasks.json",
            parents: ["folder-1"],
        })
        .unwrap();
        assert_eq!(json, r#"{"name":"tasks.json","parents":["folder-1"]}"#);
    }

    #[test]
    fn test_preallocation_is_capped() {
        assert_eq!(preallocation(None), 0);
        assert_eq!(preallocation(Some(512)), 512);
        assert_eq!(preallocation(Some(u64::MAX)), 1 << 20);
    }

    #[test]
    fn test_new_client_is_healthy() {
        let client = DriveClient::new(
            Credentials::AccessToken("t".to_string()),
            ClientOptions {
                base_url: "http://localhost:1/".to_string(),
                ..ClientOptions::default()
            },
        )
        .unwrap();
        assert_eq!(client.health_status(), "healthy");
        assert!(client.recent_errors().is_empty());
        assert_eq!(client.files_url(), "http://localhost:1/drive/v3/files");
        assert_eq!(client.file_url("a/b"), "http://localhost:1/drive/v3/files/a%2Fb");
    }
}
