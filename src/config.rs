//! Backend selection from the environment
//!
//! | Variable | Meaning |
//! |---|---|
//! | `MEMORY_STORE_BACKEND` | `local` (default) or `drive` |
//! | `MEMORY_STORE_DATA_DIR` | local record directory |
//! | `MEMORY_STORE_SHARED_ROOT` | local blob root (default: parent of the data dir) |
//! | `MEMORY_STORE_RECORDS_FOLDER` | Drive folder holding records (default `mcp-data`) |
//! | `GOOGLE_SERVICE_ACCOUNT_JSON` / `GOOGLE_SERVICE_ACCOUNT_FILE` | service-account key |
//! | `GOOGLE_DRIVE_ACCESS_TOKEN` | pre-issued bearer token, instead of a key |
//! | `GOOGLE_SHARED_DRIVE_ID` / `GOOGLE_SHARED_DRIVE_NAME` | target drive (name default `memory`) |
//! | `GOOGLE_DRIVE_API_URL` | API host override |
//! | `MEMORY_STORE_HTTP_TIMEOUT_SECS` | per-request timeout |

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::drive::{ClientOptions, Credentials, ServiceAccountKey};
use crate::error::{StorageError, StorageResult};

pub const DEFAULT_RECORDS_FOLDER: &str = "mcp-data";
pub const DEFAULT_SHARED_DRIVE_NAME: &str = "memory";

/// Settings for [`crate::LocalBackend`]
#[derive(Debug, Clone)]
pub struct LocalSettings {
    pub data_dir: PathBuf,
    /// `None` means the parent of `data_dir`
    pub shared_root: Option<PathBuf>,
}

/// How to find the shared drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveSelector {
    Id(String),
    /// Looked up through the drives list at connect time
    Name(String),
}

/// Settings for [`crate::DriveBackend`]
#[derive(Debug, Clone)]
pub struct DriveSettings {
    pub credentials: Credentials,
    pub drive: DriveSelector,
    pub records_folder: String,
    pub client: ClientOptions,
}

/// The one backend a process uses
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local(LocalSettings),
    Drive(DriveSettings),
}

impl StorageConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = get("MEMORY_STORE_BACKEND").unwrap_or_else(|| "local".to_string());
        match backend.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageConfig::Local(LocalSettings {
                data_dir: get("MEMORY_STORE_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_data_dir),
                shared_root: get("MEMORY_STORE_SHARED_ROOT").map(PathBuf::from),
            })),
            "drive" | "gdrive" | "google_drive" => {
                let credentials = load_credentials(&get)?;

                let drive = match get("GOOGLE_SHARED_DRIVE_ID") {
                    Some(id) => DriveSelector::Id(id),
                    None => DriveSelector::Name(
                        get("GOOGLE_SHARED_DRIVE_NAME")
                            .unwrap_or_else(|| DEFAULT_SHARED_DRIVE_NAME.to_string()),
                    ),
                };

                let mut client = ClientOptions::default();
                if let Some(url) = get("GOOGLE_DRIVE_API_URL") {
                    client.base_url = url;
                }
                if let Some(secs) = get("MEMORY_STORE_HTTP_TIMEOUT_SECS") {
                    let secs: u64 = secs.parse().map_err(|_| {
                        StorageError::Configuration(format!(
                            "MEMORY_STORE_HTTP_TIMEOUT_SECS must be a number of seconds, got '{}'",
                            secs
                        ))
                    })?;
                    client.timeout = Duration::from_secs(secs);
                }

                Ok(StorageConfig::Drive(DriveSettings {
                    credentials,
                    drive,
                    records_folder: get("MEMORY_STORE_RECORDS_FOLDER")
                        .unwrap_or_else(|| DEFAULT_RECORDS_FOLDER.to_string()),
                    client,
                }))
            }
            other => Err(StorageError::Configuration(format!(
                "Unknown MEMORY_STORE_BACKEND '{}' (expected 'local' or 'drive')",
                other
            ))),
        }
    }

    /// Backend type name this config selects
    pub fn backend_type(&self) -> &'static str {
        match self {
            StorageConfig::Local(_) => "local",
            StorageConfig::Drive(_) => "drive",
        }
    }
}

fn load_credentials<G>(get: &G) -> StorageResult<Credentials>
where
    G: Fn(&str) -> Option<String>,
{
    let key = if let Some(json) = get("GOOGLE_SERVICE_ACCOUNT_JSON") {
        ServiceAccountKey::from_json(&json)
    } else if let Some(file) = get("GOOGLE_SERVICE_ACCOUNT_FILE") {
        ServiceAccountKey::from_file(Path::new(&file))
    } else if let Some(token) = get("GOOGLE_DRIVE_ACCESS_TOKEN") {
        return Ok(Credentials::AccessToken(token));
    } else {
        return Err(StorageError::Configuration(
            "Drive backend needs GOOGLE_SERVICE_ACCOUNT_JSON, GOOGLE_SERVICE_ACCOUNT_FILE \
             or GOOGLE_DRIVE_ACCESS_TOKEN"
                .to_string(),
        ));
    };

    key.map(Credentials::ServiceAccount)
        .map_err(|e| StorageError::Configuration(format!("Invalid service account key: {}", e)))
}

/// Platform data directory for records (`.../memory-store/mcp-data`)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("memory-store")
        .join(DEFAULT_RECORDS_FOLDER)
}
