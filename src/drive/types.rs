//! Drive API types
//!
//! Defines types for Google Drive v3 responses and query construction.

use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Drive file/folder information from API responses
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// Opaque object id
    pub id: String,
    /// Name within its parent folder
    pub name: String,
    /// MIME type (absent when not requested in `fields`)
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl DriveFile {
    /// Check if this entry represents a folder
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

/// Response from files.list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    /// Files in this page
    #[serde(default)]
    pub files: Vec<DriveFile>,
    /// Continuation token (None if no more pages)
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Shared drive entry from drives.list
#[derive(Debug, Clone, Deserialize)]
pub struct SharedDrive {
    pub id: String,
    pub name: String,
}

/// Response from drives.list
#[derive(Debug, Deserialize)]
pub struct DriveList {
    #[serde(default)]
    pub drives: Vec<SharedDrive>,
}

/// Metadata part of a multipart create request
#[derive(Debug, Serialize)]
pub struct CreateMetadata<'a> {
    pub name: &'a str,
    pub parents: [&'a str; 1],
}

/// Escape a value for use inside a single-quoted Drive query literal
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Query: child of `parent_id` with exact `name`, optionally restricted to a MIME type
pub fn child_query(parent_id: &str, name: &str, mime_type: Option<&str>) -> String {
    let mut q = format!(
        "name = '{}' and '{}' in parents and trashed = false",
        escape_query_value(name),
        escape_query_value(parent_id)
    );
    if let Some(mime) = mime_type {
        q.push_str(&format!(" and mimeType = '{}'", escape_query_value(mime)));
    }
    q
}

/// Query: non-folder child of `parent_id` with exact `name`
pub fn file_query(parent_id: &str, name: &str) -> String {
    format!(
        "{} and mimeType != '{}'",
        child_query(parent_id, name, None),
        FOLDER_MIME_TYPE
    )
}

/// Query: all children of `parent_id`, optionally narrowed by a name substring
pub fn children_query(parent_id: &str, name_contains: Option<&str>) -> String {
    let mut q = format!(
        "'{}' in parents and trashed = false",
        escape_query_value(parent_id)
    );
    if let Some(fragment) = name_contains {
        q.push_str(&format!(" and name contains '{}'", escape_query_value(fragment)));
    }
    q
}
