//! Google Drive v3 API client

pub mod auth;
pub mod client;
pub mod errors;
pub mod types;

pub use auth::{Credentials, ServiceAccountKey};
pub use client::{ClientOptions, DriveClient, ErrorEntry};
pub use errors::DriveError;
pub use types::*;
