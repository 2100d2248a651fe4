//! Drive API Error Types
//!
//! Structured error handling for Google Drive v3 operations.
//! Maps HTTP status codes to specific error variants for retry decisions.

/// Drive API error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriveError {
    #[error("Authentication expired, token needs refresh")]
    AuthExpired,

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Rate limited, try again after backoff")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request error: {0}")]
    Request(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl DriveError {
    /// Whether this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DriveError::RateLimited
                | DriveError::Timeout
                | DriveError::Network(_)
                | DriveError::Server(_, _)
                | DriveError::AuthExpired
        )
    }

    /// Whether the remote object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveError::NotFound(_))
    }

    /// Create a DriveError from an HTTP status code and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => DriveError::AuthExpired,
            403 => DriveError::Forbidden(body.to_string()),
            404 => DriveError::NotFound(body.to_string()),
            408 => DriveError::Timeout,
            429 => DriveError::RateLimited,
            500..=599 => DriveError::Server(status, body.to_string()),
            _ => DriveError::Request(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl From<reqwest::Error> for DriveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DriveError::Timeout
        } else if err.is_connect() || err.is_request() {
            DriveError::Network(err.to_string())
        } else if err.is_decode() {
            DriveError::Decode(err.to_string())
        } else {
            DriveError::Request(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(DriveError::from_status(401, ""), DriveError::AuthExpired));
        assert!(matches!(DriveError::from_status(404, "gone"), DriveError::NotFound(b) if b == "gone"));
        assert!(matches!(DriveError::from_status(429, ""), DriveError::RateLimited));
        assert!(matches!(DriveError::from_status(503, "busy"), DriveError::Server(503, _)));
        assert!(matches!(DriveError::from_status(400, "bad"), DriveError::Request(_)));
    }

    #[test]
    fn test_retryable() {
        assert!(DriveError::RateLimited.is_retryable());
        assert!(DriveError::Server(500, String::new()).is_retryable());
        assert!(!DriveError::NotFound(String::new()).is_retryable());
        assert!(!DriveError::Forbidden(String::new()).is_retryable());
        assert!(!DriveError::AuthFailed(String::new()).is_retryable());
    }
}
