//! Error types for the jobswipe-storage crate

use serde::Deserialize;
use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while talking to the storage or auth backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// Bucket does not exist
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// Object does not exist
    #[error("object not found: {bucket}/{path}")]
    ObjectNotFound { bucket: String, path: String },

    /// Object already exists and the write was not an upsert
    #[error("object already exists: {bucket}/{path}")]
    AlreadyExists { bucket: String, path: String },

    /// Storage policy or credentials rejected the call
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other error reported by the backend
    #[error("storage API error ({status}): {message}")]
    Api {
        status: u16,
        error: String,
        message: String,
    },

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// HTTP error
    #[error("http error: {0}")]
    Http(String),

    /// Response body could not be decoded
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Error body returned by the storage API
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "statusCode", default)]
    status_code: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StorageError {
    /// Classify a non-success response from the storage API.
    ///
    /// The `statusCode` field of the body wins over the HTTP status, since the
    /// backend reports policy violations as `400` with `"statusCode": "403"`.
    pub fn from_response(status: u16, body: &str, bucket: &str, path: &str) -> Self {
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
        let status = parsed
            .status_code
            .as_ref()
            .and_then(|v| match v {
                serde_json::Value::String(s) => s.parse().ok(),
                serde_json::Value::Number(n) => n.as_u64().map(|n| n as u16),
                _ => None,
            })
            .unwrap_or(status);
        let error = parsed.error.unwrap_or_default();
        let message = parsed
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| if body.is_empty() { error.clone() } else { body.to_string() });

        let lowered = format!("{} {}", error, message).to_lowercase();

        if status == 401 || status == 403 || lowered.contains("row-level security") {
            return Self::PermissionDenied(message);
        }

        match status {
            404 if lowered.contains("bucket") => Self::BucketNotFound(bucket.to_string()),
            404 => Self::ObjectNotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            },
            409 => Self::AlreadyExists {
                bucket: bucket.to_string(),
                path: path.to_string(),
            },
            _ => Self::Api {
                status,
                error,
                message,
            },
        }
    }

    /// Check if this is a permission-denied signal
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BucketNotFound(_) | Self::ObjectNotFound { .. })
    }

    /// Check if the backend could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StorageError::Timeout(err.to_string())
        } else if err.is_connect() {
            StorageError::Connection(err.to_string())
        } else if err.is_decode() {
            StorageError::Deserialization(err.to_string())
        } else {
            StorageError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}
