//! Common types for storage operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default `cache-control` max-age for uploaded objects (seconds)
pub const DEFAULT_CACHE_CONTROL: &str = "3600";

/// A bucket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    /// Bucket id
    #[serde(default)]
    pub id: String,
    /// Bucket name
    pub name: String,
    /// Whether objects are readable without a session
    #[serde(default)]
    pub public: bool,
}

impl BucketInfo {
    /// Create a private bucket description
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            public: false,
        }
    }
}

/// An entry returned by a list call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Object name relative to the listed prefix
    pub name: String,
    /// Object id (absent for folder placeholders)
    #[serde(default)]
    pub id: Option<String>,
    /// Last update time
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Backend-specific metadata (size, mimetype, ...)
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Options for listing objects
#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    /// Maximum entries to return
    pub limit: Option<u32>,
    /// Number of entries to skip
    pub offset: Option<u32>,
    /// Filter by name substring
    pub search: Option<String>,
}

impl ListOptions {
    /// List at most `limit` entries
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }
}

/// Options for a single object write
#[derive(Clone, Debug)]
pub struct UploadOptions {
    /// Content type stored with the object
    pub content_type: String,
    /// `cache-control` max-age in seconds
    pub cache_control: String,
    /// Overwrite an existing object instead of failing
    pub upsert: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            content_type: "application/octet-stream".to_string(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            upsert: false,
        }
    }
}

impl UploadOptions {
    /// Create options for the given content type
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Default::default()
        }
    }

    /// Overwrite existing objects
    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// Set the cache max-age
    pub fn with_cache_control(mut self, seconds: impl Into<String>) -> Self {
        self.cache_control = seconds.into();
        self
    }
}
