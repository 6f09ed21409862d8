//! # JobSwipe Storage
//!
//! Backend adapters used by the JobSwipe upload engine.
//!
//! This crate provides:
//! - **ObjectStorage trait**: bucket listing, object list/probe/upload/remove and public URLs
//! - **StorageClient**: HTTP implementation against the storage REST API
//! - **MemoryStorage**: in-process implementation for tests and local development
//! - **Sessions**: the `Session` record, the `SessionProvider` seam and a password sign-in client
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Upload Engine              │
//! ├────────────────────┬────────────────────┤
//! │ ObjectStorage Trait│ SessionProvider    │
//! ├──────────┬─────────┼──────────┬─────────┤
//! │ Storage  │ Memory  │ Session  │  Auth   │
//! │ Client   │ Storage │ Store    │ Client  │
//! └──────────┴─────────┴──────────┴─────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use jobswipe_storage::{ObjectStorage, StorageClient, StorageConfig, UploadOptions};
//!
//! let storage = StorageClient::new(StorageConfig::new(url).with_api_key(key))?;
//! let path = storage
//!     .upload(&session, "resumes", "u1/resume/1_cv.pdf", data, UploadOptions::new("application/pdf"))
//!     .await?;
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod session;
pub mod types;

pub use auth::AuthClient;
pub use client::StorageClient;
pub use config::StorageConfig;
pub use error::{Result, StorageError};
pub use memory::{MemoryStorage, StoredObject};
pub use session::{Session, SessionProvider, SessionStore};
pub use types::{BucketInfo, ListOptions, ObjectEntry, UploadOptions, DEFAULT_CACHE_CONTROL};

use async_trait::async_trait;
use bytes::Bytes;

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// List the buckets visible to the session
    async fn list_buckets(&self, session: &Session) -> Result<Vec<BucketInfo>>;

    /// List objects in a bucket under `prefix`
    async fn list_objects(
        &self,
        session: &Session,
        bucket: &str,
        prefix: &str,
        options: ListOptions,
    ) -> Result<Vec<ObjectEntry>>;

    /// Lightweight reachability check against a destination.
    ///
    /// Succeeds whenever the backend answers, including "not found".
    async fn probe(&self, session: &Session, bucket: &str, path: &str) -> Result<()>;

    /// Write an object and return the stored path
    async fn upload(
        &self,
        session: &Session,
        bucket: &str,
        path: &str,
        payload: Bytes,
        options: UploadOptions,
    ) -> Result<String>;

    /// Remove objects, returning the names that were removed
    async fn remove(&self, session: &Session, bucket: &str, paths: &[String]) -> Result<Vec<String>>;

    /// Public URL of an object
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Percent-encode each segment of an object path, keeping the separators
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
