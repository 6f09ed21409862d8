//! In-memory object storage for testing and local development

use crate::{
    BucketInfo, ListOptions, ObjectEntry, ObjectStorage, Result, Session, StorageError,
    UploadOptions,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;

/// An object held by [`MemoryStorage`]
#[derive(Clone, Debug)]
pub struct StoredObject {
    /// Object bytes
    pub data: Bytes,
    /// Content type recorded at write time
    pub content_type: String,
    /// Cache max-age recorded at write time
    pub cache_control: String,
    /// Time of the last write
    pub updated_at: DateTime<Utc>,
}

/// An in-memory object store
#[derive(Clone, Default)]
pub struct MemoryStorage {
    buckets: Arc<DashMap<String, BucketInfo>>,
    objects: Arc<DashMap<(String, String), StoredObject>>,
    restricted: Arc<DashSet<String>>,
}

impl MemoryStorage {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given buckets
    pub fn with_buckets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for name in names {
            store.create_bucket(name);
        }
        store
    }

    /// Create a bucket (no-op if it exists)
    pub fn create_bucket(&self, name: impl Into<String>) {
        let name = name.into();
        self.buckets
            .entry(name.clone())
            .or_insert_with(|| BucketInfo::new(name));
    }

    /// Reject every call on `bucket` as a storage policy would
    pub fn restrict(&self, bucket: impl Into<String>) {
        self.restricted.insert(bucket.into());
    }

    /// Lift a restriction
    pub fn unrestrict(&self, bucket: &str) {
        self.restricted.remove(bucket);
    }

    /// Get a stored object
    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Number of objects in a bucket
    pub fn object_count(&self, bucket: &str) -> usize {
        self.objects.iter().filter(|entry| entry.key().0 == bucket).count()
    }

    /// Total bytes stored
    pub fn total_size(&self) -> u64 {
        self.objects.iter().map(|entry| entry.value().data.len() as u64).sum()
    }

    fn check_bucket(&self, bucket: &str) -> Result<()> {
        if self.restricted.contains(bucket) {
            return Err(StorageError::PermissionDenied(format!(
                "access to bucket {} is not allowed by policy",
                bucket
            )));
        }
        if !self.buckets.contains_key(bucket) {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn list_buckets(&self, _session: &Session) -> Result<Vec<BucketInfo>> {
        let mut buckets: Vec<BucketInfo> = self.buckets.iter().map(|entry| entry.value().clone()).collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn list_objects(
        &self,
        _session: &Session,
        bucket: &str,
        prefix: &str,
        options: ListOptions,
    ) -> Result<Vec<ObjectEntry>> {
        self.check_bucket(bucket)?;

        let mut entries: Vec<ObjectEntry> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == bucket && entry.key().1.starts_with(prefix))
            .filter(|entry| match &options.search {
                Some(term) => entry.key().1.contains(term.as_str()),
                None => true,
            })
            .map(|entry| ObjectEntry {
                name: entry.key().1.clone(),
                id: Some(entry.key().1.clone()),
                updated_at: Some(entry.value().updated_at),
                metadata: Some(serde_json::json!({
                    "size": entry.value().data.len(),
                    "mimetype": entry.value().content_type,
                })),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let offset = options.offset.unwrap_or(0) as usize;
        let limit = options.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn probe(&self, _session: &Session, _bucket: &str, _path: &str) -> Result<()> {
        Ok(())
    }

    async fn upload(
        &self,
        _session: &Session,
        bucket: &str,
        path: &str,
        payload: Bytes,
        options: UploadOptions,
    ) -> Result<String> {
        self.check_bucket(bucket)?;

        let key = (bucket.to_string(), path.to_string());
        if !options.upsert && self.objects.contains_key(&key) {
            return Err(StorageError::AlreadyExists {
                bucket: bucket.to_string(),
                path: path.to_string(),
            });
        }

        self.objects.insert(
            key,
            StoredObject {
                data: payload,
                content_type: options.content_type,
                cache_control: options.cache_control,
                updated_at: Utc::now(),
            },
        );
        Ok(path.to_string())
    }

    async fn remove(&self, _session: &Session, bucket: &str, paths: &[String]) -> Result<Vec<String>> {
        self.check_bucket(bucket)?;

        Ok(paths
            .iter()
            .filter(|path| self.objects.remove(&(bucket.to_string(), (*path).clone())).is_some())
            .cloned()
            .collect())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{}/{}", bucket, crate::encode_path(path))
    }
}
