//! HTTP client for the storage REST API

use crate::{
    encode_path, BucketInfo, ListOptions, ObjectEntry, ObjectStorage, Result, Session,
    StorageConfig, StorageError, UploadOptions,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Storage REST API client
#[derive(Clone)]
pub struct StorageClient {
    config: StorageConfig,
    http: Client,
}

#[derive(Serialize)]
struct ListBody<'a> {
    prefix: &'a str,
    limit: u32,
    offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
    #[serde(rename = "sortBy")]
    sort_by: SortBy,
}

#[derive(Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

#[derive(Serialize)]
struct RemoveBody<'a> {
    prefixes: &'a [String],
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

impl StorageClient {
    /// Create a new client with the given configuration
    pub fn new(config: StorageConfig) -> Result<Self> {
        url::Url::parse(&config.endpoint)
            .map_err(|e| StorageError::Configuration(format!("invalid endpoint {}: {}", config.endpoint, e)))?;

        let mut headers = header::HeaderMap::new();
        let user_agent = config
            .user_agent
            .parse()
            .map_err(|_| StorageError::Configuration("invalid user agent".to_string()))?;
        headers.insert(header::USER_AGENT, user_agent);

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;

        Ok(Self { config, http })
    }

    /// Get the configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.config.storage_url(),
            bucket,
            encode_path(path.trim_start_matches('/'))
        )
    }

    fn authorized(&self, req: RequestBuilder, session: &Session) -> RequestBuilder {
        req.header("apikey", &self.config.api_key)
            .header(header::AUTHORIZATION, session.bearer())
    }

    async fn check(response: Response, bucket: &str, path: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(StorageError::from_response(status.as_u16(), &text, bucket, path))
    }
}

#[async_trait]
impl ObjectStorage for StorageClient {
    #[instrument(skip(self, session))]
    async fn list_buckets(&self, session: &Session) -> Result<Vec<BucketInfo>> {
        let url = format!("{}/bucket", self.config.storage_url());
        debug!("Listing buckets at {}", url);

        let response = self.authorized(self.http.get(&url), session).send().await?;
        let response = Self::check(response, "", "").await?;

        response
            .json()
            .await
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    #[instrument(skip(self, session, options))]
    async fn list_objects(
        &self,
        session: &Session,
        bucket: &str,
        prefix: &str,
        options: ListOptions,
    ) -> Result<Vec<ObjectEntry>> {
        let url = format!("{}/object/list/{}", self.config.storage_url(), bucket);
        let body = ListBody {
            prefix,
            limit: options.limit.unwrap_or(100),
            offset: options.offset.unwrap_or(0),
            search: options.search.as_deref(),
            sort_by: SortBy {
                column: "name",
                order: "asc",
            },
        };

        let response = self
            .authorized(self.http.post(&url), session)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, bucket, prefix).await?;

        response
            .json()
            .await
            .map_err(|e| StorageError::Deserialization(e.to_string()))
    }

    #[instrument(skip(self, session))]
    async fn probe(&self, session: &Session, bucket: &str, path: &str) -> Result<()> {
        let url = self.object_url(bucket, path);
        let response = self.authorized(self.http.head(&url), session).send().await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(StorageError::Api {
                status: status.as_u16(),
                error: status.canonical_reason().unwrap_or_default().to_string(),
                message: format!("probe of {}/{} failed", bucket, path),
            });
        }
        debug!("Probe answered with {}", status);
        Ok(())
    }

    #[instrument(skip(self, session, payload, options), fields(size = payload.len(), content_type = %options.content_type))]
    async fn upload(
        &self,
        session: &Session,
        bucket: &str,
        path: &str,
        payload: Bytes,
        options: UploadOptions,
    ) -> Result<String> {
        let url = self.object_url(bucket, path);

        let response = self
            .authorized(self.http.post(&url), session)
            .header(header::CONTENT_TYPE, &options.content_type)
            .header(header::CACHE_CONTROL, format!("max-age={}", options.cache_control))
            .header("x-upsert", options.upsert.to_string())
            .body(payload)
            .send()
            .await?;
        let response = Self::check(response, bucket, path).await?;

        // The backend answers with `{"Key": "<bucket>/<path>"}`
        let key = match response.json::<UploadResponse>().await {
            Ok(body) => body.key,
            Err(e) => {
                debug!(error = %e, "Upload response body not understood, keeping requested path");
                None
            }
        };
        let stored = key
            .map(|key| {
                key.strip_prefix(&format!("{}/", bucket))
                    .map(str::to_string)
                    .unwrap_or(key)
            })
            .unwrap_or_else(|| path.to_string());

        Ok(stored)
    }

    #[instrument(skip(self, session))]
    async fn remove(&self, session: &Session, bucket: &str, paths: &[String]) -> Result<Vec<String>> {
        let url = format!("{}/object/{}", self.config.storage_url(), bucket);

        let response = self
            .authorized(self.http.delete(&url), session)
            .json(&RemoveBody { prefixes: paths })
            .send()
            .await?;
        let response = Self::check(response, bucket, "").await?;

        let removed: Vec<ObjectEntry> = response
            .json()
            .await
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(removed.into_iter().map(|entry| entry.name).collect())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/object/public/{}/{}",
            self.config.storage_url(),
            bucket,
            encode_path(path.trim_start_matches('/'))
        )
    }
}
