//! Backend connection configuration

use std::time::Duration;

/// Connection settings shared by the storage and auth clients
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Backend project URL, e.g. `https://xyz.example.co`
    pub endpoint: String,
    /// Public API key sent as the `apikey` header
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:54321".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            user_agent: format!("jobswipe-storage/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl StorageConfig {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Root of the storage REST API
    pub fn storage_url(&self) -> String {
        format!("{}/storage/v1", self.endpoint.trim_end_matches('/'))
    }

    /// Root of the auth REST API
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.endpoint.trim_end_matches('/'))
    }
}
