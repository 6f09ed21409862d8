//! Password sign-in against the auth REST API

use crate::{Result, Session, StorageConfig, StorageError};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Auth REST API client
#[derive(Clone)]
pub struct AuthClient {
    config: StorageConfig,
    http: Client,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
}

#[derive(Deserialize, Default)]
struct AuthErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AuthClient {
    /// Create a new auth client
    pub fn new(config: StorageConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;

        Ok(Self { config, http })
    }

    /// Exchange email and password for a session
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}/token", self.config.auth_url());

        let response = self
            .http
            .post(&url)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.api_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let body: AuthErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let reason = body
                .error_description
                .or(body.msg)
                .or(body.message)
                .unwrap_or(text);
            return Err(StorageError::Auth(format!("sign-in rejected ({}): {}", status, reason)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;

        info!(user_id = %token.user.id, "Signed in");
        Ok(Session::new(token.user.id, token.access_token))
    }

    /// Revoke the session server-side
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn sign_out(&self, session: &Session) -> Result<()> {
        let url = format!("{}/logout", self.config.auth_url());

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.config.api_key)
            .header(header::AUTHORIZATION, session.bearer())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!("sign-out rejected ({}): {}", status, text)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sign_in_with_password() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(body_json(serde_json::json!({"email": "ana@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "jwt-abc",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "r-1",
                "user": {"id": "3f2a", "email": "ana@example.com"}
            })))
            .mount(&server)
            .await;

        let auth = AuthClient::new(StorageConfig::new(server.uri()).with_api_key("anon")).unwrap();
        let session = auth.sign_in_with_password("ana@example.com", "pw").await.unwrap();
        assert_eq!(session.user_id, "3f2a");
        assert_eq!(session.access_token, "jwt-abc");
    }

    #[tokio::test]
    async fn test_sign_in_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let auth = AuthClient::new(StorageConfig::new(server.uri())).unwrap();
        let err = auth.sign_in_with_password("ana@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, StorageError::Auth(ref m) if m.contains("Invalid login credentials")));
    }
}
