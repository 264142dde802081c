//! HTTP client for the reMarkable cloud.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{DeviceConnector, RemoteError, RemoteResult, RemoteTree};
use crate::models::{Device, RootPointer};
use crate::util::{compact_text, normalize_text_option};

/// Token service used for device registration and user token renewal
pub const DEFAULT_AUTH_URL: &str = "https://webapp-prod.cloud.remarkable.engineering";
/// Document storage service
pub const DEFAULT_SYNC_URL: &str = "https://internal.cloud.remarkable.com";

const DEVICE_DESCRIPTION: &str = "browser-chrome";

/// Client for one user's document tree, authenticated with a user token
#[derive(Clone)]
pub struct RemarkableClient {
    client: reqwest::Client,
    sync_url: String,
    user_token: String,
}

impl std::fmt::Debug for RemarkableClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemarkableClient")
            .field("sync_url", &self.sync_url)
            .field("user_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RootResponse {
    #[serde(default)]
    hash: String,
    generation: u64,
}

#[derive(Debug, Serialize)]
struct RootUpdate<'a> {
    hash: &'a str,
    generation: u64,
    broadcast: bool,
}

#[derive(Debug, Serialize)]
struct SyncCompleteRequest {
    generation: u64,
}

impl RemarkableClient {
    pub fn new(
        client: reqwest::Client,
        sync_url: impl Into<String>,
        user_token: impl Into<String>,
    ) -> RemoteResult<Self> {
        Ok(Self {
            client,
            sync_url: normalize_endpoint(sync_url.into())?,
            user_token: user_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.sync_url)
    }
}

#[async_trait]
impl RemoteTree for RemarkableClient {
    async fn get_root_hash(&self) -> RemoteResult<RootPointer> {
        let response = self
            .client
            .get(self.url("/sync/v3/root"))
            .bearer_auth(&self.user_token)
            .send()
            .await?;
        let root = check(response).await?.json::<RootResponse>().await?;
        Ok(RootPointer {
            hash: root.hash,
            generation: root.generation,
        })
    }

    async fn put_root_hash(&self, hash: &str, expected_generation: u64) -> RemoteResult<u64> {
        let response = self
            .client
            .put(self.url("/sync/v3/root"))
            .bearer_auth(&self.user_token)
            .json(&RootUpdate {
                hash,
                generation: expected_generation,
                broadcast: true,
            })
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED
        ) {
            return Err(RemoteError::Conflict {
                expected: expected_generation,
            });
        }

        let root = check(response).await?.json::<RootResponse>().await?;
        Ok(root.generation)
    }

    async fn get_blob(&self, hash: &str) -> RemoteResult<Vec<u8>> {
        let response = self
            .client
            .get(self.url(&format!("/sync/v3/files/{hash}")))
            .bearer_auth(&self.user_token)
            .send()
            .await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }

    async fn put_blob(&self, hash: &str, filename: &str, bytes: Vec<u8>) -> RemoteResult<()> {
        let response = self
            .client
            .put(self.url(&format!("/sync/v3/files/{hash}")))
            .bearer_auth(&self.user_token)
            .header("rm-filename", filename)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn sync_complete(&self, generation: u64) -> RemoteResult<()> {
        let response = self
            .client
            .post(self.url("/sync/v2/sync-complete"))
            .bearer_auth(&self.user_token)
            .json(&SyncCompleteRequest { generation })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceRegistration<'a> {
    code: &'a str,
    device_desc: &'a str,
    #[serde(rename = "deviceID")]
    device_id: String,
}

/// Token exchange against the reMarkable auth service
#[derive(Debug, Clone)]
pub struct RemarkableAuth {
    client: reqwest::Client,
    auth_url: String,
}

impl RemarkableAuth {
    pub fn new(client: reqwest::Client, auth_url: impl Into<String>) -> RemoteResult<Self> {
        Ok(Self {
            client,
            auth_url: normalize_endpoint(auth_url.into())?,
        })
    }

    /// Trade a one-time pairing code for a long-lived device token
    pub async fn register_device(&self, code: &str) -> RemoteResult<String> {
        let code = code.trim();
        if code.len() != 8 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RemoteError::Auth(
                "pairing code must be 8 letters or digits".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/token/json/2/device/new", self.auth_url))
            .json(&DeviceRegistration {
                code,
                device_desc: DEVICE_DESCRIPTION,
                device_id: uuid::Uuid::new_v4().to_string(),
            })
            .send()
            .await?;
        token_from(response).await
    }

    /// Trade a device token for a short-lived user token
    pub async fn user_token(&self, device_token: &str) -> RemoteResult<String> {
        let response = self
            .client
            .post(format!("{}/token/json/2/user/new", self.auth_url))
            .bearer_auth(device_token)
            .send()
            .await?;
        token_from(response).await
    }
}

/// Connects linked devices to their reMarkable document tree
#[derive(Debug, Clone)]
pub struct RemarkableConnector {
    auth: RemarkableAuth,
    client: reqwest::Client,
    sync_url: String,
}

impl RemarkableConnector {
    pub fn new(auth_url: &str, sync_url: &str) -> RemoteResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            auth: RemarkableAuth::new(client.clone(), auth_url)?,
            client,
            sync_url: normalize_endpoint(sync_url.to_string())?,
        })
    }

    pub fn auth(&self) -> &RemarkableAuth {
        &self.auth
    }
}

#[async_trait]
impl DeviceConnector for RemarkableConnector {
    async fn connect(&self, device: &Device) -> RemoteResult<Arc<dyn RemoteTree>> {
        let user_token = self.auth.user_token(&device.token).await?;
        tracing::debug!(user = %device.user_id, "Obtained device cloud user token");
        let client = RemarkableClient::new(self.client.clone(), &self.sync_url, user_token)?;
        Ok(Arc::new(client))
    }
}

async fn check(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(status, &body);
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        Err(RemoteError::Auth(message))
    } else {
        Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

async fn token_from(response: Response) -> RemoteResult<String> {
    let token = check(response).await?.text().await?;
    normalize_text_option(Some(token))
        .ok_or_else(|| RemoteError::Malformed("token response was empty".to_string()))
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

fn normalize_endpoint(raw: String) -> RemoteResult<String> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| RemoteError::Malformed("endpoint must not be empty".to_string()))?;
    if crate::util::is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::Malformed(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
