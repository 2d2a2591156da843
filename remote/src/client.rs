//! `RemoteClient` over HTTP.
//!
//! # Protocol
//!
//! - create: `POST {base}/collections/{collection}/records`
//! - update: `PUT {base}/collections/{collection}/records/{id}`
//!
//! Both send the [`RemotePush`] as a JSON body and expect a [`RemoteAck`]
//! JSON body back; an empty 2xx body acknowledges the pushed id. Error
//! bodies of the form `{"error": "..."}` are surfaced as the message.

use crate::config::RemoteConfig;
use crate::error::{HttpRemoteError, Result};
use async_trait::async_trait;
use offsync_engine::{RemoteAck, RemoteClient, RemoteError, RemotePush};
use reqwest::{Client, Method, Url};
use serde::Deserialize;

const MAX_ERROR_MESSAGE_LEN: usize = 512;

/// Error body returned by the remote store.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

/// HTTP client for the remote store.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpRemoteClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        if config.base_url.cannot_be_a_base() {
            return Err(HttpRemoteError::InvalidBaseUrl(config.base_url.to_string()));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(HttpRemoteError::Build)?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/collections/{collection}/records[/{id}]`, with every segment
    /// percent-encoded.
    fn records_url(&self, collection: &str, id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| HttpRemoteError::InvalidBaseUrl(self.base_url.to_string()))?;
            segments
                .pop_if_empty()
                .extend(["collections", collection, "records"]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, push: &RemotePush) -> Result<RemoteAck> {
        tracing::debug!(%method, %url, record_id = %push.id, "sending record to remote store");

        let mut request = self.http.request(method, url).json(push);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body, status.canonical_reason());
            tracing::debug!(status = status.as_u16(), record_id = %push.id, %message, "remote store refused record");
            return Err(HttpRemoteError::Status {
                id: push.id.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(RemoteAck {
                id: push.id.clone(),
                revision: None,
            });
        }

        let ack: RemoteAck =
            serde_json::from_slice(&body).map_err(|err| HttpRemoteError::InvalidAck {
                id: push.id.clone(),
                status: status.as_u16(),
                message: err.to_string(),
            })?;
        if ack.id != push.id {
            return Err(HttpRemoteError::InvalidAck {
                id: push.id.clone(),
                status: status.as_u16(),
                message: format!("acknowledged id {} instead", ack.id),
            });
        }
        Ok(ack)
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn create_remote(&self, push: &RemotePush) -> std::result::Result<RemoteAck, RemoteError> {
        let url = self.records_url(&push.collection, None)?;
        Ok(self.send(Method::POST, url, push).await?)
    }

    async fn update_remote(
        &self,
        id: &str,
        push: &RemotePush,
    ) -> std::result::Result<RemoteAck, RemoteError> {
        let url = self.records_url(&push.collection, Some(id))?;
        Ok(self.send(Method::PUT, url, push).await?)
    }
}

/// Human-readable message from an error response body.
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return match parsed.details {
            Some(details) => format!("{}: {}", parsed.error, details),
            None => parsed.error,
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return reason.unwrap_or("no response body").to_string();
    }
    trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}
