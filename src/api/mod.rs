pub mod chat;
pub mod sources;
pub mod tasks;

use std::sync::Arc;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Fragment;
use crate::stream::FragmentDecoder;

/// Supplies the bearer token for each outgoing request.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Fixed token, or none at all.
pub struct StaticToken(pub Option<String>);

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
}

/// Every JSON response is wrapped as `{status_code, message, data}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

pub type FragmentStream = BoxStream<'static, Result<Vec<Fragment>, ApiError>>;

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        ApiClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        tracing::debug!("GET {}", path);
        let response = self.authorize(self.client.get(self.url(path))).send().await?;
        read_envelope(response).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", path);
        let response = self
            .authorize(self.client.post(self.url(path)).json(body))
            .send()
            .await?;
        read_envelope(response).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("PUT {}", path);
        let response = self
            .authorize(self.client.put(self.url(path)).json(body))
            .send()
            .await?;
        read_envelope(response).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        tracing::debug!("DELETE {}", path);
        let response = self.authorize(self.client.delete(self.url(path))).send().await?;
        read_envelope(response).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, ApiError> {
        tracing::debug!("POST {} (multipart)", path);
        let response = self
            .authorize(self.client.post(self.url(path)).multipart(form))
            .send()
            .await?;
        read_envelope(response).await
    }

    /// Opens a long-lived event-stream response and decodes it into fragment batches.
    pub async fn post_stream<B>(&self, path: &str, body: &B) -> Result<FragmentStream, ApiError>
    where
        B: Serialize + ?Sized,
    {
        tracing::debug!("POST {} (stream)", path);
        let response = self
            .authorize(
                self.client
                    .post(self.url(path))
                    .header(ACCEPT, "text/event-stream")
                    .header(CACHE_CONTROL, "no-cache")
                    .json(body),
            )
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.bytes_stream().boxed();
        let stream = futures_util::stream::unfold(
            (body, FragmentDecoder::default(), false),
            |(mut body, mut decoder, finished)| async move {
                if finished {
                    return None;
                }
                match body.next().await {
                    Some(Ok(bytes)) => {
                        let fragments = decoder.push(&bytes);
                        Some((Ok(fragments), (body, decoder, false)))
                    }
                    Some(Err(e)) => Some((Err(ApiError::from(e)), (body, decoder, true))),
                    None => {
                        let rest = decoder.finish();
                        Some((Ok(rest), (body, decoder, true)))
                    }
                }
            },
        );
        Ok(stream.boxed())
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|e| {
            e.message.filter(|m| !m.is_empty()).or_else(|| {
                e.detail.map(|d| match d {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
            })
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    Err(ApiError::Status { status, message })
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
    Ok(envelope.data)
}
