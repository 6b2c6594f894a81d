//! Embedding service client for generating text embeddings.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EmbedError;
use crate::models::EmbeddingConfig;

/// Remote embedding API abstraction.
///
/// One call embeds one batch of texts. The service is expected to return the
/// vectors in request order; callers validate that expectation.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Identifier of the model producing the vectors.
    fn model_id(&self) -> &str;
}

/// Request body for the embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: &'a str,
}

/// Response from the embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP client for a hosted embedding service.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbeddingClient {
    /// Create a new embedding client with the given configuration.
    pub fn new(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self, EmbedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbedError::Permanent(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Get the base URL of the embedding service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
            input_type: "document",
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Protocol(format!("malformed embeddings response: {e}")))?;

        Ok(parsed.embeddings)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Keyword fallbacks for errors that carry no HTTP status. Matched against a
// lowercased copy with punctuation and whitespace stripped, so "Timed Out",
// "TIMEOUT:" and "time-out" all hit the same keyword.
const TRANSIENT_KEYWORDS: &[&str] = &[
    "timeout",
    "timedout",
    "connectionreset",
    "connectionrefused",
    "temporarilyunavailable",
    "serviceunavailable",
];

const RATE_LIMIT_KEYWORDS: &[&str] = &["ratelimit", "toomanyrequests", "429"];

fn classify_request_error(error: reqwest::Error) -> EmbedError {
    if error.is_timeout() || error.is_connect() {
        return EmbedError::Transient(error.to_string());
    }
    if let Some(status) = error.status() {
        return classify_status(status, &error.to_string());
    }
    classify_message(&error.to_string())
}

/// Map an HTTP status to an error class. Server-side and throttling statuses
/// are worth retrying; client-side statuses are not.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> EmbedError {
    let detail = format!("status {status}: {body}");
    match status {
        StatusCode::TOO_MANY_REQUESTS => EmbedError::RateLimited(detail),
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => EmbedError::Transient(detail),
        _ if status.is_server_error() => EmbedError::Transient(detail),
        _ => EmbedError::Permanent(detail),
    }
}

/// Classify an error message when no structured status is available.
pub(crate) fn classify_message(message: &str) -> EmbedError {
    let compact: String = message
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    if RATE_LIMIT_KEYWORDS.iter().any(|k| compact.contains(k)) {
        return EmbedError::RateLimited(message.to_string());
    }
    if TRANSIENT_KEYWORDS.iter().any(|k| compact.contains(k)) {
        return EmbedError::Transient(message.to_string());
    }
    EmbedError::Permanent(message.to_string())
}
