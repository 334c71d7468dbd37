//! HTTP client for the remote completion endpoint.
//!
//! Request: `{"contents":[{"role","parts":[{"text"}]}]}`.
//! Success: `{"candidates":[{"content":{"parts":[{"text"}]}}]}`; error: `{"error":{"message"}}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Turn text used when a failure carries no message of its own.
pub const FETCH_FAILED: &str = "Failed to fetch response";

/// Author of a turn as the endpoint sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One history entry on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

impl Content {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion api error ({status}): {}", .message.as_deref().unwrap_or("no error message"))]
    Api {
        status: u16,
        message: Option<String>,
    },
    #[error("malformed completion response: {0}")]
    Malformed(String),
}

impl CompletionError {
    /// Text shown to the user in the error turn: the endpoint's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            CompletionError::Api {
                message: Some(m), ..
            } if !m.trim().is_empty() => m.clone(),
            _ => FETCH_FAILED.to_string(),
        }
    }
}

/// Anything that turns a history into the next model reply (raw text, before markup).
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, contents: Vec<Content>) -> Result<String, CompletionError>;
}

/// Client for the completion endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl CompletionClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Client with a transport timeout; falls back to the default client if the builder fails.
    pub fn with_timeout(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("completion: building client with timeout failed: {}", e);
                reqwest::Client::new()
            });
        Self {
            url: url.into(),
            api_key,
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST the history and return the first candidate's first text part.
    pub async fn generate(&self, contents: &[Content]) -> Result<String, CompletionError> {
        let body = GenerateRequest { contents };
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.query(&[("key", key)]);
        }
        log::debug!("completion: POST {} ({} turns)", self.url, contents.len());
        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message);
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }
        parse_generate_response(&text)
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, contents: Vec<Content>) -> Result<String, CompletionError> {
        self.generate(&contents).await
    }
}

/// Extract the reply text from a 2xx body. An `error` object in the body is reported as an api error.
fn parse_generate_response(body: &str) -> Result<String, CompletionError> {
    let data: GenerateResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Malformed(e.to_string()))?;
    if let Some(err) = data.error {
        return Err(CompletionError::Api {
            status: 200,
            message: err.message,
        });
    }
    data.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| CompletionError::Malformed("no candidate text".to_string()))
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [Content],
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}
