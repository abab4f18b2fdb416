//! Completion client for local OpenAI-style inference servers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default request timeout for completion calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Request body for the `/v1/completions` endpoint.
#[derive(Debug, Clone, Serialize)]
struct CompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

/// One completion choice in the server response.
#[derive(Debug, Clone, Deserialize)]
struct CompletionChoice {
    text: String,
}

/// Response body for the `/v1/completions` endpoint.
#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

/// One model entry in the `/v1/models` response.
#[derive(Debug, Clone, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Response body for the `/v1/models` endpoint.
#[derive(Debug, Clone, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

/// Client for an OpenAI-style completion server (llama.cpp, vLLM, LM Studio).
#[derive(Debug, Clone)]
pub struct InferClient {
    http_client: reqwest::Client,
    base_url: String,
    model: Option<String>,
}

impl InferClient {
    /// Creates a client for the given base URL (e.g. `http://localhost:1234`).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: None,
        })
    }

    /// Pins requests to a specific model id.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Requests a completion for `prompt` and returns the generated text.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, rate limiting, or a
    /// response without any choices.
    pub async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let body = CompletionRequest {
            model: self.model.as_deref(),
            prompt,
            max_tokens,
            temperature,
        };

        let response = self
            .http_client
            .post(format!("{}/v1/completions", self.base_url))
            .json(&body)
            .send()
            .await?;

        let response = check_status(response)?;
        let parsed: CompletionResponse = response.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| Error::InvalidResponse("completion had no choices".into()))
    }

    /// Probes the server for its loaded model.
    ///
    /// Returns `None` when the server is reachable but reports no model.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    pub async fn health_probe(&self) -> Result<Option<String>> {
        let response = self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .send()
            .await?;

        let response = check_status(response)?;
        let parsed: ModelsResponse = response.json().await?;
        Ok(parsed.data.into_iter().next().map(|m| m.id))
    }
}

/// Maps non-success statuses to typed errors.
fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 429 {
        return Err(Error::RateLimited {
            retry_after_secs: parse_retry_after(&response),
        });
    }
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(Error::Unauthorized);
    }
    Err(Error::Server {
        status: status.as_u16(),
    })
}

/// Reads a numeric `Retry-After` header if the server sent one.
fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
