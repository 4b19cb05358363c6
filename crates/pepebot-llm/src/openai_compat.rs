//! OpenAI-compatible provider implementation.
//!
//! [`OpenAiCompatProvider`] works with any API that follows the OpenAI
//! chat completion format: OpenAI, OpenRouter, DeepSeek, Groq, local
//! llama.cpp / vLLM servers, and many more. The endpoint is selected
//! by the `base_url` in [`ProviderConfig`].

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::provider::Provider;
use crate::sse::parse_sse_line;
use crate::types::{ChatRequest, ChatResponse, StreamChunk};

/// An LLM provider speaking the OpenAI-compatible chat completion API.
pub struct OpenAiCompatProvider {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new provider from configuration.
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// The provider configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The chat completions endpoint URL.
    fn completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// Build a POST with auth and configured headers applied.
    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        for (k, v) in &self.config.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }

    /// Map a non-2xx response to a typed error.
    async fn status_error(&self, response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => ProviderError::AuthFailed(body),
            404 => ProviderError::ModelNotFound(body),
            _ => ProviderError::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.completions_url();
        debug!(
            provider = %self.config.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion request"
        );

        let response = self.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;

        debug!(
            provider = %self.config.name,
            choices = chat_response.choices.len(),
            finish_reason = ?chat_response.finish_reason(),
            "chat completion response received"
        );

        Ok(chat_response)
    }

    async fn chat_stream(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<()> {
        let url = self.completions_url();
        debug!(
            provider = %self.config.name,
            model = %request.model,
            "sending streaming chat completion request"
        );

        let mut stream_request = request.clone();
        stream_request.stream = Some(true);
        stream_request.tools = Vec::new();

        let response = self
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&stream_request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        // Read the SSE body line by line out of the byte stream.
        use futures_util::StreamExt;
        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = chunk_result
                .map_err(|e| ProviderError::RequestFailed(format!("stream read error: {e}")))?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline_pos) = buffer.find('\n') {
                let line = buffer[..newline_pos].to_string();
                buffer.drain(..=newline_pos);

                let chunks = match parse_sse_line(&line) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(
                            provider = %self.config.name,
                            error = %e,
                            "SSE parse error, skipping line"
                        );
                        continue;
                    }
                };

                for chunk in chunks {
                    if tx.send(chunk).await.is_err() {
                        debug!(
                            provider = %self.config.name,
                            "stream receiver dropped, stopping"
                        );
                        return Ok(());
                    }
                }
            }
        }

        // Flush whatever remains in the buffer.
        if !buffer.trim().is_empty() {
            if let Ok(chunks) = parse_sse_line(&buffer) {
                for chunk in chunks {
                    let _ = tx.send(chunk).await;
                }
            }
        }

        debug!(provider = %self.config.name, "streaming complete");
        Ok(())
    }
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.config.name)
            .field("base_url", &self.config.base_url)
            .field("api_key", &self.config.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}
