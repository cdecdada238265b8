//! services/api/src/adapters/anthropic.rs
//!
//! Direct provider client, used when the service runs with its own API key
//! instead of the hosted proxy. Unlike the proxy path it enforces a request timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;
use ully_core::payload::ProviderMessage;
use ully_core::ports::{ChatService, PortError, PortResult};

const API_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ProviderMessage],
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Joins the text blocks of a messages response.
fn collect_text(body: &str) -> PortResult<String> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| PortError::Unexpected(format!("malformed provider response: {}", e)))?;
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        return Err(PortError::Unexpected("provider response had no text".to_string()));
    }
    Ok(text)
}

#[derive(Clone)]
pub struct AnthropicChatAdapter {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl AnthropicChatAdapter {
    pub fn new(client: Client, api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            client,
            base_url: API_BASE_URL.to_string(),
            api_key,
            model,
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ChatService for AnthropicChatAdapter {
    async fn chat_with_history(
        &self,
        messages: &[ProviderMessage],
        system_prompt: &str,
        max_tokens: u32,
    ) -> PortResult<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            system: system_prompt,
            messages,
        };

        let response = self
            .client
            .post(self.api_url("/v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PortError::Timeout
                } else {
                    PortError::Unexpected(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                PortError::Timeout
            } else {
                PortError::Unexpected(e.to_string())
            }
        })?;

        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(PortError::RateLimited(None)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PortError::Unauthorized),
            s if !s.is_success() => {
                warn!("Provider returned HTTP {}: {}", s.as_u16(), text);
                Err(PortError::Unexpected(format!("provider returned HTTP {}", s.as_u16())))
            }
            _ => collect_text(&text),
        }
    }
}
