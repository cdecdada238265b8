//! services/api/src/adapters/chat_proxy.rs
//!
//! This module contains the adapter for the hosted chat proxy function.
//! It implements the `ChatService` port from the `core` crate. The proxy holds
//! the provider key and enforces the per-user daily quota.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ully_core::payload::ProviderMessage;
use ully_core::ports::{ChatService, PortError, PortResult};

/// Error status the proxy uses for an exhausted quota, in both spellings it emits.
const RATE_LIMIT_STATUSES: [&str; 2] = ["RESOURCE_EXHAUSTED", "resource-exhausted"];

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct CallableRequest<'a> {
    data: ChatPayload<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatPayload<'a> {
    messages: &'a [ProviderMessage],
    system_prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CallableResponse {
    result: Option<ChatResult>,
    error: Option<CallableError>,
}

#[derive(Deserialize)]
struct ChatResult {
    text: Option<String>,
}

#[derive(Deserialize)]
struct CallableError {
    status: Option<String>,
    message: Option<String>,
}

/// Maps a proxy reply onto the port contract.
pub(crate) fn interpret_response(status: StatusCode, body: &str) -> PortResult<String> {
    let parsed = serde_json::from_str::<CallableResponse>(body).ok();

    if let Some(CallableResponse {
        error: Some(error), ..
    }) = &parsed
    {
        let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
            || error
                .status
                .as_deref()
                .is_some_and(|s| RATE_LIMIT_STATUSES.contains(&s));
        if rate_limited {
            return Err(PortError::RateLimited(error.message.clone()));
        }
        return Err(PortError::Unexpected(format!(
            "chat proxy error ({}): {}",
            error.status.as_deref().unwrap_or("unknown"),
            error.message.as_deref().unwrap_or("no message")
        )));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(PortError::RateLimited(None));
    }
    if !status.is_success() {
        return Err(PortError::Unexpected(format!(
            "chat proxy returned HTTP {}",
            status.as_u16()
        )));
    }

    parsed
        .and_then(|p| p.result)
        .and_then(|r| r.text)
        .ok_or_else(|| PortError::Unexpected("chat proxy reply had no text".to_string()))
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatService` by calling the chat proxy function.
#[derive(Clone)]
pub struct ChatProxyAdapter {
    client: Client,
    url: String,
    token: Option<String>,
}

impl ChatProxyAdapter {
    /// Creates a new `ChatProxyAdapter`.
    pub fn new(client: Client, url: String, token: Option<String>) -> Self {
        Self { client, url, token }
    }
}

//=========================================================================================
// `ChatService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatService for ChatProxyAdapter {
    async fn chat_with_history(
        &self,
        messages: &[ProviderMessage],
        system_prompt: &str,
        max_tokens: u32,
    ) -> PortResult<String> {
        let body = CallableRequest {
            data: ChatPayload {
                messages,
                system_prompt,
                max_tokens,
            },
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Chat proxy unreachable: {}", e);
            PortError::Unexpected(e.to_string())
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!("Chat proxy answered HTTP {} ({} bytes).", status, text.len());
        interpret_response(status, &text)
    }
}
