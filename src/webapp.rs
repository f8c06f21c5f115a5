//! Webapp chat client
//!
//! HTTP client for the chat backend: `POST /api/chat` for completions and
//! `GET /api/status` as a lightweight health probe. The backend is an
//! operator-controlled service that often runs with a self-signed
//! certificate, so certificate verification is deliberately disabled.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::history::ConversationTurn;

const CHAT_TEMPERATURE: f64 = 0.7;
/// Generous ceiling for slow model generations; still bounded
const CHAT_TIMEOUT: Duration = Duration::from_secs(120);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Chat request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    model_id: &'a str,
    system_prompt: &'a str,
    temperature: f64,
    max_length: usize,
    conversation_history: &'a [ConversationTurn],
}

/// Chat response body.
///
/// The backend reports its own failures in-band via `error`, usually with a
/// non-2xx status; both fields absent means something upstream misbehaved.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: Option<String>,
    pub error: Option<String>,
    pub generation_time: Option<String>,
}

/// Client for the webapp chat backend
#[derive(Debug, Clone)]
pub struct WebappClient {
    client: Client,
    base_url: String,
}

impl WebappClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send one chat turn with the sender's conversation history.
    ///
    /// Resolves with the parsed body for any completed HTTP exchange, 2xx or
    /// not - error classification belongs to the caller, which inspects the
    /// `response`/`error` fields. Returns `Err` only for transport-level
    /// failures (connection refused, DNS, unparseable body).
    pub async fn chat(
        &self,
        message: &str,
        model_id: &str,
        system_prompt: &str,
        history: &[ConversationTurn],
        max_length: usize,
    ) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            message,
            model_id,
            system_prompt,
            temperature: CHAT_TEMPERATURE,
            max_length,
            conversation_history: history,
        };

        debug!(
            "POST {} model={} history_len={} msg_len={}",
            url,
            model_id,
            history.len(),
            message.len()
        );

        let response = self
            .client
            .post(&url)
            .timeout(CHAT_TIMEOUT)
            .json(&body)
            .send()
            .await
            .context("chat request failed")?;

        let status = response.status();
        let parsed: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("invalid JSON response (status {})", status))?;

        Ok(parsed)
    }

    /// Health probe; any error or timeout resolves to false
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/status", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }
}
