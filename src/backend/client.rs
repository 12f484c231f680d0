//! HTTP client for the email backend
//!
//! Speaks the backend's JSON endpoints for the message queue, reply drafting,
//! revision and sending, plus the speech synthesis and transcription
//! endpoints used by the remote speech adapters. Every request carries the
//! configured session cookie. Idempotent calls retry with exponential backoff.

use super::{EmailQueue, MessageContent, ReplyService, RevisionRequest, ServiceError};
use crate::config::BackendConfig;
use async_trait::async_trait;
use reqwest::{header, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Default timeout for API requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for idempotent requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff in milliseconds
const BASE_RETRY_DELAY_MS: u64 = 100;

/// Status the send endpoint reports for a delivered email
const SENT_STATUS: &str = "sent";

#[derive(Debug, Deserialize)]
struct QueueResponse {
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

impl From<MessageResponse> for MessageContent {
    fn from(response: MessageResponse) -> Self {
        fn or_placeholder(value: Option<String>, placeholder: &str) -> String {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| placeholder.to_string())
        }

        MessageContent {
            subject: or_placeholder(response.subject, "(No subject)"),
            body: or_placeholder(response.body, "(No body)"),
            summary: or_placeholder(response.summary, "(No summary)"),
        }
    }
}

#[derive(Debug, Serialize)]
struct DraftRequest<'a> {
    reply: &'a str,
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    formatted_reply: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    reply_text: &'a str,
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP client for the email backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    session_cookie: Option<String>,
}

impl BackendClient {
    /// Create a client from backend configuration
    pub fn new(config: &BackendConfig) -> Result<Self, ServiceError> {
        Self::with_config(
            &config.base_url,
            config.timeout_secs,
            config.session_cookie.clone(),
        )
    }

    /// Create a client against a custom base URL with default settings
    pub fn with_base_url(base_url: &str) -> Result<Self, ServiceError> {
        Self::with_config(base_url, DEFAULT_TIMEOUT_SECS, None)
    }

    /// Create a client with full configuration
    ///
    /// # Arguments
    ///
    /// * `base_url` - Backend base URL; a trailing slash is ignored
    /// * `timeout_secs` - Request timeout in seconds
    /// * `session_cookie` - Credential sent as the `Cookie` header
    pub fn with_config(
        base_url: &str,
        timeout_secs: u64,
        session_cookie: Option<String>,
    ) -> Result<Self, ServiceError> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::ConnectionFailed(format!("HTTP client setup: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
            session_cookie,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Where the user signs in when the backend reports them unauthenticated
    pub fn login_url(&self) -> String {
        self.url("/login")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a single request and map transport and status failures
    async fn send_once(&self, request: RequestBuilder) -> Result<Response, ServiceError> {
        let request = match &self.session_cookie {
            Some(cookie) => request.header(header::COOKIE, cookie),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout(self.timeout.as_secs())
            } else {
                ServiceError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ServiceError::Unauthorized);
        }

        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(ServiceError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Send an idempotent request, retrying transient failures
    ///
    /// Retries up to 3 times with exponential backoff (100ms, 200ms).
    async fn send_with_retry<F>(&self, label: &str, build: F) -> Result<Response, ServiceError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut last_error: Option<ServiceError> = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            match self.send_once(build(&self.client)).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::debug!("{} succeeded on attempt {}", label, attempt + 1);
                    }
                    return Ok(response);
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!("{} failed: {}", label, e);
                    return Err(e);
                }
                Err(e) => {
                    if attempt == MAX_RETRY_ATTEMPTS - 1 {
                        tracing::error!("{} failed (attempt {}): {}", label, attempt + 1, e);
                        last_error = Some(e);
                        break;
                    }

                    let delay_ms = BASE_RETRY_DELAY_MS * 2u64.pow(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}), retrying in {}ms: {}",
                        label,
                        attempt + 1,
                        delay_ms,
                        e
                    );
                    last_error = Some(e);
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }

        Err(ServiceError::RetriesExhausted {
            attempts: MAX_RETRY_ATTEMPTS,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, ServiceError> {
        response
            .json()
            .await
            .map_err(|e| ServiceError::ParseError(e.to_string()))
    }

    /// Synthesise speech audio for `text`
    pub async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        let url = self.url("/synthesize_speech");
        let body = SynthesisRequest { text };
        let response = self
            .send_with_retry("Speech synthesis", |client| client.post(&url).json(&body))
            .await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::ParseError(e.to_string()))?;

        tracing::debug!("Synthesised {} bytes of audio", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Transcribe a recorded audio clip to text
    pub async fn transcribe_audio(&self, audio: &[u8]) -> Result<String, ServiceError> {
        let url = self.url("/transcribe_audio");
        let response = self
            .send_with_retry("Transcription", |client| {
                client
                    .post(&url)
                    .header(header::CONTENT_TYPE, "audio/wav")
                    .body(audio.to_vec())
            })
            .await?;

        let transcription: TranscriptionResponse = Self::parse_json(response).await?;
        Ok(transcription.text)
    }
}

#[async_trait]
impl EmailQueue for BackendClient {
    async fn fetch_queue(&self) -> Result<Vec<String>, ServiceError> {
        let url = self.url("/queue");
        let response = self
            .send_with_retry("Queue fetch", |client| client.get(&url))
            .await?;

        let queue: QueueResponse = Self::parse_json(response).await?;
        tracing::info!("Fetched queue with {} messages", queue.ids.len());
        Ok(queue.ids)
    }

    async fn fetch_message(&self, id: &str) -> Result<MessageContent, ServiceError> {
        let url = self.url("/message");
        let response = self
            .send_with_retry("Message fetch", |client| {
                client.get(&url).query(&[("id", id)])
            })
            .await?;

        let message: MessageResponse = Self::parse_json(response).await?;
        Ok(message.into())
    }
}

#[async_trait]
impl ReplyService for BackendClient {
    async fn draft_reply(
        &self,
        instructions: &str,
        message_id: &str,
    ) -> Result<String, ServiceError> {
        let url = self.url("/send_reply");
        let body = DraftRequest {
            reply: instructions,
            id: message_id,
        };

        tracing::info!(
            "Requesting draft for {} ({} characters of instructions)",
            message_id,
            instructions.len()
        );

        let response = self
            .send_with_retry("Draft", |client| client.post(&url).json(&body))
            .await?;

        let draft: DraftResponse = Self::parse_json(response).await?;
        Ok(draft.formatted_reply)
    }

    async fn revise_reply(&self, request: &RevisionRequest) -> Result<String, ServiceError> {
        let url = self.url("/revise_reply");

        tracing::info!("Requesting revision for {}", request.message_id);

        let response = self
            .send_with_retry("Revision", |client| client.post(&url).json(request))
            .await?;

        let draft: DraftResponse = Self::parse_json(response).await?;
        Ok(draft.formatted_reply)
    }

    async fn send_reply(&self, text: &str, message_id: &str) -> Result<bool, ServiceError> {
        // Sending is not idempotent, so it gets exactly one attempt
        let body = SendRequest {
            reply_text: text,
            id: message_id,
        };
        let response = self
            .send_once(self.client.post(self.url("/send_email")).json(&body))
            .await?;

        let result: SendResponse = Self::parse_json(response).await?;
        match result.status.as_deref() {
            Some(SENT_STATUS) => {
                tracing::info!("Reply to {} sent", message_id);
                Ok(true)
            }
            other => {
                tracing::warn!("Unexpected send status for {}: {:?}", message_id, other);
                Ok(false)
            }
        }
    }
}
