//! Email backend subsystem
//!
//! The dialog consumes the backend through two narrow traits: [`EmailQueue`]
//! for the pending messages and [`ReplyService`] for drafting, revising and
//! sending replies. [`BackendClient`] implements both over HTTP.

pub mod client;

pub use client::BackendClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Not signed in")]
    Unauthorized,

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("All {attempts} retry attempts failed: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl ServiceError {
    /// Whether a retry could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::ConnectionFailed(_) | ServiceError::Timeout(_) => true,
            ServiceError::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Content of one email as presented to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub subject: String,
    pub body: String,
    pub summary: String,
}

/// Everything the backend needs to rewrite a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRequest {
    #[serde(rename = "id")]
    pub message_id: String,
    pub original_body: String,
    pub prior_draft: String,
    pub instructions: String,
}

/// Source of pending messages
#[async_trait]
pub trait EmailQueue: Send + Sync {
    /// Ordered identifiers of the messages awaiting a reply
    async fn fetch_queue(&self) -> Result<Vec<String>, ServiceError>;

    /// Content of a single message
    async fn fetch_message(&self, id: &str) -> Result<MessageContent, ServiceError>;
}

/// Reply drafting and delivery
#[async_trait]
pub trait ReplyService: Send + Sync {
    /// Turn spoken instructions into a reply draft for `message_id`
    async fn draft_reply(&self, instructions: &str, message_id: &str)
        -> Result<String, ServiceError>;

    /// Rewrite a prior draft according to edit instructions
    async fn revise_reply(&self, request: &RevisionRequest) -> Result<String, ServiceError>;

    /// Send the final reply text; `Ok(false)` means the backend declined
    async fn send_reply(&self, text: &str, message_id: &str) -> Result<bool, ServiceError>;
}
