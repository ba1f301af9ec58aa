//! Wire types for the chat-completion endpoint

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for DescriptionError {
    fn from(e: reqwest::Error) -> Self {
        DescriptionError::Transport(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Body of a description request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionRequest {
    pub temperature: f32,
    pub model: String,
    pub stream: bool,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Option<Vec<CompletionChoice>>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Extract `choices[0].message.content` from a response body
pub fn decode_response(body: &str) -> Result<String, DescriptionError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| DescriptionError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let choices = response
        .choices
        .ok_or_else(|| DescriptionError::MalformedResponse("missing choices".into()))?;

    let first = choices
        .into_iter()
        .next()
        .ok_or_else(|| DescriptionError::MalformedResponse("empty choices".into()))?;

    first
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| DescriptionError::MalformedResponse("missing message content".into()))
}
