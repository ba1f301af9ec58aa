//! Scene description client for OpenAI-compatible chat endpoints

use crate::describe::config::DescriptionConfig;
use crate::describe::types::{decode_response, ChatMessage, DescriptionError, DescriptionRequest};
use crate::{OpticaError, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info};

/// Turns a list of object names into a spoken-style description
#[async_trait]
pub trait DescriptionClient: Send + Sync {
    /// `names_json` is the object list serialized as a JSON array of strings
    async fn describe(&self, names_json: &str) -> std::result::Result<String, DescriptionError>;
}

/// Client posting to `{endpoint}/chat/completions`
pub struct HttpDescriptionClient {
    client: Client,
    url: String,
    api_key: String,
    config: DescriptionConfig,
}

impl std::fmt::Debug for HttpDescriptionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDescriptionClient")
            .field("url", &self.url)
            .field("model", &self.config.model_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl HttpDescriptionClient {
    /// Create a client; fails when no API key can be resolved
    pub fn new(config: DescriptionConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            OpticaError::ConfigError(format!(
                "No API key configured (set description.api_key or {})",
                config.api_key_env
            ))
        })?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| OpticaError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let url = config.completions_url();
        info!(
            "Description client configured: url={}, model={}",
            url, config.model_id
        );

        Ok(Self {
            client,
            url,
            api_key,
            config,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the request body for an object list
    pub fn build_request(&self, names_json: &str) -> DescriptionRequest {
        DescriptionRequest {
            temperature: self.config.temperature,
            model: self.config.model_id.clone(),
            stream: self.config.stream,
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage::system(self.config.system_prompt.clone()),
                ChatMessage::user(names_json),
            ],
        }
    }
}

#[async_trait]
impl DescriptionClient for HttpDescriptionClient {
    async fn describe(&self, names_json: &str) -> std::result::Result<String, DescriptionError> {
        let start = Instant::now();
        let request = self.build_request(names_json);

        debug!("Requesting description for {}", names_json);

        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(DescriptionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let description = decode_response(&body)?;
        debug!(
            "Description received in {}ms: {}",
            start.elapsed().as_millis(),
            description
        );

        Ok(description)
    }
}
