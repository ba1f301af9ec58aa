//! Configuration for the scene description endpoint

use crate::describe::prompts::SCENE_PROMPT;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Environment variable consulted when no API key is configured
pub const DEFAULT_API_KEY_ENV: &str = "OPTICA_API_KEY";

/// Configuration for the chat-completion endpoint
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DescriptionConfig {
    /// Base URL; requests go to `{endpoint}/chat/completions`
    pub endpoint: String,

    /// Model identifier sent with each request
    pub model_id: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens in the generated description
    pub max_tokens: u32,

    /// Ask the endpoint to stream; descriptions are short so this stays off
    pub stream: bool,

    /// System prompt preceding the object list
    pub system_prompt: String,

    /// Sent verbatim as the `Authorization` header
    pub api_key: Option<String>,

    /// Environment variable to read the key from when `api_key` is unset
    pub api_key_env: String,

    /// Whole-request timeout; `None` waits indefinitely
    pub timeout_secs: Option<u64>,
}

impl Default for DescriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://proxy.tune.app".to_string(),
            model_id: "MeghanaM4/Optica".to_string(),
            temperature: 1.0,
            max_tokens: 50,
            stream: false,
            system_prompt: SCENE_PROMPT.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: Some(30),
        }
    }
}

impl fmt::Debug for DescriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptionConfig")
            .field("endpoint", &self.endpoint)
            .field("model_id", &self.model_id)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("stream", &self.stream)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl DescriptionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_secs = timeout.map(|t| t.as_secs().max(1));
        self
    }

    /// Full URL of the completion endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    /// The configured key, falling back to the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
