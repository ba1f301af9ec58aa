//! Remote scene description
//!
//! Sends the detected object names to a chat-completion endpoint and returns
//! the generated description.
//!
//! - **config**: endpoint, model and sampling settings
//! - **prompts**: the system prompt and the "nothing seen" markers
//! - **types**: request/response wire types and the typed decode result
//! - **client**: the [`DescriptionClient`] seam and its HTTP implementation
//!
//! # Usage
//!
//! ```rust,ignore
//! use optica::describe::{DescriptionClient, DescriptionConfig, HttpDescriptionClient};
//!
//! let client = HttpDescriptionClient::new(DescriptionConfig::default().with_api_key(key))?;
//! let text = client.describe(r#"["cup","laptop"]"#).await?;
//! ```

pub mod client;
pub mod config;
pub mod prompts;
pub mod types;

pub use client::{DescriptionClient, HttpDescriptionClient};
pub use config::{DescriptionConfig, DEFAULT_API_KEY_ENV};
pub use prompts::{SCENE_PROMPT, UNINFORMATIVE_MARKERS};
pub use types::{decode_response, ChatMessage, ChatRole, DescriptionError, DescriptionRequest};
