//! Language model backends for Fabula.
//!
//! Each provider sits behind its own feature flag. Every client implements
//! [`FabulaDriver`](fabula_interface::FabulaDriver), so the orchestration
//! core never sees provider wire types.
//!
//! # Available Providers
//!
//! - **Anthropic** (Claude) - Enable with `anthropic` feature
//!
//! ```no_run
//! # #[cfg(feature = "anthropic")]
//! # {
//! use fabula_models::AnthropicClient;
//! use fabula_interface::FabulaDriver;
//! use fabula_core::{GenerateRequest, Message};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AnthropicClient::from_env("claude-3-opus-20240229")?;
//! let request = GenerateRequest::builder()
//!     .system("You are Agent A.")
//!     .messages(vec![Message::user("It should hum while it works [NEW STORY]")])
//!     .build()?;
//! let response = client.generate(&request).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "anthropic")]
pub use anthropic::{
    ANTHROPIC_API_KEY_ENV, AnthropicClient, AnthropicContent, AnthropicMessage,
    AnthropicMessageBuilder, AnthropicRequest, AnthropicRequestBuilder, AnthropicResponse,
    AnthropicUsage,
};
