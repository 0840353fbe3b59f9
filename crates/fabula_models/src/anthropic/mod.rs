//! Anthropic Messages API client.

mod client;
mod types;

pub use client::{ANTHROPIC_API_KEY_ENV, AnthropicClient};
pub use types::{
    AnthropicContent, AnthropicMessage, AnthropicMessageBuilder, AnthropicRequest,
    AnthropicRequestBuilder, AnthropicResponse, AnthropicUsage,
};
