//! Fabula - multi-agent storytelling sessions.
//!
//! A session turns a user's feature ideas into a sequence of chapters. Each
//! chapter is written by a chain of role-specialized prompts (for example a
//! parameter identifier, a challenge provider, and a story writer) and
//! explores one dimension from a closed set. The session tracks coverage,
//! allows earlier chapters to be revised in place, persists everything as it
//! goes, and closes with the user ranking their own ideas.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fabula::{AnthropicClient, InMemorySessionRepository, StoryConfig, StoryService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoryConfig::load()?;
//!     let driver = Arc::new(AnthropicClient::from_env(config.model().name().clone())?);
//!     let service = StoryService::new(driver, Arc::new(InMemorySessionRepository::new()), &config)?;
//!
//!     let id = service.start_session().await;
//!     let chapter = service.submit_feature(id, "It keeps eye contact", None).await?;
//!     println!("{}", chapter.value().story());
//!     Ok(())
//! }
//! ```
//!
//! # Cargo Features
//!
//! - `anthropic` (default) - Anthropic Messages API backend
//! - `observability` - OpenTelemetry span export to stdout
//!
//! # Architecture
//!
//! - `fabula_error` - Error types
//! - `fabula_core` - Conversation types (Message, GenerateRequest, ...)
//! - `fabula_interface` - FabulaDriver and SessionRepository traits, records
//! - `fabula_models` - Model backends
//! - `fabula_storage` - In-memory and JSON-file session repositories
//! - `fabula_story` - Orchestration core
//!
//! This crate (`fabula`) re-exports everything for convenience.

// Re-export core crates (always available)
pub use fabula_core::*;
pub use fabula_error::*;
pub use fabula_interface::*;
pub use fabula_storage::*;
pub use fabula_story::*;

// Re-export optional crates based on features
#[cfg(feature = "anthropic")]
pub use fabula_models::*;

// OpenTelemetry observability module
#[cfg(feature = "observability")]
pub mod observability;

#[cfg(feature = "observability")]
pub use observability::{ObservabilityConfig, ObservabilityGuard, init_observability};
