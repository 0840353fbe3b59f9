//! Agent orchestration core for Fabula.
//!
//! A session produces a sequence of chapters. Each chapter is written by a
//! chain of role-specialized prompts and explores one dimension from a
//! closed set; the session tracks which dimensions have been covered and
//! ends once the set is exhausted or the chapter limit is hit.
//!
//! # Components
//!
//! - [`DimensionTracker`]: coverage bookkeeping with a pluggable
//!   [`DimensionSelector`]
//! - [`extract_tagged`] / [`RoleOutput`]: strict tag-delimited extraction
//! - [`RoleRegistry`] / [`RoleChain`]: declarative role chains from TOML
//! - [`SessionState`]: chapters, inputs, ranking, summary
//! - [`Orchestrator`]: the per-session phase machine
//! - [`StoryService`]: caller-facing operations over many sessions
//!
//! # Example
//!
//! ```rust,ignore
//! use fabula_story::{StoryConfig, StoryService};
//! use fabula_storage::InMemorySessionRepository;
//! use std::sync::Arc;
//!
//! # async fn example(driver: Arc<impl fabula_interface::FabulaDriver>) -> fabula_error::FabulaResult<()> {
//! let config = StoryConfig::load()?;
//! let service = StoryService::new(driver, Arc::new(InMemorySessionRepository::new()), &config)?;
//!
//! let id = service.start_session().await;
//! service.submit_feature(id, "It hums when you are sad", None).await?;
//! println!("{}", service.get_complete_story(id).await?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dimension;
mod orchestrator;
mod parser;
mod ranking;
mod role;
mod service;
mod session;

pub use config::{
    DEFAULT_CONFIG, ModelSettings, SessionSettings, SessionSettingsBuilder, StorageBackend,
    StorageSettings, StoryConfig,
};
pub use dimension::{
    Dimension, DimensionBuilder, DimensionSelector, DimensionSet, DimensionTracker, Progress,
    RandomSelector, SelectionStrategy, SequentialSelector,
};
pub use orchestrator::{Orchestrator, Phase, StoryRuntime};
pub use parser::{RoleOutput, extract_tagged};
pub use ranking::{RankEntry, Ranking};
pub use role::{
    PLACEHOLDERS, RoleChain, RoleChainSpec, RolePrompt, RolePromptBuilder, RoleRegistry,
    RoleScope, Stage, TemplateContext,
};
pub use service::StoryService;
pub use session::{
    CHAPTER_SEPARATOR, Chapter, Persisted, SessionState, SessionSummary, UserInput,
};
