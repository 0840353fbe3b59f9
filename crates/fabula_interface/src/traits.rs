//! Trait definitions for model backends and session storage.

use crate::{
    ChapterRecord, RankingRecord, SessionId, SessionSnapshot, SessionSummaryRecord,
    UserInputRecord,
};
use async_trait::async_trait;
use fabula_core::{GenerateRequest, GenerateResponse};
use fabula_error::{FabulaResult, PersistenceError};

/// Core trait that every text-generation backend implements.
///
/// The call is atomic request/response; no streaming is required.
#[async_trait]
pub trait FabulaDriver: Send + Sync {
    /// Generate text for the given instructions and conversation.
    async fn generate(&self, req: &GenerateRequest) -> FabulaResult<GenerateResponse>;

    /// Provider name (e.g., "anthropic").
    fn provider_name(&self) -> &'static str;

    /// Model identifier (e.g., "claude-3-opus-20240229").
    fn model_name(&self) -> &str;
}

/// Durable storage of session records.
///
/// Implementations must tolerate concurrent writes for different session
/// ids without cross-session interference. Chapter records are keyed by
/// `(session_id, chapter_index)`; saving the same index again replaces the
/// earlier record (chapter revision).
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Save (insert or replace) one chapter.
    async fn save_chapter(
        &self,
        session_id: &SessionId,
        record: &ChapterRecord,
    ) -> Result<(), PersistenceError>;

    /// Append one user input to the session's input log.
    async fn save_user_input(
        &self,
        session_id: &SessionId,
        record: &UserInputRecord,
    ) -> Result<(), PersistenceError>;

    /// Save the closing summary of a session.
    async fn save_session_summary(
        &self,
        session_id: &SessionId,
        record: &SessionSummaryRecord,
    ) -> Result<(), PersistenceError>;

    /// Save the ranking submitted at session end.
    async fn save_ranking(
        &self,
        session_id: &SessionId,
        record: &RankingRecord,
    ) -> Result<(), PersistenceError>;

    /// Load every record stored for a session.
    ///
    /// Returns `Ok(None)` when nothing was ever stored under `session_id`.
    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionSnapshot>, PersistenceError>;
}
