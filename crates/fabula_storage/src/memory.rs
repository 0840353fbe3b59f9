//! In-memory implementation of SessionRepository.
//!
//! All data is lost when the repository is dropped.

use async_trait::async_trait;
use fabula_error::PersistenceError;
use fabula_interface::{
    ChapterRecord, RankingRecord, SessionId, SessionRepository, SessionSnapshot,
    SessionSummaryRecord, UserInputRecord,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory session repository.
///
/// Snapshots live in a HashMap protected by an RwLock. Cloning the
/// repository shares the underlying storage.
///
/// # Example
/// ```no_run
/// use fabula_storage::InMemorySessionRepository;
/// use fabula_interface::{SessionId, SessionRepository};
///
/// #[tokio::main]
/// async fn main() {
///     let repo = InMemorySessionRepository::new();
///     let loaded = repo.load_session(&SessionId::new()).await.unwrap();
///     assert!(loaded.is_none());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<SessionId, SessionSnapshot>>>,
}

impl InMemorySessionRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with at least one stored record.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Check if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn update<F>(&self, session_id: &SessionId, apply: F)
    where
        F: FnOnce(&mut SessionSnapshot),
    {
        let mut sessions = self.sessions.write().await;
        let snapshot = sessions
            .entry(*session_id)
            .or_insert_with(|| SessionSnapshot::empty(*session_id));
        apply(snapshot);
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn save_chapter(
        &self,
        session_id: &SessionId,
        record: &ChapterRecord,
    ) -> Result<(), PersistenceError> {
        debug!(session_id = %session_id, chapter = record.chapter_index, "Storing chapter in memory");
        self.update(session_id, |s| s.upsert_chapter(record.clone()))
            .await;
        Ok(())
    }

    async fn save_user_input(
        &self,
        session_id: &SessionId,
        record: &UserInputRecord,
    ) -> Result<(), PersistenceError> {
        self.update(session_id, |s| s.inputs.push(record.clone()))
            .await;
        Ok(())
    }

    async fn save_session_summary(
        &self,
        session_id: &SessionId,
        record: &SessionSummaryRecord,
    ) -> Result<(), PersistenceError> {
        self.update(session_id, |s| s.summary = Some(record.clone()))
            .await;
        Ok(())
    }

    async fn save_ranking(
        &self,
        session_id: &SessionId,
        record: &RankingRecord,
    ) -> Result<(), PersistenceError> {
        self.update(session_id, |s| s.ranking = Some(record.clone()))
            .await;
        Ok(())
    }

    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionSnapshot>, PersistenceError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }
}
