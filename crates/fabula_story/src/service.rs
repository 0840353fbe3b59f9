//! Caller-facing session operations.

use crate::{
    Chapter, DimensionSet, DimensionTracker, Orchestrator, Persisted, Phase, Progress,
    RankEntry, Ranking, SessionSettings, SessionState, SessionSummary, StoryConfig,
    StoryRuntime,
};
use fabula_error::{FabulaResult, StoryError, StoryErrorKind};
use fabula_interface::{FabulaDriver, SessionId, SessionRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

type SessionHandle<D> = Arc<Mutex<Orchestrator<D>>>;

/// Owns the live sessions and the collaborators they share.
///
/// Each session is guarded by its own mutex, held for the full role
/// chain, so requests against one session run strictly in order while
/// separate sessions proceed independently.
///
/// # Example
///
/// ```no_run
/// use fabula_story::{StoryConfig, StoryService};
/// use fabula_interface::{FabulaDriver, SessionRepository};
/// use std::sync::Arc;
///
/// # async fn run<D: FabulaDriver>(driver: Arc<D>, repo: Arc<dyn SessionRepository>)
/// #     -> fabula_error::FabulaResult<()> {
/// let config = StoryConfig::load()?;
/// let service = StoryService::new(driver, repo, &config)?;
///
/// let id = service.start_session().await;
/// let chapter = service.submit_feature(id, "It remembers birthdays", None).await?;
/// println!("{}", chapter.value().story());
/// # Ok(())
/// # }
/// ```
pub struct StoryService<D: ?Sized> {
    runtime: StoryRuntime<D>,
    dimensions: Arc<DimensionSet>,
    sessions: RwLock<HashMap<SessionId, SessionHandle<D>>>,
}

impl<D: ?Sized> std::fmt::Debug for StoryService<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryService")
            .field("runtime", &self.runtime)
            .field("dimensions", &self.dimensions.len())
            .finish_non_exhaustive()
    }
}

impl<D: FabulaDriver + ?Sized> StoryService<D> {
    /// Build a service from configuration. Validates the dimension set and
    /// the active role chain.
    pub fn new(
        driver: Arc<D>,
        repository: Arc<dyn SessionRepository>,
        config: &StoryConfig,
    ) -> FabulaResult<Self> {
        let dimensions = config.dimension_set()?;
        let chain = config.active_chain()?;
        info!(
            chain = %chain.name(),
            roles = chain.roles().len(),
            dimensions = dimensions.len(),
            provider = driver.provider_name(),
            model = driver.model_name(),
            "Story service ready"
        );
        let runtime = StoryRuntime::new(
            driver,
            repository,
            chain,
            config.session().clone(),
            config.model().clone(),
        );
        Ok(Self::from_parts(runtime, dimensions))
    }

    /// Build a service from already validated parts.
    pub fn from_parts(runtime: StoryRuntime<D>, dimensions: Arc<DimensionSet>) -> Self {
        Self {
            runtime,
            dimensions,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Session behavior shared by every session.
    pub fn settings(&self) -> &SessionSettings {
        self.runtime.session()
    }

    /// The dimension set shared by every session.
    pub fn dimensions(&self) -> &DimensionSet {
        &self.dimensions
    }

    fn tracker(&self, chapters: &[Chapter]) -> DimensionTracker {
        let settings = self.runtime.session();
        let selector = settings.selection().selector(*settings.seed());
        DimensionTracker::from_session(Arc::clone(&self.dimensions), selector, chapters)
    }

    async fn handle(&self, id: SessionId) -> FabulaResult<SessionHandle<D>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoryError::new(StoryErrorKind::SessionNotFound(id.to_string())).into())
    }

    /// Open a fresh session.
    #[instrument(skip(self))]
    pub async fn start_session(&self) -> SessionId {
        let id = SessionId::new();
        let orchestrator = Orchestrator::new(
            self.runtime.clone(),
            SessionState::new(id),
            self.tracker(&[]),
        );
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(orchestrator)));
        info!(session_id = %id, "Session started");
        id
    }

    /// Load a persisted session and make it live again.
    ///
    /// A session that is already live is returned as is.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn resume_session(&self, id: SessionId) -> FabulaResult<SessionId> {
        if self.sessions.read().await.contains_key(&id) {
            debug!("Session already live");
            return Ok(id);
        }

        let snapshot = self
            .runtime
            .repository()
            .load_session(&id)
            .await?
            .ok_or_else(|| StoryError::new(StoryErrorKind::SessionNotFound(id.to_string())))?;
        let state = SessionState::from_snapshot(snapshot)?;
        let tracker = self.tracker(state.chapters());
        info!(
            chapters = state.chapter_count(),
            covered = tracker.covered().len(),
            ended = state.is_ended(),
            "Session resumed"
        );

        let orchestrator = Orchestrator::new(self.runtime.clone(), state, tracker);
        self.sessions
            .write()
            .await
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(orchestrator)));
        Ok(id)
    }

    /// Generate the next chapter, or revise chapter `target`.
    #[instrument(skip(self, text), fields(session_id = %id, revision = ?target))]
    pub async fn submit_feature(
        &self,
        id: SessionId,
        text: &str,
        target: Option<usize>,
    ) -> FabulaResult<Persisted<Chapter>> {
        let handle = self.handle(id).await?;
        let mut orchestrator = handle.lock().await;
        orchestrator.submit(text, target).await
    }

    /// One committed chapter, 1-based.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn get_chapter(&self, id: SessionId, index: usize) -> FabulaResult<Chapter> {
        let handle = self.handle(id).await?;
        let orchestrator = handle.lock().await;
        let state = orchestrator.state();
        state.chapter(index).cloned().ok_or_else(|| {
            StoryError::new(StoryErrorKind::ChapterNotFound {
                index,
                chapter_count: state.chapter_count(),
            })
            .into()
        })
    }

    /// All chapter stories in index order.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn get_complete_story(&self, id: SessionId) -> FabulaResult<String> {
        let handle = self.handle(id).await?;
        let orchestrator = handle.lock().await;
        Ok(orchestrator.state().complete_story())
    }

    /// Dimension coverage for the session.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn progress(&self, id: SessionId) -> FabulaResult<Progress> {
        let handle = self.handle(id).await?;
        let orchestrator = handle.lock().await;
        Ok(orchestrator.progress())
    }

    /// Current orchestrator phase.
    pub async fn phase(&self, id: SessionId) -> FabulaResult<Phase> {
        let handle = self.handle(id).await?;
        let orchestrator = handle.lock().await;
        Ok(orchestrator.phase())
    }

    /// A copy of the session state.
    pub async fn session_state(&self, id: SessionId) -> FabulaResult<SessionState> {
        let handle = self.handle(id).await?;
        let orchestrator = handle.lock().await;
        Ok(orchestrator.state().clone())
    }

    /// Distinct inputs of the session, in first-seen order. These are the
    /// features a ranking must cover.
    pub async fn features(&self, id: SessionId) -> FabulaResult<Vec<String>> {
        let handle = self.handle(id).await?;
        let orchestrator = handle.lock().await;
        Ok(orchestrator.state().distinct_inputs())
    }

    /// End the session. Returns the existing summary if already ended.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn end_session(&self, id: SessionId) -> FabulaResult<Persisted<SessionSummary>> {
        let handle = self.handle(id).await?;
        let mut orchestrator = handle.lock().await;
        Ok(orchestrator.end_session().await)
    }

    /// Record the user's ranking of their inputs.
    #[instrument(skip(self, entries), fields(session_id = %id))]
    pub async fn submit_rankings(
        &self,
        id: SessionId,
        entries: Vec<RankEntry>,
    ) -> FabulaResult<Persisted<Ranking>> {
        let handle = self.handle(id).await?;
        let mut orchestrator = handle.lock().await;
        orchestrator.submit_rankings(entries).await
    }

    /// Whether `text` is the configured end word.
    pub fn is_end_command(&self, text: &str) -> bool {
        self.runtime.session().is_end_command(text)
    }

    /// Drop a live session from memory. Persisted data is untouched.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn close_session(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        debug!(removed, "Session closed");
        removed
    }

    /// Ids of live sessions.
    pub async fn live_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.read().await.keys().copied().collect();
        ids.sort();
        ids
    }
}
