//! The per-session state machine.
//!
//! ```text
//! AwaitingInput -> DimensionSelected -> RoleChainRunning -> ChapterCommitted
//!       ^                                     |                    |
//!       +---------------- failure ------------+                    v
//!       +------------------------------------------- AwaitingInput | SessionEnded
//! ```
//!
//! One [`Orchestrator`] owns one [`SessionState`]. Calls on it are
//! sequential; the service serializes access per session.

use crate::{
    Chapter, Dimension, DimensionTracker, ModelSettings, Persisted, Progress, RankEntry,
    Ranking, RoleChain, RoleOutput, SessionSettings, SessionState, SessionSummary, Stage,
    TemplateContext, UserInput,
};
use fabula_core::{GenerateRequest, Message};
use fabula_error::{
    FabulaResult, ModelError, ModelErrorKind, PersistenceError, StoryError, StoryErrorKind,
};
use fabula_interface::{FabulaDriver, SessionId, SessionRepository};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Orchestrator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Phase {
    /// Ready for the next feature text
    #[display("awaiting_input")]
    AwaitingInput,
    /// Target chapter and dimension fixed
    #[display("dimension_selected")]
    DimensionSelected,
    /// Roles are being invoked
    #[display("role_chain_running")]
    RoleChainRunning,
    /// A chapter was written to session state
    #[display("chapter_committed")]
    ChapterCommitted,
    /// Read-only archive
    #[display("session_ended")]
    SessionEnded,
}

/// Collaborators shared by every session of a service.
pub struct StoryRuntime<D: ?Sized> {
    driver: Arc<D>,
    repository: Arc<dyn SessionRepository>,
    chain: Arc<RoleChain>,
    session: Arc<SessionSettings>,
    model: Arc<ModelSettings>,
}

impl<D: ?Sized> StoryRuntime<D> {
    /// Bundle the collaborators.
    pub fn new(
        driver: Arc<D>,
        repository: Arc<dyn SessionRepository>,
        chain: Arc<RoleChain>,
        session: SessionSettings,
        model: ModelSettings,
    ) -> Self {
        Self {
            driver,
            repository,
            chain,
            session: Arc::new(session),
            model: Arc::new(model),
        }
    }

    /// The model backend.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The session repository.
    pub fn repository(&self) -> &Arc<dyn SessionRepository> {
        &self.repository
    }

    /// The active role chain.
    pub fn chain(&self) -> &RoleChain {
        &self.chain
    }

    /// Session behavior.
    pub fn session(&self) -> &SessionSettings {
        &self.session
    }

    /// Model call parameters.
    pub fn model(&self) -> &ModelSettings {
        &self.model
    }
}

impl<D: ?Sized> Clone for StoryRuntime<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            repository: Arc::clone(&self.repository),
            chain: Arc::clone(&self.chain),
            session: Arc::clone(&self.session),
            model: Arc::clone(&self.model),
        }
    }
}

impl<D: ?Sized> std::fmt::Debug for StoryRuntime<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryRuntime")
            .field("chain", &self.chain.name())
            .field("session", &self.session)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Drives one session through its phases.
#[derive(Debug)]
pub struct Orchestrator<D: ?Sized> {
    runtime: StoryRuntime<D>,
    state: SessionState,
    tracker: DimensionTracker,
    phase: Phase,
    /// False while the summary exists only in memory
    summary_saved: bool,
}

impl<D: FabulaDriver + ?Sized> Orchestrator<D> {
    /// Wrap a session. An already ended session starts in `SessionEnded`,
    /// and its summary is taken to be the stored one.
    pub fn new(runtime: StoryRuntime<D>, state: SessionState, tracker: DimensionTracker) -> Self {
        let phase = if state.is_ended() {
            Phase::SessionEnded
        } else {
            Phase::AwaitingInput
        };
        let summary_saved = state.summary().is_some();
        Self {
            runtime,
            state,
            tracker,
            phase,
            summary_saved,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        *self.state.id()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Read-only view of the session.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current coverage.
    pub fn progress(&self) -> Progress {
        self.tracker.progress()
    }

    fn transition(&mut self, next: Phase) {
        debug!(
            session_id = %self.state.id(),
            from = %self.phase,
            to = %next,
            "Phase transition"
        );
        self.phase = next;
    }

    fn story_error(kind: StoryErrorKind) -> StoryError {
        StoryError::new(kind)
    }

    /// Generate a new chapter (`target == None`) or revise chapter `target`.
    ///
    /// On any failure before the commit, session state is unchanged except
    /// for the input log, and the phase returns to `AwaitingInput`.
    #[instrument(skip(self, text), fields(session_id = %self.state.id(), revision = ?target))]
    pub async fn submit(
        &mut self,
        text: &str,
        target: Option<usize>,
    ) -> FabulaResult<Persisted<Chapter>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Self::story_error(StoryErrorKind::EmptyInput).into());
        }

        if self.state.is_ended() {
            return Err(self.ended_error(target).into());
        }

        let (index, dimension) = match target {
            None => match self.select_forward().await? {
                Some(selected) => selected,
                None => {
                    return Err(Self::story_error(StoryErrorKind::DimensionsExhausted(
                        self.tracker.dimension_set().len(),
                    ))
                    .into());
                }
            },
            Some(requested) => self.select_revision(requested)?,
        };
        self.transition(Phase::DimensionSelected);
        debug!(chapter = index, dimension = %dimension.id(), "Dimension selected");

        let input = UserInput::new(text.to_string(), target);
        let input_warning = self
            .runtime
            .repository
            .save_user_input(self.state.id(), &input.to_record(*self.state.id()))
            .await
            .err();
        if let Some(err) = &input_warning {
            warn!(error = %err, "Failed to persist user input");
        }
        self.state.record_input(input);

        self.transition(Phase::RoleChainRunning);
        let outputs = match self.run_chain(text, index, &dimension).await {
            Ok(outputs) => outputs,
            Err(err) => {
                warn!(error = %err, chapter = index, "Role chain aborted");
                self.transition(Phase::AwaitingInput);
                return Err(err);
            }
        };

        let Some(story) = outputs.last().map(|o| o.extracted().clone()) else {
            self.transition(Phase::AwaitingInput);
            return Err(Self::story_error(StoryErrorKind::InvalidRoleChain {
                chain: self.runtime.chain.name().clone(),
                message: "no role ran for this chapter".to_string(),
            })
            .into());
        };

        let chapter = self.commit(text, target, index, &dimension, outputs, story);
        self.transition(Phase::ChapterCommitted);

        let chapter_warning = self.save_chapter(&chapter).await;
        let mut warning = chapter_warning.or(input_warning);

        if target.is_none() && self.state.chapter_count() >= *self.runtime.session.chapter_limit()
        {
            info!(
                chapters = self.state.chapter_count(),
                "Chapter limit reached, ending session"
            );
            let summary_warning = self.end_session().await.warning().clone();
            warning = warning.or(summary_warning);
        } else {
            self.transition(Phase::AwaitingInput);
        }

        Ok(Persisted::new(chapter, warning))
    }

    fn ended_error(&self, target: Option<usize>) -> StoryError {
        if target.is_none() && self.tracker.is_exhausted() {
            Self::story_error(StoryErrorKind::DimensionsExhausted(
                self.tracker.dimension_set().len(),
            ))
        } else {
            Self::story_error(StoryErrorKind::SessionEnded(self.state.id().to_string()))
        }
    }

    /// Next forward chapter, or `None` after ending an exhausted session.
    async fn select_forward(&mut self) -> FabulaResult<Option<(usize, Dimension)>> {
        if self.state.chapter_count() >= *self.runtime.session.chapter_limit() {
            self.end_session().await;
            return Err(
                Self::story_error(StoryErrorKind::SessionEnded(self.state.id().to_string()))
                    .into(),
            );
        }

        match self.tracker.next_dimension() {
            Some(dimension) => Ok(Some((self.state.chapter_count() + 1, dimension))),
            None => {
                info!("All dimensions covered, ending session");
                // An unsaved summary is retried by the next end_session.
                self.end_session().await;
                Ok(None)
            }
        }
    }

    fn select_revision(&self, requested: usize) -> Result<(usize, Dimension), StoryError> {
        let chapter_count = self.state.chapter_count();
        let Some(chapter) = self.state.chapter(requested) else {
            return Err(Self::story_error(StoryErrorKind::InvalidRevisionTarget {
                requested,
                chapter_count,
            }));
        };

        let dimension = self
            .tracker
            .dimension_set()
            .get(chapter.dimension())
            .cloned()
            .ok_or_else(|| {
                Self::story_error(StoryErrorKind::InvalidDimensionSet(format!(
                    "chapter {} is bound to unknown dimension '{}'",
                    requested,
                    chapter.dimension()
                )))
            })?;
        Ok((requested, dimension))
    }

    /// Invoke every effective role in order and parse each reply.
    async fn run_chain(
        &self,
        feature: &str,
        index: usize,
        dimension: &Dimension,
    ) -> FabulaResult<Vec<RoleOutput>> {
        let stage = Stage::for_chapter(index);
        let settings = &self.runtime.session;
        let marker = match stage {
            Stage::Opening => settings.opening_marker().as_str(),
            Stage::Continuation => settings.continuation_marker().as_str(),
        };
        let story = self.state.story_before(index);
        let user_turn = user_turn(feature, marker, &story);

        let roles = self.runtime.chain.effective_roles(stage);
        let mut outputs: Vec<RoleOutput> = Vec::with_capacity(roles.len());
        let mut handoffs: Vec<String> = Vec::with_capacity(roles.len());

        for role in roles {
            let previous = outputs.last().map(|o| o.extracted().as_str()).unwrap_or("");
            let labeled = handoffs.join("\n");
            let context = TemplateContext {
                feature,
                story: &story,
                previous,
                dimension,
                chapter: index,
                stage_marker: marker,
                outputs: &labeled,
            };
            let system = role.system_prompt(&context)?;

            let mut messages = vec![Message::user(user_turn.clone())];
            if role.consumes_previous() {
                if let Some(handoff) = handoffs.last() {
                    messages.push(Message::system(handoff.clone()));
                }
            }

            let request = self.build_request(system, messages)?;
            debug!(role = %role.name(), turns = request.messages().len(), "Invoking role");
            let raw = self.invoke(role.name(), &request).await?;

            let output = RoleOutput::parse(role.name(), raw, role.tag())?;
            debug!(role = %role.name(), extracted_len = output.extracted().len(), "Role output parsed");
            handoffs.push(format!("{}: {}", role.label(), output.extracted()));
            outputs.push(output);
        }

        Ok(outputs)
    }

    fn build_request(
        &self,
        system: String,
        messages: Vec<Message>,
    ) -> Result<GenerateRequest, ModelError> {
        let model = &self.runtime.model;
        let mut builder = GenerateRequest::builder();
        builder
            .system(system)
            .messages(messages)
            .max_tokens(*model.max_tokens())
            .model(model.name().clone());
        if let Some(temperature) = model.temperature() {
            builder.temperature(*temperature);
        }
        builder
            .build()
            .map_err(|e| ModelError::new(ModelErrorKind::Builder(e.to_string())))
    }

    /// One model call bounded by the role timeout.
    async fn invoke(&self, role: &str, request: &GenerateRequest) -> FabulaResult<String> {
        let timeout = self.runtime.session.role_timeout();
        match tokio::time::timeout(timeout, self.runtime.driver.generate(request)).await {
            Ok(Ok(response)) => Ok(response.into_text()),
            Ok(Err(err)) => {
                warn!(role, error = %err, "Model call failed");
                Err(err)
            }
            Err(_) => {
                warn!(role, seconds = timeout.as_secs(), "Model call timed out");
                Err(ModelError::new(ModelErrorKind::Timeout {
                    role: role.to_string(),
                    seconds: timeout.as_secs(),
                })
                .into())
            }
        }
    }

    /// Write the chapter to session state. Infallible once reached.
    fn commit(
        &mut self,
        text: &str,
        target: Option<usize>,
        index: usize,
        dimension: &Dimension,
        outputs: Vec<RoleOutput>,
        story: String,
    ) -> Chapter {
        match target.and_then(|k| self.state.chapter_mut(k)) {
            Some(existing) => {
                existing.revise(text.to_string(), outputs, story);
                debug!(chapter = index, "Chapter revised in place");
                existing.clone()
            }
            None => {
                let chapter = Chapter::new(
                    index,
                    dimension.id().clone(),
                    text.to_string(),
                    outputs,
                    story,
                );
                let committed = self.state.append_chapter(chapter).clone();
                self.tracker.mark_covered(dimension.id());
                info!(
                    chapter = index,
                    dimension = %dimension.id(),
                    coverage = self.tracker.progress().coverage_percentage(),
                    "Chapter committed"
                );
                committed
            }
        }
    }

    async fn save_chapter(&self, chapter: &Chapter) -> Option<PersistenceError> {
        let id = *self.state.id();
        match self
            .runtime
            .repository
            .save_chapter(&id, &chapter.to_record(id))
            .await
        {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, chapter = chapter.index(), "Failed to persist chapter");
                Some(err)
            }
        }
    }

    /// End the session. Idempotent: an ended session returns its summary,
    /// saving it again only if no earlier save succeeded.
    #[instrument(skip(self), fields(session_id = %self.state.id()))]
    pub async fn end_session(&mut self) -> Persisted<SessionSummary> {
        let summary = match self.state.summary() {
            Some(summary) if self.summary_saved => {
                return Persisted::new(summary.clone(), None);
            }
            Some(summary) => {
                debug!("Retrying summary save");
                summary.clone()
            }
            None => {
                let progress = self.tracker.progress();
                let summary = self.state.end(&progress).clone();
                self.transition(Phase::SessionEnded);
                info!(
                    chapters = summary.num_chapters(),
                    prompts = summary.num_prompts(),
                    coverage = summary.coverage_percentage(),
                    "Session ended"
                );
                summary
            }
        };

        let warning = self
            .runtime
            .repository
            .save_session_summary(self.state.id(), &summary.to_record())
            .await
            .err();
        match &warning {
            Some(err) => warn!(error = %err, "Failed to persist session summary"),
            None => self.summary_saved = true,
        }
        Persisted::new(summary, warning)
    }

    /// Accept the closing ranking; ends the session if still open.
    #[instrument(skip(self, entries), fields(session_id = %self.state.id(), entries = entries.len()))]
    pub async fn submit_rankings(
        &mut self,
        entries: Vec<RankEntry>,
    ) -> FabulaResult<Persisted<Ranking>> {
        if self.state.ranking().is_some() {
            return Err(Self::story_error(StoryErrorKind::RankingAlreadySubmitted(
                self.state.id().to_string(),
            ))
            .into());
        }

        let ranking = Ranking::validate(&self.state.distinct_inputs(), entries)?;
        let summary_warning = self.end_session().await.warning().clone();

        let ranking = self.state.set_ranking(ranking).clone();
        let id = *self.state.id();
        let warning = match self
            .runtime
            .repository
            .save_ranking(&id, &ranking.to_record(id))
            .await
        {
            Ok(()) => summary_warning,
            Err(err) => {
                warn!(error = %err, "Failed to persist ranking");
                Some(err)
            }
        };
        info!(order = ?ranking.ordered_features(), "Ranking accepted");
        Ok(Persisted::new(ranking, warning))
    }
}

/// Feature text, stage marker, and the story so far when there is one.
pub(crate) fn user_turn(feature: &str, marker: &str, story: &str) -> String {
    if story.is_empty() {
        format!("{} {}", feature, marker)
    } else {
        format!("{} {}\n\nPrevious story:\n{}", feature, marker, story)
    }
}
