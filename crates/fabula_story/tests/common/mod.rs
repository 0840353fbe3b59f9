//! Test doubles shared by the orchestration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use fabula_core::{GenerateRequest, GenerateResponse};
use fabula_error::{FabulaResult, ModelError, ModelErrorKind, PersistenceError, PersistenceErrorKind};
use fabula_interface::{
    ChapterRecord, FabulaDriver, RankingRecord, SessionId, SessionRepository, SessionSnapshot,
    SessionSummaryRecord, UserInputRecord,
};
use fabula_story::{StoryConfig, StoryService};
use fabula_storage::InMemorySessionRepository;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Six dimensions, sequential selection, two chains.
pub const TEST_CONFIG: &str = r#"
[session]
chapter_limit = 6
selection = "sequential"
role_timeout_secs = 5
active_chain = "trio"

[model]
name = "mock-model"
max_tokens = 256

[[dimensions]]
id = "d1"
name = "One"
definition = "First theme"
challenges = ["first challenge"]

[[dimensions]]
id = "d2"
name = "Two"
definition = "Second theme"

[[dimensions]]
id = "d3"
name = "Three"
definition = "Third theme"

[[dimensions]]
id = "d4"
name = "Four"
definition = "Fourth theme"

[[dimensions]]
id = "d5"
name = "Five"
definition = "Fifth theme"

[[dimensions]]
id = "d6"
name = "Six"
definition = "Sixth theme"

[chains.trio]
description = "parameter, challenge, story"

[[chains.trio.roles]]
name = "Parameter"
tag = "PARAMETER:"
label = "Parameter Info"
instructions = "Find the parameter in {{feature}} for {{dimension}}."

[[chains.trio.roles]]
name = "Challenge"
tag = "CHALLENGE:"
label = "Context Info"
instructions = "Challenge {{previous}}. Examples:\n{{challenges}}"

[[chains.trio.roles]]
name = "Writer"
tag = "STORY:"
instructions = "Write chapter {{chapter}} {{stage}} using:\n{{outputs}}"

[chains.staged]

[[chains.staged.roles]]
name = "Analyzer"
tag = "FEATURE:"

instructions = "Analyze {{feature}}."

[[chains.staged.roles]]
name = "Scene"
tag = "SCENE:"
scope = "opening"
instructions = "Set the scene from {{previous}}."

[[chains.staged.roles]]
name = "Writer"
tag = "STORY:"
instructions = "Continue {{story}}"
"#;

pub fn config() -> StoryConfig {
    StoryConfig::from_toml_str(TEST_CONFIG).expect("test config parses")
}

pub fn service<D: FabulaDriver>(
    driver: Arc<D>,
    repository: Arc<dyn SessionRepository>,
) -> StoryService<D> {
    StoryService::new(driver, repository, &config()).expect("test service builds")
}

/// Role name from a "You are {name}. ..." system prompt.
pub fn role_of(request: &GenerateRequest) -> String {
    request
        .system()
        .strip_prefix("You are ")
        .and_then(|rest| rest.split_once('.'))
        .map(|(name, _)| name.to_string())
        .unwrap_or_default()
}

/// Feature text from the first user turn (everything before the marker).
pub fn feature_of(request: &GenerateRequest) -> String {
    request
        .messages()
        .first()
        .map(|m| m.content().split(" [").next().unwrap_or_default().to_string())
        .unwrap_or_default()
}

fn tag_for(role: &str) -> &'static str {
    match role {
        "Parameter" => "PARAMETER:",
        "Challenge" => "CHALLENGE:",
        "Analyzer" => "FEATURE:",
        "Scene" => "SCENE:",
        _ => "STORY:",
    }
}

/// Replies "{tag} {role}: {feature}" after some chatter, and records every
/// request. Roles listed in `untagged` reply without their tag.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    requests: Mutex<Vec<GenerateRequest>>,
    untagged: Mutex<HashSet<String>>,
}

impl ScriptedDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn drop_tag_for(&self, role: &str) {
        self.untagged.lock().unwrap().insert(role.to_string());
    }

    pub fn restore_tags(&self) {
        self.untagged.lock().unwrap().clear();
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn roles_called(&self) -> Vec<String> {
        self.requests().iter().map(role_of).collect()
    }

    pub fn clear(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl FabulaDriver for ScriptedDriver {
    async fn generate(&self, request: &GenerateRequest) -> FabulaResult<GenerateResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let role = role_of(request);
        let feature = feature_of(request);
        let text = if self.untagged.lock().unwrap().contains(&role) {
            format!("I would rather talk about {}", feature)
        } else {
            format!("Let me think.\n{} {}: {}", tag_for(&role), role, feature)
        };
        Ok(GenerateResponse::new(text).with_stop_reason("end_turn"))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Every call fails with an HTTP error.
#[derive(Debug, Default)]
pub struct FailingDriver;

#[async_trait]
impl FabulaDriver for FailingDriver {
    async fn generate(&self, _request: &GenerateRequest) -> FabulaResult<GenerateResponse> {
        Err(ModelError::new(ModelErrorKind::Http("connection reset".to_string())).into())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Never answers within any reasonable timeout.
#[derive(Debug, Default)]
pub struct SlowDriver;

#[async_trait]
impl FabulaDriver for SlowDriver {
    async fn generate(&self, _request: &GenerateRequest) -> FabulaResult<GenerateResponse> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(GenerateResponse::new("STORY: too late"))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "slow"
    }
}

/// Rejects every write; has nothing to load.
#[derive(Debug, Default)]
pub struct FailingRepository;

fn disk_full() -> PersistenceError {
    PersistenceError::new(PersistenceErrorKind::Write("disk full".to_string()))
}

#[async_trait]
impl SessionRepository for FailingRepository {
    async fn save_chapter(
        &self,
        _session_id: &SessionId,
        _chapter: &ChapterRecord,
    ) -> Result<(), PersistenceError> {
        Err(disk_full())
    }

    async fn save_user_input(
        &self,
        _session_id: &SessionId,
        _input: &UserInputRecord,
    ) -> Result<(), PersistenceError> {
        Err(disk_full())
    }

    async fn save_session_summary(
        &self,
        _session_id: &SessionId,
        _summary: &SessionSummaryRecord,
    ) -> Result<(), PersistenceError> {
        Err(disk_full())
    }

    async fn save_ranking(
        &self,
        _session_id: &SessionId,
        _ranking: &RankingRecord,
    ) -> Result<(), PersistenceError> {
        Err(disk_full())
    }

    async fn load_session(
        &self,
        _session_id: &SessionId,
    ) -> Result<Option<SessionSnapshot>, PersistenceError> {
        Ok(None)
    }
}

/// In-memory repository whose summary saves fail until `recover` is called.
#[derive(Debug, Default)]
pub struct SummaryFailingRepository {
    inner: InMemorySessionRepository,
    recovered: AtomicBool,
}

impl SummaryFailingRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recover(&self) {
        self.recovered.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionRepository for SummaryFailingRepository {
    async fn save_chapter(
        &self,
        session_id: &SessionId,
        chapter: &ChapterRecord,
    ) -> Result<(), PersistenceError> {
        self.inner.save_chapter(session_id, chapter).await
    }

    async fn save_user_input(
        &self,
        session_id: &SessionId,
        input: &UserInputRecord,
    ) -> Result<(), PersistenceError> {
        self.inner.save_user_input(session_id, input).await
    }

    async fn save_session_summary(
        &self,
        session_id: &SessionId,
        summary: &SessionSummaryRecord,
    ) -> Result<(), PersistenceError> {
        if !self.recovered.load(Ordering::SeqCst) {
            return Err(PersistenceError::new(PersistenceErrorKind::Unavailable(
                "summary store offline".to_string(),
            )));
        }
        self.inner.save_session_summary(session_id, summary).await
    }

    async fn save_ranking(
        &self,
        session_id: &SessionId,
        ranking: &RankingRecord,
    ) -> Result<(), PersistenceError> {
        self.inner.save_ranking(session_id, ranking).await
    }

    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionSnapshot>, PersistenceError> {
        self.inner.load_session(session_id).await
    }
}
