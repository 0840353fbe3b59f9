//! Session state: the single source of truth for one storytelling session.

use crate::{Progress, Ranking, RoleOutput};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use fabula_error::{PersistenceError, PersistenceErrorKind};
use fabula_interface::{
    ChapterRecord, RoleOutputRecord, SessionId, SessionSnapshot, SessionSummaryRecord,
    UserInputRecord,
};
use serde::{Deserialize, Serialize};

/// Separator between chapters in the complete story.
pub const CHAPTER_SEPARATOR: &str = "\n\n";

/// One committed narrative unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Chapter {
    /// 1-based index, contiguous within a session
    index: usize,
    /// Id of the dimension the chapter explores
    dimension: String,
    /// Input that produced the current version
    user_input: String,
    /// Output of every role invoked, in chain order
    role_outputs: Vec<RoleOutput>,
    /// Extracted story text
    story: String,
    /// First commit time
    created_at: DateTime<Utc>,
    /// Last revision time
    revised_at: Option<DateTime<Utc>>,
}

impl Chapter {
    pub(crate) fn new(
        index: usize,
        dimension: String,
        user_input: String,
        role_outputs: Vec<RoleOutput>,
        story: String,
    ) -> Self {
        Self {
            index,
            dimension,
            user_input,
            role_outputs,
            story,
            created_at: Utc::now(),
            revised_at: None,
        }
    }

    /// Replace content in place; index and dimension stay bound.
    pub(crate) fn revise(&mut self, user_input: String, role_outputs: Vec<RoleOutput>, story: String) {
        self.user_input = user_input;
        self.role_outputs = role_outputs;
        self.story = story;
        self.revised_at = Some(Utc::now());
    }

    /// Record form for a repository.
    pub fn to_record(&self, session_id: SessionId) -> ChapterRecord {
        ChapterRecord {
            session_id,
            chapter_index: self.index,
            dimension: self.dimension.clone(),
            user_input: self.user_input.clone(),
            story: self.story.clone(),
            role_outputs: self
                .role_outputs
                .iter()
                .map(|o| RoleOutputRecord {
                    role: o.role().clone(),
                    raw: o.raw().clone(),
                    extracted: o.extracted().clone(),
                })
                .collect(),
            created_at: self.created_at,
            revised_at: self.revised_at,
            timestamp: Utc::now(),
        }
    }

    fn from_record(record: ChapterRecord) -> Self {
        Self {
            index: record.chapter_index,
            dimension: record.dimension,
            user_input: record.user_input,
            role_outputs: record
                .role_outputs
                .into_iter()
                .map(|o| RoleOutput::from_parts(o.role, o.raw, o.extracted))
                .collect(),
            story: record.story,
            created_at: record.created_at,
            revised_at: record.revised_at,
        }
    }
}

/// One generation request that reached the role chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct UserInput {
    /// Feature text
    text: String,
    /// Chapter being revised, `None` for a forward chapter
    target: Option<usize>,
    /// Submission time
    submitted_at: DateTime<Utc>,
}

impl UserInput {
    pub(crate) fn new(text: String, target: Option<usize>) -> Self {
        Self {
            text,
            target,
            submitted_at: Utc::now(),
        }
    }

    /// Record form for a repository.
    pub fn to_record(&self, session_id: SessionId) -> UserInputRecord {
        UserInputRecord {
            session_id,
            text: self.text.clone(),
            target_chapter: self.target,
            timestamp: self.submitted_at,
        }
    }
}

/// Closing summary of an ended session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct SessionSummary {
    /// Session summarized
    session_id: SessionId,
    /// When the session ended
    ended_at: DateTime<Utc>,
    /// Chapter stories in ascending index order
    complete_story: String,
    /// Number of generation requests that reached the role chain
    num_prompts: usize,
    /// Number of chapters
    num_chapters: usize,
    /// Covered dimension ids, in chapter order
    covered_dimensions: Vec<String>,
    /// Coverage at the end of the session
    coverage_percentage: f64,
}

impl SessionSummary {
    /// Record form for a repository.
    pub fn to_record(&self) -> SessionSummaryRecord {
        SessionSummaryRecord {
            session_id: self.session_id,
            timestamp: self.ended_at,
            complete_story: self.complete_story.clone(),
            num_prompts: self.num_prompts,
            num_chapters: self.num_chapters,
            covered_dimensions: self.covered_dimensions.clone(),
            coverage_percentage: self.coverage_percentage,
        }
    }

    fn from_record(record: SessionSummaryRecord) -> Self {
        Self {
            session_id: record.session_id,
            ended_at: record.timestamp,
            complete_story: record.complete_story,
            num_prompts: record.num_prompts,
            num_chapters: record.num_chapters,
            covered_dimensions: record.covered_dimensions,
            coverage_percentage: record.coverage_percentage,
        }
    }
}

/// A committed value plus the outcome of persisting it.
///
/// In-memory state is authoritative: a failed save is reported here and
/// never rolls the value back.
#[derive(Debug, Clone, Getters)]
pub struct Persisted<T> {
    /// The committed value
    value: T,
    /// Storage failure, if the save did not succeed
    warning: Option<PersistenceError>,
}

impl<T> Persisted<T> {
    pub(crate) fn new(value: T, warning: Option<PersistenceError>) -> Self {
        Self { value, warning }
    }

    /// True when the save succeeded.
    pub fn is_durable(&self) -> bool {
        self.warning.is_none()
    }

    /// Discard the persistence outcome.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Ordered chapters, the input log, and closing artifacts of one session.
///
/// Covered dimensions are derived from chapters, never stored separately.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct SessionState {
    /// Session identifier
    id: SessionId,
    /// Chapters, position `i` holds index `i + 1`
    chapters: Vec<Chapter>,
    /// Requests that reached the role chain, in order
    inputs: Vec<UserInput>,
    /// Ranking, once submitted
    ranking: Option<Ranking>,
    /// Summary, once the session ended
    summary: Option<SessionSummary>,
}

impl SessionState {
    /// Empty session.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            chapters: Vec::new(),
            inputs: Vec::new(),
            ranking: None,
            summary: None,
        }
    }

    /// Rebuild from stored records.
    ///
    /// Chapter indices must run 1..=n without gaps.
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Result<Self, PersistenceError> {
        let mut records = snapshot.chapters;
        records.sort_by_key(|c| c.chapter_index);
        for (position, record) in records.iter().enumerate() {
            if record.chapter_index != position + 1 {
                return Err(PersistenceError::new(PersistenceErrorKind::Corrupt(format!(
                    "session {} has chapter {} where chapter {} was expected",
                    snapshot.session_id,
                    record.chapter_index,
                    position + 1
                ))));
            }
        }

        Ok(Self {
            id: snapshot.session_id,
            chapters: records.into_iter().map(Chapter::from_record).collect(),
            inputs: snapshot
                .inputs
                .into_iter()
                .map(|i| UserInput {
                    text: i.text,
                    target: i.target_chapter,
                    submitted_at: i.timestamp,
                })
                .collect(),
            ranking: snapshot.ranking.map(Ranking::from_record),
            summary: snapshot.summary.map(SessionSummary::from_record),
        })
    }

    /// Whether the session has ended.
    pub fn is_ended(&self) -> bool {
        self.summary.is_some()
    }

    /// Number of chapters.
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Chapter by 1-based index.
    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        index.checked_sub(1).and_then(|i| self.chapters.get(i))
    }

    /// Dimension ids referenced by chapters, in index order.
    pub fn covered_dimensions(&self) -> Vec<String> {
        self.chapters.iter().map(|c| c.dimension.clone()).collect()
    }

    /// Every chapter's story, ascending by index, joined by a blank line.
    pub fn complete_story(&self) -> String {
        self.story_before(self.chapters.len() + 1)
    }

    /// Stories of the chapters preceding `index`.
    pub fn story_before(&self, index: usize) -> String {
        self.chapters
            .iter()
            .filter(|c| c.index < index)
            .map(|c| c.story.as_str())
            .collect::<Vec<_>>()
            .join(CHAPTER_SEPARATOR)
    }

    /// Distinct input texts in order of first submission.
    pub fn distinct_inputs(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for input in &self.inputs {
            if !seen.contains(&input.text) {
                seen.push(input.text.clone());
            }
        }
        seen
    }

    pub(crate) fn record_input(&mut self, input: UserInput) {
        self.inputs.push(input);
    }

    /// Append the next chapter; returns a reference to it.
    pub(crate) fn append_chapter(&mut self, chapter: Chapter) -> &Chapter {
        debug_assert_eq!(chapter.index, self.chapters.len() + 1);
        self.chapters.push(chapter);
        &self.chapters[self.chapters.len() - 1]
    }

    pub(crate) fn chapter_mut(&mut self, index: usize) -> Option<&mut Chapter> {
        index.checked_sub(1).and_then(|i| self.chapters.get_mut(i))
    }

    /// Mark the session ended with a summary built from current state.
    pub(crate) fn end(&mut self, progress: &Progress) -> &SessionSummary {
        let summary = SessionSummary {
            session_id: self.id,
            ended_at: Utc::now(),
            complete_story: self.complete_story(),
            num_prompts: self.inputs.len(),
            num_chapters: self.chapters.len(),
            covered_dimensions: self.covered_dimensions(),
            coverage_percentage: *progress.coverage_percentage(),
        };
        self.summary.insert(summary)
    }

    pub(crate) fn set_ranking(&mut self, ranking: Ranking) -> &Ranking {
        self.ranking.insert(ranking)
    }
}
