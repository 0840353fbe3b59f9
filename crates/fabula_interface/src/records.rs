//! Record documents exchanged with a [`SessionRepository`](crate::SessionRepository).
//!
//! Records are plain serializable structures; the orchestration core owns
//! the conversion between its in-memory session state and these documents.

use crate::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw and extracted output of one role invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOutputRecord {
    /// Role name.
    pub role: String,

    /// Unmodified model text.
    pub raw: String,

    /// Payload extracted after the role's tag.
    pub extracted: String,
}

/// One committed chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    /// Session the chapter belongs to.
    pub session_id: SessionId,

    /// 1-based chapter index.
    pub chapter_index: usize,

    /// Identifier of the dimension the chapter explores.
    pub dimension: String,

    /// User input that produced the current version of the chapter.
    pub user_input: String,

    /// Extracted story text.
    pub story: String,

    /// Output of every role invoked for this chapter, in chain order.
    pub role_outputs: Vec<RoleOutputRecord>,

    /// When the chapter was first committed.
    pub created_at: DateTime<Utc>,

    /// When the chapter was last revised, if ever.
    pub revised_at: Option<DateTime<Utc>>,

    /// When this record was written.
    pub timestamp: DateTime<Utc>,
}

/// One entry of the user input log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInputRecord {
    /// Session the input belongs to.
    pub session_id: SessionId,

    /// Feature text as submitted.
    pub text: String,

    /// Chapter targeted for revision, or `None` for a new chapter.
    pub target_chapter: Option<usize>,

    /// When the input was submitted.
    pub timestamp: DateTime<Utc>,
}

/// Closing summary written when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummaryRecord {
    /// Session being summarized.
    pub session_id: SessionId,

    /// When the session ended.
    pub timestamp: DateTime<Utc>,

    /// All chapter stories joined in ascending index order.
    pub complete_story: String,

    /// Number of generation requests that reached the role chain.
    pub num_prompts: usize,

    /// Number of committed chapters.
    pub num_chapters: usize,

    /// Covered dimension identifiers, in chapter order.
    pub covered_dimensions: Vec<String>,

    /// Percentage of the dimension set covered.
    pub coverage_percentage: f64,
}

/// A feature and the rank the user gave it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedFeature {
    /// Feature text.
    pub feature: String,

    /// Rank in 1..=N.
    pub rank: u32,
}

/// Ranking of a session's features, ordered by rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRecord {
    /// Session the ranking belongs to.
    pub session_id: SessionId,

    /// When the ranking was submitted.
    pub timestamp: DateTime<Utc>,

    /// Entries in ascending rank order.
    pub entries: Vec<RankedFeature>,
}

/// Everything a repository holds for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub session_id: SessionId,

    /// Latest version of each chapter, ascending by index.
    pub chapters: Vec<ChapterRecord>,

    /// User input log in submission order.
    pub inputs: Vec<UserInputRecord>,

    /// Closing summary, present once the session ended.
    pub summary: Option<SessionSummaryRecord>,

    /// Submitted ranking, if any.
    pub ranking: Option<RankingRecord>,
}

impl SessionSnapshot {
    /// Create an empty snapshot for a session.
    pub fn empty(session_id: SessionId) -> Self {
        Self {
            session_id,
            chapters: Vec::new(),
            inputs: Vec::new(),
            summary: None,
            ranking: None,
        }
    }

    /// Insert a chapter, replacing any record with the same index and
    /// keeping the list ordered by index.
    pub fn upsert_chapter(&mut self, record: ChapterRecord) {
        match self
            .chapters
            .binary_search_by_key(&record.chapter_index, |c| c.chapter_index)
        {
            Ok(pos) => self.chapters[pos] = record,
            Err(pos) => self.chapters.insert(pos, record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(session_id: SessionId, index: usize, story: &str) -> ChapterRecord {
        let now = Utc::now();
        ChapterRecord {
            session_id,
            chapter_index: index,
            dimension: "care".to_string(),
            user_input: "feature".to_string(),
            story: story.to_string(),
            role_outputs: Vec::new(),
            created_at: now,
            revised_at: None,
            timestamp: now,
        }
    }

    #[test]
    fn upsert_keeps_chapters_ordered_and_replaces_by_index() {
        let id = SessionId::new();
        let mut snapshot = SessionSnapshot::empty(id);
        snapshot.upsert_chapter(chapter(id, 2, "second"));
        snapshot.upsert_chapter(chapter(id, 1, "first"));
        snapshot.upsert_chapter(chapter(id, 2, "second, revised"));

        let stories: Vec<&str> = snapshot.chapters.iter().map(|c| c.story.as_str()).collect();
        assert_eq!(stories, vec!["first", "second, revised"]);
    }

    #[test]
    fn snapshot_serializes_session_id_as_plain_string() {
        let id = SessionId::new();
        let json = serde_json::to_value(SessionSnapshot::empty(id)).unwrap();
        assert_eq!(json["session_id"], serde_json::Value::String(id.to_string()));
    }
}
