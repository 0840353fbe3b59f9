//! Story orchestration error types.

use std::fmt;

/// Specific error conditions raised by the orchestration core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StoryErrorKind {
    /// A role's output lacked its required tag
    #[display("Role '{}' response is missing required tag '{}'", role, tag)]
    MissingTag {
        /// Role whose output was parsed
        role: String,
        /// Tag that was expected
        tag: String,
        /// The offending raw model text
        raw: String,
    },
    /// A role's output carried the tag but nothing after it
    #[display("Role '{}' response has an empty '{}' section", role, tag)]
    EmptySection {
        /// Role whose output was parsed
        role: String,
        /// Tag that was found
        tag: String,
    },
    /// A new chapter was requested but every dimension is covered
    #[display("All {} dimensions have been covered", _0)]
    DimensionsExhausted(usize),
    /// Revision requested for a chapter that does not exist
    #[display(
        "Cannot revise chapter {}: valid targets are 1..={}",
        requested,
        chapter_count
    )]
    InvalidRevisionTarget {
        /// Requested chapter index
        requested: usize,
        /// Number of chapters in the session
        chapter_count: usize,
    },
    /// Ranking submission is not a permutation of 1..=N over the session's features
    #[display("Rankings rejected: {}", _0)]
    DuplicateRank(RankConflicts),
    /// Rankings may only be submitted once per session
    #[display("Rankings were already submitted for session {}", _0)]
    RankingAlreadySubmitted(String),
    /// Session no longer accepts generation requests
    #[display("Session {} has ended", _0)]
    SessionEnded(String),
    /// Session is not known to the service or the repository
    #[display("Session {} not found", _0)]
    SessionNotFound(String),
    /// Chapter lookup out of range
    #[display("Chapter {} not found (session has {} chapters)", index, chapter_count)]
    ChapterNotFound {
        /// Requested chapter index
        index: usize,
        /// Number of chapters in the session
        chapter_count: usize,
    },
    /// Submitted feature text was blank
    #[display("Feature text cannot be empty")]
    EmptyInput,
    /// Role template could not be rendered
    #[display("Template error in role '{}': {}", role, message)]
    Template {
        /// Role whose template failed
        role: String,
        /// Error message
        message: String,
    },
    /// Role chain definition is unusable
    #[display("Invalid role chain '{}': {}", chain, message)]
    InvalidRoleChain {
        /// Chain name
        chain: String,
        /// Error message
        message: String,
    },
    /// Configuration names a chain the registry does not hold
    #[display("Unknown role chain '{}'", _0)]
    UnknownRoleChain(String),
    /// Dimension set definition is unusable
    #[display("Invalid dimension set: {}", _0)]
    InvalidDimensionSet(String),
}

/// Conflicting entries found while validating a ranking submission.
///
/// Each list names the specific entries at fault so the caller can fix
/// exactly those and resubmit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RankConflicts {
    /// Ranks assigned to more than one feature, with the features sharing them
    pub duplicate_ranks: Vec<(u32, Vec<String>)>,
    /// Ranks in 1..=N that no feature received
    pub missing_ranks: Vec<u32>,
    /// Features given a rank outside 1..=N
    pub out_of_range: Vec<(String, u32)>,
    /// Features listed more than once
    pub repeated_features: Vec<String>,
    /// Features that were never submitted in this session
    pub unknown_features: Vec<String>,
    /// Session features that received no rank
    pub unranked_features: Vec<String>,
}

impl RankConflicts {
    /// True when no conflict was recorded.
    pub fn is_empty(&self) -> bool {
        self.duplicate_ranks.is_empty()
            && self.missing_ranks.is_empty()
            && self.out_of_range.is_empty()
            && self.repeated_features.is_empty()
            && self.unknown_features.is_empty()
            && self.unranked_features.is_empty()
    }
}

impl fmt::Display for RankConflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for (rank, features) in &self.duplicate_ranks {
            parts.push(format!("rank {} used by {}", rank, features.join(", ")));
        }
        if !self.missing_ranks.is_empty() {
            let ranks: Vec<String> = self.missing_ranks.iter().map(u32::to_string).collect();
            parts.push(format!("missing ranks {}", ranks.join(", ")));
        }
        for (feature, rank) in &self.out_of_range {
            parts.push(format!("rank {} for '{}' is out of range", rank, feature));
        }
        if !self.repeated_features.is_empty() {
            parts.push(format!("listed twice: {}", self.repeated_features.join(", ")));
        }
        if !self.unknown_features.is_empty() {
            parts.push(format!("unknown features: {}", self.unknown_features.join(", ")));
        }
        if !self.unranked_features.is_empty() {
            parts.push(format!("unranked features: {}", self.unranked_features.join(", ")));
        }
        if parts.is_empty() {
            write!(f, "no conflicts")
        } else {
            write!(f, "{}", parts.join("; "))
        }
    }
}

/// Error type for story orchestration.
///
/// # Examples
///
/// ```
/// use fabula_error::{StoryError, StoryErrorKind};
///
/// let err = StoryError::new(StoryErrorKind::DimensionsExhausted(6));
/// assert!(format!("{}", err).contains("All 6 dimensions"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Story Error: {} at line {} in {}", kind, line, file)]
pub struct StoryError {
    /// The specific error condition
    pub kind: StoryErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl StoryError {
    /// Create a new StoryError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StoryErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
