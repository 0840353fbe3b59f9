//! Top-level error wrapper types.

use crate::{
    ConfigError, ModelError, PersistenceError, StoryError, StoryErrorKind,
};

/// Foundation error enum unifying every Fabula error.
///
/// # Examples
///
/// ```
/// use fabula_error::{ConfigError, ConfigErrorKind, FabulaError};
///
/// let kind = ConfigErrorKind::Parse("bad dimension table".into());
/// let err: FabulaError = ConfigError::new(kind).into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum FabulaErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Model backend error
    #[from(ModelError)]
    Model(ModelError),
    /// Storage error
    #[from(PersistenceError)]
    Persistence(PersistenceError),
    /// Orchestration error
    #[from(StoryError)]
    Story(StoryError),
}

/// How a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorDisposition {
    /// Transient failure; the same request may succeed if re-submitted
    #[display("retry")]
    Retry,
    /// The session is over; no further generation is possible
    #[display("session over")]
    SessionOver,
    /// The request itself is invalid and must be changed
    #[display("fix input")]
    FixInput,
    /// Misconfiguration or internal fault
    #[display("fault")]
    Fault,
}

/// Fabula error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Fabula Error: {}", _0)]
pub struct FabulaError(Box<FabulaErrorKind>);

impl FabulaError {
    /// Create a new error from a kind.
    pub fn new(kind: FabulaErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &FabulaErrorKind {
        &self.0
    }

    /// Get the story error kind, if this is an orchestration error.
    pub fn story_kind(&self) -> Option<&StoryErrorKind> {
        match self.kind() {
            FabulaErrorKind::Story(e) => Some(&e.kind),
            _ => None,
        }
    }

    /// Classify this error for the caller.
    pub fn disposition(&self) -> ErrorDisposition {
        match self.kind() {
            FabulaErrorKind::Model(e) if e.kind.is_transient() => ErrorDisposition::Retry,
            FabulaErrorKind::Model(_) => ErrorDisposition::Fault,
            FabulaErrorKind::Persistence(_) => ErrorDisposition::Retry,
            FabulaErrorKind::Config(_) => ErrorDisposition::Fault,
            FabulaErrorKind::Story(e) => match &e.kind {
                StoryErrorKind::MissingTag { .. } | StoryErrorKind::EmptySection { .. } => {
                    ErrorDisposition::Retry
                }
                StoryErrorKind::DimensionsExhausted(_) | StoryErrorKind::SessionEnded(_) => {
                    ErrorDisposition::SessionOver
                }
                StoryErrorKind::InvalidRevisionTarget { .. }
                | StoryErrorKind::DuplicateRank(_)
                | StoryErrorKind::RankingAlreadySubmitted(_)
                | StoryErrorKind::SessionNotFound(_)
                | StoryErrorKind::ChapterNotFound { .. }
                | StoryErrorKind::EmptyInput => ErrorDisposition::FixInput,
                StoryErrorKind::Template { .. }
                | StoryErrorKind::InvalidRoleChain { .. }
                | StoryErrorKind::UnknownRoleChain(_)
                | StoryErrorKind::InvalidDimensionSet(_) => ErrorDisposition::Fault,
            },
        }
    }
}

// Generic From implementation for any type that converts to FabulaErrorKind
impl<T> From<T> for FabulaError
where
    T: Into<FabulaErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Fabula operations.
pub type FabulaResult<T> = std::result::Result<T, FabulaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ModelErrorKind, PersistenceErrorKind};

    #[test]
    fn missing_tag_is_retryable() {
        let err: FabulaError = StoryError::new(StoryErrorKind::MissingTag {
            role: "Story Writer".to_string(),
            tag: "STORY:".to_string(),
            raw: "Sorry, I cannot comply".to_string(),
        })
        .into();
        assert_eq!(err.disposition(), ErrorDisposition::Retry);
    }

    #[test]
    fn exhaustion_ends_the_session() {
        let err: FabulaError = StoryError::new(StoryErrorKind::DimensionsExhausted(6)).into();
        assert_eq!(err.disposition(), ErrorDisposition::SessionOver);
        assert!(matches!(
            err.story_kind(),
            Some(StoryErrorKind::DimensionsExhausted(6))
        ));
    }

    #[test]
    fn model_errors_split_on_transience() {
        let timeout: FabulaError = ModelError::new(ModelErrorKind::Timeout {
            role: "Agent A".to_string(),
            seconds: 30,
        })
        .into();
        assert_eq!(timeout.disposition(), ErrorDisposition::Retry);

        let no_key: FabulaError =
            ModelError::new(ModelErrorKind::MissingApiKey("ANTHROPIC_API_KEY".into())).into();
        assert_eq!(no_key.disposition(), ErrorDisposition::Fault);
    }

    #[test]
    fn persistence_is_retryable() {
        let err: FabulaError =
            PersistenceError::new(PersistenceErrorKind::Write("disk full".into())).into();
        assert_eq!(err.disposition(), ErrorDisposition::Retry);
        assert!(err.story_kind().is_none());
    }
}
