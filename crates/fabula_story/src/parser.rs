//! Strict extraction of tagged sections from model replies.

use derive_getters::Getters;
use fabula_error::{StoryError, StoryErrorKind};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Return the trimmed text after the first occurrence of `tag`.
///
/// Fails with [`StoryErrorKind::MissingTag`] when the tag is absent and
/// with [`StoryErrorKind::EmptySection`] when only whitespace follows it.
/// The whole raw text is never returned as a fallback.
///
/// # Examples
///
/// ```
/// use fabula_story::extract_tagged;
///
/// let raw = "Sure.\nSTORY:\n  Grandma laughed at the robot's joke.  ";
/// let story = extract_tagged("Agent B", raw, "STORY:").unwrap();
/// assert_eq!(story, "Grandma laughed at the robot's joke.");
///
/// assert!(extract_tagged("Agent B", "Sorry, I cannot comply", "STORY:").is_err());
/// ```
pub fn extract_tagged(role: &str, raw: &str, tag: &str) -> Result<String, StoryError> {
    let Some(start) = raw.find(tag) else {
        warn!(role, tag, raw, "Model response is missing required tag");
        return Err(StoryError::new(StoryErrorKind::MissingTag {
            role: role.to_string(),
            tag: tag.to_string(),
            raw: raw.to_string(),
        }));
    };

    let section = raw[start + tag.len()..].trim();
    if section.is_empty() {
        warn!(role, tag, raw, "Model response has an empty tagged section");
        return Err(StoryError::new(StoryErrorKind::EmptySection {
            role: role.to_string(),
            tag: tag.to_string(),
        }));
    }

    Ok(section.to_string())
}

/// The output of one role invocation: who produced it, the raw reply and
/// the payload extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RoleOutput {
    /// Role name
    role: String,
    /// Unmodified model text
    raw: String,
    /// Text following the role's tag
    extracted: String,
}

impl RoleOutput {
    /// Parse a raw reply with the role's required tag.
    pub fn parse(role: &str, raw: impl Into<String>, tag: &str) -> Result<Self, StoryError> {
        let raw = raw.into();
        let extracted = extract_tagged(role, &raw, tag)?;
        Ok(Self {
            role: role.to_string(),
            raw,
            extracted,
        })
    }

    /// Rebuild from stored parts.
    pub fn from_parts(
        role: impl Into<String>,
        raw: impl Into<String>,
        extracted: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            raw: raw.into(),
            extracted: extracted.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_wins() {
        let raw = "PARAMETER: gentle touch\nPARAMETER: loud voice";
        let extracted = extract_tagged("Agent A", raw, "PARAMETER:").unwrap();
        assert_eq!(extracted, "gentle touch\nPARAMETER: loud voice");
    }

    #[test]
    fn missing_tag_keeps_raw_text_for_diagnosis() {
        let err = extract_tagged("Agent B", "Sorry, I cannot comply", "STORY:").unwrap_err();
        match err.kind {
            StoryErrorKind::MissingTag { role, tag, raw } => {
                assert_eq!(role, "Agent B");
                assert_eq!(tag, "STORY:");
                assert_eq!(raw, "Sorry, I cannot comply");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn whitespace_after_tag_is_an_empty_section() {
        let err = extract_tagged("Agent B", "STORY:   \n\t", "STORY:").unwrap_err();
        assert!(matches!(err.kind, StoryErrorKind::EmptySection { .. }));
    }

    #[test]
    fn tag_match_is_case_sensitive() {
        assert!(extract_tagged("Agent C", "challenge: noise", "CHALLENGE:").is_err());
    }

    #[test]
    fn role_output_binds_all_parts() {
        let output = RoleOutput::parse("Agent C", "CHALLENGE: battery life", "CHALLENGE:").unwrap();
        assert_eq!(output.role(), "Agent C");
        assert_eq!(output.raw(), "CHALLENGE: battery life");
        assert_eq!(output.extracted(), "battery life");
    }
}
