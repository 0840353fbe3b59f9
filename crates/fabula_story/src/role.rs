//! Role prompts and the chains they form.
//!
//! A [`RoleChain`] is data: an ordered list of [`RolePrompt`]s loaded from
//! TOML. The orchestrator walks whichever chain configuration selects and
//! never decides at runtime which role runs next.
//!
//! ```toml
//! [chains.parameter_challenge]
//! description = "Parameter, challenge, story"
//!
//! [[chains.parameter_challenge.roles]]
//! name = "Agent A"
//! tag = "PARAMETER:"
//! instructions = "Identify the key design parameter in: {{feature}}"
//!
//! [[chains.parameter_challenge.roles]]
//! name = "Agent B"
//! tag = "STORY:"
//! instructions = "Continue the story for chapter {{chapter}}."
//! ```

use crate::Dimension;
use derive_getters::Getters;
use fabula_error::{StoryError, StoryErrorKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument};

/// Placeholders a role template may use.
pub const PLACEHOLDERS: &[&str] = &[
    "feature",
    "story",
    "previous",
    "dimension",
    "definition",
    "challenges",
    "chapter",
    "stage",
    "outputs",
];

/// Which chapters a role takes part in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum RoleScope {
    /// Every chapter
    #[default]
    #[display("every")]
    Every,
    /// Only the first chapter
    #[display("opening")]
    Opening,
    /// Only chapters after the first
    #[display("continuation")]
    Continuation,
}

impl RoleScope {
    /// Whether a role with this scope runs at `stage`.
    pub fn applies_to(&self, stage: Stage) -> bool {
        matches!(
            (self, stage),
            (RoleScope::Every, _)
                | (RoleScope::Opening, Stage::Opening)
                | (RoleScope::Continuation, Stage::Continuation)
        )
    }
}

/// Whether a chapter opens the story or continues it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Stage {
    /// Chapter 1
    #[display("opening")]
    Opening,
    /// Any later chapter
    #[display("continuation")]
    Continuation,
}

impl Stage {
    /// Stage of the chapter with the given 1-based index.
    pub fn for_chapter(index: usize) -> Self {
        if index <= 1 {
            Stage::Opening
        } else {
            Stage::Continuation
        }
    }
}

/// One role's prompt configuration.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct RolePrompt {
    /// Role name, used in the system prompt ("You are {name}.")
    name: String,
    /// Instruction template
    instructions: String,
    /// Marker the role's reply must contain
    tag: String,
    /// Chapters this role runs for
    #[serde(default)]
    #[builder(default)]
    scope: RoleScope,
    /// Whether the preceding role's output is passed in as a system turn.
    /// Defaults to true for every role except the first.
    #[serde(default)]
    #[builder(default, setter(into, strip_option))]
    #[getter(skip)]
    consumes_previous: Option<bool>,
    /// Heading used when this role's output is handed on
    #[serde(default)]
    #[builder(default, setter(into, strip_option))]
    #[getter(skip)]
    label: Option<String>,
}

impl RolePrompt {
    /// Creates a builder for `RolePrompt`.
    pub fn builder() -> RolePromptBuilder {
        RolePromptBuilder::default()
    }

    /// Whether this role receives the preceding role's output.
    pub fn consumes_previous(&self) -> bool {
        self.consumes_previous.unwrap_or(false)
    }

    /// Heading for this role's output; the role name unless configured.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Placeholder names used by the instruction template.
    fn placeholders(&self) -> Result<Vec<String>, StoryError> {
        let re = placeholder_regex(&self.name)?;
        Ok(re
            .captures_iter(&self.instructions)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
            .collect())
    }

    /// Render the instruction template.
    pub fn render(&self, context: &TemplateContext<'_>) -> Result<String, StoryError> {
        let re = placeholder_regex(&self.name)?;
        let mut failure = None;
        let rendered = re.replace_all(&self.instructions, |cap: &regex::Captures<'_>| {
            let name = cap.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            match context.value(name) {
                Some(value) => value,
                None => {
                    failure.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });
        if let Some(name) = failure {
            return Err(StoryError::new(StoryErrorKind::Template {
                role: self.name.clone(),
                message: format!("unknown placeholder {{{{{}}}}}", name),
            }));
        }
        Ok(rendered.into_owned())
    }

    /// Full system prompt: "You are {name}. {rendered instructions}".
    pub fn system_prompt(&self, context: &TemplateContext<'_>) -> Result<String, StoryError> {
        Ok(format!("You are {}. {}", self.name, self.render(context)?))
    }
}

static PLACEHOLDER_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// `{{name}}` matcher, compiled on first use.
fn placeholder_regex(role: &str) -> Result<&'static Regex, StoryError> {
    PLACEHOLDER_RE
        .get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}"))
        .as_ref()
        .map_err(|e| {
            StoryError::new(StoryErrorKind::Template {
                role: role.to_string(),
                message: format!("Invalid template regex: {}", e),
            })
        })
}

/// Values substituted into a role template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// The user's feature text
    pub feature: &'a str,
    /// Accumulated story before this chapter
    pub story: &'a str,
    /// Extracted output of the preceding role, empty for the first role
    pub previous: &'a str,
    /// Dimension bound to the chapter
    pub dimension: &'a Dimension,
    /// 1-based chapter index
    pub chapter: usize,
    /// Stage marker sent with the user turn
    pub stage_marker: &'a str,
    /// Labeled outputs of every earlier role in this run
    pub outputs: &'a str,
}

impl TemplateContext<'_> {
    fn value(&self, name: &str) -> Option<String> {
        let value = match name {
            "feature" => self.feature.to_string(),
            "story" => self.story.to_string(),
            "previous" => self.previous.to_string(),
            "dimension" => self.dimension.name().clone(),
            "definition" => self.dimension.definition().clone(),
            "challenges" => self
                .dimension
                .challenges()
                .iter()
                .map(|c| format!("- {}", c))
                .collect::<Vec<_>>()
                .join("\n"),
            "chapter" => self.chapter.to_string(),
            "stage" => self.stage_marker.to_string(),
            "outputs" => self.outputs.to_string(),
            _ => return None,
        };
        Some(value)
    }
}

/// Chain definition as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChainSpec {
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Roles in invocation order
    #[serde(default)]
    pub roles: Vec<RolePrompt>,
}

/// A validated, ordered list of roles. The last role writes the story.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct RoleChain {
    /// Chain name
    name: String,
    /// Free-form description
    description: Option<String>,
    /// Roles in invocation order
    roles: Vec<RolePrompt>,
}

impl RoleChain {
    /// Validate and build a chain.
    ///
    /// Roles that leave `consumes_previous` unset consume the preceding
    /// output unless they come first.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        mut roles: Vec<RolePrompt>,
    ) -> Result<Self, StoryError> {
        for (position, role) in roles.iter_mut().enumerate() {
            role.consumes_previous.get_or_insert(position > 0);
        }
        let chain = Self {
            name: name.into(),
            description,
            roles,
        };
        chain.validate()?;
        Ok(chain)
    }

    fn invalid(&self, message: impl Into<String>) -> StoryError {
        StoryError::new(StoryErrorKind::InvalidRoleChain {
            chain: self.name.clone(),
            message: message.into(),
        })
    }

    fn validate(&self) -> Result<(), StoryError> {
        let Some(writer) = self.roles.last() else {
            return Err(self.invalid("chain has no roles"));
        };

        let mut names = HashSet::new();
        for role in &self.roles {
            if role.name.trim().is_empty() {
                return Err(self.invalid("role with an empty name"));
            }
            if role.tag.trim().is_empty() {
                return Err(self.invalid(format!("role '{}' has an empty tag", role.name)));
            }
            if !names.insert(role.name.as_str()) {
                return Err(self.invalid(format!("role '{}' appears twice", role.name)));
            }
            for placeholder in role.placeholders()? {
                if !PLACEHOLDERS.contains(&placeholder.as_str()) {
                    return Err(StoryError::new(StoryErrorKind::Template {
                        role: role.name.clone(),
                        message: format!(
                            "unknown placeholder {{{{{}}}}}; expected one of {}",
                            placeholder,
                            PLACEHOLDERS.join(", ")
                        ),
                    }));
                }
                if placeholder == "previous" && !role.consumes_previous() {
                    return Err(StoryError::new(StoryErrorKind::Template {
                        role: role.name.clone(),
                        message: "{{previous}} used by a role that does not consume previous output"
                            .to_string(),
                    }));
                }
            }
        }

        if writer.scope != RoleScope::Every {
            return Err(self.invalid(format!(
                "last role '{}' writes the story and must have scope 'every', not '{}'",
                writer.name, writer.scope
            )));
        }

        for stage in [Stage::Opening, Stage::Continuation] {
            let roles = self.effective_roles(stage);
            if let Some(first) = roles.first().filter(|r| r.consumes_previous()) {
                return Err(self.invalid(format!(
                    "role '{}' runs first for {} chapters but consumes previous output",
                    first.name, stage
                )));
            }
        }

        Ok(())
    }

    /// Roles that run for a chapter at `stage`, in order.
    pub fn effective_roles(&self, stage: Stage) -> Vec<&RolePrompt> {
        self.roles
            .iter()
            .filter(|role| role.scope.applies_to(stage))
            .collect()
    }

    /// The story-writing role.
    pub fn writer(&self) -> Option<&RolePrompt> {
        self.roles.last()
    }
}

#[derive(Debug, Deserialize)]
struct ChainsDocument {
    #[serde(default)]
    chains: HashMap<String, RoleChainSpec>,
}

/// Named role chains.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    chains: BTreeMap<String, Arc<RoleChain>>,
}

impl RoleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and validate every chain in `specs`.
    pub fn from_specs(specs: &HashMap<String, RoleChainSpec>) -> Result<Self, StoryError> {
        let mut registry = Self::new();
        for (name, spec) in specs {
            registry.register(RoleChain::new(
                name.clone(),
                spec.description.clone(),
                spec.roles.clone(),
            )?);
        }
        Ok(registry)
    }

    /// Parse `[chains.<name>]` tables from a TOML document.
    #[instrument(skip(text), fields(len = text.len()))]
    pub fn from_toml(text: &str) -> Result<Self, StoryError> {
        let document: ChainsDocument = toml::from_str(text).map_err(|e| {
            StoryError::new(StoryErrorKind::InvalidRoleChain {
                chain: "<document>".to_string(),
                message: e.to_string(),
            })
        })?;
        let registry = Self::from_specs(&document.chains)?;
        debug!(chains = registry.chains.len(), "Loaded role chains");
        Ok(registry)
    }

    /// Add a chain, returning any chain it replaced.
    pub fn register(&mut self, chain: RoleChain) -> Option<Arc<RoleChain>> {
        self.chains.insert(chain.name.clone(), Arc::new(chain))
    }

    /// Look up a chain by name.
    pub fn get(&self, name: &str) -> Result<Arc<RoleChain>, StoryError> {
        self.chains
            .get(name)
            .cloned()
            .ok_or_else(|| StoryError::new(StoryErrorKind::UnknownRoleChain(name.to_string())))
    }

    /// Registered chain names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    /// Number of registered chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// True when no chain is registered.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str, tag: &str, instructions: &str) -> RolePromptBuilder {
        let mut builder = RolePrompt::builder();
        builder.name(name).tag(tag).instructions(instructions);
        builder
    }

    fn dimension() -> Dimension {
        Dimension::builder()
            .id("presence")
            .name("Presence")
            .definition("Feeling that the remote person is in the room")
            .challenges(vec!["Lag breaks the illusion".to_string()])
            .build()
            .unwrap()
    }

    #[test]
    fn consumes_previous_defaults_to_all_but_first() {
        let chain = RoleChain::new(
            "pcs",
            None,
            vec![
                role("Agent A", "PARAMETER:", "a").build().unwrap(),
                role("Agent C", "CHALLENGE:", "c").build().unwrap(),
                role("Agent B", "STORY:", "b").build().unwrap(),
            ],
        )
        .unwrap();

        let flags: Vec<bool> = chain.roles().iter().map(RolePrompt::consumes_previous).collect();
        assert_eq!(flags, vec![false, true, true]);
    }

    #[test]
    fn scope_filters_effective_roles() {
        let chain = RoleChain::new(
            "fd",
            None,
            vec![
                role("Feature Analyzer", "FEATURE:", "x").build().unwrap(),
                role("Scene Setter", "SCENE:", "x")
                    .scope(RoleScope::Opening)
                    .build()
                    .unwrap(),
                role("Story Writer", "STORY:", "x").build().unwrap(),
            ],
        )
        .unwrap();

        let names = |stage| -> Vec<String> {
            chain
                .effective_roles(stage)
                .iter()
                .map(|r| r.name().clone())
                .collect()
        };
        assert_eq!(names(Stage::Opening), vec!["Feature Analyzer", "Scene Setter", "Story Writer"]);
        assert_eq!(names(Stage::Continuation), vec!["Feature Analyzer", "Story Writer"]);
    }

    #[test]
    fn writer_must_run_every_chapter() {
        let err = RoleChain::new(
            "bad",
            None,
            vec![role("Writer", "STORY:", "x")
                .scope(RoleScope::Opening)
                .build()
                .unwrap()],
        )
        .unwrap_err();
        assert!(matches!(err.kind, StoryErrorKind::InvalidRoleChain { .. }));
    }

    #[test]
    fn empty_chain_and_empty_tag_are_rejected() {
        assert!(RoleChain::new("empty", None, Vec::new()).is_err());
        assert!(RoleChain::new("tagless", None, vec![role("W", "  ", "x").build().unwrap()]).is_err());
    }

    #[test]
    fn unknown_placeholder_is_a_template_error() {
        let err = RoleChain::new(
            "typo",
            None,
            vec![role("Writer", "STORY:", "Use {{feture}}").build().unwrap()],
        )
        .unwrap_err();
        match err.kind {
            StoryErrorKind::Template { role, message } => {
                assert_eq!(role, "Writer");
                assert!(message.contains("{{feture}}"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn first_role_cannot_use_previous() {
        let err = RoleChain::new(
            "prev",
            None,
            vec![role("Writer", "STORY:", "After {{previous}}").build().unwrap()],
        )
        .unwrap_err();
        assert!(matches!(err.kind, StoryErrorKind::Template { .. }));
    }

    #[test]
    fn render_substitutes_every_placeholder() {
        let prompt = role(
            "Agent B",
            "STORY:",
            "{{stage}} ch{{chapter}} {{dimension}}: {{definition}}\n{{challenges}}\n{{feature}}|{{story}}|{{ previous }}|{{outputs}}",
        )
        .consumes_previous(true)
        .build()
        .unwrap();
        let dimension = dimension();
        let context = TemplateContext {
            feature: "hugs",
            story: "Once",
            previous: "CHALLENGE text",
            dimension: &dimension,
            chapter: 2,
            stage_marker: "[CONTINUATION]",
            outputs: "Parameter Info: hugs",
        };

        let system = prompt.system_prompt(&context).unwrap();
        assert_eq!(
            system,
            "You are Agent B. [CONTINUATION] ch2 Presence: Feeling that the remote person is in the room\n- Lag breaks the illusion\nhugs|Once|CHALLENGE text|Parameter Info: hugs"
        );
    }

    #[test]
    fn registry_loads_chains_from_toml() {
        let registry = RoleRegistry::from_toml(
            r#"
            [chains.short]
            description = "one role"

            [[chains.short.roles]]
            name = "Writer"
            tag = "STORY:"
            instructions = "Write about {{dimension}}."
            "#,
        )
        .unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["short"]);
        let chain = registry.get("short").unwrap();
        assert_eq!(chain.writer().map(|r| r.tag().as_str()), Some("STORY:"));
        assert!(matches!(
            registry.get("missing").unwrap_err().kind,
            StoryErrorKind::UnknownRoleChain(_)
        ));
    }

    #[test]
    fn placeholder_pattern_is_compiled_once() {
        let first = placeholder_regex("Agent A").unwrap();
        let second = placeholder_regex("Agent B").unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.captures_iter("{{feature}} and {{ story }}").count(), 2);
    }
}
