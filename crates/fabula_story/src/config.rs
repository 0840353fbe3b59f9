//! Configuration loading.
//!
//! Sources, later overriding earlier:
//! 1. Bundled defaults (`fabula.toml` shipped with the library)
//! 2. `~/.config/fabula/fabula.toml`
//! 3. `./fabula.toml`
//!
//! User files are optional and silently skipped when absent.

use crate::{
    Dimension, DimensionSet, RoleChain, RoleChainSpec, RoleRegistry, SelectionStrategy,
};
use config::{Config, File, FileFormat};
use derive_getters::Getters;
use fabula_error::{ConfigError, ConfigErrorKind, FabulaResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Bundled default configuration.
pub const DEFAULT_CONFIG: &str = include_str!("../../../fabula.toml");

/// Per-session behavior.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(setter(into), default)]
pub struct SessionSettings {
    /// Forward chapters after which the session ends
    #[serde(default = "default_chapter_limit")]
    chapter_limit: usize,

    /// Dimension selection policy
    #[serde(default)]
    selection: SelectionStrategy,

    /// Seed for the random selector
    #[serde(default)]
    #[setters(strip_option)]
    #[builder(setter(into, strip_option))]
    seed: Option<u64>,

    /// Upper bound on a single model call (seconds)
    #[serde(default = "default_role_timeout_secs")]
    role_timeout_secs: u64,

    /// Input word that ends the session in interactive front ends
    #[serde(default = "default_end_command")]
    end_command: String,

    /// Name of the role chain to run
    #[serde(default = "default_active_chain")]
    active_chain: String,

    /// Stage marker appended to the first chapter's user turn
    #[serde(default = "default_opening_marker")]
    opening_marker: String,

    /// Stage marker appended to later chapters' user turns
    #[serde(default = "default_continuation_marker")]
    continuation_marker: String,
}

fn default_chapter_limit() -> usize {
    6
}

fn default_role_timeout_secs() -> u64 {
    120
}

fn default_end_command() -> String {
    "exit".to_string()
}

fn default_active_chain() -> String {
    "parameter_challenge".to_string()
}

fn default_opening_marker() -> String {
    "[FIRST_PARAMETER]".to_string()
}

fn default_continuation_marker() -> String {
    "[CONTINUATION]".to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chapter_limit: default_chapter_limit(),
            selection: SelectionStrategy::default(),
            seed: None,
            role_timeout_secs: default_role_timeout_secs(),
            end_command: default_end_command(),
            active_chain: default_active_chain(),
            opening_marker: default_opening_marker(),
            continuation_marker: default_continuation_marker(),
        }
    }
}

impl SessionSettings {
    /// Creates a builder for `SessionSettings`.
    pub fn builder() -> SessionSettingsBuilder {
        SessionSettingsBuilder::default()
    }

    /// Timeout applied to each model call.
    pub fn role_timeout(&self) -> Duration {
        Duration::from_secs(self.role_timeout_secs)
    }

    /// Whether `text` is the end command (trimmed, case-insensitive).
    pub fn is_end_command(&self, text: &str) -> bool {
        text.trim().eq_ignore_ascii_case(self.end_command.trim())
    }

    /// Reject values that would end or time out every request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chapter_limit == 0 {
            return Err(ConfigError::new(ConfigErrorKind::Invalid(
                "session.chapter_limit must be at least 1".to_string(),
            )));
        }
        if self.role_timeout_secs == 0 {
            return Err(ConfigError::new(ConfigErrorKind::Invalid(
                "session.role_timeout_secs must be at least 1".to_string(),
            )));
        }
        Ok(())
    }
}

/// Model call parameters.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct ModelSettings {
    /// Backend provider
    #[serde(default = "default_provider")]
    provider: String,

    /// Model identifier
    #[serde(default = "default_model")]
    name: String,

    /// Token limit per call
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,

    /// Sampling temperature
    #[serde(default)]
    #[setters(strip_option)]
    temperature: Option<f32>,
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_model() -> String {
    "claude-3-opus-20240229".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            name: default_model(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

/// Where sessions are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON files on disk
    #[default]
    #[display("file")]
    File,
    /// Process memory only
    #[display("memory")]
    Memory,
}

/// Storage selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct StorageSettings {
    /// Backend kind
    #[serde(default)]
    backend: StorageBackend,

    /// Root directory for the file backend
    #[serde(default = "default_storage_path")]
    path: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("sessions")
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
pub struct StoryConfig {
    /// Session behavior
    #[serde(default)]
    session: SessionSettings,

    /// Model call parameters
    #[serde(default)]
    model: ModelSettings,

    /// Storage selection
    #[serde(default)]
    storage: StorageSettings,

    /// Dimension set, in declared order
    #[serde(default)]
    dimensions: Vec<Dimension>,

    /// Role chains by name
    #[serde(default)]
    chains: HashMap<String, RoleChainSpec>,
}

impl StoryConfig {
    /// Load with precedence: current dir > home dir > bundled defaults.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fabula_story::StoryConfig;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = StoryConfig::load()?;
    /// println!("chain: {}", config.session().active_chain());
    /// # Ok(())
    /// # }
    /// ```
    #[instrument]
    pub fn load() -> FabulaResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/fabula/fabula.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("fabula").required(false));

        Self::finish(builder)
    }

    /// Bundled defaults only.
    pub fn bundled() -> FabulaResult<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Bundled defaults overridden by one explicit file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> FabulaResult<Self> {
        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.as_ref()));
        Self::finish(builder)
    }

    /// Parse a complete configuration document, without bundled defaults.
    pub fn from_toml_str(text: &str) -> FabulaResult<Self> {
        Self::finish(Config::builder().add_source(File::from_str(text, FileFormat::Toml)))
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> FabulaResult<Self> {
        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::new(ConfigErrorKind::Sources(e.to_string())))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(ConfigErrorKind::Parse(e.to_string())))?;
        config.session.validate()?;
        debug!(
            dimensions = config.dimensions.len(),
            chains = config.chains.len(),
            active_chain = %config.session.active_chain,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validated dimension set.
    pub fn dimension_set(&self) -> FabulaResult<Arc<DimensionSet>> {
        Ok(Arc::new(DimensionSet::new(self.dimensions.clone())?))
    }

    /// Validated registry of every configured chain.
    pub fn registry(&self) -> FabulaResult<RoleRegistry> {
        Ok(RoleRegistry::from_specs(&self.chains)?)
    }

    /// The chain named by `session.active_chain`.
    pub fn active_chain(&self) -> FabulaResult<Arc<RoleChain>> {
        Ok(self.registry()?.get(&self.session.active_chain)?)
    }

    /// Replace the session settings.
    pub fn with_session(mut self, session: SessionSettings) -> Self {
        self.session = session;
        self
    }

    /// Replace the model settings.
    pub fn with_model(mut self, model: ModelSettings) -> Self {
        self.model = model;
        self
    }

    /// Replace the storage settings.
    pub fn with_storage(mut self, storage: StorageSettings) -> Self {
        self.storage = storage;
        self
    }
}
