//! Configuration error types.

/// What went wrong while assembling the story configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ConfigErrorKind {
    /// A configuration source could not be read or merged
    #[display("Failed to build configuration: {}", _0)]
    Sources(String),
    /// Merged sources do not deserialize into the expected tables
    #[display("Failed to parse configuration: {}", _0)]
    Parse(String),
    /// A setting holds a value that can never work
    #[display("Invalid setting: {}", _0)]
    Invalid(String),
    /// A setting names something this build cannot provide
    #[display("Unsupported setting: {}", _0)]
    Unsupported(String),
}

/// Configuration error, tagged with where it was raised.
///
/// ```
/// use fabula_error::{ConfigError, ConfigErrorKind};
///
/// let err = ConfigError::new(ConfigErrorKind::Unsupported("provider 'gemini'".into()));
/// assert!(err.to_string().starts_with("Configuration Error: Unsupported setting"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", kind, line, file)]
pub struct ConfigError {
    /// Category and detail
    pub kind: ConfigErrorKind,
    /// Line where the error was raised
    pub line: u32,
    /// Source file where the error was raised
    pub file: &'static str,
}

impl ConfigError {
    /// Record `kind` at the caller's location.
    #[track_caller]
    pub fn new(kind: ConfigErrorKind) -> Self {
        let caller = std::panic::Location::caller();
        Self {
            kind,
            line: caller.line(),
            file: caller.file(),
        }
    }
}
