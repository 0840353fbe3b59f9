//! Model invocation error types.

/// Specific error conditions when calling a text-generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ModelErrorKind {
    /// API key not found in environment
    #[display("{} environment variable not set", _0)]
    MissingApiKey(String),
    /// Transport-level failure (connection refused, DNS, TLS)
    #[display("HTTP request failed: {}", _0)]
    Http(String),
    /// Backend answered with a non-success status
    #[display("API returned {}: {}", status, message)]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or error message
        message: String,
    },
    /// The call did not complete within the configured budget
    #[display("Role '{}' timed out after {}s", role, seconds)]
    Timeout {
        /// Role whose call timed out
        role: String,
        /// Timeout that was exceeded
        seconds: u64,
    },
    /// Response body could not be decoded
    #[display("Failed to parse response: {}", _0)]
    Parse(String),
    /// Backend returned no text content
    #[display("Model returned an empty response")]
    EmptyResponse,
    /// Request could not be assembled
    #[display("Failed to build request: {}", _0)]
    Builder(String),
}

impl ModelErrorKind {
    /// Check if this error is transient (worth a manual re-submit).
    ///
    /// Missing credentials and malformed requests will fail the same way
    /// on every attempt; everything else may succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelErrorKind::MissingApiKey(_) | ModelErrorKind::Builder(_) => false,
            ModelErrorKind::Api { status, .. } => {
                matches!(*status, 408 | 429 | 500 | 502 | 503 | 504 | 529)
            }
            _ => true,
        }
    }
}

/// Model invocation error with location tracking.
///
/// # Examples
///
/// ```
/// use fabula_error::{ModelError, ModelErrorKind};
///
/// let err = ModelError::new(ModelErrorKind::Api { status: 529, message: "overloaded".into() });
/// assert!(err.kind.is_transient());
/// assert!(format!("{}", err).contains("529"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Model Error: {} at line {} in {}", kind, line, file)]
pub struct ModelError {
    /// The specific error condition
    pub kind: ModelErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ModelError {
    /// Create a new ModelError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ModelErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
