//! Persistence error types.

/// Kinds of persistence errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PersistenceErrorKind {
    /// Failed to create a storage directory
    #[display("Failed to create storage directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write a record
    #[display("Failed to write record: {}", _0)]
    Write(String),
    /// Failed to read a record
    #[display("Failed to read record: {}", _0)]
    Read(String),
    /// Record could not be encoded or decoded
    #[display("Failed to serialize record: {}", _0)]
    Serialization(String),
    /// Stored records are inconsistent with each other
    #[display("Corrupt session record: {}", _0)]
    Corrupt(String),
    /// Storage backend is unavailable
    #[display("Storage unavailable: {}", _0)]
    Unavailable(String),
}

/// Persistence error with location tracking.
///
/// Persistence failures never roll back in-memory session state; they are
/// reported next to the value that was committed.
///
/// # Examples
///
/// ```
/// use fabula_error::{PersistenceError, PersistenceErrorKind};
///
/// let err = PersistenceError::new(PersistenceErrorKind::Unavailable("disk full".to_string()));
/// assert!(format!("{}", err).contains("disk full"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Persistence Error: {} at line {} in {}", kind, line, file)]
pub struct PersistenceError {
    /// The kind of error that occurred
    pub kind: PersistenceErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PersistenceError {
    /// Create a new persistence error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PersistenceErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
