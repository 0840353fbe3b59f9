//! Error types for Fabula.
//!
//! This crate provides the error types used throughout the Fabula workspace.
//!
//! # Error Hierarchy
//!
//! Errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - Constructors use `#[track_caller]` for automatic location capture
//!
//! Every error converts into [`FabulaError`], whose
//! [`disposition`](FabulaError::disposition) tells a caller whether to try
//! again, stop because the session is over, or fix its input.
//!
//! # Examples
//!
//! ```
//! use fabula_error::{ErrorDisposition, FabulaResult, StoryError, StoryErrorKind};
//!
//! fn revise() -> FabulaResult<()> {
//!     Err(StoryError::new(StoryErrorKind::InvalidRevisionTarget {
//!         requested: 4,
//!         chapter_count: 2,
//!     }))?
//! }
//!
//! let err = revise().unwrap_err();
//! assert_eq!(err.disposition(), ErrorDisposition::FixInput);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod model;
mod persistence;
mod story;

pub use config::{ConfigError, ConfigErrorKind};
pub use error::{ErrorDisposition, FabulaError, FabulaErrorKind, FabulaResult};
pub use model::{ModelError, ModelErrorKind};
pub use persistence::{PersistenceError, PersistenceErrorKind};
pub use story::{RankConflicts, StoryError, StoryErrorKind};
