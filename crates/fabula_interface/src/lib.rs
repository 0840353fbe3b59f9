//! Trait definitions for Fabula.
//!
//! This crate defines the two external collaborators of the orchestration
//! core: the text-generation backend ([`FabulaDriver`]) and durable session
//! storage ([`SessionRepository`]), plus the record documents exchanged
//! with storage.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod records;
mod session_id;
mod traits;

pub use records::{
    ChapterRecord, RankedFeature, RankingRecord, RoleOutputRecord, SessionSnapshot,
    SessionSummaryRecord, UserInputRecord,
};
pub use session_id::SessionId;
pub use traits::{FabulaDriver, SessionRepository};
