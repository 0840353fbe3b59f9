//! Role types for conversation participants.

use serde::{Deserialize, Serialize};

/// Speaker tag attached to every conversation turn.
///
/// # Examples
///
/// ```
/// use fabula_core::Role;
///
/// assert_ne!(Role::User, Role::Assistant);
/// assert_eq!(format!("{}", Role::System), "System");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Context and instructions injected by the orchestrator
    System,
    /// Text from the human participant
    User,
    /// Text produced by a model
    Assistant,
}
