//! Closing-step rankings of a session's features.
//!
//! A ranking must be a permutation: every distinct feature the user
//! submitted gets exactly one rank in `1..=N` and no rank is shared.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use fabula_error::{RankConflicts, StoryError, StoryErrorKind};
use fabula_interface::{RankedFeature, RankingRecord, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A feature and the rank given to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct RankEntry {
    /// Feature text, as submitted during the session
    feature: String,
    /// Rank, 1 is best
    rank: u32,
}

impl RankEntry {
    /// Pair a feature with a rank.
    pub fn new(feature: impl Into<String>, rank: u32) -> Self {
        Self {
            feature: feature.into(),
            rank,
        }
    }
}

/// An accepted ranking, ordered by rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Ranking {
    /// Entries in ascending rank order
    entries: Vec<RankEntry>,
    /// When the ranking was accepted
    submitted_at: DateTime<Utc>,
}

impl Ranking {
    /// Validate `submitted` against the session's distinct features.
    ///
    /// # Examples
    ///
    /// ```
    /// use fabula_story::{RankEntry, Ranking};
    ///
    /// let features = vec!["F1".to_string(), "F2".to_string(), "F3".to_string()];
    ///
    /// let clash = vec![RankEntry::new("F2", 1), RankEntry::new("F1", 2), RankEntry::new("F3", 2)];
    /// assert!(Ranking::validate(&features, clash).is_err());
    ///
    /// let ok = vec![RankEntry::new("F2", 1), RankEntry::new("F1", 2), RankEntry::new("F3", 3)];
    /// let ranking = Ranking::validate(&features, ok).unwrap();
    /// assert_eq!(ranking.ordered_features(), vec!["F2", "F1", "F3"]);
    /// ```
    pub fn validate(features: &[String], submitted: Vec<RankEntry>) -> Result<Self, StoryError> {
        let conflicts = find_conflicts(features, &submitted);
        if !conflicts.is_empty() {
            return Err(StoryError::new(StoryErrorKind::DuplicateRank(conflicts)));
        }

        let mut entries = submitted;
        entries.sort_by_key(|e| e.rank);
        Ok(Self {
            entries,
            submitted_at: Utc::now(),
        })
    }

    /// Feature texts from best to worst.
    pub fn ordered_features(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.feature.as_str()).collect()
    }

    /// Record form for a repository.
    pub fn to_record(&self, session_id: SessionId) -> RankingRecord {
        RankingRecord {
            session_id,
            timestamp: self.submitted_at,
            entries: self
                .entries
                .iter()
                .map(|e| RankedFeature {
                    feature: e.feature.clone(),
                    rank: e.rank,
                })
                .collect(),
        }
    }

    pub(crate) fn from_record(record: RankingRecord) -> Self {
        Self {
            entries: record
                .entries
                .into_iter()
                .map(|e| RankEntry::new(e.feature, e.rank))
                .collect(),
            submitted_at: record.timestamp,
        }
    }
}

fn find_conflicts(features: &[String], submitted: &[RankEntry]) -> RankConflicts {
    let n = features.len() as u32;
    let mut conflicts = RankConflicts::default();

    let mut by_rank: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    let mut listed: Vec<&str> = Vec::new();
    for entry in submitted {
        if listed.contains(&entry.feature.as_str()) {
            if !conflicts.repeated_features.contains(&entry.feature) {
                conflicts.repeated_features.push(entry.feature.clone());
            }
        } else {
            listed.push(&entry.feature);
        }

        if !features.contains(&entry.feature) {
            conflicts.unknown_features.push(entry.feature.clone());
        }

        if entry.rank == 0 || entry.rank > n {
            conflicts.out_of_range.push((entry.feature.clone(), entry.rank));
        } else {
            by_rank.entry(entry.rank).or_default().push(entry.feature.clone());
        }
    }

    for (rank, holders) in &by_rank {
        if holders.len() > 1 {
            conflicts.duplicate_ranks.push((*rank, holders.clone()));
        }
    }

    conflicts.missing_ranks = (1..=n).filter(|r| !by_rank.contains_key(r)).collect();

    conflicts.unranked_features = features
        .iter()
        .filter(|f| !listed.contains(&f.as_str()))
        .cloned()
        .collect();

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> Vec<String> {
        vec!["F1".to_string(), "F2".to_string(), "F3".to_string()]
    }

    fn conflicts_of(submitted: Vec<RankEntry>) -> RankConflicts {
        match Ranking::validate(&features(), submitted).unwrap_err().kind {
            StoryErrorKind::DuplicateRank(conflicts) => conflicts,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn shared_rank_names_both_features_and_the_gap() {
        let conflicts = conflicts_of(vec![
            RankEntry::new("F2", 1),
            RankEntry::new("F1", 2),
            RankEntry::new("F3", 2),
        ]);
        assert_eq!(
            conflicts.duplicate_ranks,
            vec![(2, vec!["F1".to_string(), "F3".to_string()])]
        );
        assert_eq!(conflicts.missing_ranks, vec![3]);
        assert_eq!(conflicts.to_string(), "rank 2 used by F1, F3; missing ranks 3");
    }

    #[test]
    fn unknown_and_unranked_features_are_reported() {
        let conflicts = conflicts_of(vec![
            RankEntry::new("F1", 1),
            RankEntry::new("F9", 2),
            RankEntry::new("F2", 3),
        ]);
        assert_eq!(conflicts.unknown_features, vec!["F9"]);
        assert_eq!(conflicts.unranked_features, vec!["F3"]);
        assert!(conflicts.duplicate_ranks.is_empty());
    }

    #[test]
    fn out_of_range_and_repeated_entries_are_reported() {
        let conflicts = conflicts_of(vec![
            RankEntry::new("F1", 0),
            RankEntry::new("F2", 4),
            RankEntry::new("F2", 1),
        ]);
        assert_eq!(
            conflicts.out_of_range,
            vec![("F1".to_string(), 0), ("F2".to_string(), 4)]
        );
        assert_eq!(conflicts.repeated_features, vec!["F2"]);
        assert_eq!(conflicts.missing_ranks, vec![2, 3]);
    }

    #[test]
    fn valid_permutation_is_sorted_by_rank() {
        let ranking = Ranking::validate(
            &features(),
            vec![
                RankEntry::new("F3", 3),
                RankEntry::new("F1", 2),
                RankEntry::new("F2", 1),
            ],
        )
        .unwrap();
        assert_eq!(ranking.ordered_features(), vec!["F2", "F1", "F3"]);
    }

    #[test]
    fn nothing_to_rank_accepts_empty_submission() {
        let ranking = Ranking::validate(&[], Vec::new()).unwrap();
        assert!(ranking.entries().is_empty());
    }
}
