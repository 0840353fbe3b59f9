//! Thematic dimensions and coverage tracking.
//!
//! A session explores a closed [`DimensionSet`]. Each forward chapter is
//! bound to one dimension that no earlier chapter covered; the
//! [`DimensionTracker`] decides which one using a pluggable
//! [`DimensionSelector`].

use crate::Chapter;
use derive_getters::Getters;
use fabula_error::{StoryError, StoryErrorKind};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// One thematic category a chapter can explore.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct Dimension {
    /// Stable identifier (slug)
    id: String,
    /// Display name
    name: String,
    /// Human-readable definition
    definition: String,
    /// Canned challenge exemplars
    #[serde(default)]
    #[builder(default)]
    challenges: Vec<String>,
}

impl Dimension {
    /// Creates a builder for `Dimension`.
    pub fn builder() -> DimensionBuilder {
        DimensionBuilder::default()
    }
}

/// Closed, ordered set of dimensions loaded at startup.
///
/// Identifiers are unique and non-empty; the set is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionSet {
    dimensions: Vec<Dimension>,
}

impl DimensionSet {
    /// Validate and build a dimension set.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, StoryError> {
        if dimensions.is_empty() {
            return Err(StoryError::new(StoryErrorKind::InvalidDimensionSet(
                "at least one dimension is required".to_string(),
            )));
        }

        let mut seen = HashSet::new();
        for dimension in &dimensions {
            if dimension.id.trim().is_empty() {
                return Err(StoryError::new(StoryErrorKind::InvalidDimensionSet(format!(
                    "dimension '{}' has an empty id",
                    dimension.name
                ))));
            }
            if !seen.insert(dimension.id.as_str()) {
                return Err(StoryError::new(StoryErrorKind::InvalidDimensionSet(format!(
                    "duplicate dimension id '{}'",
                    dimension.id
                ))));
            }
        }

        Ok(Self { dimensions })
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Always false for a validated set.
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Look up a dimension by id.
    pub fn get(&self, id: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.id == id)
    }

    /// Check membership by id.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Dimensions in declared order.
    pub fn iter(&self) -> impl Iterator<Item = &Dimension> {
        self.dimensions.iter()
    }
}

/// Strategy choosing the next dimension among the uncovered ones.
///
/// `uncovered` is never empty and is in declared order.
pub trait DimensionSelector: Send + Sync + std::fmt::Debug {
    /// Pick one of `uncovered`.
    fn select<'a>(&mut self, uncovered: &[&'a Dimension]) -> Option<&'a Dimension>;
}

/// Uniform random choice over uncovered dimensions.
#[derive(Debug)]
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    /// Seed from system entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixed seed, for reproducible sessions.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl DimensionSelector for RandomSelector {
    fn select<'a>(&mut self, uncovered: &[&'a Dimension]) -> Option<&'a Dimension> {
        uncovered.choose(&mut self.rng).copied()
    }
}

/// First uncovered dimension in declared order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialSelector;

impl DimensionSelector for SequentialSelector {
    fn select<'a>(&mut self, uncovered: &[&'a Dimension]) -> Option<&'a Dimension> {
        uncovered.first().copied()
    }
}

/// Named selection policy, as written in configuration.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// [`RandomSelector`]
    #[default]
    #[display("random")]
    Random,
    /// [`SequentialSelector`]
    #[display("sequential")]
    Sequential,
}

impl SelectionStrategy {
    /// Instantiate the selector. `seed` only affects the random strategy.
    pub fn selector(&self, seed: Option<u64>) -> Box<dyn DimensionSelector> {
        match (self, seed) {
            (SelectionStrategy::Random, Some(seed)) => Box::new(RandomSelector::seeded(seed)),
            (SelectionStrategy::Random, None) => Box::new(RandomSelector::new()),
            (SelectionStrategy::Sequential, _) => Box::new(SequentialSelector),
        }
    }
}

/// Coverage snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Progress {
    /// Covered dimension ids, in the order they were covered
    covered: Vec<String>,
    /// Uncovered dimension ids, in declared order
    remaining: Vec<String>,
    /// covered / total * 100, rounded to two decimals
    coverage_percentage: f64,
}

impl Progress {
    /// Size of the dimension set.
    pub fn total(&self) -> usize {
        self.covered.len() + self.remaining.len()
    }

    /// True when nothing remains uncovered.
    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Round to two decimal places.
pub(crate) fn percentage(covered: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = covered as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Tracks which dimensions a session has covered and picks the next one.
#[derive(Debug)]
pub struct DimensionTracker {
    set: Arc<DimensionSet>,
    covered: Vec<String>,
    selector: Box<dyn DimensionSelector>,
}

impl DimensionTracker {
    /// Fresh tracker with nothing covered.
    pub fn new(set: Arc<DimensionSet>, selector: Box<dyn DimensionSelector>) -> Self {
        Self {
            set,
            covered: Vec::new(),
            selector,
        }
    }

    /// Rebuild coverage from existing chapters, in index order.
    pub fn from_session(
        set: Arc<DimensionSet>,
        selector: Box<dyn DimensionSelector>,
        chapters: &[Chapter],
    ) -> Self {
        let mut tracker = Self::new(set, selector);
        for chapter in chapters {
            if !tracker.mark_covered(chapter.dimension()) {
                debug!(
                    chapter = chapter.index(),
                    dimension = %chapter.dimension(),
                    "Chapter dimension not counted toward coverage"
                );
            }
        }
        tracker
    }

    /// The dimension set being tracked.
    pub fn dimension_set(&self) -> &DimensionSet {
        &self.set
    }

    /// Pick an uncovered dimension, or `None` when the cycle is complete.
    ///
    /// Does not mark the returned dimension covered.
    pub fn next_dimension(&mut self) -> Option<Dimension> {
        let uncovered: Vec<&Dimension> = self
            .set
            .iter()
            .filter(|d| !self.covered.contains(&d.id))
            .collect();
        if uncovered.is_empty() {
            return None;
        }
        self.selector.select(&uncovered).cloned()
    }

    /// Record coverage. Returns false for an unknown or already covered id.
    pub fn mark_covered(&mut self, id: &str) -> bool {
        if !self.set.contains(id) || self.is_covered(id) {
            return false;
        }
        self.covered.push(id.to_string());
        true
    }

    /// Whether `id` has been covered.
    pub fn is_covered(&self, id: &str) -> bool {
        self.covered.iter().any(|c| c == id)
    }

    /// Covered ids in coverage order.
    pub fn covered(&self) -> &[String] {
        &self.covered
    }

    /// True when every dimension is covered.
    pub fn is_exhausted(&self) -> bool {
        self.covered.len() == self.set.len()
    }

    /// Current coverage.
    pub fn progress(&self) -> Progress {
        let remaining = self
            .set
            .iter()
            .filter(|d| !self.is_covered(&d.id))
            .map(|d| d.id.clone())
            .collect();
        Progress {
            covered: self.covered.clone(),
            remaining,
            coverage_percentage: percentage(self.covered.len(), self.set.len()),
        }
    }
}
