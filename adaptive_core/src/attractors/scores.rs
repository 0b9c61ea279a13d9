//! Accumulated engagement per theme group.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ThemeGroup;

/// Engagement accumulated per theme group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ThemeScores {
    scores: BTreeMap<ThemeGroup, f32>,
}

impl ThemeScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to a group's score (accumulates with the existing score).
    pub fn add_score(&mut self, group: ThemeGroup, score: f32) {
        *self.scores.entry(group).or_insert(0.0) += score;
    }

    pub fn get_score(&self, group: ThemeGroup) -> f32 {
        self.scores.get(&group).copied().unwrap_or(0.0)
    }

    /// The highest-scoring group; ties go to the earliest group.
    pub fn strongest(&self) -> Option<(ThemeGroup, f32)> {
        self.scores
            .iter()
            .rev()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(group, score)| (*group, *score))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Rescale so the strongest group scores 100.
    pub fn normalize(&mut self) {
        if let Some((_, max_score)) = self.strongest() {
            if max_score > 0.0 {
                for score in self.scores.values_mut() {
                    *score = *score / max_score * 100.0;
                }
            }
        }
    }

    pub fn normalized(&self) -> Self {
        let mut scores = self.clone();
        scores.normalize();
        scores
    }
}
