//! Structured memo keys for condition evaluation.
//!
//! A key hashes only what the condition tree can observe: the slice of the reader path its
//! predicates read, plus the target node's identity fields. Anything else may change without
//! invalidating the memo.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use story_model::{Condition, NodeState, ReaderPath};

use crate::cache::hash_of;

/// Reader-path fields a condition tree depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PathDependencies {
    pub sequence: bool,
    pub revisit_counts: bool,
    pub visits: bool,
    pub character_visits: bool,
    pub temporal_visits: bool,
    pub attractor_engagements: bool,
    pub endpoint_progress: bool,
}

impl PathDependencies {
    pub fn of(condition: &Condition) -> Self {
        let mut deps = Self::default();
        deps.collect(condition);
        deps
    }

    fn collect(&mut self, condition: &Condition) {
        match condition {
            Condition::VisitCount { .. } | Condition::TemporalPosition { .. } => {}
            Condition::PreviouslyVisited { .. }
            | Condition::VisitPattern { .. }
            | Condition::JourneyPattern { .. }
            | Condition::RecursivePattern(_) => self.sequence = true,
            Condition::AttractorsEngaged { .. } => self.attractor_engagements = true,
            Condition::EndpointProgress { .. } => self.endpoint_progress = true,
            Condition::RevisitCount { .. } => self.revisit_counts = true,
            Condition::CharacterBleed { .. } => self.visits = true,
            Condition::CharacterFocus(_) => {
                self.visits = true;
                self.character_visits = true;
            }
            Condition::TemporalFocus(_) => {
                self.visits = true;
                self.temporal_visits = true;
            }
            Condition::AttractorAffinity(_) => self.visits = true,
            Condition::AttractorEngagement(_) => {
                self.visits = true;
                self.attractor_engagements = true;
            }
            Condition::JourneyFingerprint(_) => {
                self.sequence = true;
                self.visits = true;
            }
            Condition::AllOf(children) | Condition::AnyOf(children) => {
                for child in children {
                    self.collect(child);
                }
            }
            Condition::Not(inner) => self.collect(inner),
        }
    }

    /// Hash only the selected fields of `path`.
    pub fn hash_path(&self, path: &ReaderPath) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        if self.sequence {
            path.sequence.hash(&mut hasher);
        }
        if self.revisit_counts {
            path.revisit_counts.hash(&mut hasher);
        }
        if self.visits {
            path.visits.hash(&mut hasher);
        }
        if self.character_visits {
            path.character_visits.hash(&mut hasher);
        }
        if self.temporal_visits {
            path.temporal_visits.hash(&mut hasher);
        }
        if self.attractor_engagements {
            path.attractor_engagements.hash(&mut hasher);
        }
        if self.endpoint_progress {
            path.endpoint_progress.hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Memo key of one top-level evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConditionKey {
    condition: u64,
    path: u64,
    node: u64,
}

impl ConditionKey {
    pub fn new(condition: &Condition, path: &ReaderPath, node: &NodeState) -> Self {
        Self {
            condition: structural_hash(condition),
            path: PathDependencies::of(condition).hash_path(path),
            node: hash_of(&(
                &node.id,
                node.visit_count,
                node.temporal_value,
                node.character,
                &node.attractors,
            )),
        }
    }
}

/// Hash of the serialized tree, so structurally equal conditions share a key.
pub fn structural_hash(condition: &Condition) -> u64 {
    match serde_json::to_vec(condition) {
        Ok(bytes) => hash_of(&bytes),
        Err(_) => hash_of(&format!("{:?}", condition)),
    }
}
