//! Rule vocabulary: transformation conditions and text transformations.
//!
//! Conditions form a tree of leaf predicates joined by `allOf`, `anyOf` and `not`.
//! Every optional threshold inside a predicate is non-constraining when absent.

mod transformation;

pub use transformation::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::nodes::{AttractorTag, Character, NodeId, TemporalBucket};

/// A boolean condition tree evaluated against the reader's journey and a target node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    /// Target node visited at least `min` times.
    VisitCount { min: u32 },

    /// Every listed node appears somewhere in the history.
    PreviouslyVisited { nodes: Vec<NodeId> },

    /// The contiguous sequence occurs anywhere in the history.
    VisitPattern { sequence: Vec<NodeId> },

    /// The contiguous sequence is the tail of the history.
    JourneyPattern { sequence: Vec<NodeId> },

    /// Every listed attractor has been engaged at least once.
    AttractorsEngaged { attractors: Vec<AttractorTag> },

    /// The target node sits in the given temporal bucket.
    TemporalPosition { bucket: TemporalBucket },

    /// Progress towards a named endpoint orientation is at least `min` (0-100).
    EndpointProgress { orientation: String, min: u8 },

    /// Each listed node has been revisited at least the given number of times.
    RevisitCount { counts: BTreeMap<NodeId, u32> },

    /// Whether the reader just crossed from one character's node to another's.
    CharacterBleed { expected: bool },

    CharacterFocus(CharacterFocusPredicate),

    TemporalFocus(TemporalFocusPredicate),

    AttractorAffinity(AttractorAffinityPredicate),

    AttractorEngagement(AttractorEngagementPredicate),

    RecursivePattern(RecursivePatternPredicate),

    JourneyFingerprint(FingerprintPredicate),

    /// True when every child is true; empty is vacuously true.
    AllOf(Vec<Condition>),

    /// True when any child is true; empty is treated as absent.
    AnyOf(Vec<Condition>),

    Not(Box<Condition>),
}

impl Default for Condition {
    fn default() -> Self {
        Condition::AllOf(Vec::new())
    }
}

impl Condition {
    /// The vacuously true condition.
    pub fn always() -> Self {
        Self::default()
    }

    pub fn all_of(children: impl IntoIterator<Item = Condition>) -> Self {
        Condition::AllOf(children.into_iter().collect())
    }

    pub fn any_of(children: impl IntoIterator<Item = Condition>) -> Self {
        Condition::AnyOf(children.into_iter().collect())
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub fn visit_count(min: u32) -> Self {
        Condition::VisitCount { min }
    }

    pub fn previously_visited<N: Into<NodeId>>(nodes: impl IntoIterator<Item = N>) -> Self {
        Condition::PreviouslyVisited {
            nodes: nodes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn visit_pattern<N: Into<NodeId>>(sequence: impl IntoIterator<Item = N>) -> Self {
        Condition::VisitPattern {
            sequence: sequence.into_iter().map(Into::into).collect(),
        }
    }

    pub fn journey_pattern<N: Into<NodeId>>(sequence: impl IntoIterator<Item = N>) -> Self {
        Condition::JourneyPattern {
            sequence: sequence.into_iter().map(Into::into).collect(),
        }
    }

    pub fn attractors_engaged<T: Into<AttractorTag>>(tags: impl IntoIterator<Item = T>) -> Self {
        Condition::AttractorsEngaged {
            attractors: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this tree is a combinator with no children (vacuously true).
    pub fn is_empty(&self) -> bool {
        matches!(self, Condition::AllOf(c) | Condition::AnyOf(c) if c.is_empty())
    }

    /// Number of nodes in the tree, combinators included.
    pub fn size(&self) -> usize {
        match self {
            Condition::AllOf(children) | Condition::AnyOf(children) => {
                1 + children.iter().map(Condition::size).sum::<usize>()
            }
            Condition::Not(inner) => 1 + inner.size(),
            _ => 1,
        }
    }
}

/// Character-focus intensity predicate. Without a character the top-scoring one is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CharacterFocusPredicate {
    #[serde(default)]
    pub character: Option<Character>,
    /// Defaults to 0.5.
    #[serde(default)]
    pub min_intensity: Option<f32>,
}

/// Share of visits spent in a temporal bucket. Without a bucket, the dominant one is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemporalFocusPredicate {
    #[serde(default)]
    pub bucket: Option<TemporalBucket>,
    /// Defaults to 0.4.
    #[serde(default)]
    pub min_share: Option<f32>,
}

/// A thematic-affinity pattern must exist for the attractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttractorAffinityPredicate {
    pub attractor: AttractorTag,
    #[serde(default)]
    pub min_strength: Option<f32>,
}

/// Engagement score (0-100) for an attractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttractorEngagementPredicate {
    pub attractor: AttractorTag,
    /// Defaults to the significance threshold (50).
    #[serde(default)]
    pub min_score: Option<f32>,
}

/// A recursive (recurring) subsequence must have been detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecursivePatternPredicate {
    /// Restrict to this exact subsequence.
    #[serde(default)]
    pub sequence: Option<Vec<NodeId>>,
    #[serde(default)]
    pub min_strength: Option<f32>,
    /// Defaults to 2.
    #[serde(default)]
    pub min_occurrences: Option<usize>,
}

/// Match against the journey fingerprint classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintPredicate {
    #[serde(default)]
    pub exploration_style: Option<ExplorationStyle>,
    #[serde(default)]
    pub temporal_preference: Option<TemporalPreference>,
    #[serde(default)]
    pub narrative_approach: Option<NarrativeApproach>,
    #[serde(default)]
    pub min_complexity: Option<f32>,
}

/// How a reader moves through the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplorationStyle {
    Chaotic,
    Recursive,
    Focused,
    Linear,
    Wandering,
}

/// Which temporal layer a reader gravitates towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalPreference {
    Past,
    Present,
    Future,
    Fluid,
}

impl From<TemporalBucket> for TemporalPreference {
    fn from(bucket: TemporalBucket) -> Self {
        match bucket {
            TemporalBucket::Past => TemporalPreference::Past,
            TemporalBucket::Present => TemporalPreference::Present,
            TemporalBucket::Future => TemporalPreference::Future,
        }
    }
}

/// How a reader approaches the narrative as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeApproach {
    Systematic,
    Thematic,
    Experimental,
    Intuitive,
}

/// A condition paired with the transformations it unlocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRule {
    #[serde(default)]
    pub condition: Condition,
    pub transformations: Vec<TextTransformation>,
}

impl TransformationRule {
    pub fn new(condition: Condition, transformations: Vec<TextTransformation>) -> Self {
        Self {
            condition,
            transformations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_condition_is_empty() {
        assert!(Condition::default().is_empty());
        assert!(Condition::any_of([]).is_empty());
        assert!(!Condition::visit_count(1).is_empty());
    }

    #[test]
    fn test_condition_size() {
        let condition = Condition::all_of([
            Condition::visit_count(2),
            Condition::any_of([Condition::visit_pattern(["a", "b"]), Condition::visit_count(5)])
                .negate(),
        ]);
        assert_eq!(condition.size(), 6);
    }

    #[test]
    fn test_condition_json_shape() {
        let condition = Condition::all_of([
            Condition::visit_count(2),
            Condition::journey_pattern(["a", "b"]),
        ]);
        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(json["allOf"][0]["visitCount"]["min"], 2);
        assert_eq!(json["allOf"][1]["journeyPattern"]["sequence"][1], "b");
    }

    #[test]
    fn test_condition_round_trip() {
        let condition = Condition::any_of([
            Condition::CharacterFocus(CharacterFocusPredicate {
                character: Some(Character::Algorithm),
                min_intensity: None,
            }),
            Condition::JourneyFingerprint(FingerprintPredicate {
                exploration_style: Some(ExplorationStyle::Recursive),
                ..Default::default()
            }),
        ]);
        let json = serde_json::to_string(&condition).unwrap();
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, condition);
    }

    #[test]
    fn test_partial_predicate_fields_default() {
        let condition: Condition =
            serde_json::from_str(r#"{"characterFocus":{}}"#).unwrap();
        assert_eq!(
            condition,
            Condition::CharacterFocus(CharacterFocusPredicate::default())
        );
    }
}
