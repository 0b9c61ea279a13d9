//! Condition Evaluator - decides whether a transformation rule applies.
//!
//! Conditions are evaluated recursively:
//! 1. **Combinators**: `allOf` stops at the first false child, `anyOf` at the first true one,
//!    `not` negates its subtree
//! 2. **Direct leaves**: answered from the reader path or the target node
//! 3. **Composite leaves**: answered by running the path analyzer
//!
//! Top-level results are memoized in a bounded LRU keyed by [`ConditionKey`].

mod cache_key;

pub use cache_key::*;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use tracing::debug;

use story_model::{
    CharacterFocusPredicate, Condition, FingerprintPredicate, NodeState, ReaderPath,
    RecursivePatternPredicate, TemporalFocusPredicate, TextTransformation, TransformationRule,
};

use crate::analysis::PathAnalyzer;
use crate::config::EngineConfig;

const DEFAULT_MIN_INTENSITY: f32 = 0.5;
const DEFAULT_MIN_SHARE: f32 = 0.4;
const DEFAULT_MIN_OCCURRENCES: usize = 2;

/// Counters for memo behaviour and leaf work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluatorStats {
    pub hits: u64,
    pub misses: u64,
    /// Leaf predicates actually evaluated (short-circuited leaves are not counted).
    pub leaf_evaluations: u64,
}

/// Memoized condition evaluator.
pub struct ConditionEvaluator {
    analyzer: PathAnalyzer,
    cache: LruCache<ConditionKey, bool>,
    significance_threshold: f32,
    stats: EvaluatorStats,
}

impl ConditionEvaluator {
    pub fn new(analyzer: PathAnalyzer, config: &EngineConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.evaluator_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            analyzer,
            cache: LruCache::new(capacity),
            significance_threshold: config.significance_threshold,
            stats: EvaluatorStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PathAnalyzer::with_defaults(), &EngineConfig::default())
    }

    /// Evaluate `condition` for `node` given the reader's journey so far.
    pub fn evaluate(&mut self, condition: &Condition, path: &ReaderPath, node: &NodeState) -> bool {
        if condition.is_empty() {
            return true;
        }

        let key = ConditionKey::new(condition, path, node);
        if let Some(result) = self.cache.get(&key) {
            self.stats.hits += 1;
            return *result;
        }

        self.stats.misses += 1;
        let result = self.eval(condition, path, node);
        self.cache.put(key, result);
        result
    }

    /// Every transformation unlocked by a rule whose condition holds, in rule order.
    pub fn applicable_transformations(
        &mut self,
        rules: &[TransformationRule],
        path: &ReaderPath,
        node: &NodeState,
    ) -> Vec<TextTransformation> {
        let mut unlocked = Vec::new();
        for rule in rules {
            if self.evaluate(&rule.condition, path, node) {
                unlocked.extend(rule.transformations.iter().cloned());
            }
        }
        unlocked
    }

    /// Drop every memoized result. Call whenever the rule set changes.
    pub fn invalidate(&mut self) {
        debug!(entries = self.cache.len(), "invalidating condition cache");
        self.cache.clear();
    }

    pub fn stats(&self) -> EvaluatorStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = EvaluatorStats::default();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn eval(&mut self, condition: &Condition, path: &ReaderPath, node: &NodeState) -> bool {
        match condition {
            Condition::AllOf(children) => {
                for child in children {
                    if !self.eval(child, path, node) {
                        return false;
                    }
                }
                true
            }
            Condition::AnyOf(children) => {
                if children.is_empty() {
                    return true;
                }
                for child in children {
                    if self.eval(child, path, node) {
                        return true;
                    }
                }
                false
            }
            Condition::Not(inner) => !self.eval(inner, path, node),
            leaf => {
                self.stats.leaf_evaluations += 1;
                self.eval_leaf(leaf, path, node)
            }
        }
    }

    fn eval_leaf(&self, condition: &Condition, path: &ReaderPath, node: &NodeState) -> bool {
        match condition {
            Condition::VisitCount { min } => node.visit_count >= *min,
            Condition::PreviouslyVisited { nodes } => nodes.iter().all(|id| path.has_visited(id)),
            Condition::VisitPattern { sequence } => path.contains_subsequence(sequence),
            Condition::JourneyPattern { sequence } => path.ends_with(sequence),
            Condition::AttractorsEngaged { attractors } => attractors
                .iter()
                .all(|tag| path.attractor_engagement(tag) > 0),
            Condition::TemporalPosition { bucket } => node.temporal_bucket() == *bucket,
            Condition::EndpointProgress { orientation, min } => {
                orientation.is_empty() || path.endpoint_progress(orientation) >= *min
            }
            Condition::RevisitCount { counts } => counts
                .iter()
                .all(|(id, min)| path.revisit_count(id) >= *min),
            Condition::CharacterBleed { expected } => {
                let bleed = path
                    .previous_visit()
                    .is_some_and(|previous| previous.character != node.character);
                bleed == *expected
            }
            Condition::CharacterFocus(predicate) => self.character_focus(predicate, path),
            Condition::TemporalFocus(predicate) => self.temporal_focus(predicate, path),
            Condition::AttractorAffinity(predicate) => {
                // Visit-time tags only; registry state is not part of the memo key.
                self.analyzer
                    .detect_attractor_affinities_visit_time(path)
                    .iter()
                    .filter(|p| p.attractors.contains(&predicate.attractor))
                    .any(|p| match predicate.min_strength {
                        Some(min) => p.strength >= min,
                        None => p.strength > 0.0,
                    })
            }
            Condition::AttractorEngagement(predicate) => {
                let min = predicate.min_score.unwrap_or(self.significance_threshold);
                let score = self
                    .analyzer
                    .attractor_engagements(path)
                    .into_iter()
                    .find(|e| e.tag == predicate.attractor)
                    .map(|e| e.score)
                    .unwrap_or(0.0);
                score >= min
            }
            Condition::RecursivePattern(predicate) => self.recursive_pattern(predicate, path),
            Condition::JourneyFingerprint(predicate) => self.fingerprint_matches(predicate, path),
            Condition::AllOf(_) | Condition::AnyOf(_) | Condition::Not(_) => true,
        }
    }

    fn character_focus(&self, predicate: &CharacterFocusPredicate, path: &ReaderPath) -> bool {
        let min = predicate.min_intensity.unwrap_or(DEFAULT_MIN_INTENSITY);
        let intensities = self.analyzer.character_intensities(path);
        let found = match predicate.character {
            Some(character) => intensities.iter().find(|i| i.character == character),
            None => intensities.first(),
        };
        found.is_some_and(|i| i.intensity >= min)
    }

    fn temporal_focus(&self, predicate: &TemporalFocusPredicate, path: &ReaderPath) -> bool {
        let min = predicate.min_share.unwrap_or(DEFAULT_MIN_SHARE);
        let jumps = self.analyzer.analyze_temporal_jumps(path);
        let share = match predicate.bucket {
            Some(bucket) => jumps.share_of(bucket),
            None => jumps.dominant_bucket().map(|(_, share)| share).unwrap_or(0.0),
        };
        share >= min
    }

    fn recursive_pattern(&self, predicate: &RecursivePatternPredicate, path: &ReaderPath) -> bool {
        let min_occurrences = predicate.min_occurrences.unwrap_or(DEFAULT_MIN_OCCURRENCES);
        let min_strength = predicate.min_strength.unwrap_or(0.0);
        self.analyzer
            .detect_recursive_patterns(path)
            .iter()
            .filter(|p| match &predicate.sequence {
                Some(sequence) => &p.sequence == sequence,
                None => true,
            })
            .any(|p| p.occurrences >= min_occurrences && p.strength >= min_strength)
    }

    fn fingerprint_matches(&self, predicate: &FingerprintPredicate, path: &ReaderPath) -> bool {
        let fingerprint = self.analyzer.journey_fingerprint_visit_time(path);

        predicate
            .exploration_style
            .map_or(true, |style| fingerprint.exploration_style == style)
            && predicate
                .temporal_preference
                .map_or(true, |preference| fingerprint.temporal_preference == preference)
            && predicate
                .narrative_approach
                .map_or(true, |approach| fingerprint.narrative_approach == approach)
            && predicate
                .min_complexity
                .map_or(true, |min| fingerprint.complexity_index >= min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_model::{
        AttractorAffinityPredicate, AttractorEngagementPredicate, Character, ExplorationStyle,
        NodeId, NodeRegistry, TemporalBucket,
    };

    fn visit_all(steps: &[(&str, Character)]) -> (NodeRegistry, ReaderPath) {
        let mut registry = NodeRegistry::new();
        let mut path = ReaderPath::new();
        for (id, character) in steps {
            let node_id = NodeId::from(*id);
            if !registry.contains(&node_id) {
                registry.insert(NodeState::new(*id, *character, 5).with_attractor("memory"));
            }
            registry.record_visit(&node_id, &mut path).unwrap();
        }
        (registry, path)
    }

    fn target(visits: u32) -> NodeState {
        NodeState::new("target", Character::Algorithm, 2).with_visit_count(visits)
    }

    #[test]
    fn test_empty_condition_is_true() {
        let mut evaluator = ConditionEvaluator::with_defaults();
        assert!(evaluator.evaluate(&Condition::always(), &ReaderPath::new(), &target(0)));
        assert!(evaluator.evaluate(&Condition::any_of([]), &ReaderPath::new(), &target(0)));
    }

    #[test]
    fn test_all_of_short_circuits() {
        let mut evaluator = ConditionEvaluator::with_defaults();
        let condition = Condition::all_of([
            Condition::visit_count(1),
            Condition::visit_count(10),
            Condition::visit_count(0),
            Condition::visit_count(0),
        ]);

        assert!(!evaluator.evaluate(&condition, &ReaderPath::new(), &target(2)));
        assert_eq!(evaluator.stats().leaf_evaluations, 2);
    }

    #[test]
    fn test_any_of_short_circuits() {
        let mut evaluator = ConditionEvaluator::with_defaults();
        let condition = Condition::any_of([
            Condition::visit_count(10),
            Condition::visit_count(1),
            Condition::visit_count(20),
        ]);

        assert!(evaluator.evaluate(&condition, &ReaderPath::new(), &target(2)));
        assert_eq!(evaluator.stats().leaf_evaluations, 2);
    }

    #[test]
    fn test_double_negation() {
        let mut evaluator = ConditionEvaluator::with_defaults();
        let (_, path) = visit_all(&[("a", Character::Algorithm), ("b", Character::Algorithm)]);
        let node = target(1);

        for condition in [
            Condition::visit_pattern(["a", "b"]),
            Condition::visit_pattern(["b", "a"]),
            Condition::visit_count(3),
        ] {
            let plain = evaluator.evaluate(&condition, &path, &node);
            let doubled = evaluator.evaluate(&condition.clone().negate().negate(), &path, &node);
            assert_eq!(plain, doubled);
        }
    }

    #[test]
    fn test_memo_hits() {
        let mut evaluator = ConditionEvaluator::with_defaults();
        let (_, path) = visit_all(&[("a", Character::Algorithm), ("b", Character::Algorithm)]);
        let condition = Condition::previously_visited(["a"]);

        assert!(evaluator.evaluate(&condition, &path, &target(1)));
        assert!(evaluator.evaluate(&condition, &path, &target(1)));

        let stats = evaluator.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.leaf_evaluations, 1);
    }

    #[test]
    fn test_invalidate_clears_memo() {
        let mut evaluator = ConditionEvaluator::with_defaults();
        evaluator.evaluate(&Condition::visit_count(1), &ReaderPath::new(), &target(1));
        assert_eq!(evaluator.cache_len(), 1);

        evaluator.invalidate();
        assert_eq!(evaluator.cache_len(), 0);
    }

    #[test]
    fn test_direct_leaves() {
        let mut evaluator = ConditionEvaluator::with_defaults();
        let (_, mut path) = visit_all(&[
            ("a", Character::Algorithm),
            ("b", Character::Algorithm),
            ("a", Character::Algorithm),
        ]);
        path.set_endpoint_progress("release", 40).unwrap();
        let node = target(2);

        assert!(evaluator.evaluate(&Condition::journey_pattern(["b", "a"]), &path, &node));
        assert!(!evaluator.evaluate(&Condition::journey_pattern(["a", "b"]), &path, &node));
        assert!(evaluator.evaluate(&Condition::visit_pattern(["a", "b"]), &path, &node));
        assert!(evaluator.evaluate(&Condition::attractors_engaged(["memory"]), &path, &node));
        assert!(!evaluator.evaluate(&Condition::attractors_engaged(["entropy"]), &path, &node));
        assert!(evaluator.evaluate(
            &Condition::TemporalPosition {
                bucket: TemporalBucket::Past
            },
            &path,
            &node
        ));
        assert!(evaluator.evaluate(
            &Condition::EndpointProgress {
                orientation: "release".into(),
                min: 40
            },
            &path,
            &node
        ));
        assert!(!evaluator.evaluate(
            &Condition::EndpointProgress {
                orientation: "preserve".into(),
                min: 1
            },
            &path,
            &node
        ));
        assert!(evaluator.evaluate(
            &Condition::RevisitCount {
                counts: [(NodeId::from("a"), 1)].into_iter().collect()
            },
            &path,
            &node
        ));
    }

    #[test]
    fn test_character_bleed_leaf() {
        let mut evaluator = ConditionEvaluator::with_defaults();
        let bleed = Condition::CharacterBleed { expected: true };
        let node = NodeState::new("b", Character::LastHuman, 8);

        let (_, single) = visit_all(&[("b", Character::LastHuman)]);
        assert!(!evaluator.evaluate(&bleed, &single, &node));

        let (_, crossed) = visit_all(&[("a", Character::Archaeologist), ("b", Character::LastHuman)]);
        assert!(evaluator.evaluate(&bleed, &crossed, &node));

        let (_, same) = visit_all(&[("c", Character::LastHuman), ("b", Character::LastHuman)]);
        assert!(evaluator.evaluate(&Condition::CharacterBleed { expected: false }, &same, &node));
    }

    #[test]
    fn test_composite_leaves() {
        let mut evaluator = ConditionEvaluator::with_defaults();
        let (_, path) = visit_all(&[
            ("a", Character::Archaeologist),
            ("b", Character::Archaeologist),
            ("a", Character::Archaeologist),
            ("b", Character::Archaeologist),
        ]);
        let node = target(1);

        assert!(evaluator.evaluate(
            &Condition::CharacterFocus(CharacterFocusPredicate {
                character: Some(Character::Archaeologist),
                min_intensity: None,
            }),
            &path,
            &node
        ));
        assert!(!evaluator.evaluate(
            &Condition::CharacterFocus(CharacterFocusPredicate {
                character: Some(Character::LastHuman),
                min_intensity: None,
            }),
            &path,
            &node
        ));
        assert!(evaluator.evaluate(
            &Condition::TemporalFocus(TemporalFocusPredicate {
                bucket: Some(TemporalBucket::Present),
                min_share: Some(0.9),
            }),
            &path,
            &node
        ));
        assert!(evaluator.evaluate(
            &Condition::AttractorAffinity(AttractorAffinityPredicate {
                attractor: "memory".into(),
                min_strength: None,
            }),
            &path,
            &node
        ));
        assert!(evaluator.evaluate(
            &Condition::AttractorEngagement(AttractorEngagementPredicate {
                attractor: "memory".into(),
                min_score: None,
            }),
            &path,
            &node
        ));
        assert!(evaluator.evaluate(
            &Condition::RecursivePattern(RecursivePatternPredicate {
                sequence: Some(vec!["a".into(), "b".into()]),
                min_strength: None,
                min_occurrences: None,
            }),
            &path,
            &node
        ));
        assert!(!evaluator.evaluate(
            &Condition::RecursivePattern(RecursivePatternPredicate {
                sequence: None,
                min_strength: None,
                min_occurrences: Some(3),
            }),
            &path,
            &node
        ));
        assert!(evaluator.evaluate(
            &Condition::JourneyFingerprint(FingerprintPredicate {
                exploration_style: Some(ExplorationStyle::Recursive),
                ..Default::default()
            }),
            &path,
            &node
        ));
    }

    #[test]
    fn test_applicable_transformations() {
        let mut evaluator = ConditionEvaluator::with_defaults();
        let rules = vec![
            TransformationRule::new(
                Condition::visit_count(2),
                vec![TextTransformation::replace("old", "new")],
            ),
            TransformationRule::new(
                Condition::visit_count(9),
                vec![TextTransformation::replace("never", "shown")],
            ),
        ];
        let unlocked = evaluator.applicable_transformations(&rules, &ReaderPath::new(), &target(3));
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].selector, "old");
    }
}
