//! Priority assignment and conflict resolution for candidate transformations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use story_model::{
    AttractorTag, Condition, NodeState, TemporalBucket, TextTransformation, TransformationKind,
};

use crate::analysis::{PathAnalysis, PatternKind, ReadingRhythm};

/// Signal family a candidate transformation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationSource {
    Pattern,
    Rhythm,
    Attractor,
    Temporal,
    Condition,
}

impl TransformationSource {
    /// Classify a rule by the first signal-specific predicate found in its condition tree.
    pub fn classify(condition: &Condition) -> Self {
        Self::find(condition).unwrap_or(TransformationSource::Condition)
    }

    fn find(condition: &Condition) -> Option<Self> {
        match condition {
            Condition::VisitPattern { .. }
            | Condition::JourneyPattern { .. }
            | Condition::RecursivePattern(_)
            | Condition::JourneyFingerprint(_) => Some(TransformationSource::Pattern),
            Condition::AttractorsEngaged { .. }
            | Condition::AttractorAffinity(_)
            | Condition::AttractorEngagement(_) => Some(TransformationSource::Attractor),
            Condition::TemporalPosition { .. } | Condition::TemporalFocus(_) => {
                Some(TransformationSource::Temporal)
            }
            Condition::CharacterBleed { .. } | Condition::CharacterFocus(_) => {
                Some(TransformationSource::Rhythm)
            }
            Condition::AllOf(children) | Condition::AnyOf(children) => {
                children.iter().find_map(Self::find)
            }
            Condition::Not(inner) => Self::find(inner),
            _ => None,
        }
    }
}

/// Boost ceilings for the resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Added to pattern-sourced candidates, scaled by sequence pattern strength.
    pub pattern_boost: f32,

    /// Added when the selector names an attractor engaged above `attractor_floor`.
    pub attractor_boost: f32,

    /// Engagement score above which the attractor boost starts.
    pub attractor_floor: f32,

    /// Added to temporal-sourced candidates, scaled by how disproportionate the node's layer is.
    pub temporal_boost: f32,

    /// Added to fragments during fast transitions.
    pub fast_fragment_boost: f32,

    /// Added to expansions during deep engagement.
    pub deep_expand_boost: f32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            pattern_boost: 15.0,
            attractor_boost: 10.0,
            attractor_floor: 50.0,
            temporal_boost: 12.0,
            fast_fragment_boost: 10.0,
            deep_expand_boost: 5.0,
        }
    }
}

/// The signals a resolver needs, extracted once per render.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    /// Strength of the strongest sequence pattern passing through the node.
    pub pattern_strength: f32,
    /// Engagement score per attractor.
    pub engagement: Vec<(AttractorTag, f32)>,
    /// Share of visits spent in the node's temporal bucket.
    pub temporal_share: f32,
    pub rhythm: ReadingRhythm,
}

impl ResolutionContext {
    /// No signals: only base priorities and hints apply.
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn from_analysis(analysis: &PathAnalysis, node: &NodeState) -> Self {
        let pattern_strength = analysis
            .patterns
            .iter()
            .filter(|p| p.kind == PatternKind::Sequence && p.nodes.contains(&node.id))
            .map(|p| p.strength)
            .fold(0.0_f32, f32::max);
        Self {
            pattern_strength,
            engagement: analysis
                .engagements
                .iter()
                .map(|e| (e.tag.clone(), e.score))
                .collect(),
            temporal_share: analysis.temporal_jumps.share_of(node.temporal_bucket()),
            rhythm: analysis.rhythm,
        }
    }

    /// `0` at an even three-way split, `1` when every visit is in one layer.
    fn temporal_disproportion(&self) -> f32 {
        let even = 1.0 / TemporalBucket::ALL.len() as f32;
        ((self.temporal_share - even) / (1.0 - even)).clamp(0.0, 1.0)
    }
}

/// A candidate with its final priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizedTransformation {
    pub transformation: TextTransformation,
    pub source: TransformationSource,
    pub priority: f32,
    /// Position among the candidates, used to break ties.
    pub order: usize,
}

/// Assigns priorities and resolves conflicts.
#[derive(Debug, Clone, Default)]
pub struct PriorityResolver {
    config: ResolverConfig,
}

impl PriorityResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ResolverConfig::default())
    }

    /// Type-based priority: the more destructive the edit, the earlier it runs.
    pub fn base_priority(kind: &TransformationKind) -> u32 {
        match kind {
            TransformationKind::Replace { .. } => 80,
            TransformationKind::Fragment { .. } => 75,
            TransformationKind::Expand { .. } => 60,
            TransformationKind::Emphasize { .. } => 50,
            TransformationKind::MetaComment { .. } => 40,
            TransformationKind::Unknown => 0,
        }
    }

    /// Base priority (or the explicit hint) plus every applicable boost.
    pub fn priority_of(
        &self,
        transformation: &TextTransformation,
        source: TransformationSource,
        context: &ResolutionContext,
    ) -> f32 {
        let base = transformation
            .priority
            .unwrap_or_else(|| Self::base_priority(&transformation.kind)) as f32;
        let mut boost = 0.0;

        if source == TransformationSource::Pattern {
            boost += self.config.pattern_boost * context.pattern_strength.clamp(0.0, 1.0);
        }

        let selector = transformation.selector.to_lowercase();
        let engaged = context
            .engagement
            .iter()
            .filter(|(tag, score)| {
                *score > self.config.attractor_floor
                    && selector.contains(&tag.keyword().to_lowercase())
            })
            .map(|(_, score)| *score)
            .fold(0.0_f32, f32::max);
        if engaged > 0.0 {
            let span = (100.0 - self.config.attractor_floor).max(f32::EPSILON);
            boost += self.config.attractor_boost
                * ((engaged - self.config.attractor_floor) / span).clamp(0.0, 1.0);
        }

        if source == TransformationSource::Temporal {
            boost += self.config.temporal_boost * context.temporal_disproportion();
        }

        match (context.rhythm, &transformation.kind) {
            (ReadingRhythm::FastTransition, TransformationKind::Fragment { .. }) => {
                boost += self.config.fast_fragment_boost
            }
            (ReadingRhythm::DeepEngagement, TransformationKind::Expand { .. }) => {
                boost += self.config.deep_expand_boost
            }
            _ => {}
        }

        base + boost
    }

    pub fn prioritize(
        &self,
        candidates: Vec<(TextTransformation, TransformationSource)>,
        context: &ResolutionContext,
    ) -> Vec<PrioritizedTransformation> {
        candidates
            .into_iter()
            .enumerate()
            .map(|(order, (transformation, source))| PrioritizedTransformation {
                priority: self.priority_of(&transformation, source, context),
                transformation,
                source,
                order,
            })
            .collect()
    }

    /// Keep the highest-priority member of each selector group, highest priority first.
    /// Ties go to the earlier candidate.
    pub fn resolve(&self, candidates: Vec<PrioritizedTransformation>) -> Vec<PrioritizedTransformation> {
        let mut winners: HashMap<String, PrioritizedTransformation> = HashMap::new();
        for candidate in candidates {
            let selector = candidate.transformation.selector.clone();
            match winners.get(&selector) {
                Some(current) if !beats(&candidate, current) => {}
                _ => {
                    winners.insert(selector, candidate);
                }
            }
        }

        let mut resolved: Vec<_> = winners.into_values().collect();
        resolved.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.order.cmp(&b.order))
        });
        resolved
    }
}

fn beats(candidate: &PrioritizedTransformation, current: &PrioritizedTransformation) -> bool {
    candidate.priority > current.priority
        || (candidate.priority == current.priority && candidate.order < current.order)
}
