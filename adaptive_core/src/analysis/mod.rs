//! Path Pattern Analyzer - turns a recorded journey into behavioural signals.
//!
//! Every analyzer method is a pure function of `(ReaderPath, NodeRegistry)`:
//! identical snapshots always produce identical patterns, scores and fingerprints,
//! which is what lets the services above memoize freely.
//!
//! The analysis is split by concern:
//! 1. **sequences**: repeated and recursive subsequences of node ids
//! 2. **focus**: character, temporal and thematic concentration
//! 3. **engagement**: per-attractor engagement scores
//! 4. **magnetism**: nodes the reader keeps returning to
//! 5. **temporal**: jumps across the timeline and reading rhythm
//! 6. **fingerprint**: the composite journey classification

mod engagement;
mod fingerprint;
mod focus;
mod magnetism;
mod sequences;
mod temporal;

pub use engagement::*;
pub use fingerprint::*;
pub use focus::*;
pub use magnetism::*;
pub use sequences::*;
pub use temporal::*;

use serde::{Deserialize, Serialize};
use story_model::{AttractorTag, Character, NodeId, NodeRegistry, ReaderPath, TemporalBucket};

/// Thresholds for the pattern detectors.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Shortest subsequence considered.
    pub min_sequence_len: usize,

    /// Longest subsequence considered.
    pub max_sequence_len: usize,

    /// Occurrences needed for a subsequence to count as repeated.
    pub min_occurrences: usize,

    /// Visit ratio at which a character or temporal bucket counts as a focus.
    pub focus_threshold: f32,

    /// Share of alternation points needed for an oscillation pattern.
    pub oscillation_threshold: f32,

    /// Share of monotone transitions needed for a progression pattern.
    pub progression_threshold: f32,

    /// Bucket samples needed before progressions are considered.
    pub progression_min_samples: usize,

    /// Share of engagement events at which an attractor counts as an affinity.
    pub thematic_threshold: f32,

    /// Fraction of consecutive visits sharing a tag needed for thematic continuity.
    pub continuity_threshold: f32,

    /// Number of trailing visits inspected for thematic continuity.
    pub continuity_window: usize,

    /// Occurrences needed for a node to count as a strange attractor.
    pub attractor_node_min_visits: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_sequence_len: 2,
            max_sequence_len: 4,
            min_occurrences: 2,
            focus_threshold: 0.4,
            oscillation_threshold: 0.3,
            progression_threshold: 0.3,
            progression_min_samples: 5,
            thematic_threshold: 0.25,
            continuity_threshold: 0.5,
            continuity_window: 10,
            attractor_node_min_visits: 3,
        }
    }
}

/// Kind of regularity a reading pattern describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Sequence,
    Character,
    Temporal,
    Thematic,
}

/// A detected statistical regularity in the reader's journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPattern {
    pub kind: PatternKind,

    /// Strength from 0.0 to 1.0.
    pub strength: f32,

    pub description: String,

    #[serde(default)]
    pub nodes: Vec<NodeId>,

    #[serde(default)]
    pub characters: Vec<Character>,

    #[serde(default)]
    pub temporal_buckets: Vec<TemporalBucket>,

    #[serde(default)]
    pub attractors: Vec<AttractorTag>,

    /// How many times the regularity was observed.
    pub occurrences: usize,
}

impl ReadingPattern {
    pub fn new(kind: PatternKind, strength: f32, description: impl Into<String>) -> Self {
        Self {
            kind,
            strength: strength.clamp(0.0, 1.0),
            description: description.into(),
            nodes: Vec::new(),
            characters: Vec::new(),
            temporal_buckets: Vec::new(),
            attractors: Vec::new(),
            occurrences: 0,
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeId>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_characters(mut self, characters: Vec<Character>) -> Self {
        self.characters = characters;
        self
    }

    pub fn with_buckets(mut self, buckets: Vec<TemporalBucket>) -> Self {
        self.temporal_buckets = buckets;
        self
    }

    pub fn with_attractors(mut self, attractors: Vec<AttractorTag>) -> Self {
        self.attractors = attractors;
        self
    }

    pub fn with_occurrences(mut self, occurrences: usize) -> Self {
        self.occurrences = occurrences;
        self
    }
}

/// Everything the analyzer can say about one journey snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathAnalysis {
    /// All reading patterns, strongest first.
    pub patterns: Vec<ReadingPattern>,
    pub engagements: Vec<AttractorEngagement>,
    pub recursive_patterns: Vec<RecursivePattern>,
    pub character_intensities: Vec<CharacterIntensity>,
    pub attractor_nodes: Vec<AttractorNode>,
    pub temporal_jumps: TemporalJumpAnalysis,
    pub rhythm: ReadingRhythm,
    pub fingerprint: JourneyFingerprint,
}

impl PathAnalysis {
    /// Strongest pattern of a given kind.
    pub fn strongest(&self, kind: PatternKind) -> Option<&ReadingPattern> {
        self.patterns
            .iter()
            .filter(|p| p.kind == kind)
            .max_by(|a, b| a.strength.partial_cmp(&b.strength).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn engagement_for(&self, tag: &AttractorTag) -> Option<&AttractorEngagement> {
        self.engagements.iter().find(|e| &e.tag == tag)
    }
}

/// The path pattern analyzer.
#[derive(Debug, Clone, Default)]
pub struct PathAnalyzer {
    config: AnalyzerConfig,
}

impl PathAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(AnalyzerConfig::default())
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run every detector over the snapshot.
    pub fn analyze(&self, path: &ReaderPath, registry: &NodeRegistry) -> PathAnalysis {
        let patterns = self.detect_patterns(path, registry);
        let recursive_patterns = self.detect_recursive_patterns(path);
        let character_intensities = self.character_intensities(path);
        let attractor_nodes = self.detect_attractor_nodes(path);
        let temporal_jumps = self.analyze_temporal_jumps(path);
        let fingerprint = self.fingerprint_from_parts(
            path,
            &recursive_patterns,
            &character_intensities,
            &temporal_jumps,
            &attractor_nodes,
            &patterns,
        );

        PathAnalysis {
            engagements: self.attractor_engagements(path),
            rhythm: self.reading_rhythm(path),
            patterns,
            recursive_patterns,
            character_intensities,
            attractor_nodes,
            temporal_jumps,
            fingerprint,
        }
    }

    /// Sequence, character, temporal and thematic patterns, strongest first.
    pub fn detect_patterns(&self, path: &ReaderPath, registry: &NodeRegistry) -> Vec<ReadingPattern> {
        let mut patterns = self.detect_sequence_patterns(path);
        patterns.extend(self.detect_character_patterns(path));
        patterns.extend(self.detect_temporal_patterns(path));
        patterns.extend(self.detect_thematic_patterns(path, registry));
        sort_by_strength(&mut patterns);
        patterns
    }

    /// Like [`detect_patterns`](Self::detect_patterns), reading attractor tags only from
    /// the visit log, so the result depends on the path alone.
    pub fn detect_patterns_visit_time(&self, path: &ReaderPath) -> Vec<ReadingPattern> {
        let mut patterns = self.detect_sequence_patterns(path);
        patterns.extend(self.detect_character_patterns(path));
        patterns.extend(self.detect_temporal_patterns(path));
        patterns.extend(self.thematic_patterns(path, None));
        sort_by_strength(&mut patterns);
        patterns
    }
}

/// Sort strongest first; ties keep detection order.
pub(crate) fn sort_by_strength(patterns: &mut [ReadingPattern]) {
    patterns.sort_by(|a, b| {
        b.strength
            .partial_cmp(&a.strength)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

pub(crate) fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f32>() / values.len() as f32;
    variance.sqrt()
}

#[cfg(test)]
pub(crate) mod test_support {
    use story_model::{Character, NodeId, NodeRegistry, NodeState, ReaderPath};

    /// Build a registry and a path by visiting `(id, character, temporal, tags)` entries in order.
    pub fn journey(steps: &[(&str, Character, u8, &[&str])]) -> (NodeRegistry, ReaderPath) {
        let mut registry = NodeRegistry::new();
        let mut path = ReaderPath::new();
        for (id, character, temporal, tags) in steps {
            let node_id: NodeId = (*id).into();
            if !registry.contains(&node_id) {
                registry.insert(
                    NodeState::new(*id, *character, *temporal).with_attractors(tags.iter().copied()),
                );
            }
            registry
                .record_visit(&node_id, &mut path)
                .expect("node was just inserted");
        }
        (registry, path)
    }

    /// A journey over plain ids, all narrated by one character in the present.
    pub fn simple_journey(ids: &[&str]) -> (NodeRegistry, ReaderPath) {
        let steps: Vec<(&str, Character, u8, &[&str])> = ids
            .iter()
            .map(|id| (*id, Character::Algorithm, 5u8, &[][..]))
            .collect();
        journey(&steps)
    }
}
