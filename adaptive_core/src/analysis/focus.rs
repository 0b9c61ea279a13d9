//! Character, temporal and thematic focus detection.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use story_model::{AttractorTag, Character, NodeRegistry, ReaderPath, TemporalBucket};

use super::{sort_by_strength, PathAnalyzer, PatternKind, ReadingPattern};

/// How strongly the reader is concentrating on one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterIntensity {
    pub character: Character,
    /// Combined score from 0.0 to 1.0.
    pub intensity: f32,
    pub visit_ratio: f32,
    /// Longest run of consecutive visits to this character.
    pub longest_streak: usize,
    /// Distinct temporal buckets visited under this character (0-3).
    pub temporal_range: usize,
}

/// Map a ratio above `threshold` linearly onto 0.5..=1.0.
fn focus_strength(ratio: f32, threshold: f32) -> f32 {
    let span = (1.0 - threshold).max(f32::EPSILON);
    (0.5 + 0.5 * (ratio - threshold) / span).clamp(0.5, 1.0)
}

fn bucket_rank(bucket: TemporalBucket) -> u8 {
    match bucket {
        TemporalBucket::Past => 0,
        TemporalBucket::Present => 1,
        TemporalBucket::Future => 2,
    }
}

impl PathAnalyzer {
    /// Character concentration and ABAB oscillation.
    pub fn detect_character_patterns(&self, path: &ReaderPath) -> Vec<ReadingPattern> {
        let total = path.visits.len();
        if total == 0 {
            return Vec::new();
        }

        let mut counts: BTreeMap<Character, usize> = BTreeMap::new();
        for visit in &path.visits {
            *counts.entry(visit.character).or_default() += 1;
        }

        let mut patterns = Vec::new();
        for (character, count) in counts {
            let ratio = count as f32 / total as f32;
            if ratio >= self.config.focus_threshold {
                patterns.push(
                    ReadingPattern::new(
                        PatternKind::Character,
                        focus_strength(ratio, self.config.focus_threshold),
                        format!(
                            "Focused on {} ({:.0}% of visits)",
                            character.display_name(),
                            ratio * 100.0
                        ),
                    )
                    .with_characters(vec![character])
                    .with_occurrences(count),
                );
            }
        }

        let sequence: Vec<Character> = path.visits.iter().map(|v| v.character).collect();
        if let Some(pattern) = self.detect_oscillation(&sequence) {
            patterns.push(pattern);
        }

        sort_by_strength(&mut patterns);
        patterns
    }

    fn detect_oscillation(&self, sequence: &[Character]) -> Option<ReadingPattern> {
        if sequence.len() < 4 {
            return None;
        }

        let mut pairs: BTreeMap<(Character, Character), usize> = BTreeMap::new();
        for i in 2..sequence.len() {
            if sequence[i] == sequence[i - 2] && sequence[i] != sequence[i - 1] {
                let a = sequence[i].min(sequence[i - 1]);
                let b = sequence[i].max(sequence[i - 1]);
                *pairs.entry((a, b)).or_default() += 1;
            }
        }

        let alternations: usize = pairs.values().sum();
        let ratio = alternations as f32 / (sequence.len() - 2) as f32;
        if ratio < self.config.oscillation_threshold {
            return None;
        }

        let ((a, b), _) = pairs
            .into_iter()
            .max_by(|x, y| x.1.cmp(&y.1).then(y.0.cmp(&x.0)))?;
        Some(
            ReadingPattern::new(
                PatternKind::Character,
                ratio,
                format!(
                    "Oscillating between {} and {}",
                    a.display_name(),
                    b.display_name()
                ),
            )
            .with_characters(vec![a, b])
            .with_occurrences(alternations),
        )
    }

    /// Temporal bucket concentration and chronological / reverse progressions.
    pub fn detect_temporal_patterns(&self, path: &ReaderPath) -> Vec<ReadingPattern> {
        let total = path.visits.len();
        if total == 0 {
            return Vec::new();
        }

        let mut counts: BTreeMap<TemporalBucket, usize> = BTreeMap::new();
        for visit in &path.visits {
            *counts.entry(visit.temporal_bucket).or_default() += 1;
        }

        let mut patterns = Vec::new();
        for (bucket, count) in counts {
            let ratio = count as f32 / total as f32;
            if ratio >= self.config.focus_threshold {
                patterns.push(
                    ReadingPattern::new(
                        PatternKind::Temporal,
                        focus_strength(ratio, self.config.focus_threshold),
                        format!("Dwelling in the {} ({:.0}% of visits)", bucket, ratio * 100.0),
                    )
                    .with_buckets(vec![bucket])
                    .with_occurrences(count),
                );
            }
        }

        let ranks: Vec<u8> = path
            .visits
            .iter()
            .map(|v| bucket_rank(v.temporal_bucket))
            .collect();
        if ranks.len() >= self.config.progression_min_samples {
            if let Some(p) = self.detect_progression(&ranks, true) {
                patterns.push(p);
            }
            if let Some(p) = self.detect_progression(&ranks, false) {
                patterns.push(p);
            }
        }

        sort_by_strength(&mut patterns);
        patterns
    }

    fn detect_progression(&self, ranks: &[u8], forward: bool) -> Option<ReadingPattern> {
        let step = |a: u8, b: u8| if forward { a < b } else { a > b };

        let two_step = ranks.windows(2).filter(|w| step(w[0], w[1])).count();
        let three_step = ranks
            .windows(3)
            .filter(|w| step(w[0], w[1]) && step(w[1], w[2]))
            .count();
        let possible = (ranks.len() - 1) + (ranks.len() - 2);
        let ratio = (two_step + three_step) as f32 / possible as f32;

        if ratio < self.config.progression_threshold {
            return None;
        }

        let (description, buckets) = if forward {
            ("Moving chronologically through time", TemporalBucket::ALL.to_vec())
        } else {
            (
                "Moving backwards through time",
                TemporalBucket::ALL.iter().rev().copied().collect(),
            )
        };
        Some(
            ReadingPattern::new(PatternKind::Temporal, ratio, description)
                .with_buckets(buckets)
                .with_occurrences(two_step + three_step),
        )
    }

    /// Attractor affinity and thematic continuity.
    pub fn detect_thematic_patterns(
        &self,
        path: &ReaderPath,
        registry: &NodeRegistry,
    ) -> Vec<ReadingPattern> {
        self.thematic_patterns(path, Some(registry))
    }

    pub(crate) fn thematic_patterns(
        &self,
        path: &ReaderPath,
        registry: Option<&NodeRegistry>,
    ) -> Vec<ReadingPattern> {
        let mut patterns = self.attractor_affinities(path, registry);
        if let Some(p) = self.detect_thematic_continuity(path) {
            patterns.push(p);
        }
        sort_by_strength(&mut patterns);
        patterns
    }

    /// One thematic pattern per attractor holding at least the thematic share of engagement events.
    /// Current registry tags win over what was recorded at visit time.
    pub fn detect_attractor_affinities(
        &self,
        path: &ReaderPath,
        registry: &NodeRegistry,
    ) -> Vec<ReadingPattern> {
        self.attractor_affinities(path, Some(registry))
    }

    /// Attractor affinities from the tags recorded at visit time alone.
    pub fn detect_attractor_affinities_visit_time(&self, path: &ReaderPath) -> Vec<ReadingPattern> {
        self.attractor_affinities(path, None)
    }

    fn attractor_affinities(
        &self,
        path: &ReaderPath,
        registry: Option<&NodeRegistry>,
    ) -> Vec<ReadingPattern> {
        let total_visits = path.visits.len();
        let mut events: BTreeMap<&AttractorTag, usize> = BTreeMap::new();
        for visit in &path.visits {
            for tag in &visit.attractors {
                *events.entry(tag).or_default() += 1;
            }
        }
        let total_events: usize = events.values().sum();
        if total_visits == 0 || total_events == 0 {
            return Vec::new();
        }

        let mut patterns = Vec::new();
        for (tag, count) in &events {
            let share = *count as f32 / total_events as f32;
            if share < self.config.thematic_threshold {
                continue;
            }
            let carrying = path
                .visits
                .iter()
                .filter(|v| match registry.and_then(|r| r.get(&v.node_id)) {
                    Some(node) => node.has_attractor(tag),
                    None => v.attractors.contains(tag),
                })
                .count();
            let strength = 0.7 * share + 0.3 * (carrying as f32 / total_visits as f32);
            patterns.push(
                ReadingPattern::new(
                    PatternKind::Thematic,
                    strength,
                    format!("Drawn to {} ({:.0}% of engagement)", tag, share * 100.0),
                )
                .with_attractors(vec![(*tag).clone()])
                .with_occurrences(*count),
            );
        }

        sort_by_strength(&mut patterns);
        patterns
    }

    fn detect_thematic_continuity(&self, path: &ReaderPath) -> Option<ReadingPattern> {
        let start = path.visits.len().saturating_sub(self.config.continuity_window);
        let window = &path.visits[start..];
        if window.len() < 2 {
            return None;
        }

        let mut shared_tags: BTreeSet<AttractorTag> = BTreeSet::new();
        let mut linked = 0;
        for pair in window.windows(2) {
            let shared: Vec<&AttractorTag> = pair[0]
                .attractors
                .iter()
                .filter(|t| pair[1].attractors.contains(t))
                .collect();
            if !shared.is_empty() {
                linked += 1;
                shared_tags.extend(shared.into_iter().cloned());
            }
        }

        let ratio = linked as f32 / (window.len() - 1) as f32;
        if ratio < self.config.continuity_threshold {
            return None;
        }
        Some(
            ReadingPattern::new(
                PatternKind::Thematic,
                ratio,
                "Following a continuous thematic thread",
            )
            .with_attractors(shared_tags.into_iter().collect())
            .with_occurrences(linked),
        )
    }

    /// Per-character intensity: 0.5 x ratio (doubled, capped) + 0.3 x streak/5 + 0.2 x range/3.
    pub fn character_intensities(&self, path: &ReaderPath) -> Vec<CharacterIntensity> {
        let total = path.visits.len();
        if total == 0 {
            return Vec::new();
        }

        let mut intensities = Vec::new();
        for character in Character::ALL {
            let count = path.visits.iter().filter(|v| v.character == character).count();
            if count == 0 {
                continue;
            }

            let mut longest_streak = 0;
            let mut streak = 0;
            for visit in &path.visits {
                if visit.character == character {
                    streak += 1;
                    longest_streak = longest_streak.max(streak);
                } else {
                    streak = 0;
                }
            }

            let temporal_range = path
                .visits
                .iter()
                .filter(|v| v.character == character)
                .map(|v| v.temporal_bucket)
                .collect::<BTreeSet<_>>()
                .len();

            let visit_ratio = count as f32 / total as f32;
            let intensity = 0.5 * (visit_ratio * 2.0).min(1.0)
                + 0.3 * (longest_streak as f32 / 5.0).min(1.0)
                + 0.2 * (temporal_range as f32 / 3.0);

            intensities.push(CharacterIntensity {
                character,
                intensity: intensity.clamp(0.0, 1.0),
                visit_ratio,
                longest_streak,
                temporal_range,
            });
        }

        intensities.sort_by(|a, b| {
            b.intensity
                .partial_cmp(&a.intensity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        intensities
    }
}
