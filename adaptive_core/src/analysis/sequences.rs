//! Repeated and recursive subsequence detection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use story_model::{NodeId, ReaderPath};

use super::{sort_by_strength, PathAnalyzer, PatternKind, ReadingPattern};

/// A subsequence of node ids that recurs in the journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecursivePattern {
    pub sequence: Vec<NodeId>,
    pub occurrences: usize,
    /// Start index of every occurrence.
    pub positions: Vec<usize>,
    /// 0.7 x frequency + 0.3 x recency.
    pub strength: f32,
    /// Average gap between occurrences relative to an even spread, 0.0 to 1.0.
    pub temporal_spread: f32,
}

/// Start positions of every contiguous window of length `len`, keyed by window.
fn window_positions(sequence: &[NodeId], len: usize) -> BTreeMap<&[NodeId], Vec<usize>> {
    let mut positions: BTreeMap<&[NodeId], Vec<usize>> = BTreeMap::new();
    if len == 0 {
        return positions;
    }
    for (start, window) in sequence.windows(len).enumerate() {
        positions.entry(window).or_default().push(start);
    }
    positions
}

/// Most non-overlapping occurrences a window of `len` could have in `total` visits.
fn max_possible_occurrences(len: usize, total: usize) -> usize {
    (total / len.max(1)).max(1)
}

/// Strength of a repeated subsequence.
///
/// `0.4 * (len / (total / 2)) + 0.6 * min(1, occurrences / max_possible)`, each term capped at 1.
/// For a fixed path length this never decreases as `occurrences` grows.
pub fn sequence_strength(len: usize, occurrences: usize, total: usize) -> f32 {
    if total == 0 || len == 0 {
        return 0.0;
    }
    let half = total as f32 / 2.0;
    let length_factor = (len as f32 / half).min(1.0);
    let occurrence_factor =
        (occurrences as f32 / max_possible_occurrences(len, total) as f32).min(1.0);
    (0.4 * length_factor + 0.6 * occurrence_factor).clamp(0.0, 1.0)
}

fn describe(sequence: &[NodeId]) -> String {
    sequence
        .iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl PathAnalyzer {
    /// Repeated contiguous subsequences of length 2-4 occurring at least twice.
    pub fn detect_sequence_patterns(&self, path: &ReaderPath) -> Vec<ReadingPattern> {
        let total = path.sequence.len();
        let mut patterns = Vec::new();

        for len in self.config.min_sequence_len..=self.config.max_sequence_len {
            if len > total {
                break;
            }
            for (window, starts) in window_positions(&path.sequence, len) {
                let occurrences = starts.len();
                if occurrences < self.config.min_occurrences {
                    continue;
                }

                let first = starts[0];
                let visits = path.visits.get(first..first + len).unwrap_or(&[]);
                let mut characters: Vec<_> = visits.iter().map(|v| v.character).collect();
                characters.dedup();
                let mut buckets: Vec<_> = visits.iter().map(|v| v.temporal_bucket).collect();
                buckets.dedup();
                let mut attractors: Vec<_> =
                    visits.iter().flat_map(|v| v.attractors.iter().cloned()).collect();
                attractors.sort();
                attractors.dedup();

                patterns.push(
                    ReadingPattern::new(
                        PatternKind::Sequence,
                        sequence_strength(len, occurrences, total),
                        format!("Sequence {} repeated {} times", describe(window), occurrences),
                    )
                    .with_nodes(window.to_vec())
                    .with_characters(characters)
                    .with_buckets(buckets)
                    .with_attractors(attractors)
                    .with_occurrences(occurrences),
                );
            }
        }

        sort_by_strength(&mut patterns);
        patterns
    }

    /// Recurring subsequences scored by frequency and recency, with their spread over time.
    pub fn detect_recursive_patterns(&self, path: &ReaderPath) -> Vec<RecursivePattern> {
        let total = path.sequence.len();
        let mut patterns = Vec::new();

        for len in self.config.min_sequence_len..=self.config.max_sequence_len {
            if len > total {
                break;
            }
            for (window, positions) in window_positions(&path.sequence, len) {
                let occurrences = positions.len();
                if occurrences < self.config.min_occurrences {
                    continue;
                }

                let frequency =
                    (occurrences as f32 / max_possible_occurrences(len, total) as f32).min(1.0);
                let last = positions[occurrences - 1];
                let recency = ((last + len) as f32 / total as f32).min(1.0);

                let gaps: Vec<f32> = positions
                    .windows(2)
                    .map(|pair| (pair[1] - pair[0]) as f32)
                    .collect();
                let expected_gap = total as f32 / occurrences as f32;
                let temporal_spread = if expected_gap > 0.0 {
                    (super::mean(&gaps) / expected_gap).min(1.0)
                } else {
                    0.0
                };

                patterns.push(RecursivePattern {
                    sequence: window.to_vec(),
                    occurrences,
                    strength: (0.7 * frequency + 0.3 * recency).clamp(0.0, 1.0),
                    temporal_spread,
                    positions,
                });
            }
        }

        patterns.sort_by(|a, b| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::simple_journey;
    use super::*;

    fn ids(raw: &[&str]) -> Vec<NodeId> {
        raw.iter().map(|id| NodeId::from(*id)).collect()
    }

    #[test]
    fn test_alternating_path_pairs() {
        let (_, path) = simple_journey(&["a", "b", "a", "b", "a", "b"]);
        let patterns = PathAnalyzer::with_defaults().detect_sequence_patterns(&path);

        let ab = patterns
            .iter()
            .find(|p| p.nodes == ids(&["a", "b"]))
            .expect("a -> b detected");
        let ba = patterns
            .iter()
            .find(|p| p.nodes == ids(&["b", "a"]))
            .expect("b -> a detected");

        assert_eq!(ab.occurrences, 3);
        assert_eq!(ba.occurrences, 2);
        assert!(ab.strength > 0.0);
        assert!(ba.strength > 0.0);
        assert!(ab.occurrences >= 2 && ba.occurrences >= 2);
        assert!(ab.strength > ba.strength);
    }

    #[test]
    fn test_alternating_path_strength_values() {
        // total 6, half 3: length term 0.4 * 2/3; max possible occurrences 3
        assert!((sequence_strength(2, 3, 6) - (0.4 * 2.0 / 3.0 + 0.6)).abs() < 0.001);
        assert!((sequence_strength(2, 2, 6) - (0.4 * 2.0 / 3.0 + 0.4)).abs() < 0.001);
    }

    #[test]
    fn test_strength_monotonic_in_occurrences() {
        let total = 12;
        for len in 2..=4 {
            let mut previous = 0.0;
            for occurrences in 2..=total {
                let strength = sequence_strength(len, occurrences, total);
                assert!(strength >= previous);
                previous = strength;
            }
        }
    }

    #[test]
    fn test_more_repetitions_not_weaker() {
        // Same path length, the pair repeated more often.
        let (_, sparse) = simple_journey(&["a", "b", "c", "d", "a", "b", "e", "f"]);
        let (_, dense) = simple_journey(&["a", "b", "a", "b", "c", "a", "b", "d"]);
        let analyzer = PathAnalyzer::with_defaults();

        let strength_of = |path: &ReaderPath| {
            analyzer
                .detect_sequence_patterns(path)
                .into_iter()
                .find(|p| p.nodes == ids(&["a", "b"]))
                .map(|p| p.strength)
                .unwrap_or(0.0)
        };
        assert!(strength_of(&dense) >= strength_of(&sparse));
    }

    #[test]
    fn test_no_patterns_without_repeats() {
        let (_, path) = simple_journey(&["a", "b", "c", "d"]);
        assert!(PathAnalyzer::with_defaults()
            .detect_sequence_patterns(&path)
            .is_empty());
    }

    #[test]
    fn test_longer_windows_detected() {
        let (_, path) = simple_journey(&["a", "b", "c", "a", "b", "c"]);
        let patterns = PathAnalyzer::with_defaults().detect_sequence_patterns(&path);
        assert!(patterns.iter().any(|p| p.nodes == ids(&["a", "b", "c"])));
        assert!(!patterns.iter().any(|p| p.nodes.len() == 4));
    }

    #[test]
    fn test_recursive_patterns() {
        let (_, path) = simple_journey(&["a", "b", "x", "a", "b", "y", "a", "b"]);
        let patterns = PathAnalyzer::with_defaults().detect_recursive_patterns(&path);

        let ab = patterns
            .iter()
            .find(|p| p.sequence == ids(&["a", "b"]))
            .expect("a -> b recurs");
        assert_eq!(ab.occurrences, 3);
        assert_eq!(ab.positions, vec![0, 3, 6]);
        // Last occurrence ends the path.
        assert!(ab.strength > 0.7 * 0.75);
        assert!(ab.temporal_spread > 0.0 && ab.temporal_spread <= 1.0);
    }
}
