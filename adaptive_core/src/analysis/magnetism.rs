//! Strange-attractor nodes: places the reader keeps being pulled back to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use story_model::{NodeId, ReaderPath};

use super::{mean, std_dev, PathAnalyzer};

/// A node with strong "return magnetism".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttractorNode {
    pub node_id: NodeId,
    pub visits: usize,
    /// 0.5 x frequency + 0.3 x gap consistency + 0.2 x recency of the last return.
    pub magnetic_strength: f32,
    pub average_gap: f32,
    /// Sequence index of the most recent return.
    pub last_return: usize,
}

impl PathAnalyzer {
    /// Nodes revisited at least twice, strongest pull first.
    pub fn detect_attractor_nodes(&self, path: &ReaderPath) -> Vec<AttractorNode> {
        let total = path.sequence.len();
        if total == 0 {
            return Vec::new();
        }

        let mut positions: BTreeMap<&NodeId, Vec<usize>> = BTreeMap::new();
        for (i, id) in path.sequence.iter().enumerate() {
            positions.entry(id).or_default().push(i);
        }

        let mut nodes: Vec<AttractorNode> = positions
            .into_iter()
            .filter(|(_, pos)| pos.len() >= self.config.attractor_node_min_visits)
            .map(|(id, pos)| {
                let returns = pos.len() - 1;
                let frequency = (returns as f32 / 5.0).min(1.0);

                let gaps: Vec<f32> = pos.windows(2).map(|w| (w[1] - w[0]) as f32).collect();
                let average_gap = mean(&gaps);
                let gap_consistency = if average_gap > 0.0 {
                    1.0 - (std_dev(&gaps) / average_gap).min(1.0)
                } else {
                    0.0
                };

                let last_return = pos[pos.len() - 1];
                let recency = (last_return + 1) as f32 / total as f32;

                AttractorNode {
                    node_id: id.clone(),
                    visits: pos.len(),
                    magnetic_strength: (0.5 * frequency + 0.3 * gap_consistency + 0.2 * recency)
                        .clamp(0.0, 1.0),
                    average_gap,
                    last_return,
                }
            })
            .collect();

        nodes.sort_by(|a, b| {
            b.magnetic_strength
                .partial_cmp(&a.magnetic_strength)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::simple_journey;
    use super::*;

    #[test]
    fn test_regular_returns() {
        let (_, path) = simple_journey(&["hub", "a", "hub", "b", "hub", "c", "hub"]);
        let nodes = PathAnalyzer::with_defaults().detect_attractor_nodes(&path);

        assert_eq!(nodes.len(), 1);
        let hub = &nodes[0];
        assert_eq!(hub.node_id, NodeId::from("hub"));
        assert_eq!(hub.visits, 4);
        assert_eq!(hub.last_return, 6);
        assert!((hub.average_gap - 2.0).abs() < 0.001);
        // frequency 3/5, perfectly regular gaps, last return ends the path
        assert!((hub.magnetic_strength - (0.5 * 0.6 + 0.3 + 0.2)).abs() < 0.001);
    }

    #[test]
    fn test_single_revisit_is_not_magnetic() {
        let (_, path) = simple_journey(&["a", "b", "a"]);
        assert!(PathAnalyzer::with_defaults()
            .detect_attractor_nodes(&path)
            .is_empty());
    }

    #[test]
    fn test_irregular_returns_weaker() {
        let (_, regular) = simple_journey(&["x", "a", "x", "b", "x"]);
        let (_, irregular) = simple_journey(&["x", "x", "a", "b", "x"]);
        let analyzer = PathAnalyzer::with_defaults();

        let strength = |path: &ReaderPath| analyzer.detect_attractor_nodes(path)[0].magnetic_strength;
        assert!(strength(&regular) > strength(&irregular));
    }
}
