//! Per-attractor engagement scoring.

use serde::{Deserialize, Serialize};

use story_model::{AttractorTag, NodeId, ReaderPath};

use super::{mean, std_dev, PathAnalyzer};

/// Direction engagement with an attractor is heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementTrend {
    Rising,
    Falling,
    Stable,
}

/// How strongly the reader is engaging with one attractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttractorEngagement {
    pub tag: AttractorTag,
    /// Score from 0 to 100.
    pub score: f32,
    pub total_engagements: u32,
    /// Visited nodes that engaged this attractor, in first-visit order.
    pub related_nodes: Vec<NodeId>,
    pub trend: EngagementTrend,
}

impl PathAnalyzer {
    /// Engagement score per attractor: `min(100, 0.6 share + 0.2 recency + 0.2 consistency)`,
    /// each factor expressed on a 0-100 scale. Highest score first.
    pub fn attractor_engagements(&self, path: &ReaderPath) -> Vec<AttractorEngagement> {
        let total_engagements = path.total_engagements();
        if total_engagements == 0 {
            return Vec::new();
        }
        let total_visits = path.visits.len();

        let mut engagements: Vec<AttractorEngagement> = path
            .attractor_engagements
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(tag, count)| {
                let indices: Vec<usize> = path
                    .visits
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.attractors.contains(tag))
                    .map(|(i, _)| i)
                    .collect();

                let share = *count as f32 / total_engagements as f32 * 100.0;
                let recency = match indices.last() {
                    Some(last) if total_visits > 0 => (*last + 1) as f32 / total_visits as f32 * 100.0,
                    _ => 0.0,
                };
                let consistency = consistency_factor(&indices);
                let score = (0.6 * share + 0.2 * recency + 0.2 * consistency).min(100.0);

                let mut related_nodes: Vec<NodeId> = Vec::new();
                for i in &indices {
                    let id = &path.visits[*i].node_id;
                    if !related_nodes.contains(id) {
                        related_nodes.push(id.clone());
                    }
                }

                AttractorEngagement {
                    tag: tag.clone(),
                    score,
                    total_engagements: *count,
                    related_nodes,
                    trend: trend_of(&indices, total_visits),
                }
            })
            .collect();

        engagements.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.tag.cmp(&b.tag))
        });
        engagements
    }
}

/// 100 for perfectly even gaps between engagements, falling with their variation.
fn consistency_factor(indices: &[usize]) -> f32 {
    if indices.len() < 2 {
        return 0.0;
    }
    let gaps: Vec<f32> = indices.windows(2).map(|w| (w[1] - w[0]) as f32).collect();
    let m = mean(&gaps);
    if m <= 0.0 {
        return 0.0;
    }
    (1.0 - (std_dev(&gaps) / m).min(1.0)) * 100.0
}

fn trend_of(indices: &[usize], total_visits: usize) -> EngagementTrend {
    if total_visits < 2 {
        return EngagementTrend::Stable;
    }
    let half = total_visits / 2;
    let first = indices.iter().filter(|i| **i < half).count() as f32;
    let second = indices.len() as f32 - first;

    if second > first * 1.2 {
        EngagementTrend::Rising
    } else if second < first * 0.8 {
        EngagementTrend::Falling
    } else {
        EngagementTrend::Stable
    }
}
