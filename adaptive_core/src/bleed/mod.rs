//! Character Bleed Calculator - mutations fired when the narrative voice changes.
//!
//! A bleed happens when the visit before the current one belongs to a different character
//! than the current node. The catalogue for that ordered pair scans the node's text and
//! proposes a few effects whose intensity grows with how often the reader has made the
//! same crossing.

mod catalogue;

pub use catalogue::*;

use serde::{Deserialize, Serialize};

use story_model::{Character, NodeState, ReaderPath, TextTransformation};

use crate::config::EngineConfig;

/// A detected change of voice between the previous and the current visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleedEvent {
    pub from: Character,
    pub to: Character,
    /// Times this exact ordered crossing appears in the visit log.
    pub transition_count: u32,
    /// 1 to 5.
    pub intensity: u8,
}

#[derive(Debug, Clone)]
pub struct CharacterBleedCalculator {
    max_specific_effects: usize,
}

impl Default for CharacterBleedCalculator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl CharacterBleedCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_specific_effects: config.max_bleed_effects,
        }
    }

    pub fn detect(&self, node: &NodeState, path: &ReaderPath) -> Option<BleedEvent> {
        let previous = path.previous_visit()?;
        if previous.character == node.character {
            return None;
        }

        let (from, to) = (previous.character, node.character);
        let transition_count = path
            .visits
            .windows(2)
            .filter(|w| w[0].character == from && w[1].character == to)
            .count() as u32;

        Some(BleedEvent {
            from,
            to,
            transition_count,
            intensity: transition_count.clamp(1, 5) as u8,
        })
    }

    /// Bleed transformations for `node`: at most the configured number of category effects
    /// plus one perspective-shift note. Empty when there is no bleed.
    pub fn calculate_bleed(&self, node: &NodeState, path: &ReaderPath) -> Vec<TextTransformation> {
        let Some(event) = self.detect(node, path) else {
            return Vec::new();
        };
        let text = if node.current_content.is_empty() {
            node.raw_content.as_str()
        } else {
            node.current_content.as_str()
        };

        let mut effects: Vec<TextTransformation> = Vec::new();
        for category in effects_for(event.from, event.to) {
            if effects.len() >= self.max_specific_effects {
                break;
            }
            if let Some(effect) = generate(*category, event.from, event.to, text, event.intensity) {
                if !effects.iter().any(|e| e.selector == effect.selector) {
                    effects.push(effect);
                }
            }
        }

        if let Some(note) = perspective_shift(event.from, event.to, text) {
            if !effects.iter().any(|e| e.selector == note.selector) {
                effects.push(note);
            }
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_model::TransformationKind;

    const TEXT: &str = "Data streams before me. I remember the signal and the fear, the signal again.";

    fn node(id: &str, character: Character) -> NodeState {
        NodeState::new(id, character, 5).with_content(TEXT)
    }

    fn walk(steps: &[(&str, Character)]) -> ReaderPath {
        let mut path = ReaderPath::new();
        for (id, character) in steps {
            path.record_visit(&node(id, *character));
        }
        path
    }

    #[test]
    fn test_single_visit_never_bleeds() {
        let calculator = CharacterBleedCalculator::default();
        let current = node("a", Character::Algorithm);
        let path = walk(&[("a", Character::Algorithm)]);

        assert!(calculator.detect(&current, &path).is_none());
        assert!(calculator.calculate_bleed(&current, &path).is_empty());
    }

    #[test]
    fn test_same_character_never_bleeds() {
        let calculator = CharacterBleedCalculator::default();
        let current = node("b", Character::Algorithm);
        let path = walk(&[("a", Character::Algorithm), ("b", Character::Algorithm)]);

        assert!(calculator.calculate_bleed(&current, &path).is_empty());
    }

    #[test]
    fn test_character_change_always_bleeds() {
        let calculator = CharacterBleedCalculator::default();
        for from in Character::ALL {
            for to in Character::ALL {
                if from == to {
                    continue;
                }
                let current = node("b", to);
                let path = walk(&[("a", from), ("b", to)]);
                let event = calculator.detect(&current, &path).unwrap();
                assert_eq!((event.from, event.to), (from, to));
                assert!(!calculator.calculate_bleed(&current, &path).is_empty());
            }
        }
    }

    #[test]
    fn test_effect_bounds() {
        let calculator = CharacterBleedCalculator::default();
        let current = node("b", Character::Algorithm);
        let path = walk(&[("a", Character::LastHuman), ("b", Character::Algorithm)]);

        let effects = calculator.calculate_bleed(&current, &path);
        let notes = effects
            .iter()
            .filter(|e| {
                matches!(&e.kind, TransformationKind::MetaComment { text, .. } if text.starts_with("perspective shift"))
            })
            .count();
        assert!(effects.len() <= 3);
        assert_eq!(notes, 1);
    }

    #[test]
    fn test_intensity_tracks_repeated_crossings() {
        let calculator = CharacterBleedCalculator::default();
        let current = node("b", Character::Algorithm);

        let once = walk(&[("a", Character::Archaeologist), ("b", Character::Algorithm)]);
        assert_eq!(calculator.detect(&current, &once).unwrap().intensity, 1);

        let mut steps = Vec::new();
        for _ in 0..7 {
            steps.push(("a", Character::Archaeologist));
            steps.push(("b", Character::Algorithm));
        }
        let often = walk(&steps);
        let event = calculator.detect(&current, &often).unwrap();
        assert_eq!(event.transition_count, 7);
        assert_eq!(event.intensity, 5);
    }
}
