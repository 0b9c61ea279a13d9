//! Text transformation intents. Nothing here touches text; application lives in the core.

use serde::{Deserialize, Serialize};

/// A pending edit to a node's text, targeting the first literal occurrence of `selector`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextTransformation {
    #[serde(flatten)]
    pub kind: TransformationKind,

    /// Exact substring to target.
    pub selector: String,

    /// Overrides the type-based base priority when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl TextTransformation {
    pub fn new(kind: TransformationKind, selector: impl Into<String>) -> Self {
        Self {
            kind,
            selector: selector.into(),
            priority: None,
        }
    }

    pub fn replace(selector: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::new(
            TransformationKind::Replace {
                replacement: replacement.into(),
                preserve_formatting: false,
            },
            selector,
        )
    }

    pub fn fragment(selector: impl Into<String>, pattern: impl Into<String>, style: FragmentStyle) -> Self {
        Self::new(
            TransformationKind::Fragment {
                pattern: pattern.into(),
                style,
            },
            selector,
        )
    }

    pub fn expand(selector: impl Into<String>, text: impl Into<String>, style: ExpandStyle) -> Self {
        Self::new(
            TransformationKind::Expand {
                text: text.into(),
                style,
            },
            selector,
        )
    }

    pub fn emphasize(selector: impl Into<String>, style: EmphasisStyle, intensity: u8) -> Self {
        Self::new(
            TransformationKind::Emphasize {
                style,
                intensity: intensity.clamp(1, 5),
            },
            selector,
        )
    }

    pub fn meta_comment(selector: impl Into<String>, text: impl Into<String>, style: CommentStyle) -> Self {
        Self::new(
            TransformationKind::MetaComment {
                text: text.into(),
                style,
            },
            selector,
        )
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Keep markdown emphasis found in the selector around the replacement.
    pub fn preserving_formatting(mut self) -> Self {
        if let TransformationKind::Replace {
            preserve_formatting, ..
        } = &mut self.kind
        {
            *preserve_formatting = true;
        }
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// The five transformation types plus a catch-all for unrecognised input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransformationKind {
    #[serde(rename_all = "camelCase")]
    Replace {
        replacement: String,
        #[serde(default)]
        preserve_formatting: bool,
    },
    Fragment {
        pattern: String,
        #[serde(default)]
        style: FragmentStyle,
    },
    Expand {
        text: String,
        #[serde(default)]
        style: ExpandStyle,
    },
    Emphasize {
        #[serde(default)]
        style: EmphasisStyle,
        #[serde(default = "default_intensity")]
        intensity: u8,
    },
    MetaComment {
        text: String,
        #[serde(default)]
        style: CommentStyle,
    },
    /// Any other `type` value; applied as a no-op.
    #[serde(other)]
    Unknown,
}

fn default_intensity() -> u8 {
    3
}

impl TransformationKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TransformationKind::Replace { .. } => "replace",
            TransformationKind::Fragment { .. } => "fragment",
            TransformationKind::Expand { .. } => "expand",
            TransformationKind::Emphasize { .. } => "emphasize",
            TransformationKind::MetaComment { .. } => "metaComment",
            TransformationKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FragmentStyle {
    #[default]
    Character,
    Word,
    Progressive,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExpandStyle {
    #[default]
    Append,
    Inline,
    Paragraph,
    Reveal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmphasisStyle {
    #[default]
    Italic,
    Bold,
    Color,
    Spacing,
    Highlight,
    Glitch,
    Fade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommentStyle {
    #[default]
    Inline,
    Footnote,
    Marginalia,
    Interlinear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emphasis_intensity_clamped() {
        let t = TextTransformation::emphasize("echo", EmphasisStyle::Glitch, 9);
        assert_eq!(
            t.kind,
            TransformationKind::Emphasize {
                style: EmphasisStyle::Glitch,
                intensity: 5
            }
        );
    }

    #[test]
    fn test_transformation_json_shape() {
        let t = TextTransformation::replace("old", "new").with_priority(90);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["type"], "replace");
        assert_eq!(json["selector"], "old");
        assert_eq!(json["replacement"], "new");
        assert_eq!(json["priority"], 90);
    }

    #[test]
    fn test_unknown_type_deserializes_to_noop() {
        let t: TextTransformation =
            serde_json::from_str(r#"{"type":"dissolve","selector":"x"}"#).unwrap();
        assert_eq!(t.kind, TransformationKind::Unknown);
        assert_eq!(t.type_name(), "unknown");
    }

    #[test]
    fn test_meta_comment_defaults() {
        let t: TextTransformation =
            serde_json::from_str(r#"{"type":"metaComment","selector":"x","text":"note"}"#).unwrap();
        assert_eq!(
            t.kind,
            TransformationKind::MetaComment {
                text: "note".to_string(),
                style: CommentStyle::Inline
            }
        );
    }

    #[test]
    fn test_preserving_formatting_only_affects_replace() {
        let t = TextTransformation::replace("*a*", "b").preserving_formatting();
        assert!(matches!(
            t.kind,
            TransformationKind::Replace {
                preserve_formatting: true,
                ..
            }
        ));
        let e = TextTransformation::expand("a", "b", ExpandStyle::Inline).preserving_formatting();
        assert!(matches!(e.kind, TransformationKind::Expand { .. }));
    }
}
