//! Layout settings.
//!
//! A plain settings object with named numeric fields. Every field has a
//! default that applies when it is absent from the stored settings.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Spacing and node-dimension settings for [`crate::LayoutEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutSettings {
    /// Gap between depth columns.
    pub horizontal_spacing: f64,
    /// Gap between sibling subtrees.
    pub vertical_spacing: f64,
    /// Gap between separate main trees.
    pub root_spacing: f64,
    /// Gap between the main trees and the floating islands, and between islands.
    pub island_spacing: f64,
    /// Width used when a text node has no usable width of its own.
    pub node_width: f64,
    pub min_node_height: f64,
    pub max_text_height: f64,
    pub line_height: f64,
    /// Average glyph advance used by the default height estimate.
    pub char_width: f64,
    pub text_padding: f64,
    pub formula_width: f64,
    pub formula_height: f64,
    pub image_width: f64,
    pub image_height: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            horizontal_spacing: 80.0,
            vertical_spacing: 20.0,
            root_spacing: 60.0,
            island_spacing: 80.0,
            node_width: 300.0,
            min_node_height: 60.0,
            max_text_height: 400.0,
            line_height: 24.0,
            char_width: 8.0,
            text_padding: 24.0,
            formula_width: 400.0,
            formula_height: 80.0,
            image_width: 400.0,
            image_height: 400.0,
        }
    }
}

impl LayoutSettings {
    /// Rejects negative or non-finite values.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let fields = [
            ("horizontalSpacing", self.horizontal_spacing),
            ("verticalSpacing", self.vertical_spacing),
            ("rootSpacing", self.root_spacing),
            ("islandSpacing", self.island_spacing),
            ("nodeWidth", self.node_width),
            ("minNodeHeight", self.min_node_height),
            ("maxTextHeight", self.max_text_height),
            ("lineHeight", self.line_height),
            ("charWidth", self.char_width),
            ("textPadding", self.text_padding),
            ("formulaWidth", self.formula_width),
            ("formulaHeight", self.formula_height),
            ("imageWidth", self.image_width),
            ("imageHeight", self.image_height),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidSetting { field, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_take_defaults() {
        let settings: LayoutSettings =
            serde_json::from_value(json!({"horizontalSpacing": 120, "nodeWidth": 250})).unwrap();
        assert_eq!(settings.horizontal_spacing, 120.0);
        assert_eq!(settings.node_width, 250.0);
        assert_eq!(settings.vertical_spacing, LayoutSettings::default().vertical_spacing);
    }

    #[test]
    fn defaults_are_valid() {
        assert!(LayoutSettings::default().validate().is_ok());
    }

    #[test]
    fn negative_spacing_rejected() {
        let settings = LayoutSettings {
            vertical_spacing: -1.0,
            ..LayoutSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, LayoutError::InvalidSetting { field: "verticalSpacing", .. }));
    }
}
