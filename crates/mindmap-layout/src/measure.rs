//! Node measurement seam.
//!
//! Layout treats every node as a fixed box. Formula and image nodes get the
//! configured fixed dimensions; text nodes keep their width and take a height
//! from [`NodeMeasure::text_height`]. Hosts with real text metrics plug in
//! their own [`NodeMeasure`]; [`DefaultMeasure`] is a deterministic estimate.

use mindmap_core::{CanvasNode, NodeKind};

use crate::settings::LayoutSettings;

/// File extensions rendered as images by the host.
const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp"];

/// What a node displays, as far as sizing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Text,
    Formula,
    Image,
}

/// Measures nodes for layout.
pub trait NodeMeasure {
    fn classify(&self, node: &CanvasNode) -> ContentClass;

    /// Height of a text node rendered at `width`.
    fn text_height(&self, node: &CanvasNode, width: f64, settings: &LayoutSettings) -> f64;

    /// Final `(width, height)` box for a node.
    fn measure(&self, node: &CanvasNode, settings: &LayoutSettings) -> (f64, f64) {
        match self.classify(node) {
            ContentClass::Formula => (settings.formula_width, settings.formula_height),
            ContentClass::Image => (settings.image_width, settings.image_height),
            ContentClass::Text => {
                let width = usable(node.width).unwrap_or(settings.node_width);
                let height = if node.kind == NodeKind::Text {
                    let max = settings.max_text_height.max(settings.min_node_height);
                    self.text_height(node, width, settings)
                        .clamp(settings.min_node_height, max)
                } else {
                    usable(node.height).unwrap_or(settings.min_node_height)
                };
                (width, height)
            }
        }
    }
}

fn usable(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Deterministic line-count estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMeasure;

impl NodeMeasure for DefaultMeasure {
    fn classify(&self, node: &CanvasNode) -> ContentClass {
        if node.kind == NodeKind::File {
            let is_image = node
                .file
                .as_deref()
                .and_then(|f| f.rsplit_once('.'))
                .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                return ContentClass::Image;
            }
        }
        if let Some(text) = node.text.as_deref() {
            let text = text.trim();
            if text.len() >= 4 && text.starts_with("$$") && text.ends_with("$$") {
                return ContentClass::Formula;
            }
        }
        ContentClass::Text
    }

    fn text_height(&self, node: &CanvasNode, width: f64, settings: &LayoutSettings) -> f64 {
        let text = node.text.as_deref().unwrap_or("");
        let usable_width = (width - 2.0 * settings.text_padding).max(settings.char_width);
        let per_line = if settings.char_width > 0.0 {
            ((usable_width / settings.char_width).floor() as usize).max(1)
        } else {
            usize::MAX
        };
        let lines: usize = text
            .lines()
            .map(|line| line.chars().count().div_ceil(per_line).max(1))
            .sum::<usize>()
            .max(1);
        lines as f64 * settings.line_height + 2.0 * settings.text_padding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_images_and_formulas() {
        let m = DefaultMeasure;
        let image = CanvasNode::file("i", "assets/Diagram.PNG", 0.0, 0.0, 1.0, 1.0);
        assert_eq!(m.classify(&image), ContentClass::Image);
        let doc = CanvasNode::file("d", "notes/readme.md", 0.0, 0.0, 1.0, 1.0);
        assert_eq!(m.classify(&doc), ContentClass::Text);
        let formula = CanvasNode::text("f", " $$x^2$$ ", 0.0, 0.0, 1.0, 1.0);
        assert_eq!(m.classify(&formula), ContentClass::Formula);
        let plain = CanvasNode::text("t", "$$", 0.0, 0.0, 1.0, 1.0);
        assert_eq!(m.classify(&plain), ContentClass::Text);
    }

    #[test]
    fn fixed_dimensions_for_formula_and_image() {
        let settings = LayoutSettings::default();
        let formula = CanvasNode::text("f", "$$a+b$$", 0.0, 0.0, 10.0, 10.0);
        assert_eq!(
            DefaultMeasure.measure(&formula, &settings),
            (settings.formula_width, settings.formula_height)
        );
    }

    #[test]
    fn text_height_grows_with_wrapping_and_is_capped() {
        let settings = LayoutSettings::default();
        let short = CanvasNode::text("a", "hi", 0.0, 0.0, 300.0, 10.0);
        let long = CanvasNode::text("b", &"word ".repeat(60), 0.0, 0.0, 300.0, 10.0);
        let huge = CanvasNode::text("c", &"line\n".repeat(100), 0.0, 0.0, 300.0, 10.0);

        let (_, h_short) = DefaultMeasure.measure(&short, &settings);
        let (_, h_long) = DefaultMeasure.measure(&long, &settings);
        let (_, h_huge) = DefaultMeasure.measure(&huge, &settings);
        assert!(h_short >= settings.min_node_height);
        assert!(h_long > h_short);
        assert_eq!(h_huge, settings.max_text_height);
    }

    #[test]
    fn invalid_width_falls_back_to_setting() {
        let settings = LayoutSettings::default();
        let node = CanvasNode::text("a", "x", 0.0, 0.0, f64::NAN, f64::NAN);
        assert_eq!(DefaultMeasure.measure(&node, &settings).0, settings.node_width);
    }
}
