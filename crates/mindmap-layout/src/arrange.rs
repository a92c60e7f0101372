//! The mindmap arrangement algorithm.
//!
//! # Overview
//!
//! 1. Build a forest over the visible nodes. Nodes without a visible parent
//!    are roots. Roots carrying a floating record become *islands*; the rest
//!    are main trees.
//! 2. Every node gets a column: its depth below its root. Main trees start
//!    at column 0. An island starts one column right of its recorded
//!    original parent, so it stays near where it used to hang.
//! 3. Column x positions come from the widest node in each column plus
//!    `horizontal_spacing`, giving one vertical rail per depth.
//! 4. Vertically, each subtree occupies the larger of its own height and its
//!    stacked children (plus `vertical_spacing` between siblings). Parents
//!    are centered on their children's block.
//! 5. Main trees stack top to bottom; islands stack below them, ordered by
//!    the time they detached.
//! 6. The whole result is translated so the first main root keeps its
//!    current position.
//!
//! Collapsed subtrees never reach this module: callers pass only visible
//! nodes and edges.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde::Serialize;

use mindmap_core::{CanvasDocument, CanvasNode, FloatingInfo, NodeId, TreeEdge, TreeIndex};

use crate::error::LayoutError;
use crate::measure::{DefaultMeasure, NodeMeasure};
use crate::settings::LayoutSettings;

/// Computed geometry for one node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NodeBox {
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// True if the two boxes share any interior area.
    pub fn overlaps(&self, other: &NodeBox) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Everything [`LayoutEngine::arrange`] looks at.
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    /// Nodes to position, in document order.
    pub visible_nodes: &'a IndexMap<NodeId, CanvasNode>,
    /// Edges among the visible nodes.
    pub edges: &'a [TreeEdge],
    /// The unfiltered edge list, used to place islands whose original parent
    /// is not visible.
    pub original_edges: Option<&'a [TreeEdge]>,
    /// The unfiltered node set, paired with `original_edges`.
    pub all_nodes: Option<&'a IndexMap<NodeId, CanvasNode>>,
    /// The persisted document, source of `metadata.floatingNodes`.
    pub document: Option<&'a CanvasDocument>,
}

impl<'a> LayoutInput<'a> {
    pub fn new(visible_nodes: &'a IndexMap<NodeId, CanvasNode>, edges: &'a [TreeEdge]) -> Self {
        LayoutInput {
            visible_nodes,
            edges,
            original_edges: None,
            all_nodes: None,
            document: None,
        }
    }

    pub fn with_original_edges(mut self, edges: &'a [TreeEdge]) -> Self {
        self.original_edges = Some(edges);
        self
    }

    pub fn with_all_nodes(mut self, nodes: &'a IndexMap<NodeId, CanvasNode>) -> Self {
        self.all_nodes = Some(nodes);
        self
    }

    pub fn with_document(mut self, document: &'a CanvasDocument) -> Self {
        self.document = Some(document);
        self
    }
}

/// New geometry per visible node, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    positions: IndexMap<NodeId, NodeBox>,
}

impl LayoutResult {
    pub fn get(&self, id: &NodeId) -> Option<&NodeBox> {
        self.positions.get(id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// An empty layout means there was nothing visible; callers treat it as
    /// a no-op.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeBox)> {
        self.positions.iter()
    }

    /// Distance from the highest top edge to the lowest bottom edge.
    pub fn vertical_extent(&self) -> f64 {
        let top = self.positions.values().map(|b| b.y).fold(f64::INFINITY, f64::min);
        let bottom = self
            .positions
            .values()
            .map(NodeBox::bottom)
            .fold(f64::NEG_INFINITY, f64::max);
        if top.is_finite() && bottom.is_finite() {
            bottom - top
        } else {
            0.0
        }
    }
}

impl IntoIterator for LayoutResult {
    type Item = (NodeId, NodeBox);
    type IntoIter = indexmap::map::IntoIter<NodeId, NodeBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.positions.into_iter()
    }
}

/// Tree layout engine. Stateless apart from its settings and measurer, so
/// repeated calls with the same input give identical output.
#[derive(Debug, Clone)]
pub struct LayoutEngine<M = DefaultMeasure> {
    settings: LayoutSettings,
    measure: M,
}

impl LayoutEngine<DefaultMeasure> {
    pub fn new(settings: LayoutSettings) -> Self {
        LayoutEngine {
            settings,
            measure: DefaultMeasure,
        }
    }
}

impl<M: NodeMeasure> LayoutEngine<M> {
    pub fn with_measure(settings: LayoutSettings, measure: M) -> Self {
        LayoutEngine { settings, measure }
    }

    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    /// Computes new boxes for every visible node.
    pub fn arrange(&self, input: &LayoutInput<'_>) -> Result<LayoutResult, LayoutError> {
        self.settings.validate()?;
        let visible = input.visible_nodes;
        if visible.is_empty() {
            return Ok(LayoutResult::default());
        }

        let tree = TreeIndex::build(visible.keys(), input.edges);
        let floating = floating_records(input);
        let sizes: HashMap<NodeId, (f64, f64)> = visible
            .iter()
            .map(|(id, node)| (id.clone(), self.measure.measure(node, &self.settings)))
            .collect();

        let (main_roots, mut islands): (Vec<NodeId>, Vec<NodeId>) = tree
            .roots()
            .into_iter()
            .partition(|root| !floating.contains_key(root));
        let order: HashMap<&NodeId, usize> = visible.keys().enumerate().map(|(i, id)| (id, i)).collect();
        islands.sort_by_key(|id| {
            (
                floating.get(id).map_or(0, |f| f.since_timestamp),
                order.get(id).copied().unwrap_or(usize::MAX),
            )
        });

        // Columns.
        let mut columns: HashMap<NodeId, usize> = HashMap::new();
        for root in &main_roots {
            assign_columns(&tree, root, 0, &mut columns);
        }
        let mut full_tree = None;
        for root in &islands {
            let base = island_column(root, &floating, &columns, input, &mut full_tree);
            assign_columns(&tree, root, base, &mut columns);
        }
        let column_x = self.column_offsets(&columns, &sizes);

        // Vertical extents, bottom-up.
        let mut extents: HashMap<NodeId, f64> = HashMap::new();
        let mut spans: HashMap<NodeId, f64> = HashMap::new();
        for root in main_roots.iter().chain(&islands) {
            for id in tree.subtree(root).into_iter().rev() {
                let children = tree.children(&id);
                let span = if children.is_empty() {
                    0.0
                } else {
                    children.iter().map(|c| extents[c]).sum::<f64>()
                        + self.settings.vertical_spacing * (children.len() - 1) as f64
                };
                extents.insert(id.clone(), sizes[&id].1.max(span));
                spans.insert(id, span);
            }
        }

        // Vertical placement.
        let mut raw_y: HashMap<NodeId, f64> = HashMap::new();
        let mut cursor = 0.0;
        for root in &main_roots {
            self.place(&tree, root, cursor, &extents, &spans, &sizes, &mut raw_y);
            cursor += extents[root] + self.settings.root_spacing;
        }
        if !main_roots.is_empty() {
            cursor += self.settings.island_spacing - self.settings.root_spacing;
        }
        for root in &islands {
            self.place(&tree, root, cursor, &extents, &spans, &sizes, &mut raw_y);
            cursor += extents[root] + self.settings.island_spacing;
        }

        // Keep the first tree where the user left it.
        let (dx, dy) = match main_roots.first().or(islands.first()) {
            Some(anchor) => {
                let node = &visible[anchor];
                (
                    finite_or_zero(node.x) - column_x[columns[anchor]],
                    finite_or_zero(node.y) - raw_y[anchor],
                )
            }
            None => (0.0, 0.0),
        };

        let mut positions = IndexMap::with_capacity(visible.len());
        for id in visible.keys() {
            let (Some(&column), Some(&y)) = (columns.get(id), raw_y.get(id)) else {
                tracing::debug!(node = %id, "node unreachable from any root; left in place");
                continue;
            };
            let (width, height) = sizes[id];
            positions.insert(
                id.clone(),
                NodeBox {
                    x: finite_or_zero(column_x[column] + dx),
                    y: finite_or_zero(y + dy),
                    width: finite_or_zero(width),
                    height: finite_or_zero(height),
                },
            );
        }
        tracing::debug!(
            nodes = positions.len(),
            trees = main_roots.len(),
            islands = islands.len(),
            "layout computed"
        );
        Ok(LayoutResult { positions })
    }

    /// Left edge of every column, starting at 0.
    fn column_offsets(
        &self,
        columns: &HashMap<NodeId, usize>,
        sizes: &HashMap<NodeId, (f64, f64)>,
    ) -> Vec<f64> {
        let count = columns.values().max().map_or(0, |c| c + 1);
        let mut widths = vec![0.0_f64; count];
        for (id, &column) in columns {
            widths[column] = widths[column].max(sizes[id].0);
        }
        let mut offsets = Vec::with_capacity(count);
        let mut x = 0.0;
        for width in widths {
            offsets.push(x);
            x += width + self.settings.horizontal_spacing;
        }
        offsets
    }

    /// Places the subtree under `root` with its block starting at `top`.
    #[allow(clippy::too_many_arguments)]
    fn place(
        &self,
        tree: &TreeIndex,
        root: &NodeId,
        top: f64,
        extents: &HashMap<NodeId, f64>,
        spans: &HashMap<NodeId, f64>,
        sizes: &HashMap<NodeId, (f64, f64)>,
        raw_y: &mut HashMap<NodeId, f64>,
    ) {
        let mut stack = vec![(root.clone(), top)];
        while let Some((id, top)) = stack.pop() {
            let extent = extents[&id];
            raw_y.insert(id.clone(), top + (extent - sizes[&id].1) / 2.0);

            let mut child_top = top + (extent - spans[&id]) / 2.0;
            for child in tree.children(&id) {
                let next = child_top + extents[&child] + self.settings.vertical_spacing;
                stack.push((child, child_top));
                child_top = next;
            }
        }
    }
}

/// Floating records for the visible nodes: document metadata merged with
/// node fields, node fields winning.
fn floating_records(input: &LayoutInput<'_>) -> BTreeMap<NodeId, FloatingInfo> {
    let mut records = input
        .document
        .map(CanvasDocument::floating_nodes)
        .unwrap_or_default();
    for (id, node) in input.visible_nodes {
        if let Some(info) = &node.floating {
            records.insert(id.clone(), info.clone());
        }
    }
    records.retain(|id, info| info.is_floating && input.visible_nodes.contains_key(id));
    records
}

fn assign_columns(tree: &TreeIndex, root: &NodeId, base: usize, columns: &mut HashMap<NodeId, usize>) {
    let mut stack = vec![(root.clone(), base)];
    while let Some((id, column)) = stack.pop() {
        for child in tree.children(&id) {
            stack.push((child, column + 1));
        }
        columns.insert(id, column);
    }
}

/// Starting column for an island: one right of its original parent.
fn island_column(
    root: &NodeId,
    floating: &BTreeMap<NodeId, FloatingInfo>,
    columns: &HashMap<NodeId, usize>,
    input: &LayoutInput<'_>,
    full_tree: &mut Option<TreeIndex>,
) -> usize {
    let Some(parent) = floating.get(root).map(|f| &f.original_parent) else {
        return 0;
    };
    if let Some(column) = columns.get(parent) {
        return column + 1;
    }
    let full = full_tree.get_or_insert_with(|| unfiltered_tree(input));
    full.depth(parent).map_or(0, |depth| depth + 1)
}

fn unfiltered_tree(input: &LayoutInput<'_>) -> TreeIndex {
    let document_edges;
    let edges = match (input.original_edges, input.document) {
        (Some(edges), _) => edges,
        (None, Some(doc)) => {
            document_edges = doc.tree_edges();
            &document_edges[..]
        }
        (None, None) => input.edges,
    };
    match (input.all_nodes, input.document) {
        (Some(nodes), _) => TreeIndex::build(nodes.keys(), edges),
        (None, Some(doc)) => TreeIndex::build(doc.nodes.iter().map(|n| &n.id), edges),
        (None, None) => TreeIndex::build(input.visible_nodes.keys(), edges),
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
