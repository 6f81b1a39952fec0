//! Live scene graph behind the reference engine.
//!
//! The portable [`Document`] is a nested tree; here every element is a node
//! in a `StableDiGraph`, with edges going parent → child. Group children
//! become graph children, so nested elements can be looked up, hit-tested
//! and reordered without walking the tree.

use canvas_core::{Document, Element, ElementId, ElementKind, ZOrder};
use kurbo::{Affine, Point, Rect, Vec2};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use std::collections::{HashMap, HashSet};

// ─── Nodes ───────────────────────────────────────────────────────────────

/// A node in the scene. Group elements are stored with an empty `objects`
/// list; their children live in the graph.
#[derive(Debug, Clone)]
pub enum SceneNode {
    Root,
    Element(Element),
}

impl SceneNode {
    pub fn element(&self) -> Option<&Element> {
        match self {
            SceneNode::Element(el) => Some(el),
            SceneNode::Root => None,
        }
    }

    pub fn element_mut(&mut self) -> Option<&mut Element> {
        match self {
            SceneNode::Element(el) => Some(el),
            SceneNode::Root => None,
        }
    }
}

// ─── Scene Graph ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SceneGraph {
    pub graph: StableDiGraph<SceneNode, ()>,
    pub root: NodeIndex,
    pub background: Option<String>,
    id_index: HashMap<ElementId, NodeIndex>,
    /// Paint order per parent, back to front. `StableGraph` recycles
    /// indices, so edge order alone cannot carry z-order.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(SceneNode::Root);
        Self {
            graph,
            root,
            background: None,
            id_index: HashMap::new(),
            child_order: HashMap::new(),
        }
    }

    /// Build a scene from a portable document.
    pub fn from_document(document: &Document) -> Result<Self, ElementId> {
        let mut scene = Self::new();
        scene.background = document.background.clone();
        for element in &document.objects {
            scene.insert(scene.root, element.clone())?;
        }
        Ok(scene)
    }

    /// Number of top-level elements.
    pub fn len(&self) -> usize {
        self.children(self.root).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.id_index.contains_key(&id)
    }

    /// First id in `element`'s subtree that is already in the scene or
    /// repeated within the subtree itself.
    pub fn first_conflict(&self, element: &Element) -> Option<ElementId> {
        fn walk(
            scene: &SceneGraph,
            el: &Element,
            seen: &mut HashSet<ElementId>,
        ) -> Option<ElementId> {
            if scene.contains(el.id) || !seen.insert(el.id) {
                return Some(el.id);
            }
            el.children().iter().find_map(|c| walk(scene, c, seen))
        }
        walk(self, element, &mut HashSet::new())
    }

    /// Insert `element` (and its group children) as the topmost child of
    /// `parent`. Fails with the offending id if any id is already taken.
    pub fn insert(&mut self, parent: NodeIndex, element: Element) -> Result<NodeIndex, ElementId> {
        if let Some(conflict) = self.first_conflict(&element) {
            return Err(conflict);
        }
        Ok(self.insert_unchecked(parent, element))
    }

    fn insert_unchecked(&mut self, parent: NodeIndex, mut element: Element) -> NodeIndex {
        let children = match &mut element.kind {
            ElementKind::Group { objects } => std::mem::take(objects),
            _ => Vec::new(),
        };
        let id = element.id;
        let idx = self.graph.add_node(SceneNode::Element(element));
        self.graph.add_edge(parent, idx, ());
        self.id_index.insert(id, idx);
        self.child_order.entry(parent).or_default().push(idx);
        for child in children {
            self.insert_unchecked(idx, child);
        }
        idx
    }

    /// Remove a node and its subtree, returning it as a portable element.
    pub fn remove(&mut self, idx: NodeIndex) -> Option<Element> {
        let element = self.to_element(idx)?;
        if let Some(parent) = self.parent(idx)
            && let Some(order) = self.child_order.get_mut(&parent)
        {
            order.retain(|&c| c != idx);
        }
        self.remove_subtree(idx);
        Some(element)
    }

    fn remove_subtree(&mut self, idx: NodeIndex) {
        for child in self.child_order.remove(&idx).unwrap_or_default() {
            self.remove_subtree(child);
        }
        if let Some(SceneNode::Element(el)) = self.graph.remove_node(idx) {
            self.id_index.remove(&el.id);
        }
    }

    /// Remove every element, keeping the background.
    pub fn clear(&mut self) -> Vec<Element> {
        self.children(self.root)
            .to_vec()
            .into_iter()
            .filter_map(|idx| self.remove(idx))
            .collect()
    }

    pub fn index_of(&self, id: ElementId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&Element> {
        self.graph.node_weight(idx).and_then(SceneNode::element)
    }

    pub fn get_mut(&mut self, idx: NodeIndex) -> Option<&mut Element> {
        self.graph.node_weight_mut(idx).and_then(SceneNode::element_mut)
    }

    pub fn get_by_id(&self, id: ElementId) -> Option<&Element> {
        self.index_of(id).and_then(|idx| self.get(idx))
    }

    pub fn get_by_id_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        let idx = self.index_of(id)?;
        self.get_mut(idx)
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    /// Children of a node, back to front.
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of the top-level elements, back to front.
    pub fn top_level_ids(&self) -> Vec<ElementId> {
        self.children(self.root)
            .iter()
            .filter_map(|&idx| self.get(idx).map(|el| el.id))
            .collect()
    }

    /// The top-level ancestor of `id` (or `id` itself). Groups are picked
    /// as a unit, so a click on a nested child selects its outermost group.
    pub fn selectable_target(&self, id: ElementId) -> Option<ElementId> {
        let mut idx = self.index_of(id)?;
        while let Some(parent) = self.parent(idx) {
            if parent == self.root {
                break;
            }
            idx = parent;
        }
        self.get(idx).map(|el| el.id)
    }

    // ─── Z-order ─────────────────────────────────────────────────────────

    /// Move `child` within its parent's paint order. Returns `true` if the
    /// order changed.
    pub fn reorder(&mut self, child: NodeIndex, order: ZOrder) -> bool {
        let Some(parent) = self.parent(child) else {
            return false;
        };
        let Some(siblings) = self.child_order.get_mut(&parent) else {
            return false;
        };
        let Some(pos) = siblings.iter().position(|&s| s == child) else {
            return false;
        };
        let last = siblings.len() - 1;
        let to = match order {
            ZOrder::Backward => pos.saturating_sub(1),
            ZOrder::Forward => (pos + 1).min(last),
            ZOrder::ToBack => 0,
            ZOrder::ToFront => last,
        };
        if to == pos {
            return false;
        }
        let moved = siblings.remove(pos);
        siblings.insert(to, moved);
        true
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    /// Transform from `idx`'s local space into scene space.
    pub fn absolute_transform(&self, idx: NodeIndex) -> Affine {
        let mut transform = Affine::IDENTITY;
        let mut current = Some(idx);
        while let Some(node) = current {
            if let Some(el) = self.get(node) {
                transform = el.geometry.local_transform() * transform;
            }
            current = self.parent(node);
        }
        transform
    }

    /// Axis-aligned bounding box in scene space.
    pub fn absolute_bounds(&self, idx: NodeIndex) -> Option<Rect> {
        let el = self.get(idx)?;
        Some(
            self.absolute_transform(idx)
                .transform_rect_bbox(el.geometry.local_rect()),
        )
    }

    /// Translate an element by a scene-space delta, converting it into the
    /// parent's space first.
    pub fn translate(&mut self, idx: NodeIndex, delta: Vec2) -> bool {
        let parent_inv = match self.parent(idx) {
            Some(parent) if parent != self.root => self.absolute_transform(parent).inverse(),
            _ => Affine::IDENTITY,
        };
        let local = (parent_inv * (Point::ORIGIN + delta)) - (parent_inv * Point::ORIGIN);
        let Some(el) = self.get_mut(idx) else {
            return false;
        };
        el.geometry.left += local.x;
        el.geometry.top += local.y;
        true
    }

    // ─── Export ──────────────────────────────────────────────────────────

    /// Rebuild the portable element for a node, groups included.
    pub fn to_element(&self, idx: NodeIndex) -> Option<Element> {
        let mut element = self.get(idx)?.clone();
        if let ElementKind::Group { objects } = &mut element.kind {
            *objects = self
                .children(idx)
                .iter()
                .filter_map(|&child| self.to_element(child))
                .collect();
        }
        Some(element)
    }

    pub fn to_document(&self) -> Document {
        Document {
            objects: self
                .children(self.root)
                .iter()
                .filter_map(|&idx| self.to_element(idx))
                .collect(),
            background: self.background.clone(),
        }
    }
}
