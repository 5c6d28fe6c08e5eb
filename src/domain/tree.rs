//! Arena-backed topic tree and the traversal protocol every other component uses.
//!
//! Nodes live in a generational arena and are addressed by [`NodeId`] handles.
//! Parent links are plain handles too, so creation and deletion in the middle of
//! a frame never leave dangling references: a stale handle simply resolves to
//! `None`.

use std::collections::HashSet;
use std::time::Duration;

use generational_arena::{Arena, Index};
use kurbo::{Point, Rect, Size, Vec2};
use tracing::{debug, info, instrument};

use crate::domain::error::DomainError;

/// Stable handle of a node in a [`TopicTree`].
pub type NodeId = Index;

/// Name of the invisible root node. It has no backing note.
pub const ROOT_NAME: &str = "master";

/// Appended to the parent's name when a child is created interactively.
pub const CHILD_SUFFIX: &str = "subtopic";

/// Child names that make the deletion sweep remove the child.
pub const DELETE_KEYWORDS: [&str; 2] = ["delete", "del"];

/// Padding around the detail panel, in multiples of the node radius.
pub const DETAIL_PADDING: f64 = 1.5;

/// Returns true if `name` asks for its node to be deleted.
pub fn is_delete_keyword(name: &str) -> bool {
    DELETE_KEYWORDS
        .iter()
        .any(|keyword| name.eq_ignore_ascii_case(keyword))
}

/// Radius rule: `base_size * scale_factor^depth`, depth 0 being the root's children.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeGeometry {
    pub base_size: f64,
    /// Must be in `(0, 1)` so that radius strictly decreases with depth
    pub scale_factor: f64,
}

impl Default for TreeGeometry {
    fn default() -> Self {
        Self {
            base_size: 15.0,
            scale_factor: 0.8,
        }
    }
}

impl TreeGeometry {
    pub fn radius(&self, depth: usize) -> f64 {
        self.base_size * self.scale_factor.powi(depth as i32)
    }
}

/// Exponential approach of `position` towards `desired`.
///
/// Without an elapsed time every call moves a fixed `fraction` of the remaining
/// distance. With an elapsed time the fraction is rescaled so that the speed of
/// convergence matches `reference_fps` frames per second regardless of pacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    pub fraction: f64,
    pub reference_fps: f64,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            fraction: 0.1,
            reference_fps: 60.0,
        }
    }
}

impl Smoothing {
    pub fn factor(&self, elapsed: Option<Duration>) -> f64 {
        match elapsed {
            None => self.fraction,
            Some(dt) => {
                let frames = dt.as_secs_f64() * self.reference_fps;
                (1.0 - (1.0 - self.fraction).powf(frames)).clamp(0.0, 1.0)
            }
        }
    }
}

/// A topic circle in the mind map.
#[derive(Debug, Clone)]
pub struct Topic {
    /// Doubles as the file stem of the backing note
    pub name: String,
    /// Rendered location in world space
    pub position: Point,
    /// Target that `position` approaches every frame
    pub desired: Point,
    pub radius: f64,
    pub selected: bool,
    /// Detail panel (thumbnail) visible for this node
    pub show_detail: bool,
    pub needs_detail_reload: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    depth: usize,
}

impl Topic {
    fn new(name: impl Into<String>, position: Point, radius: f64, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            position,
            desired: position,
            radius,
            selected: false,
            show_detail: false,
            needs_detail_reload: true,
            parent,
            children: Vec::new(),
            depth: 0,
        }
    }

    pub fn move_to(&mut self, to: Point) {
        self.desired = to;
    }

    pub fn contains(&self, point: Point) -> bool {
        (point - self.position).hypot() < self.radius
    }

    /// Position after one smoothing step towards `desired`. A node whose
    /// detail panel is shown never drifts.
    pub fn step_towards(&self, desired: Point, factor: f64) -> Point {
        if self.show_detail || self.position == desired {
            return self.position;
        }
        let d: Vec2 = desired - self.position;
        if d.hypot() < 1.0 {
            return desired;
        }
        self.position + d * factor
    }

    pub fn advance(&mut self, factor: f64) {
        self.position = self.step_towards(self.desired, factor);
    }

    /// Rectangle of the detail panel, placed to the left of the node.
    pub fn detail_rect(&self, panel: Size) -> Rect {
        let x0 = self.position.x - panel.width - self.radius * DETAIL_PADDING;
        let y0 = self.position.y - panel.height / 2.0;
        Rect::new(x0, y0, x0 + panel.width, y0 + panel.height)
    }
}

/// Visited set for one logical traversal operation.
///
/// Within a pass every node receives an action at most once, no matter how many
/// overlapping traversals are issued. Start a new pass (or [`Pass::reset`]) for
/// each logical operation.
#[derive(Debug, Default)]
pub struct Pass {
    visited: HashSet<NodeId>,
}

impl Pass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.visited.clear();
    }

    pub fn is_visited(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }

    /// Marks `id`, returning false if it was already marked.
    fn mark(&mut self, id: NodeId) -> bool {
        self.visited.insert(id)
    }
}

/// Rooted, single-owner tree of topics.
#[derive(Debug)]
pub struct TopicTree {
    arena: Arena<Topic>,
    root: NodeId,
    geometry: TreeGeometry,
}

impl Default for TopicTree {
    fn default() -> Self {
        Self::new(TreeGeometry::default())
    }
}

impl TopicTree {
    pub fn new(geometry: TreeGeometry) -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(Topic::new(ROOT_NAME, Point::ORIGIN, 0.0, None));
        Self {
            arena,
            root,
            geometry,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn geometry(&self) -> TreeGeometry {
        self.geometry
    }

    pub fn get(&self, id: NodeId) -> Option<&Topic> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Topic> {
        self.arena.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    /// Number of topics, not counting the root.
    pub fn len(&self) -> usize {
        self.arena.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.arena
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Depth below the root: the root's children are at depth 0.
    pub fn depth_of(&self, id: NodeId) -> usize {
        self.arena.get(id).map_or(0, |node| node.depth)
    }

    /// Appends a child with the radius its depth calls for.
    #[instrument(level = "trace", skip(self))]
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        name: &str,
        position: Point,
    ) -> Result<NodeId, DomainError> {
        if !self.arena.contains(parent) {
            return Err(DomainError::UnknownNode);
        }
        let depth = if parent == self.root {
            0
        } else {
            self.depth_of(parent) + 1
        };
        let mut topic = Topic::new(name, position, self.geometry.radius(depth), Some(parent));
        topic.depth = depth;
        let id = self.arena.insert(topic);
        if let Some(parent) = self.arena.get_mut(parent) {
            parent.children.push(id);
        }
        Ok(id)
    }

    /// Creates a child named after its parent, probing `name1`, `name2`, ... while
    /// a note with the candidate name already exists.
    pub fn create_child(
        &mut self,
        parent: NodeId,
        at: Point,
        note_exists: impl Fn(&str) -> bool,
    ) -> Result<NodeId, DomainError> {
        let base = match self.arena.get(parent) {
            Some(node) => format!("{}{}", node.name, CHILD_SUFFIX),
            None => return Err(DomainError::UnknownNode),
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while note_exists(&name) {
            name = format!("{base}{suffix}");
            suffix += 1;
        }
        let id = self.insert_child(parent, &name, at)?;
        info!("created topic {name}");
        Ok(id)
    }

    /// Invokes `action` on every descendant of `root` in pre-order, skipping nodes
    /// already visited in `pass` together with their subtrees.
    pub fn apply_to_descendants<F>(&mut self, pass: &mut Pass, root: NodeId, mut action: F)
    where
        F: FnMut(NodeId, &mut Topic),
    {
        pass.mark(root);
        let pending = self.children(root).iter().rev().copied().collect();
        self.walk(pass, pending, &mut action);
    }

    /// Like [`Self::apply_to_descendants`], but `root` itself is visited first.
    pub fn apply_to_subtree<F>(&mut self, pass: &mut Pass, root: NodeId, mut action: F)
    where
        F: FnMut(NodeId, &mut Topic),
    {
        self.walk(pass, vec![root], &mut action);
    }

    /// Pre-order walk over an explicit stack; the top of `pending` comes first.
    fn walk<F>(&mut self, pass: &mut Pass, mut pending: Vec<NodeId>, action: &mut F)
    where
        F: FnMut(NodeId, &mut Topic),
    {
        while let Some(id) = pending.pop() {
            if !self.arena.contains(id) || !pass.mark(id) {
                continue;
            }
            if let Some(node) = self.arena.get_mut(id) {
                action(id, node);
            }
            pending.extend(
                self.children(id)
                    .iter()
                    .rev()
                    .copied()
                    .filter(|&child| !pass.is_visited(child)),
            );
        }
    }

    /// Runs `action` on every topic in its own pass.
    pub fn for_each_topic<F>(&mut self, action: F)
    where
        F: FnMut(NodeId, &mut Topic),
    {
        let mut pass = Pass::new();
        let root = self.root;
        self.apply_to_descendants(&mut pass, root, action);
    }

    /// Pre-order iterator over the root's descendants.
    pub fn iter(&self) -> TopicIterator<'_> {
        TopicIterator::new(self, self.root)
    }

    /// Pre-order iterator over the descendants of `id`.
    pub fn iter_below(&self, id: NodeId) -> TopicIterator<'_> {
        TopicIterator::new(self, id)
    }

    /// Moves every topic one smoothing step closer to its desired position.
    pub fn advance_all(&mut self, smoothing: Smoothing, elapsed: Option<Duration>) {
        let factor = smoothing.factor(elapsed);
        self.for_each_topic(|_, node| node.advance(factor));
    }

    /// First topic in pre-order whose circle contains `point`. Parents win over
    /// their children, earlier siblings over later ones.
    pub fn hit_test(&self, point: Point) -> Option<NodeId> {
        self.iter()
            .find(|(_, node)| node.contains(point))
            .map(|(id, _)| id)
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.iter().find(|(_, node)| node.selected).map(|(id, _)| id)
    }

    /// Makes `id` the only selected topic, returning the previous selection.
    pub fn select(&mut self, id: NodeId) -> Option<NodeId> {
        let mut previous = None;
        self.for_each_topic(|other, node| {
            if node.selected {
                previous = Some(other);
                node.selected = false;
            }
        });
        if let Some(node) = self.arena.get_mut(id) {
            node.selected = true;
        }
        previous
    }

    pub fn detail_node(&self) -> Option<NodeId> {
        self.iter()
            .find(|(_, node)| node.show_detail)
            .map(|(id, _)| id)
    }

    pub fn clear_detail(&mut self) {
        self.for_each_topic(|_, node| node.show_detail = false);
    }

    /// Shows the detail panel of `id` and hides every other one. A panel that was
    /// not visible yet is flagged for an image reload.
    pub fn show_detail(&mut self, id: NodeId) {
        self.for_each_topic(|other, node| {
            if other != id {
                node.show_detail = false;
            }
        });
        if let Some(node) = self.arena.get_mut(id) {
            if !node.show_detail {
                node.needs_detail_reload = true;
            }
            node.show_detail = true;
        }
    }

    /// Flags every topic called `name` for a detail image reload.
    pub fn request_reload(&mut self, name: &str) {
        self.for_each_topic(|_, node| {
            if node.name == name {
                node.needs_detail_reload = true;
            }
        });
    }

    pub fn rename(&mut self, id: NodeId, name: &str) -> Result<(), DomainError> {
        if id == self.root {
            return Err(DomainError::RootNotEditable);
        }
        let node = self.arena.get_mut(id).ok_or(DomainError::UnknownNode)?;
        info!("renaming topic {} to {}", node.name, name);
        node.name = name.to_string();
        Ok(())
    }

    /// Unlinks `id` from its parent and frees its whole subtree.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<Topic, DomainError> {
        if id == self.root {
            return Err(DomainError::RootNotEditable);
        }
        let parent = self
            .arena
            .get(id)
            .ok_or(DomainError::UnknownNode)?
            .parent;
        if let Some(parent) = parent.and_then(|p| self.arena.get_mut(p)) {
            parent.children.retain(|&child| child != id);
        }
        let below: Vec<NodeId> = self.iter_below(id).map(|(child, _)| child).collect();
        for child in below {
            self.arena.remove(child);
        }
        self.arena.remove(id).ok_or(DomainError::UnknownNode)
    }

    /// Removes at most one child of `parent` whose name is a delete keyword.
    pub fn remove_marked_child(&mut self, parent: NodeId) -> Option<Topic> {
        let marked = self
            .children(parent)
            .iter()
            .copied()
            .find(|&child| {
                self.arena
                    .get(child)
                    .is_some_and(|node| is_delete_keyword(&node.name))
            })?;
        self.remove_subtree(marked).ok()
    }

    /// One deletion sweep: each node, root included, drops at most one marked
    /// child. Several pending deletions under one parent take several sweeps.
    pub fn sweep_deletions(&mut self) -> Vec<String> {
        let mut parents = vec![self.root];
        parents.extend(self.iter().map(|(id, _)| id));

        let mut removed = Vec::new();
        for parent in parents {
            if !self.arena.contains(parent) {
                continue;
            }
            if let Some(topic) = self.remove_marked_child(parent) {
                debug!("deleted topic {}", topic.name);
                removed.push(topic.name);
            }
        }
        removed
    }
}

/// Depth-first pre-order walk below a starting node, in child order.
#[derive(Debug, Clone)]
pub struct TopicIterator<'a> {
    tree: &'a TopicTree,
    stack: Vec<NodeId>,
}

impl<'a> TopicIterator<'a> {
    fn new(tree: &'a TopicTree, start: NodeId) -> Self {
        let stack = tree.children(start).iter().rev().copied().collect();
        Self { tree, stack }
    }
}

impl<'a> Iterator for TopicIterator<'a> {
    type Item = (NodeId, &'a Topic);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.tree.get(current) {
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(node.children.iter().rev().copied());
                return Some((current, node));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_chain() -> (TopicTree, NodeId, NodeId, NodeId) {
        let mut tree = TopicTree::default();
        let root = tree.root();
        let a = tree.insert_child(root, "a", Point::new(0.0, 0.0)).unwrap();
        let b = tree.insert_child(a, "b", Point::new(40.0, 0.0)).unwrap();
        let c = tree.insert_child(b, "c", Point::new(80.0, 0.0)).unwrap();
        (tree, a, b, c)
    }

    #[test]
    fn given_chain_when_inserting_then_radius_shrinks_with_depth() {
        let (tree, a, b, c) = tree_with_chain();
        let radii: Vec<f64> = [a, b, c].iter().map(|&id| tree.get(id).unwrap().radius).collect();
        assert_eq!(radii[0], 15.0);
        assert!((radii[1] - 12.0).abs() < 1e-9);
        assert!((radii[2] - 9.6).abs() < 1e-9);
        assert_eq!(tree.depth_of(c), 2);
    }

    #[test]
    fn given_very_deep_chain_when_traversing_and_removing_then_no_recursion_limit() {
        let mut tree = TopicTree::default();
        let mut parent = tree.root();
        for i in 0..200_000 {
            parent = tree.insert_child(parent, &format!("t{i}"), Point::ORIGIN).unwrap();
        }
        assert_eq!(tree.depth_of(parent), 199_999);

        let mut visited = 0;
        tree.for_each_topic(|_, _| visited += 1);
        let top = tree.children(tree.root())[0];
        tree.remove_subtree(top).unwrap();

        assert_eq!(visited, 200_000);
        assert!(tree.is_empty());
    }

    #[test]
    fn given_overlapping_traversals_in_one_pass_when_applying_then_each_node_fires_once() {
        let (mut tree, a, _, _) = tree_with_chain();
        let root = tree.root();
        let mut calls = Vec::new();
        let mut pass = Pass::new();

        tree.apply_to_subtree(&mut pass, a, |_, node| calls.push(node.name.clone()));
        tree.apply_to_descendants(&mut pass, root, |_, node| calls.push(node.name.clone()));
        tree.apply_to_subtree(&mut pass, a, |_, node| calls.push(node.name.clone()));

        assert_eq!(calls, vec!["a", "b", "c"]);
    }

    #[test]
    fn given_reset_pass_when_applying_again_then_nodes_fire_again() {
        let (mut tree, _, _, _) = tree_with_chain();
        let root = tree.root();
        let mut count = 0;
        let mut pass = Pass::new();
        tree.apply_to_descendants(&mut pass, root, |_, _| count += 1);
        pass.reset();
        tree.apply_to_descendants(&mut pass, root, |_, _| count += 1);
        assert_eq!(count, 6);
    }

    #[test]
    fn given_far_target_when_advancing_then_moves_a_tenth() {
        let mut tree = TopicTree::default();
        let root = tree.root();
        let a = tree.insert_child(root, "a", Point::ORIGIN).unwrap();
        tree.get_mut(a).unwrap().move_to(Point::new(100.0, 0.0));

        tree.advance_all(Smoothing::default(), None);

        assert_eq!(tree.get(a).unwrap().position, Point::new(10.0, 0.0));
    }

    #[test]
    fn given_close_target_when_advancing_then_snaps() {
        let mut tree = TopicTree::default();
        let root = tree.root();
        let a = tree.insert_child(root, "a", Point::ORIGIN).unwrap();
        tree.get_mut(a).unwrap().move_to(Point::new(0.5, 0.5));

        tree.advance_all(Smoothing::default(), None);

        assert_eq!(tree.get(a).unwrap().position, Point::new(0.5, 0.5));
    }

    #[test]
    fn given_shown_detail_when_advancing_then_node_stays() {
        let mut tree = TopicTree::default();
        let root = tree.root();
        let a = tree.insert_child(root, "a", Point::ORIGIN).unwrap();
        tree.get_mut(a).unwrap().move_to(Point::new(100.0, 0.0));
        tree.show_detail(a);

        tree.advance_all(Smoothing::default(), None);

        assert_eq!(tree.get(a).unwrap().position, Point::ORIGIN);
    }

    #[test]
    fn given_elapsed_reference_frame_when_computing_factor_then_matches_fixed_step() {
        let smoothing = Smoothing::default();
        let one_frame = Duration::from_secs_f64(1.0 / 60.0);
        assert!((smoothing.factor(Some(one_frame)) - 0.1).abs() < 1e-9);
        assert!(smoothing.factor(Some(Duration::from_secs_f64(2.0 / 60.0))) > 0.1);
    }

    #[test]
    fn given_parent_containing_child_when_hit_testing_then_parent_wins() {
        let mut tree = TopicTree::default();
        let root = tree.root();
        let parent = tree.insert_child(root, "parent", Point::ORIGIN).unwrap();
        let _child = tree.insert_child(parent, "child", Point::new(1.0, 0.0)).unwrap();

        assert_eq!(tree.hit_test(Point::new(1.0, 0.0)), Some(parent));
        assert_eq!(tree.hit_test(Point::new(100.0, 0.0)), None);
    }

    #[test]
    fn given_existing_notes_when_creating_children_then_probes_numeric_suffixes() {
        let mut tree = TopicTree::default();
        let root = tree.root();
        let x = tree.insert_child(root, "X", Point::ORIGIN).unwrap();
        let mut notes: HashSet<String> = HashSet::new();

        let mut names = Vec::new();
        for _ in 0..3 {
            let id = tree
                .create_child(x, Point::ORIGIN, |name| notes.contains(name))
                .unwrap();
            let name = tree.get(id).unwrap().name.clone();
            notes.insert(name.clone());
            names.push(name);
        }

        assert_eq!(names, vec!["Xsubtopic", "Xsubtopic1", "Xsubtopic2"]);
        assert_eq!(tree.children(x).len(), 3);
    }

    #[test]
    fn given_two_selections_when_selecting_then_only_latest_is_selected() {
        let (mut tree, a, b, _) = tree_with_chain();
        assert_eq!(tree.select(a), None);
        assert_eq!(tree.select(b), Some(a));
        assert_eq!(tree.iter().filter(|(_, n)| n.selected).count(), 1);
        assert_eq!(tree.selected(), Some(b));
    }

    #[test]
    fn given_two_marked_children_when_sweeping_then_one_removed_per_sweep() {
        let mut tree = TopicTree::default();
        let root = tree.root();
        let a = tree.insert_child(root, "a", Point::ORIGIN).unwrap();
        let del = tree.insert_child(a, "Delete", Point::ORIGIN).unwrap();
        let _grandchild = tree.insert_child(del, "orphan", Point::ORIGIN).unwrap();
        tree.insert_child(a, "del", Point::ORIGIN).unwrap();

        assert_eq!(tree.sweep_deletions(), vec!["Delete"]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.sweep_deletions(), vec!["del"]);
        assert_eq!(tree.len(), 1);
        assert!(tree.sweep_deletions().is_empty());
    }

    #[test]
    fn given_root_when_renaming_or_removing_then_rejected() {
        let mut tree = TopicTree::default();
        let root = tree.root();
        assert_eq!(tree.rename(root, "x"), Err(DomainError::RootNotEditable));
        assert!(tree.remove_subtree(root).is_err());
    }
}
