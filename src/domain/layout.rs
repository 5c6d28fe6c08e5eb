//! Per-frame overlap resolution and detail-panel avoidance.
//!
//! Two regimes:
//! - relaxed: overlapping circles are pushed apart along the line between their
//!   centres, one relaxation step per call;
//! - constrained: while a detail panel is shown, every circle overlapping the
//!   panel is moved out of it once, and the previous desired positions are
//!   restored when the panel is hidden again.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use kurbo::{Point, Rect, Size, Vec2};
use tracing::{debug, trace};

use crate::domain::tree::{NodeId, Topic, TopicTree, DETAIL_PADDING};

/// Below this distance two centres are treated as coincident.
const COINCIDENT: f64 = 1e-9;

/// Halvings of a separation step tried before the step is dropped for a frame.
const MAX_HALVINGS: u32 = 6;

#[derive(Debug)]
pub struct LayoutEngine {
    pile: Vec<NodeId>,
    members: HashSet<NodeId>,
    snapshot: Vec<(NodeId, Point)>,
    /// Desired positions last assigned by separation
    separated: HashMap<NodeId, Point>,
    perturbed: bool,
    panel: Size,
}

impl LayoutEngine {
    /// `panel` is the size of the detail panel drawn next to an inspected node.
    pub fn new(panel: Size) -> Self {
        Self {
            pile: Vec::new(),
            members: HashSet::new(),
            snapshot: Vec::new(),
            separated: HashMap::new(),
            perturbed: false,
            panel,
        }
    }

    /// Adds a node to the participating set; duplicates are ignored.
    pub fn dump(&mut self, id: NodeId) {
        if self.members.insert(id) {
            self.pile.push(id);
        }
    }

    /// Adds every topic of `tree` to the participating set.
    pub fn collect(&mut self, tree: &TopicTree) {
        for (id, _) in tree.iter() {
            self.dump(id);
        }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.pile
    }

    /// True while panel avoidance has moved nodes and a restore is pending.
    pub fn is_perturbed(&self) -> bool {
        self.perturbed
    }

    /// One layout pass. `step` is the smoothing factor the following
    /// [`TopicTree::advance_all`] applies; separation is scaled so that the
    /// total overlap depth after that step does not exceed the current one.
    pub fn align(&mut self, tree: &mut TopicTree, step: f64) {
        self.prune(tree);
        self.separate(tree, step);

        let detail = self
            .pile
            .iter()
            .copied()
            .find(|&id| tree.get(id).is_some_and(|node| node.show_detail));

        match detail {
            None if self.perturbed => self.restore(tree),
            Some(detail) if !self.perturbed => self.avoid_panel(tree, detail),
            _ => {}
        }
    }

    fn prune(&mut self, tree: &TopicTree) {
        self.pile.retain(|&id| tree.contains(id));
        self.members.retain(|&id| tree.contains(id));
        self.separated.retain(|&id, _| tree.contains(id));
    }

    /// Sum of pairwise penetration depths with every node placed by `at`.
    fn overlap_depth<F>(&self, tree: &TopicTree, at: F) -> f64
    where
        F: Fn(NodeId, &Topic) -> Point,
    {
        let circles: Vec<(Point, f64)> = self
            .pile
            .iter()
            .filter_map(|&id| tree.get(id).map(|node| (at(id, node), node.radius)))
            .collect();
        circles
            .iter()
            .tuple_combinations()
            .map(|(a, b)| (a.1 + b.1 - (b.0 - a.0).hypot()).max(0.0))
            .sum()
    }

    /// Each overlapping pair is split evenly along the line between the
    /// centres, displacements of one node summed over its pairs.
    fn displacements(&self, tree: &TopicTree) -> HashMap<NodeId, Vec2> {
        let mut displacement: HashMap<NodeId, Vec2> = HashMap::new();

        for (&a, &b) in self.pile.iter().tuple_combinations() {
            let (Some(na), Some(nb)) = (tree.get(a), tree.get(b)) else {
                continue;
            };
            let delta = nb.position - na.position;
            let distance = delta.hypot();
            let reach = na.radius + nb.radius;
            if distance >= reach {
                continue;
            }
            let direction = if distance > COINCIDENT {
                delta / distance
            } else {
                Vec2::new(1.0, 0.0)
            };
            let push = direction * ((reach - distance) / 2.0);
            *displacement.entry(a).or_insert(Vec2::ZERO) -= push;
            *displacement.entry(b).or_insert(Vec2::ZERO) += push;
        }
        displacement
    }

    /// One relaxation step.
    ///
    /// The step covers overlapping nodes and nodes still travelling towards a
    /// target set by an earlier step. It is halved until the positions after
    /// the next smoothing step overlap no deeper than the current ones; if no
    /// halving does, those nodes hold still for a frame.
    fn separate(&mut self, tree: &mut TopicTree, step: f64) {
        let displacement = self.displacements(tree);
        let moves: Vec<(NodeId, Point, Point)> = self
            .pile
            .iter()
            .filter_map(|&id| {
                let node = tree.get(id)?;
                match displacement.get(&id) {
                    Some(&offset) => Some((id, node.position, node.position + offset)),
                    None if node.desired != node.position
                        && self.separated.get(&id) == Some(&node.desired) =>
                    {
                        Some((id, node.position, node.desired))
                    }
                    None => None,
                }
            })
            .collect();
        if moves.is_empty() {
            return;
        }

        let current = self.overlap_depth(tree, |_, node| node.position);
        let mut chosen = HashMap::new();
        for halvings in 0..=MAX_HALVINGS + 1 {
            let scale = if halvings > MAX_HALVINGS {
                0.0
            } else {
                0.5_f64.powi(halvings as i32)
            };
            let candidate: HashMap<NodeId, Point> = moves
                .iter()
                .map(|&(id, from, to)| (id, from + (to - from) * scale))
                .collect();
            let predicted = self.overlap_depth(tree, |id, node| {
                let desired = candidate.get(&id).copied().unwrap_or(node.desired);
                node.step_towards(desired, step)
            });
            chosen = candidate;
            if predicted <= current {
                if halvings > 0 {
                    trace!("separation step scaled by {scale}");
                }
                break;
            }
        }

        for (id, desired) in chosen {
            if let Some(node) = tree.get_mut(id) {
                node.move_to(desired);
                self.separated.insert(id, desired);
            }
        }
    }

    fn restore(&mut self, tree: &mut TopicTree) {
        debug!("restoring {} desired positions", self.snapshot.len());
        for (id, desired) in self.snapshot.drain(..) {
            if let Some(node) = tree.get_mut(id) {
                node.move_to(desired);
            }
        }
        self.perturbed = false;
    }

    fn avoid_panel(&mut self, tree: &mut TopicTree, detail: NodeId) {
        let Some(rect) = tree.get(detail).map(|node| node.detail_rect(self.panel)) else {
            return;
        };
        self.perturbed = true;
        self.snapshot = self
            .pile
            .iter()
            .filter_map(|&id| tree.get(id).map(|node| (id, node.desired)))
            .collect();

        for &id in &self.pile {
            let Some(node) = tree.get_mut(id) else {
                continue;
            };
            if circle_overlaps_rect(node.position, node.radius, rect) {
                debug!("moving {} out of the detail panel", node.name);
                let escape = escape_vector(node.position, node.radius, rect);
                node.move_to(node.desired + escape);
            }
        }
    }
}

/// Closest-point test: clamp the centre into the rectangle and compare squared
/// distances.
pub fn circle_overlaps_rect(center: Point, radius: f64, rect: Rect) -> bool {
    let closest = Point::new(
        center.x.clamp(rect.x0, rect.x1),
        center.y.clamp(rect.y0, rect.y1),
    );
    (center - closest).hypot2() <= radius * radius
}

/// Shortest single-axis move that clears a padded rectangle edge. Ties prefer
/// left, then right, then top, then bottom.
pub fn escape_vector(center: Point, radius: f64, rect: Rect) -> Vec2 {
    let pad = DETAIL_PADDING * radius;
    let candidates = [
        Vec2::new(rect.x0 - center.x - pad, 0.0),
        Vec2::new(rect.x1 - center.x + pad, 0.0),
        Vec2::new(0.0, rect.y0 - center.y - pad),
        Vec2::new(0.0, rect.y1 - center.y + pad),
    ];
    candidates
        .into_iter()
        .min_by(|a, b| a.hypot().total_cmp(&b.hypot()))
        .unwrap_or(Vec2::ZERO)
}
