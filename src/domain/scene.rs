//! Render-ready snapshot of the tree in screen coordinates.

use kurbo::{Point, Rect, Size, Vec2};

use crate::domain::tree::{NodeId, TopicTree};

/// Gap between the bottom of a circle and its label.
pub const LABEL_GAP: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: NodeId,
    pub name: String,
    pub center: Point,
    pub radius: f64,
    pub selected: bool,
    /// Centre of the label, below the circle
    pub label_anchor: Point,
    /// Detail panel, when shown
    pub detail: Option<Rect>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrow {
    pub from: Point,
    pub to: Point,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
    pub arrows: Vec<Arrow>,
}

/// Projects every topic into screen space. `translation` is the screen centre
/// plus the current view offset. The root is never part of the scene.
pub fn build_scene(tree: &TopicTree, translation: Vec2, panel: Size) -> Scene {
    let mut scene = Scene::default();

    for (id, node) in tree.iter() {
        let center = node.position + translation;
        scene.nodes.push(SceneNode {
            id,
            name: node.name.clone(),
            center,
            radius: node.radius,
            selected: node.selected,
            label_anchor: center + Vec2::new(0.0, node.radius + LABEL_GAP),
            detail: node
                .show_detail
                .then(|| node.detail_rect(panel) + translation),
        });

        for &child in &node.children {
            let Some(child) = tree.get(child) else {
                continue;
            };
            let delta = child.position - node.position;
            let length = delta.hypot();
            if length <= node.radius + child.radius {
                continue;
            }
            let direction = delta / length;
            scene.arrows.push(Arrow {
                from: center + direction * node.radius,
                to: child.position + translation - direction * child.radius,
            });
        }
    }
    scene
}
