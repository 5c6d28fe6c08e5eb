//! Pointer state machine: panning, dragging, creating and selecting topics.

use kurbo::{Point, Vec2};
use tracing::{debug, trace};

use crate::domain::error::DomainError;
use crate::domain::tree::{NodeId, Pass, TopicTree};

/// Raw input sampled once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub primary_down: bool,
    /// Create-child modifier (Ctrl)
    pub modifier: bool,
    /// Pointer position in view space (screen centre at the origin)
    pub position: Point,
}

impl PointerInput {
    pub fn up(position: Point) -> Self {
        Self {
            primary_down: false,
            modifier: false,
            position,
        }
    }

    pub fn down(position: Point) -> Self {
        Self {
            primary_down: true,
            modifier: false,
            position,
        }
    }

    pub fn with_modifier(mut self) -> Self {
        self.modifier = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Panning,
    DraggingNode {
        target: NodeId,
        /// Node centre minus press point, kept for the whole drag
        grab_offset: Vec2,
    },
}

/// The selection moved from `previous` to `current` during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionChange {
    pub previous: Option<NodeId>,
    pub current: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub selection: Option<SelectionChange>,
    pub created: Option<NodeId>,
    /// Topic under the pointer at the start of the tick
    pub hovered: Option<NodeId>,
}

#[derive(Debug)]
pub struct PointerController {
    state: DragState,
    was_down: bool,
    press_point: Point,
    last_pointer: Point,
    view_offset: Vec2,
}

impl Default for PointerController {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerController {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
            was_down: false,
            press_point: Point::ORIGIN,
            last_pointer: Point::ORIGIN,
            view_offset: Vec2::ZERO,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// Translation applied to world space when rendering.
    pub fn view_offset(&self) -> Vec2 {
        self.view_offset
    }

    /// View-space point of the last button press.
    pub fn press_point(&self) -> Point {
        self.press_point
    }

    pub fn to_world(&self, view: Point) -> Point {
        view - self.view_offset
    }

    /// Advances the state machine by one tick.
    ///
    /// `note_exists` decides name collisions when a child is created.
    pub fn update<F>(
        &mut self,
        tree: &mut TopicTree,
        input: PointerInput,
        note_exists: F,
    ) -> Result<TickOutcome, DomainError>
    where
        F: Fn(&str) -> bool,
    {
        let world = self.to_world(input.position);
        let hovered = tree.hit_test(world);
        let mut outcome = TickOutcome {
            hovered,
            ..TickOutcome::default()
        };

        match (self.was_down, input.primary_down) {
            (false, true) => self.press(tree, input, world, hovered, note_exists, &mut outcome)?,
            (true, true) => self.hold(tree, input, world),
            (_, false) => self.release(tree, hovered),
        }

        self.was_down = input.primary_down;
        self.last_pointer = input.position;
        Ok(outcome)
    }

    fn press<F>(
        &mut self,
        tree: &mut TopicTree,
        input: PointerInput,
        world: Point,
        hovered: Option<NodeId>,
        note_exists: F,
        outcome: &mut TickOutcome,
    ) -> Result<(), DomainError>
    where
        F: Fn(&str) -> bool,
    {
        self.press_point = input.position;
        tree.clear_detail();

        if input.modifier {
            let parent = hovered.unwrap_or_else(|| tree.root());
            let created = tree.create_child(parent, world, note_exists)?;
            outcome.created = Some(created);
            outcome.selection = Some(self.grab(tree, created, Vec2::ZERO));
            return Ok(());
        }

        match hovered.and_then(|id| tree.get(id).map(|node| (id, node.position))) {
            Some((id, position)) => {
                outcome.selection = Some(self.grab(tree, id, position - world));
            }
            None => {
                debug!("press on empty space, panning");
                self.state = DragState::Panning;
            }
        }
        Ok(())
    }

    fn grab(&mut self, tree: &mut TopicTree, target: NodeId, grab_offset: Vec2) -> SelectionChange {
        self.state = DragState::DraggingNode {
            target,
            grab_offset,
        };
        let previous = tree.select(target);
        SelectionChange {
            previous,
            current: target,
        }
    }

    fn hold(&mut self, tree: &mut TopicTree, input: PointerInput, world: Point) {
        match self.state {
            DragState::Idle => {}
            DragState::Panning => {
                self.view_offset += input.position - self.last_pointer;
            }
            DragState::DraggingNode {
                target,
                grab_offset,
            } => {
                let Some(anchor) = tree.get(target).map(|node| node.position) else {
                    // Target was deleted mid-drag
                    self.state = DragState::Idle;
                    return;
                };
                trace!("dragging subtree to {world:?}");
                let mut pass = Pass::new();
                tree.apply_to_subtree(&mut pass, target, |_, node| {
                    node.move_to(world + (node.position - anchor) + grab_offset);
                });
            }
        }
    }

    fn release(&mut self, tree: &mut TopicTree, hovered: Option<NodeId>) {
        self.state = DragState::Idle;
        match hovered {
            Some(id) => tree.show_detail(id),
            None => tree.clear_detail(),
        }
    }
}
