//! Domain layer: the topic tree and the per-frame algorithms over it
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod codec;
pub mod error;
pub mod interaction;
pub mod layout;
pub mod scene;
pub mod tree;

pub use error::DomainError;
pub use interaction::{DragState, PointerController, PointerInput, SelectionChange, TickOutcome};
pub use layout::LayoutEngine;
pub use scene::{build_scene, Scene};
pub use tree::{NodeId, Pass, Smoothing, Topic, TopicTree, TreeGeometry};
