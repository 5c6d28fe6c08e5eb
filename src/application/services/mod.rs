//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, CommandRunner)
//! but are themselves concrete structs, not traits.

mod detail;
mod editor;
mod notes;
mod session;

pub use detail::{ConversionDone, DetailService};
pub use editor::{Editor, FrameReport};
pub use notes::{NoteService, NONE_NOTE, UNNAMED_NOTE};
pub use session::SessionService;
