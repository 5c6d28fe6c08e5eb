//! Tests for NoteService, the edit buffer hand-off

mod common;

use std::sync::Arc;

use treenote::application::services::{NoteService, SessionService, NONE_NOTE, UNNAMED_NOTE};
use treenote::infrastructure::traits::RealFileSystem;

use common::{read, workspace};

fn initialized() -> (tempfile::TempDir, NoteService) {
    let (temp, settings) = workspace();
    let settings = Arc::new(settings);
    let fs = Arc::new(RealFileSystem);
    SessionService::new(fs.clone(), settings.clone())
        .init_workspace()
        .unwrap();
    let notes = NoteService::new(fs, settings);
    notes.open_buffer().unwrap();
    (temp, notes)
}

#[test]
fn given_startup_when_opening_buffer_then_none_note_loaded() {
    let (temp, notes) = initialized();

    assert_eq!(notes.opened(), NONE_NOTE);
    assert_eq!(read(&temp.path().join("edit.md")), "# none\n");
    assert_eq!(notes.current_title().unwrap(), "none");
}

#[test]
fn given_buffer_when_switching_then_flushed_to_title_and_target_loaded() {
    // Arrange
    let (temp, mut notes) = initialized();
    notes.switch_to("treeNote").unwrap();
    std::fs::write(temp.path().join("edit.md"), "# treeNote\nfirst thoughts\n").unwrap();

    // Act
    let stored = notes.switch_to("none").unwrap();

    // Assert
    assert_eq!(stored, "treeNote");
    assert_eq!(
        read(&temp.path().join("notes/treeNote.md")),
        "# treeNote\nfirst thoughts\n"
    );
    assert_eq!(read(&temp.path().join("edit.md")), "# none\n");
    assert_eq!(notes.opened(), "none");
}

#[test]
fn given_retitled_buffer_when_switching_then_old_note_replaced_by_new_title() {
    // Arrange
    let (temp, mut notes) = initialized();
    notes.switch_to("treeNote").unwrap();
    std::fs::write(temp.path().join("edit.md"), "## Renamed \nbody").unwrap();

    // Act
    let stored = notes.switch_to("none").unwrap();

    // Assert
    assert_eq!(stored, "Renamed");
    assert!(!temp.path().join("notes/treeNote.md").exists());
    assert_eq!(read(&temp.path().join("notes/Renamed.md")), "## Renamed \nbody\n");
}

#[test]
fn given_target_without_note_when_switching_then_note_created_with_header() {
    let (temp, mut notes) = initialized();

    notes.switch_to("fresh").unwrap();

    assert_eq!(read(&temp.path().join("notes/fresh.md")), "# fresh\n");
    assert_eq!(read(&temp.path().join("edit.md")), "# fresh\n");
    assert_eq!(notes.opened(), "fresh");
}

#[test]
fn given_empty_buffer_when_switching_then_stored_as_unnamed() {
    let (temp, mut notes) = initialized();
    std::fs::write(temp.path().join("edit.md"), "").unwrap();

    let stored = notes.switch_to("treeNote").unwrap();

    assert_eq!(stored, UNNAMED_NOTE);
    assert!(temp.path().join("notes/unnamedFile.md").exists());
}

#[test]
fn given_notes_directory_when_listing_then_stems_sorted() {
    let (temp, notes) = initialized();
    std::fs::write(temp.path().join("notes/zeta.md"), "# zeta").unwrap();
    std::fs::write(temp.path().join("notes/ignored.txt"), "x").unwrap();

    assert_eq!(notes.list_notes(), ["none", "treeNote", "zeta"]);
}
