//! Note synchronization with the external editor
//!
//! The external editor works on a single edit buffer (`edit.md`). Whenever the
//! selection moves, the buffer is flushed into the note of the topic it holds
//! and the newly selected topic's note is loaded into it.
//!
//! ```text
//! workspace/
//!   edit.md            <- edit buffer, first line is the title
//!   notes/<topic>.md   <- one note per topic
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::application::{ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::infrastructure::traits::FileSystem;

/// Note held by the edit buffer before anything is selected.
pub const NONE_NOTE: &str = "none";

/// Title used when the edit buffer has no usable first line.
pub const UNNAMED_NOTE: &str = "unnamedFile";

/// Extracts the title from buffer contents: the first line without its
/// leading `#` markers and surrounding whitespace.
pub fn title_of(contents: &str) -> String {
    let title = contents
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start()
        .trim_start_matches('#')
        .trim();
    if title.is_empty() {
        UNNAMED_NOTE.to_string()
    } else {
        title.to_string()
    }
}

/// File sync collaborator between the tree and the edit buffer.
pub struct NoteService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
    /// Topic whose note the buffer was last loaded from
    opened: String,
}

impl NoteService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self {
            fs,
            settings,
            opened: NONE_NOTE.to_string(),
        }
    }

    /// Topic the edit buffer currently belongs to.
    pub fn opened(&self) -> &str {
        &self.opened
    }

    pub fn note_path(&self, name: &str) -> PathBuf {
        self.settings.note_path(name)
    }

    pub fn note_exists(&self, name: &str) -> bool {
        self.fs.is_file(&self.note_path(name))
    }

    /// Predicate handed to child creation for name-collision probing.
    pub fn exists_fn(&self) -> impl Fn(&str) -> bool + '_ {
        move |name| self.note_exists(name)
    }

    pub fn read_buffer(&self) -> ApplicationResult<String> {
        let path = self.settings.edit_path();
        if !self.fs.exists(&path) {
            return Ok(String::new());
        }
        self.fs
            .read_to_string(&path)
            .with_path_context("read edit buffer", &path)
    }

    pub fn write_buffer(&self, contents: &str) -> ApplicationResult<()> {
        let path = self.settings.edit_path();
        self.fs
            .write(&path, &normalize(contents))
            .with_path_context("write edit buffer", &path)
    }

    /// Title derived from the edit buffer.
    pub fn current_title(&self) -> ApplicationResult<String> {
        Ok(title_of(&self.read_buffer()?))
    }

    /// Writes buffer contents into the note of `name`.
    #[instrument(level = "debug", skip(self, contents))]
    pub fn flush(&self, name: &str, contents: &str) -> ApplicationResult<()> {
        let path = self.note_path(name);
        self.fs
            .ensure_parent(&path)
            .with_path_context("create notes directory", &path)?;
        self.fs
            .write(&path, &normalize(contents))
            .with_path_context("write note", &path)
    }

    /// Contents of the note of `name`, created with a title header if missing.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, name: &str) -> ApplicationResult<String> {
        self.ensure_note(name)?;
        let path = self.note_path(name);
        self.fs
            .read_to_string(&path)
            .with_path_context("read note", &path)
    }

    /// Creates `# name` as the note of `name` unless it exists. Returns true if
    /// a note was created.
    pub fn ensure_note(&self, name: &str) -> ApplicationResult<bool> {
        if self.note_exists(name) {
            return Ok(false);
        }
        let path = self.note_path(name);
        info!("creating note {}", path.display());
        self.flush(name, &format!("# {name}"))?;
        Ok(true)
    }

    /// Replaces the note of `old` by an empty note for `new`.
    #[instrument(level = "debug", skip(self))]
    pub fn rename(&self, old: &str, new: &str) -> ApplicationResult<()> {
        let old_path = self.note_path(old);
        if self.fs.exists(&old_path) {
            self.fs
                .remove_file(&old_path)
                .with_path_context("delete note", &old_path)?;
            info!("deleted note {}", old_path.display());
        } else {
            warn!(
                "tried to delete {}, but the file doesn't exist",
                old_path.display()
            );
        }
        self.flush(new, "")
    }

    /// Loads the buffer from the currently opened note, as done at startup.
    pub fn open_buffer(&self) -> ApplicationResult<()> {
        let contents = self.load(&self.opened)?;
        self.write_buffer(&contents)
    }

    /// Selection hand-off: stores the buffer under its title, then loads the
    /// note of `name` into the buffer.
    ///
    /// A title without a note means the user retitled the buffer, so the note
    /// it was opened from is replaced. Returns the title the buffer was stored
    /// under.
    #[instrument(level = "debug", skip(self))]
    pub fn switch_to(&mut self, name: &str) -> ApplicationResult<String> {
        let contents = self.read_buffer()?;
        let title = title_of(&contents);
        if !self.note_exists(&title) {
            let opened = self.opened.clone();
            self.rename(&opened, &title)?;
        }
        self.flush(&title, &contents)?;

        debug!("loading {name} into the edit buffer");
        let loaded = self.load(name)?;
        self.write_buffer(&loaded)?;
        self.opened = title_of(&loaded);
        Ok(title)
    }

    /// Note stems in the notes directory, sorted.
    pub fn list_notes(&self) -> Vec<String> {
        let dir = self.settings.notes_path();
        let ext = self.settings.note_ext();
        let mut notes: Vec<String> = WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|x| x == ext))
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
            })
            .collect();
        notes.sort();
        notes
    }
}

/// Trims surrounding whitespace and ends the text with a single newline.
fn normalize(contents: &str) -> String {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}
