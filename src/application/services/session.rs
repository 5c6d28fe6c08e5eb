//! Session file persistence and workspace initialization

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::application::services::notes::NONE_NOTE;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::codec;
use crate::domain::TopicTree;
use crate::infrastructure::traits::FileSystem;

/// Topic a fresh workspace starts with.
pub const FIRST_TOPIC: &str = "treeNote";

pub struct SessionService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl SessionService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    pub fn session_path(&self) -> PathBuf {
        self.settings.session_path()
    }

    pub fn is_initialized(&self) -> bool {
        self.fs.is_file(&self.session_path())
    }

    /// Reads the session file. A missing file means the workspace was never
    /// initialized.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self) -> ApplicationResult<TopicTree> {
        let path = self.session_path();
        if !self.fs.exists(&path) {
            return Err(ApplicationError::NotInitialized(path));
        }
        let text = self
            .fs
            .read_to_string(&path)
            .with_path_context("read session", &path)?;
        let tree = codec::decode(&text, self.settings.geometry())?;
        info!("loaded {} topics from {}", tree.len(), path.display());
        Ok(tree)
    }

    #[instrument(level = "debug", skip(self, tree))]
    pub fn save(&self, tree: &TopicTree) -> ApplicationResult<()> {
        let path = self.session_path();
        self.fs
            .ensure_parent(&path)
            .with_path_context("create session directory", &path)?;
        self.fs
            .write(&path, &codec::encode(tree))
            .with_path_context("write session", &path)?;
        info!("saved {} topics to {}", tree.len(), path.display());
        Ok(())
    }

    /// Creates session file, notes, cache directory and an empty edit buffer.
    /// Existing files are overwritten. Returns the paths written.
    #[instrument(level = "debug", skip(self))]
    pub fn init_workspace(&self) -> ApplicationResult<Vec<PathBuf>> {
        let settings = &self.settings;
        let mut created = Vec::new();

        let notes = settings.notes_path();
        let cache = settings.cache_path();
        for dir in [&notes, &cache] {
            self.fs
                .create_dir_all(dir)
                .with_path_context("create directory", dir)?;
            created.push(dir.clone());
        }

        let session = self.session_path();
        let files = [
            (session, format!("{FIRST_TOPIC};0,0;0\n")),
            (
                settings.note_path(FIRST_TOPIC),
                format!("# {FIRST_TOPIC}\n"),
            ),
            (settings.note_path(NONE_NOTE), format!("# {NONE_NOTE}\n")),
            (settings.edit_path(), String::new()),
        ];
        for (path, content) in files {
            self.fs
                .ensure_parent(&path)
                .with_path_context("create directory", &path)?;
            self.fs
                .write(&path, &content)
                .with_path_context("write file", &path)?;
            created.push(path);
        }

        info!("initialized workspace {}", settings.workspace.display());
        Ok(created)
    }
}
