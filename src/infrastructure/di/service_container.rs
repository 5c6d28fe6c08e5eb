//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{DetailService, Editor, NoteService, SessionService};
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::infrastructure::traits::{CommandRunner, FileSystem, RealCommandRunner, RealFileSystem};

/// Container holding the shared dependencies services are built from.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Command runner abstraction
    pub cmd: Arc<dyn CommandRunner>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(RealCommandRunner),
        )
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self { settings, fs, cmd }
    }

    pub fn session_service(&self) -> SessionService {
        SessionService::new(Arc::clone(&self.fs), Arc::clone(&self.settings))
    }

    pub fn note_service(&self) -> NoteService {
        NoteService::new(Arc::clone(&self.fs), Arc::clone(&self.settings))
    }

    pub fn detail_service(&self) -> DetailService {
        DetailService::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.cmd),
            Arc::clone(&self.settings),
        )
    }

    /// Loads the session and opens an editor over it.
    pub fn editor(&self) -> ApplicationResult<Editor> {
        let tree = self.session_service().load()?;
        Editor::open(
            tree,
            self.note_service(),
            self.detail_service(),
            self.session_service(),
            &self.settings,
        )
    }
}
