//! The per-frame editor loop
//!
//! Each [`Editor::tick`] runs, strictly in order:
//! 1. pointer state machine (pan, drag, create, select, detail hover)
//! 2. note hand-off when the selection moved
//! 3. layout: overlap separation and detail-panel avoidance
//! 4. smoothing of every position towards its target
//! 5. deletion sweep
//! 6. finished conversions flag their topics for a reload
//! 7. detail images of shown panels are reloaded

use std::collections::HashMap;
use std::time::Duration;

use image::RgbaImage;
use kurbo::{Size, Vec2};
use tracing::{debug, info, instrument};

use crate::application::services::notes::NONE_NOTE;
use crate::application::services::{ConversionDone, DetailService, NoteService, SessionService};
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::domain::{
    build_scene, DomainError, LayoutEngine, NodeId, PointerController, PointerInput, Scene,
    SelectionChange, Smoothing, TickOutcome, TopicTree,
};

/// What happened during one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub outcome: TickOutcome,
    /// Title the edit buffer was stored under during a hand-off
    pub stored_note: Option<String>,
    pub deleted: Vec<String>,
    pub converted: Vec<ConversionDone>,
    /// Topics whose detail image was (re)loaded
    pub reloaded: Vec<String>,
}

pub struct Editor {
    tree: TopicTree,
    controller: PointerController,
    layout: LayoutEngine,
    notes: NoteService,
    detail: DetailService,
    session: SessionService,
    smoothing: Smoothing,
    panel: Size,
    images: HashMap<NodeId, RgbaImage>,
    frames: u64,
}

impl Editor {
    /// Loads the opened note into the edit buffer and queues a conversion for
    /// every topic.
    pub fn open(
        tree: TopicTree,
        notes: NoteService,
        detail: DetailService,
        session: SessionService,
        settings: &Settings,
    ) -> ApplicationResult<Self> {
        let panel = settings.panel_size();
        let mut editor = Self {
            tree,
            controller: PointerController::new(),
            layout: LayoutEngine::new(panel),
            notes,
            detail,
            session,
            smoothing: settings.smoothing(),
            panel,
            images: HashMap::new(),
            frames: 0,
        };
        editor.notes.open_buffer()?;
        editor.convert_all()?;
        Ok(editor)
    }

    pub fn tree(&self) -> &TopicTree {
        &self.tree
    }

    pub fn controller(&self) -> &PointerController {
        &self.controller
    }

    pub fn notes(&self) -> &NoteService {
        &self.notes
    }

    pub fn detail(&self) -> &DetailService {
        &self.detail
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Last loaded detail image of a topic.
    pub fn detail_image(&self, id: NodeId) -> Option<&RgbaImage> {
        self.images.get(&id)
    }

    /// Queues a conversion for every topic with a note and flags all topics
    /// for a detail reload. Returns the number of conversions started.
    #[instrument(level = "debug", skip(self))]
    pub fn convert_all(&mut self) -> ApplicationResult<usize> {
        let mut names: Vec<String> = self.tree.iter().map(|(_, n)| n.name.clone()).collect();
        names.sort();
        names.dedup();

        let mut started = 0;
        for name in names {
            if !self.notes.note_exists(&name) {
                debug!("no note for {name}, skipping conversion");
                continue;
            }
            if self.detail.request_conversion(&name)? {
                started += 1;
            }
        }
        self.tree
            .for_each_topic(|_, node| node.needs_detail_reload = true);
        Ok(started)
    }

    /// Advances the editor by one frame. `elapsed` is the time since the last
    /// frame; `None` applies one fixed smoothing step.
    pub fn tick(
        &mut self,
        input: PointerInput,
        elapsed: Option<Duration>,
    ) -> ApplicationResult<FrameReport> {
        let notes = &self.notes;
        let outcome = self
            .controller
            .update(&mut self.tree, input, |name| notes.note_exists(name))?;

        let stored_note = match outcome.selection {
            Some(change) => Some(self.hand_off(change)?),
            None => None,
        };

        self.layout.collect(&self.tree);
        self.layout
            .align(&mut self.tree, self.smoothing.factor(elapsed));
        self.tree.advance_all(self.smoothing, elapsed);

        let deleted = self.tree.sweep_deletions();
        if !deleted.is_empty() {
            info!("deleted topics: {}", deleted.join(", "));
            self.images.retain(|id, _| self.tree.contains(*id));
        }

        let converted = self.detail.poll_completed();
        self.flag_converted(&converted);
        let reloaded = self.reload_details();

        self.frames += 1;
        Ok(FrameReport {
            outcome,
            stored_note,
            deleted,
            converted,
            reloaded,
        })
    }

    /// Stores the edit buffer, renaming the previously selected topic when
    /// its title was edited, then opens the note of the new selection. The
    /// tree is only renamed once the notes were written.
    #[instrument(level = "debug", skip(self))]
    fn hand_off(&mut self, change: SelectionChange) -> ApplicationResult<String> {
        let title = self.notes.current_title()?;
        let retitled = change.previous.filter(|&previous| {
            title != NONE_NOTE
                && self
                    .tree
                    .get(previous)
                    .is_some_and(|node| node.name != title)
        });

        let name = self
            .tree
            .get(change.current)
            .map(|node| node.name.clone())
            .ok_or(DomainError::UnknownNode)?;
        let stored = self.notes.switch_to(&name)?;
        if let Some(previous) = retitled {
            self.tree.rename(previous, &title)?;
        }
        self.detail.request_conversion(&stored)?;
        info!("selected {name}");
        Ok(stored)
    }

    fn flag_converted(&mut self, converted: &[ConversionDone]) {
        for done in converted.iter().filter(|done| done.is_ok()) {
            self.tree.request_reload(&done.topic);
        }
    }

    /// Loads images for shown panels flagged for a reload. The flag is cleared
    /// on the attempt; a failed load keeps the previous image.
    fn reload_details(&mut self) -> Vec<String> {
        let pending: Vec<(NodeId, String)> = self
            .tree
            .iter()
            .filter(|(_, node)| node.show_detail && node.needs_detail_reload)
            .map(|(id, node)| (id, node.name.clone()))
            .collect();

        let mut reloaded = Vec::new();
        for (id, name) in pending {
            if let Some(node) = self.tree.get_mut(id) {
                node.needs_detail_reload = false;
            }
            if let Some(image) = self.detail.try_load_detail_image(&name) {
                self.images.insert(id, image);
                reloaded.push(name);
            }
        }
        reloaded
    }

    /// Blocks until running conversions finish and flags their topics.
    pub fn wait_for_conversions(&mut self) -> Vec<ConversionDone> {
        let converted = self.detail.wait_all();
        self.flag_converted(&converted);
        converted
    }

    /// Render snapshot for a surface whose centre is `screen_centre`.
    pub fn scene(&self, screen_centre: Vec2) -> Scene {
        build_scene(
            &self.tree,
            screen_centre + self.controller.view_offset(),
            self.panel,
        )
    }

    pub fn save(&self) -> ApplicationResult<()> {
        self.session.save(&self.tree)
    }
}
