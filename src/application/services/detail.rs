//! Detail image pipeline: note → PDF → PNG thumbnail
//!
//! Conversions run on background threads, at most one per topic. A request
//! for a topic that is already converting is folded into the running one.
//! Finished conversions are reported through a channel the frame loop drains
//! with [`DetailService::poll_completed`].
//!
//! ```text
//! notes/<topic>.md --converter--> cache/<topic>.pdf --rasterizer--> cache/<topic>-thumbnail-1.png
//! ```

use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use image::{imageops, RgbaImage};
use tracing::{debug, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::infrastructure::traits::{CommandRunner, FileSystem};

/// Outcome of one background conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionDone {
    pub topic: String,
    /// Error message when a step failed
    pub error: Option<String>,
}

impl ConversionDone {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-topic conversion registry and thumbnail loader.
pub struct DetailService {
    fs: Arc<dyn FileSystem>,
    cmd: Arc<dyn CommandRunner>,
    settings: Arc<Settings>,
    in_flight: HashSet<String>,
    tx: Sender<ConversionDone>,
    rx: Receiver<ConversionDone>,
}

impl DetailService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
        settings: Arc<Settings>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            fs,
            cmd,
            settings,
            in_flight: HashSet::new(),
            tx,
            rx,
        }
    }

    pub fn is_converting(&self, topic: &str) -> bool {
        self.in_flight.contains(topic)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Starts converting the note of `topic` unless a conversion for it is
    /// already running. Returns true if a new conversion was started.
    #[instrument(level = "debug", skip(self))]
    pub fn request_conversion(&mut self, topic: &str) -> ApplicationResult<bool> {
        if self.in_flight.contains(topic) {
            debug!("conversion of {topic} already running, coalescing");
            return Ok(false);
        }
        let cache = self.settings.cache_path();
        self.fs
            .create_dir_all(&cache)
            .with_path_context("create cache directory", &cache)?;

        self.in_flight.insert(topic.to_string());
        let cmd = Arc::clone(&self.cmd);
        let settings = Arc::clone(&self.settings);
        let tx = self.tx.clone();
        let topic = topic.to_string();
        thread::spawn(move || {
            let error = convert(cmd.as_ref(), &settings, &topic)
                .err()
                .map(|e| e.to_string());
            // The receiver lives as long as the service; a send error only
            // means nobody waits for the result anymore
            let _ = tx.send(ConversionDone { topic, error });
        });
        Ok(true)
    }

    /// Finished conversions since the last poll. Never blocks.
    pub fn poll_completed(&mut self) -> Vec<ConversionDone> {
        let done: Vec<ConversionDone> = self.rx.try_iter().collect();
        self.settle(&done);
        done
    }

    /// Blocks until every running conversion has finished.
    pub fn wait_all(&mut self) -> Vec<ConversionDone> {
        let mut done = Vec::new();
        while !self.in_flight.is_empty() {
            match self.rx.recv() {
                Ok(result) => {
                    self.in_flight.remove(&result.topic);
                    done.push(result);
                }
                Err(_) => break,
            }
        }
        self.settle(&done);
        done
    }

    fn settle(&mut self, done: &[ConversionDone]) {
        for result in done {
            self.in_flight.remove(&result.topic);
            match &result.error {
                None => debug!("thumbnail for {} ready", result.topic),
                Some(error) => warn!("conversion of {} failed: {}", result.topic, error),
            }
        }
    }

    /// Loads the first rendered page of `topic`, cropped by `crop_thumbnail`
    /// on every side when the page is large enough. Missing or undecodable
    /// images are logged and yield `None`.
    pub fn try_load_detail_image(&self, topic: &str) -> Option<RgbaImage> {
        let path = self.settings.thumbnail_path(topic);
        debug!("reloading thumbnail for {topic}");
        match image::open(&path) {
            Ok(page) => Some(crop(page.to_rgba8(), self.settings.crop_thumbnail)),
            Err(e) => {
                warn!("{} could not be loaded: {}", path.display(), e);
                None
            }
        }
    }
}

/// Removes `by` pixels from every side. Pages too small to crop are kept.
pub fn crop(page: RgbaImage, by: u32) -> RgbaImage {
    let (width, height) = page.dimensions();
    let margin = by.saturating_mul(2);
    if by == 0 || width <= margin || height <= margin {
        return page;
    }
    imageops::crop_imm(&page, by, by, width - margin, height - margin).to_image()
}

fn convert(cmd: &dyn CommandRunner, settings: &Settings, topic: &str) -> ApplicationResult<()> {
    let note = settings.note_path(topic).to_string_lossy().to_string();
    let pdf = settings.pdf_path(topic).to_string_lossy().to_string();
    let prefix = settings.thumbnail_prefix(topic).to_string_lossy().to_string();

    debug!("converting to PDF for {note}");
    run_step(cmd, &settings.converter, &[note.as_str(), "-o", pdf.as_str()])?;

    debug!("creating thumbnail for {note}");
    run_step(
        cmd,
        &settings.rasterizer,
        &[pdf.as_str(), prefix.as_str(), "-png"],
    )
}

fn run_step(cmd: &dyn CommandRunner, program: &str, args: &[&str]) -> ApplicationResult<()> {
    let output = cmd
        .run(program, args)
        .map_err(|e| ApplicationError::OperationFailed {
            context: format!("failed to run {program}"),
            source: Box::new(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ApplicationError::OperationFailed {
            context: format!("{program} failed: {}", stderr.trim()),
            source: Box::new(std::io::Error::other(stderr.to_string())),
        });
    }
    Ok(())
}
