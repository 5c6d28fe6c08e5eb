//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treenote/treenote.toml`
//! 3. Local config: `--config <file>`, or `./.treenote.toml` when present
//! 4. Environment variables: `TREENOTE_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use kurbo::Size;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{Smoothing, TreeGeometry};

/// Height-to-width ratio of a rendered A4 page.
pub const PAGE_RATIO: f64 = 1.41421;

/// Colors handed to the renderer, as `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColorConfig {
    pub background: String,
    pub nodes: String,
    pub selected: String,
    pub arrows: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            background: "#0D1F22".into(),
            nodes: "#F2EFE9".into(),
            selected: "#9B2915".into(),
            arrows: "#F2EFE9".into(),
        }
    }
}

impl ColorConfig {
    fn merge(&self, overlay: &RawColorConfig) -> Self {
        Self {
            background: overlay
                .background
                .clone()
                .unwrap_or_else(|| self.background.clone()),
            nodes: overlay.nodes.clone().unwrap_or_else(|| self.nodes.clone()),
            selected: overlay
                .selected
                .clone()
                .unwrap_or_else(|| self.selected.clone()),
            arrows: overlay.arrows.clone().unwrap_or_else(|| self.arrows.clone()),
        }
    }
}

/// Raw color config for intermediate parsing (`None` → not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawColorConfig {
    pub background: Option<String>,
    pub nodes: Option<String>,
    pub selected: Option<String>,
    pub arrows: Option<String>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub workspace: Option<PathBuf>,
    pub notes_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub session_file: Option<PathBuf>,
    pub edit_stem: Option<String>,
    pub ext: Option<String>,
    pub thumbnail_width: Option<u32>,
    pub crop_thumbnail: Option<u32>,
    pub default_node_size: Option<f64>,
    pub child_scaler: Option<f64>,
    pub line_width: Option<f64>,
    pub smoothing: Option<f64>,
    pub reference_fps: Option<f64>,
    pub converter: Option<String>,
    pub rasterizer: Option<String>,
    #[serde(default)]
    pub colors: RawColorConfig,
}

/// Unified configuration for treenote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Directory every relative path below resolves against
    pub workspace: PathBuf,
    pub notes_dir: PathBuf,
    /// PDFs and thumbnails
    pub cache_dir: PathBuf,
    pub session_file: PathBuf,
    /// File stem of the edit buffer shared with the external editor
    pub edit_stem: String,
    /// Note file extension, without the dot
    pub ext: String,
    pub thumbnail_width: u32,
    /// Pixels cropped from every side of a rendered page
    pub crop_thumbnail: u32,
    pub default_node_size: f64,
    /// Radius ratio between a child and its parent, in (0, 1)
    pub child_scaler: f64,
    pub line_width: f64,
    /// Fraction of the remaining distance covered per reference frame
    pub smoothing: f64,
    pub reference_fps: f64,
    /// Markdown to PDF command
    pub converter: String,
    /// PDF to PNG command
    pub rasterizer: String,
    pub colors: ColorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            notes_dir: PathBuf::from("notes"),
            cache_dir: PathBuf::from("cache"),
            session_file: PathBuf::from(".session"),
            edit_stem: "edit".into(),
            ext: "md".into(),
            thumbnail_width: 500,
            crop_thumbnail: 200,
            default_node_size: 15.0,
            child_scaler: 0.8,
            line_width: 15.0,
            smoothing: 0.1,
            reference_fps: 60.0,
            converter: "pandoc".into(),
            rasterizer: "pdftoppm".into(),
            colors: ColorConfig::default(),
        }
    }
}

/// Get the XDG config directory for treenote.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treenote").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treenote.toml"))
}

/// Local config picked up from the working directory.
pub fn local_config_path() -> PathBuf {
    PathBuf::from(".treenote.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Parses `#RRGGBB` or `#RRGGBBAA` (the `#` is optional) into RGBA bytes.
pub fn parse_hex_color(hex: &str) -> Result<[u8; 4], String> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 && hex.len() != 8 {
        return Err(format!("hex color must be 6 or 8 digits: {hex}"));
    }
    let byte = |at: usize| {
        hex.get(at..at + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .ok_or_else(|| format!("invalid hex color: {hex}"))
    };
    let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
    Ok([byte(0)?, byte(2)?, byte(4)?, alpha])
}

impl Settings {
    /// Extension without a leading dot.
    pub fn note_ext(&self) -> &str {
        self.ext.trim_start_matches('.')
    }

    pub fn notes_path(&self) -> PathBuf {
        self.workspace.join(&self.notes_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.workspace.join(&self.cache_dir)
    }

    pub fn session_path(&self) -> PathBuf {
        self.workspace.join(&self.session_file)
    }

    /// Edit buffer the external editor works on.
    pub fn edit_path(&self) -> PathBuf {
        self.workspace
            .join(format!("{}.{}", self.edit_stem, self.note_ext()))
    }

    pub fn note_path(&self, name: &str) -> PathBuf {
        self.notes_path()
            .join(format!("{}.{}", name, self.note_ext()))
    }

    pub fn pdf_path(&self, topic: &str) -> PathBuf {
        self.cache_path().join(format!("{topic}.pdf"))
    }

    /// Output prefix handed to the rasterizer; it appends the page number.
    pub fn thumbnail_prefix(&self, topic: &str) -> PathBuf {
        self.cache_path().join(format!("{topic}-thumbnail"))
    }

    /// First rendered page of a topic.
    pub fn thumbnail_path(&self, topic: &str) -> PathBuf {
        self.cache_path().join(format!("{topic}-thumbnail-1.png"))
    }

    /// Detail panel size: the thumbnail width by a page-proportioned height.
    pub fn panel_size(&self) -> Size {
        let width = f64::from(self.thumbnail_width);
        Size::new(width, (width * PAGE_RATIO).trunc())
    }

    pub fn geometry(&self) -> TreeGeometry {
        TreeGeometry {
            base_size: self.default_node_size,
            scale_factor: self.child_scaler,
        }
    }

    pub fn smoothing(&self) -> Smoothing {
        Smoothing {
            fraction: self.smoothing,
            reference_fps: self.reference_fps,
        }
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        let expand = |path: &Path| -> PathBuf {
            let raw = path.to_string_lossy();
            shellexpand::full(raw.as_ref())
                .map(|s| PathBuf::from(s.into_owned()))
                .unwrap_or_else(|_| path.to_path_buf())
        };
        self.workspace = expand(&self.workspace);
        self.notes_dir = expand(&self.notes_dir);
        self.cache_dir = expand(&self.cache_dir);
        self.session_file = expand(&self.session_file);
    }

    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            workspace: overlay
                .workspace
                .clone()
                .unwrap_or_else(|| self.workspace.clone()),
            notes_dir: overlay
                .notes_dir
                .clone()
                .unwrap_or_else(|| self.notes_dir.clone()),
            cache_dir: overlay
                .cache_dir
                .clone()
                .unwrap_or_else(|| self.cache_dir.clone()),
            session_file: overlay
                .session_file
                .clone()
                .unwrap_or_else(|| self.session_file.clone()),
            edit_stem: overlay
                .edit_stem
                .clone()
                .unwrap_or_else(|| self.edit_stem.clone()),
            ext: overlay.ext.clone().unwrap_or_else(|| self.ext.clone()),
            thumbnail_width: overlay.thumbnail_width.unwrap_or(self.thumbnail_width),
            crop_thumbnail: overlay.crop_thumbnail.unwrap_or(self.crop_thumbnail),
            default_node_size: overlay.default_node_size.unwrap_or(self.default_node_size),
            child_scaler: overlay.child_scaler.unwrap_or(self.child_scaler),
            line_width: overlay.line_width.unwrap_or(self.line_width),
            smoothing: overlay.smoothing.unwrap_or(self.smoothing),
            reference_fps: overlay.reference_fps.unwrap_or(self.reference_fps),
            converter: overlay
                .converter
                .clone()
                .unwrap_or_else(|| self.converter.clone()),
            rasterizer: overlay
                .rasterizer
                .clone()
                .unwrap_or_else(|| self.rasterizer.clone()),
            colors: self.colors.merge(&overlay.colors),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `explicit` - Config file given on the command line; it must exist.
    ///   Without it `./.treenote.toml` is used when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        // 3. Local config
        match explicit {
            Some(path) if !path.exists() => {
                return Err(ApplicationError::Config {
                    message: format!("config file {} doesn't exist", path.display()),
                });
            }
            Some(path) => current = current.merge_with(&load_raw_settings(path)?),
            None => {
                let local = local_config_path();
                if local.exists() {
                    current = current.merge_with(&load_raw_settings(&local)?);
                }
            }
        }

        // 4. Environment variables
        current = Self::apply_env_overrides(current)?;

        current.expand_paths();
        current.validate()?;
        Ok(current)
    }

    /// Apply TREENOTE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("TREENOTE").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("workspace") {
            settings.workspace = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("notes_dir") {
            settings.notes_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("cache_dir") {
            settings.cache_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("session_file") {
            settings.session_file = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("edit_stem") {
            settings.edit_stem = val;
        }
        if let Ok(val) = config.get_string("ext") {
            settings.ext = val;
        }
        if let Ok(val) = config.get::<u32>("thumbnail_width") {
            settings.thumbnail_width = val;
        }
        if let Ok(val) = config.get::<u32>("crop_thumbnail") {
            settings.crop_thumbnail = val;
        }
        if let Ok(val) = config.get::<f64>("default_node_size") {
            settings.default_node_size = val;
        }
        if let Ok(val) = config.get::<f64>("child_scaler") {
            settings.child_scaler = val;
        }
        if let Ok(val) = config.get::<f64>("line_width") {
            settings.line_width = val;
        }
        if let Ok(val) = config.get::<f64>("smoothing") {
            settings.smoothing = val;
        }
        if let Ok(val) = config.get::<f64>("reference_fps") {
            settings.reference_fps = val;
        }
        if let Ok(val) = config.get_string("converter") {
            settings.converter = val;
        }
        if let Ok(val) = config.get_string("rasterizer") {
            settings.rasterizer = val;
        }
        if let Ok(val) = config.get_string("colors.background") {
            settings.colors.background = val;
        }
        if let Ok(val) = config.get_string("colors.nodes") {
            settings.colors.nodes = val;
        }
        if let Ok(val) = config.get_string("colors.selected") {
            settings.colors.selected = val;
        }
        if let Ok(val) = config.get_string("colors.arrows") {
            settings.colors.arrows = val;
        }

        Ok(settings)
    }

    /// Rejects values the tree model cannot work with.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let invalid = |message: String| Err(ApplicationError::Config { message });

        if !(self.child_scaler > 0.0 && self.child_scaler < 1.0) {
            return invalid(format!(
                "child_scaler must be between 0 and 1, got {}",
                self.child_scaler
            ));
        }
        if self.default_node_size <= 0.0 {
            return invalid(format!(
                "default_node_size must be positive, got {}",
                self.default_node_size
            ));
        }
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return invalid(format!(
                "smoothing must be in (0, 1], got {}",
                self.smoothing
            ));
        }
        if self.thumbnail_width == 0 {
            return invalid("thumbnail_width must be positive".into());
        }
        for color in [
            &self.colors.background,
            &self.colors.nodes,
            &self.colors.selected,
            &self.colors.arrows,
        ] {
            parse_hex_color(color).map_err(|message| ApplicationError::Config { message })?;
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r##"# treenote configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/treenote/treenote.toml
#   Local:  ./.treenote.toml, or the file given with --config
#   Env:    TREENOTE_* environment variables (TREENOTE_COLORS__SELECTED for [colors])

# FILE HANDLING
# workspace = "."
# notes_dir = "notes"
# cache_dir = "cache"
# session_file = ".session"
# edit_stem = "edit"
# ext = "md"

# THUMBNAIL
# Detail panels are n pixels wide
# thumbnail_width = 500
# Rendered pages have white borders, crop them by n pixels
# crop_thumbnail = 200
# converter = "pandoc"
# rasterizer = "pdftoppm"

# NODE OPTIONS
# Radius of the largest nodes
# default_node_size = 15.0
# How much smaller each child is (< 1)
# child_scaler = 0.8
# line_width = 15.0
# smoothing = 0.1
# reference_fps = 60.0

[colors]
# background = "#0D1F22"
# nodes = "#F2EFE9"
# selected = "#9B2915"
# arrows = "#F2EFE9"
"##
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
