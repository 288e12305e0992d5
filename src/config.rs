//! Startup settings (`config.toml`) and the runtime view configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::debug;

use crate::error::EngineError;
use crate::preload::{DEFAULT_CACHE_SLACK, DEFAULT_WORKERS};
use crate::transform::{Align, AlignX, AlignY, Scaling};

pub const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "GLANCE_CONFIG_DIR";

/// An RGBA color with every component in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "[f32; 4]")]
pub struct Color {
    r: f32,
    g: f32,
    b: f32,
    a: f32,
}

impl Color {
    pub const WHITE: Self = Self::rgb_unchecked(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgb_unchecked(0.0, 0.0, 0.0);

    const fn rgb_unchecked(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> crate::error::Result<Self> {
        for c in [r, g, b, a] {
            if !(0.0..=1.0).contains(&c) {
                return Err(EngineError::InvalidColor(c));
            }
        }
        Ok(Self { r, g, b, a })
    }

    pub fn rgba(&self) -> (f32, f32, f32, f32) {
        (self.r, self.g, self.b, self.a)
    }
}

impl TryFrom<[f32; 4]> for Color {
    type Error = EngineError;

    fn try_from([r, g, b, a]: [f32; 4]) -> crate::error::Result<Self> {
        Self::new(r, g, b, a)
    }
}

/// Where the status bar is drawn
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBarPosition {
    Top,
    #[default]
    Bottom,
}

impl FromStr for StatusBarPosition {
    type Err = EngineError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            _ => Err(EngineError::invalid("status bar position", s)),
        }
    }
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub preload_forward: usize,
    pub preload_backward: usize,
    /// Extra cache entries kept beyond the preload window
    pub cache_slack: usize,
    /// Decode worker threads
    pub workers: usize,
    /// Thumbnails fit within a square of this size
    pub thumbnail_size: u32,
    /// Write generated thumbnails to the thumbnail directory
    pub save_thumbnails: bool,
    /// Defaults to the platform cache directory
    pub thumbnail_dir: Option<PathBuf>,
    pub scaling: Scaling,
    pub align_x: AlignX,
    pub align_y: AlignY,
    pub gallery_tile_width: f64,
    pub gallery_height_width_ratio: f64,
    pub status_bar: bool,
    pub status_bar_position: StatusBarPosition,
    pub background: Color,
    pub backdrop: Color,
    pub gallery_cursor: Color,
    pub gallery_border: Color,
    pub status_bar_color: Color,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preload_forward: 1,
            preload_backward: 1,
            cache_slack: DEFAULT_CACHE_SLACK,
            workers: DEFAULT_WORKERS,
            thumbnail_size: 256,
            save_thumbnails: false,
            thumbnail_dir: None,
            scaling: Scaling::Fit,
            align_x: AlignX::Center,
            align_y: AlignY::Center,
            gallery_tile_width: 200.0,
            gallery_height_width_ratio: 1.0,
            status_bar: true,
            status_bar_position: StatusBarPosition::Bottom,
            background: Color::BLACK,
            backdrop: Color::BLACK,
            gallery_cursor: Color::WHITE,
            gallery_border: Color::WHITE,
            status_bar_color: Color::WHITE,
        }
    }
}

impl Settings {
    /// Read `config.toml` from `dir`. A missing file yields the defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILENAME);
        if !path.exists() {
            debug!(?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        debug!(?path, "Loaded config file");
        Ok(settings)
    }

    /// The platform config directory for the application
    pub fn default_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "glance")
            .context("Failed to determine project directories")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// The runtime view options derived from these settings
    pub fn view_config(&self) -> ViewConfig {
        ViewConfig {
            scaling: self.scaling,
            align: Align {
                x: self.align_x,
                y: self.align_y,
            },
            gallery_tile_width: positive_or(self.gallery_tile_width, 200.0),
            gallery_height_width_ratio: positive_or(self.gallery_height_width_ratio, 1.0),
            status_bar: self.status_bar,
            status_bar_position: self.status_bar_position,
            background: self.background,
            backdrop: self.backdrop,
            gallery_cursor: self.gallery_cursor,
            gallery_border: self.gallery_border,
            status_bar_color: self.status_bar_color,
        }
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value > 0.0 && value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Process-wide view options, owned by the engine and mutable at runtime
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    /// Initial scaling for newly loaded images and `reset`
    pub scaling: Scaling,
    pub align: Align,
    /// Target tile width (> 0)
    pub gallery_tile_width: f64,
    /// Target tile `height / width` (> 0)
    pub gallery_height_width_ratio: f64,
    /// Whether the status bar is shown in image mode
    pub status_bar: bool,
    pub status_bar_position: StatusBarPosition,
    pub background: Color,
    pub backdrop: Color,
    pub gallery_cursor: Color,
    pub gallery_border: Color,
    pub status_bar_color: Color,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Settings::default().view_config()
    }
}
