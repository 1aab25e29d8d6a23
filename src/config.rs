use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::format::AnnotationFormat;
use crate::labels::{load_label_map, LabelMap};
use crate::render::{DEFAULT_FONT_SCALE, DEFAULT_THICKNESS, MAX_THICKNESS};
use crate::AnnotationError;

pub const DEFAULT_FPS: u32 = 30;

// -------------------- Run options --------------------

/// What a single invocation should do. Built from CLI arguments.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Input video path (or `stub://WxH/N` for synthetic frames).
    pub input: String,
    /// Annotation source: a file for single-file formats, a directory otherwise.
    pub annotations: PathBuf,
    /// Output base name; extensions are appended per mode.
    pub output: String,
    pub format: AnnotationFormat,
    pub frame_number: Option<u64>,
    pub whole_video: bool,
    pub decomposed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    SingleFrame(u64),
    WholeVideo { decomposed: bool },
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            return Err(AnnotationError::invalid_config("input video path is empty").into());
        }
        if self.output.trim().is_empty() {
            return Err(AnnotationError::invalid_config("output path is empty").into());
        }
        if self.annotations.as_os_str().is_empty() {
            return Err(AnnotationError::invalid_config("annotation source path is empty").into());
        }
        self.mode().map(|_| ())
    }

    /// Whole-video mode wins when both a frame number and `whole_video` are set.
    pub fn mode(&self) -> Result<RunMode> {
        if self.whole_video {
            if self.frame_number.is_some() {
                log::debug!("frame number ignored in whole-video mode");
            }
            return Ok(RunMode::WholeVideo {
                decomposed: self.decomposed,
            });
        }
        if self.decomposed {
            log::warn!("--decomposed only applies to whole-video runs; ignoring");
        }
        match self.frame_number {
            Some(frame) => Ok(RunMode::SingleFrame(frame)),
            None => Err(AnnotationError::invalid_config(
                "either a frame number or whole-video mode is required",
            )
            .into()),
        }
    }
}

// -------------------- Render settings --------------------

/// How a parse failure on one frame is handled during a whole-video run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameErrorPolicy {
    #[default]
    Abort,
    /// Log, write the frame un-annotated, keep going.
    Skip,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    font_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    fps: Option<u32>,
    thickness: Option<u32>,
    font_scale: Option<f32>,
    frame_errors: Option<FrameErrorPolicy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub font_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub fps: u32,
    pub thickness: u32,
    pub font_scale: f32,
    pub frame_errors: FrameErrorPolicy,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            font_path: None,
            labels_path: None,
            fps: DEFAULT_FPS,
            thickness: DEFAULT_THICKNESS,
            font_scale: DEFAULT_FONT_SCALE,
            frame_errors: FrameErrorPolicy::Abort,
        }
    }
}

impl RenderSettings {
    /// `ANNOTATE_CONFIG` file (if set), then `ANNOTATE_*` overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ANNOTATE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RenderConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            font_path: file.font_path,
            labels_path: file.labels_path,
            fps: file.fps.unwrap_or(defaults.fps),
            thickness: file.thickness.unwrap_or(defaults.thickness),
            font_scale: file.font_scale.unwrap_or(defaults.font_scale),
            frame_errors: file.frame_errors.unwrap_or(defaults.frame_errors),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("ANNOTATE_FONT") {
            if !path.trim().is_empty() {
                self.font_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("ANNOTATE_LABELS") {
            if !path.trim().is_empty() {
                self.labels_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(fps) = std::env::var("ANNOTATE_FPS") {
            self.fps = fps.trim().parse().map_err(|_| {
                AnnotationError::invalid_config("ANNOTATE_FPS must be a positive integer")
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(AnnotationError::invalid_config("fps must be greater than zero").into());
        }
        if self.thickness == 0 || self.thickness > MAX_THICKNESS {
            return Err(AnnotationError::invalid_config(format!(
                "thickness must be between 1 and {}",
                MAX_THICKNESS
            ))
            .into());
        }
        if !(self.font_scale.is_finite() && self.font_scale > 0.0) {
            return Err(
                AnnotationError::invalid_config("font_scale must be a positive number").into(),
            );
        }
        Ok(())
    }

    /// Configured label table, or the COCO table when none is set.
    pub fn label_map(&self) -> Result<LabelMap> {
        load_label_map(self.labels_path.as_deref())
    }
}

fn read_config_file(path: &Path) -> Result<RenderConfigFile> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AnnotationError::invalid_config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    };
    cfg.map_err(|e| {
        AnnotationError::invalid_config(format!("invalid config file {}: {}", path.display(), e))
            .into()
    })
}
