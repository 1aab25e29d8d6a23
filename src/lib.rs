//! Detection Overlay
//!
//! This crate normalizes object-detection annotations written by different
//! detectors and labelling tools, and draws them back onto the video frames
//! they describe.
//!
//! # Architecture
//!
//! Every supported encoding is decoded into one canonical box form:
//! top-left x, top-left y, width, height, in absolute pixels.
//!
//! 1. **Format parsing** (`format`): one `FormatParser` per on-disk encoding,
//!    selected by an `AnnotationFormat` tag.
//! 2. **Frame annotation** (`annotate`): canonical detections are handed to a
//!    `Canvas` which draws boxes and captions.
//! 3. **Orchestration** (`pipeline`): single-frame extraction and whole-video
//!    passes built on top of the annotator.
//!
//! # Module Structure
//!
//! - `detection`: canonical `Detection` and `BoundingBox`
//! - `labels`: class id → name tables
//! - `format`: parsers, frame-file lookup, annotation stores, source cache
//! - `render`: the image-annotation capability (`Canvas`, `ImageCanvas`)
//! - `annotate`: `FrameAnnotator`
//! - `video`: frame readers and writers (synthetic + FFmpeg)
//! - `config`: `RunConfig` and `RenderSettings`
//! - `pipeline`: run modes

use serde::{Deserialize, Serialize};

pub mod annotate;
pub mod config;
pub mod detection;
pub mod format;
pub mod labels;
pub mod pipeline;
pub mod render;
pub mod video;

pub use annotate::{annotate, FrameAnnotator};
pub use config::{FrameErrorPolicy, RenderSettings, RunConfig, RunMode};
pub use detection::{BoundingBox, Detection};
pub use format::{parse, AnnotationFormat, AnnotationStore, FormatParser, FsStore, MemoryStore};
pub use labels::{LabelMap, COCO_INSTANCE_CATEGORY_NAMES};
pub use pipeline::{run, RunSummary};
pub use render::{Canvas, ImageCanvas, OverlayStyle, PixelRect};
pub use video::{VideoReader, VideoWriter};

// -------------------- Resolution --------------------

/// Frame size in pixels. Relative coordinates are scaled by this.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn scaled(self, factor: u32) -> Self {
        Self {
            width: self.width.saturating_mul(factor),
            height: self.height.saturating_mul(factor),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// -------------------- Error Taxonomy --------------------

/// Kind of failure raised while locating, decoding or drawing annotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Annotation source missing or unreadable, or an output could not be written.
    IoFailure,
    /// Wrong field count or a non-numeric value inside one record.
    MalformedRecord,
    /// Class id outside the label table.
    UnknownClass,
    /// Format tag not recognized.
    UnsupportedFormat,
    /// Requested frame is past the end of the video, or the video is unreadable.
    FrameExtractionFailure,
    /// Run options are inconsistent (e.g. single-frame mode without a frame number).
    InvalidConfig,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::IoFailure => "IO_FAILURE",
            ErrorKind::MalformedRecord => "MALFORMED_RECORD",
            ErrorKind::UnknownClass => "UNKNOWN_CLASS",
            ErrorKind::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorKind::FrameExtractionFailure => "FRAME_EXTRACTION_FAILURE",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
        }
    }

    /// Process exit code used by the `annotate_video` binary.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::InvalidConfig => 2,
            ErrorKind::IoFailure => 3,
            ErrorKind::MalformedRecord => 4,
            ErrorKind::UnknownClass => 5,
            ErrorKind::UnsupportedFormat => 6,
            ErrorKind::FrameExtractionFailure => 7,
        }
    }
}

/// Typed error carried inside `anyhow::Error`.
///
/// The message holds the context needed to find the bad input
/// (file name, line number, frame number).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AnnotationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IoFailure, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedRecord, message)
    }

    pub fn unknown_class(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownClass, message)
    }

    pub fn unsupported_format(tag: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedFormat,
            format!("unrecognized annotation format '{}'", tag),
        )
    }

    pub fn frame_extraction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FrameExtractionFailure, message)
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, message)
    }

    /// Prefix the message with the location of the offending input.
    pub fn at(mut self, location: impl std::fmt::Display) -> Self {
        self.message = format!("{}: {}", location, self.message);
        self
    }
}

impl std::fmt::Display for AnnotationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for AnnotationError {}

/// Find the `ErrorKind` anywhere in an error chain.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AnnotationError>())
        .map(|e| e.kind)
}
