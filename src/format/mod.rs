//! Annotation formats.
//!
//! Each supported encoding has its own `FormatParser`:
//! - `opendatacamyolo`: opendatacam JSON, relative center/extent, `class_id + 1` labels
//! - `openimages`: CSV with absolute corners and verbatim label names
//! - `relxywh`: per-frame text, relative center/extent with confidence
//! - `absxywh`: per-frame text, absolute top-left/extent with confidence
//! - `yolo`: per-frame text, relative center/extent, ground truth (confidence 1.0)
//! - `absolute`: per-frame text, absolute corners, ground truth (confidence 1.0)
//! - `faster`: Faster R-CNN JSON dump, absolute corners
//!
//! All parsers return canonical `Detection`s (top-left + extent, absolute pixels).
//! Parsers read through an `AnnotationStore`, never the filesystem directly.

mod cache;
mod faster;
pub mod lookup;
mod opendatacam;
mod openimages;
mod store;
mod text;

use anyhow::Result;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::detection::Detection;
use crate::labels::LabelMap;
use crate::{AnnotationError, Resolution};

pub use cache::SourceCache;
pub use faster::FasterParser;
pub use lookup::{frame_number_from_file_name, select_frame_files};
pub use opendatacam::OpenDataCamParser;
pub use openimages::OpenImagesParser;
pub use store::{AnnotationStore, FsStore, MemoryStore};
pub use text::{
    AbsXywhParser, AbsoluteCornersParser, FrameTextParser, RelXywhParser, TextRecord, YoloParser,
};

/// Where a format keeps its annotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceLayout {
    /// One JSON/CSV file covering every frame.
    SingleFile,
    /// A directory of `frame<N>.txt` files.
    FrameDirectory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnnotationFormat {
    OpenDataCamYolo,
    /// Known to trip up the downstream evaluator when used as ground truth.
    OpenImages,
    RelXywh,
    AbsXywh,
    Yolo,
    /// Known to trip up the downstream evaluator when used as ground truth.
    Absolute,
    Faster,
}

impl AnnotationFormat {
    pub const ALL: [AnnotationFormat; 7] = [
        AnnotationFormat::OpenDataCamYolo,
        AnnotationFormat::OpenImages,
        AnnotationFormat::RelXywh,
        AnnotationFormat::AbsXywh,
        AnnotationFormat::Yolo,
        AnnotationFormat::Absolute,
        AnnotationFormat::Faster,
    ];

    /// Case-sensitive command-line tag.
    pub fn tag(self) -> &'static str {
        match self {
            AnnotationFormat::OpenDataCamYolo => "opendatacamyolo",
            AnnotationFormat::OpenImages => "openimages",
            AnnotationFormat::RelXywh => "relxywh",
            AnnotationFormat::AbsXywh => "absxywh",
            AnnotationFormat::Yolo => "yolo",
            AnnotationFormat::Absolute => "absolute",
            AnnotationFormat::Faster => "faster",
        }
    }

    pub fn layout(self) -> SourceLayout {
        match self {
            AnnotationFormat::OpenDataCamYolo
            | AnnotationFormat::OpenImages
            | AnnotationFormat::Faster => SourceLayout::SingleFile,
            AnnotationFormat::RelXywh
            | AnnotationFormat::AbsXywh
            | AnnotationFormat::Yolo
            | AnnotationFormat::Absolute => SourceLayout::FrameDirectory,
        }
    }

    /// True when records carry no score and detections get confidence 1.0.
    pub fn is_ground_truth(self) -> bool {
        matches!(self, AnnotationFormat::Yolo | AnnotationFormat::Absolute)
    }

    /// Parser reading from the real filesystem.
    pub fn parser(self, labels: Arc<LabelMap>) -> Box<dyn FormatParser> {
        self.parser_with_store(labels, Arc::new(FsStore))
    }

    pub fn parser_with_store(
        self,
        labels: Arc<LabelMap>,
        store: Arc<dyn AnnotationStore>,
    ) -> Box<dyn FormatParser> {
        match self {
            AnnotationFormat::OpenDataCamYolo => Box::new(OpenDataCamParser::new(labels, store)),
            AnnotationFormat::OpenImages => Box::new(OpenImagesParser::new(store)),
            AnnotationFormat::RelXywh => Box::new(RelXywhParser::new(labels, store)),
            AnnotationFormat::AbsXywh => Box::new(AbsXywhParser::new(labels, store)),
            AnnotationFormat::Yolo => Box::new(YoloParser::new(labels, store)),
            AnnotationFormat::Absolute => Box::new(AbsoluteCornersParser::new(labels, store)),
            AnnotationFormat::Faster => Box::new(FasterParser::new(labels, store)),
        }
    }
}

impl FromStr for AnnotationFormat {
    type Err = AnnotationError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        AnnotationFormat::ALL
            .into_iter()
            .find(|format| format.tag() == tag)
            .ok_or_else(|| AnnotationError::unsupported_format(tag))
    }
}

impl std::fmt::Display for AnnotationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Decoding strategy for one annotation format.
pub trait FormatParser: Send + Sync {
    fn format(&self) -> AnnotationFormat;

    /// Canonical detections for `frame_number`.
    ///
    /// A frame with no annotations yields an empty list, not an error.
    /// `resolution` is only consulted by formats with relative coordinates.
    fn parse(
        &self,
        source: &Path,
        frame_number: u64,
        resolution: Resolution,
    ) -> Result<Vec<Detection>>;
}

/// One-shot parse from a format tag, using the real filesystem.
pub fn parse(
    source: &Path,
    frame_number: u64,
    resolution: Resolution,
    format_tag: &str,
    labels: Arc<LabelMap>,
) -> Result<Vec<Detection>> {
    let format: AnnotationFormat = format_tag.parse()?;
    format.parser(labels).parse(source, frame_number, resolution)
}

// Shared field decoding for the line/record based formats.

pub(crate) fn parse_class_id(field: &str, location: &str) -> Result<i64, AnnotationError> {
    field.trim().parse::<i64>().map_err(|_| {
        AnnotationError::malformed(format!("class id '{}' is not an integer", field)).at(location)
    })
}

pub(crate) fn parse_number(field: &str, name: &str, location: &str) -> Result<f64, AnnotationError> {
    field.trim().parse::<f64>().map_err(|_| {
        AnnotationError::malformed(format!("{} '{}' is not a number", name, field)).at(location)
    })
}
