//! Per-frame text formats.
//!
//! The source is a directory holding one `frame<N>.txt` per frame, one
//! whitespace-delimited detection per line. The four formats differ only in
//! field order and coordinate semantics, captured by a `TextRecord` impl:
//!
//! | format     | fields                                 |
//! |------------|----------------------------------------|
//! | `relxywh`  | class conf rel_cx rel_cy rel_w rel_h   |
//! | `absxywh`  | class conf x_min y_min w h             |
//! | `yolo`     | class rel_cx rel_cy rel_w rel_h        |
//! | `absolute` | class x_min y_min x_max y_max          |

use anyhow::Result;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use super::lookup::select_frame_files;
use super::store::AnnotationStore;
use super::{parse_class_id, parse_number, AnnotationFormat, FormatParser};
use crate::detection::{BoundingBox, Detection};
use crate::labels::LabelMap;
use crate::{AnnotationError, Resolution};

/// One decoded text line before label lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordFields {
    pub class_id: i64,
    pub bbox: BoundingBox,
    pub confidence: f64,
}

/// Field layout of one per-frame text format.
pub trait TextRecord: Send + Sync + 'static {
    const FORMAT: AnnotationFormat;
    const FIELD_COUNT: usize;

    /// `fields` has exactly `FIELD_COUNT` entries.
    fn decode(
        fields: &[&str],
        resolution: Resolution,
        location: &str,
    ) -> Result<RecordFields, AnnotationError>;
}

pub struct RelXywh;
pub struct AbsXywh;
pub struct YoloGroundTruth;
pub struct AbsoluteCorners;

impl TextRecord for RelXywh {
    const FORMAT: AnnotationFormat = AnnotationFormat::RelXywh;
    const FIELD_COUNT: usize = 6;

    fn decode(
        fields: &[&str],
        resolution: Resolution,
        location: &str,
    ) -> Result<RecordFields, AnnotationError> {
        Ok(RecordFields {
            class_id: parse_class_id(fields[0], location)?,
            confidence: parse_number(fields[1], "confidence", location)?,
            bbox: BoundingBox::from_relative_center(
                parse_number(fields[2], "center_x", location)?,
                parse_number(fields[3], "center_y", location)?,
                parse_number(fields[4], "width", location)?,
                parse_number(fields[5], "height", location)?,
                resolution,
            ),
        })
    }
}

impl TextRecord for AbsXywh {
    const FORMAT: AnnotationFormat = AnnotationFormat::AbsXywh;
    const FIELD_COUNT: usize = 6;

    fn decode(
        fields: &[&str],
        _resolution: Resolution,
        location: &str,
    ) -> Result<RecordFields, AnnotationError> {
        Ok(RecordFields {
            class_id: parse_class_id(fields[0], location)?,
            confidence: parse_number(fields[1], "confidence", location)?,
            bbox: BoundingBox::new(
                parse_number(fields[2], "x_min", location)?,
                parse_number(fields[3], "y_min", location)?,
                parse_number(fields[4], "width", location)?,
                parse_number(fields[5], "height", location)?,
            ),
        })
    }
}

impl TextRecord for YoloGroundTruth {
    const FORMAT: AnnotationFormat = AnnotationFormat::Yolo;
    const FIELD_COUNT: usize = 5;

    fn decode(
        fields: &[&str],
        resolution: Resolution,
        location: &str,
    ) -> Result<RecordFields, AnnotationError> {
        Ok(RecordFields {
            class_id: parse_class_id(fields[0], location)?,
            confidence: 1.0,
            bbox: BoundingBox::from_relative_center(
                parse_number(fields[1], "center_x", location)?,
                parse_number(fields[2], "center_y", location)?,
                parse_number(fields[3], "width", location)?,
                parse_number(fields[4], "height", location)?,
                resolution,
            ),
        })
    }
}

impl TextRecord for AbsoluteCorners {
    const FORMAT: AnnotationFormat = AnnotationFormat::Absolute;
    const FIELD_COUNT: usize = 5;

    fn decode(
        fields: &[&str],
        _resolution: Resolution,
        location: &str,
    ) -> Result<RecordFields, AnnotationError> {
        Ok(RecordFields {
            class_id: parse_class_id(fields[0], location)?,
            confidence: 1.0,
            bbox: BoundingBox::from_corners(
                parse_number(fields[1], "x_min", location)?,
                parse_number(fields[2], "y_min", location)?,
                parse_number(fields[3], "x_max", location)?,
                parse_number(fields[4], "y_max", location)?,
            ),
        })
    }
}

/// Directory-of-frames parser, generic over the line layout.
pub struct FrameTextParser<R: TextRecord> {
    labels: Arc<LabelMap>,
    store: Arc<dyn AnnotationStore>,
    _record: PhantomData<R>,
}

pub type RelXywhParser = FrameTextParser<RelXywh>;
pub type AbsXywhParser = FrameTextParser<AbsXywh>;
pub type YoloParser = FrameTextParser<YoloGroundTruth>;
pub type AbsoluteCornersParser = FrameTextParser<AbsoluteCorners>;

impl<R: TextRecord> FrameTextParser<R> {
    pub fn new(labels: Arc<LabelMap>, store: Arc<dyn AnnotationStore>) -> Self {
        Self {
            labels,
            store,
            _record: PhantomData,
        }
    }

    /// Decode one frame file. Blank lines are skipped.
    pub fn parse_text(
        &self,
        text: &str,
        file: &Path,
        resolution: Resolution,
    ) -> Result<Vec<Detection>, AnnotationError> {
        let mut detections = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            let location = format!("{}:{}", file.display(), index + 1);
            if fields.len() != R::FIELD_COUNT {
                return Err(AnnotationError::malformed(format!(
                    "{} record needs {} fields, found {}",
                    R::FORMAT,
                    R::FIELD_COUNT,
                    fields.len()
                ))
                .at(&location));
            }
            let record = R::decode(&fields, resolution, &location)?;
            let label = self
                .labels
                .name(record.class_id)
                .map_err(|e| e.at(&location))?;
            detections.push(Detection::new(record.bbox, label, record.confidence));
        }
        Ok(detections)
    }
}

impl<R: TextRecord> FormatParser for FrameTextParser<R> {
    fn format(&self) -> AnnotationFormat {
        R::FORMAT
    }

    fn parse(
        &self,
        source: &Path,
        frame_number: u64,
        resolution: Resolution,
    ) -> Result<Vec<Detection>> {
        let listing = self.store.list_dir(source)?;
        let files = select_frame_files(&listing, frame_number)?;
        if files.is_empty() {
            log::debug!(
                "{}: no annotation file for frame {} in {}",
                R::FORMAT,
                frame_number,
                source.display()
            );
        }

        let mut detections = Vec::new();
        for file in files {
            log::debug!("{}: reading {}", R::FORMAT, file.display());
            let text = self.store.read_to_string(&file)?;
            detections.extend(self.parse_text(&text, &file, resolution)?);
        }
        Ok(detections)
    }
}
