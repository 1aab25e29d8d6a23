//! OpenImages-style CSV.
//!
//! ```text
//! ImageID,Source,LabelName,Confidence,XMin,XMax,YMin,YMax,IsOccluded,IsTruncated,IsGroupOf,IsDepiction,IsInside
//! frame3.jpg,xclick,person,0.9,10,50,20,80,0,0,0,0,0
//! ```
//!
//! Coordinates are absolute integer corners; note the X/X/Y/Y column order.
//! The label column is used verbatim, there is no class table lookup.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use super::cache::SourceCache;
use super::store::AnnotationStore;
use super::{parse_number, AnnotationFormat, FormatParser};
use crate::detection::{BoundingBox, Detection};
use crate::{AnnotationError, Resolution};

const MIN_FIELDS: usize = 8;

struct CsvRow {
    line: usize,
    image_id: u64,
    text: String,
}

pub struct OpenImagesParser {
    store: Arc<dyn AnnotationStore>,
    cache: SourceCache<Vec<CsvRow>>,
}

impl OpenImagesParser {
    pub fn new(store: Arc<dyn AnnotationStore>) -> Self {
        Self {
            store,
            cache: SourceCache::new(),
        }
    }
}

/// Frame number embedded in an image id such as `frame12.jpg`: the text after
/// the first `frame` and before the first `.jpg`.
fn image_id_frame(field: &str) -> Option<u64> {
    let rest = field.split("frame").nth(1)?;
    let digits = rest.split(".jpg").next()?;
    digits.trim().parse().ok()
}

/// Index every row by image id. Coordinates are only decoded for rows that
/// are actually requested.
fn index_rows(text: &str, source: &Path) -> Result<Vec<CsvRow>> {
    let mut rows = Vec::new();
    // first line is the header
    for (index, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;
        let id_field = line.split(',').next().unwrap_or_default();
        let image_id = image_id_frame(id_field).ok_or_else(|| {
            AnnotationError::malformed(format!(
                "image id '{}' does not embed a frame number",
                id_field
            ))
            .at(format!("{}:{}", source.display(), line_no))
        })?;
        rows.push(CsvRow {
            line: line_no,
            image_id,
            text: line.to_string(),
        });
    }
    Ok(rows)
}

fn parse_corner(field: &str, name: &str, location: &str) -> Result<i64, AnnotationError> {
    field.trim().parse::<i64>().map_err(|_| {
        AnnotationError::malformed(format!("{} '{}' is not an integer", name, field)).at(location)
    })
}

fn decode_row(row: &CsvRow, source: &Path) -> Result<Detection, AnnotationError> {
    let location = format!("{}:{}", source.display(), row.line);
    let fields: Vec<&str> = row.text.split(',').collect();
    if fields.len() < MIN_FIELDS {
        return Err(AnnotationError::malformed(format!(
            "expected at least {} fields, found {}",
            MIN_FIELDS,
            fields.len()
        ))
        .at(&location));
    }
    let confidence = parse_number(fields[3], "confidence", &location)?;
    let x_min = parse_corner(fields[4], "XMin", &location)?;
    let x_max = parse_corner(fields[5], "XMax", &location)?;
    let y_min = parse_corner(fields[6], "YMin", &location)?;
    let y_max = parse_corner(fields[7], "YMax", &location)?;

    Ok(Detection::new(
        BoundingBox::from_corners(x_min as f64, y_min as f64, x_max as f64, y_max as f64),
        fields[2],
        confidence,
    ))
}

impl FormatParser for OpenImagesParser {
    fn format(&self) -> AnnotationFormat {
        AnnotationFormat::OpenImages
    }

    fn parse(
        &self,
        source: &Path,
        frame_number: u64,
        _resolution: Resolution,
    ) -> Result<Vec<Detection>> {
        let rows = self
            .cache
            .get_or_load(self.store.as_ref(), source, |text| index_rows(text, source))?;

        let mut detections = Vec::new();
        for row in rows.iter().filter(|row| row.image_id == frame_number) {
            detections.push(decode_row(row, source)?);
        }
        log::debug!(
            "openimages: {} detections for frame {} in {}",
            detections.len(),
            frame_number,
            source.display()
        );
        Ok(detections)
    }
}
