//! opendatacam YOLO JSON.
//!
//! ```json
//! [
//!   {"frame_id": 0, "objects": [
//!     {"class_id": 0, "name": "person",
//!      "relative_coordinates": {"center_x": 0.5, "center_y": 0.5, "width": 0.1, "height": 0.2},
//!      "confidence": 0.93}
//!   ]}
//! ]
//! ```
//!
//! The exporter numbers classes from the first real COCO category, so the
//! label index is `class_id + 1` into the torchvision table.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use super::cache::SourceCache;
use super::store::AnnotationStore;
use super::{AnnotationFormat, FormatParser};
use crate::detection::{BoundingBox, Detection};
use crate::labels::LabelMap;
use crate::{AnnotationError, Resolution};

#[derive(Debug, Deserialize)]
struct FrameEntry {
    frame_id: u64,
    #[serde(default)]
    objects: Vec<ObjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    class_id: i64,
    relative_coordinates: RelativeCoordinates,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct RelativeCoordinates {
    center_x: f64,
    center_y: f64,
    width: f64,
    height: f64,
}

pub struct OpenDataCamParser {
    labels: Arc<LabelMap>,
    store: Arc<dyn AnnotationStore>,
    cache: SourceCache<Vec<FrameEntry>>,
}

impl OpenDataCamParser {
    pub fn new(labels: Arc<LabelMap>, store: Arc<dyn AnnotationStore>) -> Self {
        Self {
            labels,
            store,
            cache: SourceCache::new(),
        }
    }
}

impl FormatParser for OpenDataCamParser {
    fn format(&self) -> AnnotationFormat {
        AnnotationFormat::OpenDataCamYolo
    }

    fn parse(
        &self,
        source: &Path,
        frame_number: u64,
        resolution: Resolution,
    ) -> Result<Vec<Detection>> {
        let frames = self.cache.get_or_load(self.store.as_ref(), source, |text| {
            serde_json::from_str::<Vec<FrameEntry>>(text).map_err(|e| {
                AnnotationError::malformed(format!("invalid opendatacam JSON: {}", e))
                    .at(source.display())
                    .into()
            })
        })?;

        // Entries are filtered rather than scanned until the first larger
        // frame_id, so exporters that write frames out of order still resolve.
        let mut detections = Vec::new();
        for (entry_index, entry) in frames
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.frame_id == frame_number)
        {
            for (object_index, object) in entry.objects.iter().enumerate() {
                let coords = &object.relative_coordinates;
                let bbox = BoundingBox::from_relative_center(
                    coords.center_x,
                    coords.center_y,
                    coords.width,
                    coords.height,
                    resolution,
                );
                let label = self
                    .labels
                    .name(object.class_id.saturating_add(1))
                    .map_err(|e| {
                        e.at(format!(
                            "{}: entry {} object {}",
                            source.display(),
                            entry_index,
                            object_index
                        ))
                    })?;
                detections.push(Detection::new(bbox, label, object.confidence));
            }
        }

        log::debug!(
            "opendatacam: {} detections for frame {} in {}",
            detections.len(),
            frame_number,
            source.display()
        );
        Ok(detections)
    }
}
