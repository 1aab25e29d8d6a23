//! Faster R-CNN JSON dump.
//!
//! A flat list of detections, `image_id` being the zero-indexed frame:
//!
//! ```json
//! [{"image_id": 0, "category_id": 1, "bbox": [x_min, y_min, x_max, y_max], "confidence_score": 0.997}]
//! ```
//!
//! `category_id` indexes the label table directly (torchvision numbering).

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
struct FasterRecord {
    image_id: u64,
    category_id: i64,
    bbox: [f64; 4],
    confidence_score: f64,
}

pub struct FasterParser {
    labels: Arc<LabelMap>,
    store: Arc<dyn AnnotationStore>,
    cache: SourceCache<Vec<FasterRecord>>,
}

impl FasterParser {
    pub fn new(labels: Arc<LabelMap>, store: Arc<dyn AnnotationStore>) -> Self {
        Self {
            labels,
            store,
            cache: SourceCache::new(),
        }
    }
}

impl FormatParser for FasterParser {
    fn format(&self) -> AnnotationFormat {
        AnnotationFormat::Faster
    }

    fn parse(
        &self,
        source: &Path,
        frame_number: u64,
        _resolution: Resolution,
    ) -> Result<Vec<Detection>> {
        let records = self.cache.get_or_load(self.store.as_ref(), source, |text| {
            serde_json::from_str::<Vec<FasterRecord>>(text).map_err(|e| {
                AnnotationError::malformed(format!("invalid faster-rcnn JSON: {}", e))
                    .at(source.display())
                    .into()
            })
        })?;

        records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.image_id == frame_number)
            .map(|(index, record)| -> Result<Detection> {
                let [x_min, y_min, x_max, y_max] = record.bbox;
                let label = self
                    .labels
                    .name(record.category_id)
                    .map_err(|e| e.at(format!("{}: record {}", source.display(), index)))?;
                Ok(Detection::new(
                    BoundingBox::from_corners(x_min, y_min, x_max, y_max),
                    label,
                    record.confidence_score,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::store::MemoryStore;
    use crate::{error_kind, ErrorKind};

    fn parser_with(json: &str) -> Result<FasterParser> {
        let store = MemoryStore::new();
        store.insert("faster.json", json)?;
        Ok(FasterParser::new(Arc::new(LabelMap::coco()), Arc::new(store)))
    }

    #[test]
    fn decodes_corner_boxes_for_frame() -> Result<()> {
        let parser = parser_with(
            r#"[
                {"image_id": 0, "category_id": 1, "bbox": [10.5, 20.0, 50.5, 80.0], "confidence_score": 0.9972374439239502},
                {"image_id": 1, "category_id": 3, "bbox": [0, 0, 4, 4], "confidence_score": 0.5},
                {"image_id": 0, "category_id": 18, "bbox": [1, 2, 3, 4], "confidence_score": 0.25}
            ]"#,
        )?;
        let dets = parser.parse(Path::new("faster.json"), 0, Resolution::new(1, 1))?;
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].bbox, BoundingBox::new(10.5, 20.0, 40.0, 60.0));
        assert_eq!(dets[0].label, "person");
        assert_eq!(dets[0].confidence, 0.9972374439239502);
        assert_eq!(dets[1].label, "dog");
        Ok(())
    }

    #[test]
    fn short_bbox_is_malformed() -> Result<()> {
        let parser = parser_with(
            r#"[{"image_id": 0, "category_id": 1, "bbox": [1, 2, 3], "confidence_score": 0.5}]"#,
        )?;
        let err = parser
            .parse(Path::new("faster.json"), 0, Resolution::new(1, 1))
            .unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::MalformedRecord));
        Ok(())
    }

    #[test]
    fn unknown_category_names_record() -> Result<()> {
        let parser = parser_with(
            r#"[{"image_id": 0, "category_id": 500, "bbox": [1, 2, 3, 4], "confidence_score": 0.5}]"#,
        )?;
        let err = parser
            .parse(Path::new("faster.json"), 0, Resolution::new(1, 1))
            .unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::UnknownClass));
        assert!(err.to_string().contains("record 0"));
        Ok(())
    }
}
