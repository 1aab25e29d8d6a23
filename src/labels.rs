//! Class id → label name tables.
//!
//! Detectors number their classes differently. The tables here are plain
//! ordered lists; each format decides which index to look up (opendatacam
//! JSON is off by one, everything else indexes directly).

use anyhow::{Context, Result};
use std::path::Path;

use crate::AnnotationError;

/// torchvision COCO instance categories. Index 0 is the background class and
/// the `N/A` entries are ids unused by the 2017 COCO release.
pub const COCO_INSTANCE_CATEGORY_NAMES: [&str; 91] = [
    "__background__",
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "N/A",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "N/A",
    "backpack",
    "umbrella",
    "N/A",
    "N/A",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "N/A",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "N/A",
    "dining table",
    "N/A",
    "N/A",
    "toilet",
    "N/A",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "N/A",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Ordered class name table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn coco() -> Self {
        Self::new(
            COCO_INSTANCE_CATEGORY_NAMES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        )
    }

    /// Load a newline-delimited name list. Line `i` names class index `i`;
    /// trailing whitespace is dropped and a final empty line is ignored.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AnnotationError::io(format!(
                "failed to read label file {}: {}",
                path.display(),
                e
            ))
        })?;
        let names: Vec<String> = raw.lines().map(|line| line.trim_end().to_string()).collect();
        if names.is_empty() {
            return Err(AnnotationError::invalid_config(format!(
                "label file {} is empty",
                path.display()
            ))
            .into());
        }
        log::debug!("loaded {} labels from {}", names.len(), path.display());
        Ok(Self::new(names))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolve a class index. Negative or out-of-range indices are `UnknownClass`.
    pub fn name(&self, index: i64) -> Result<&str, AnnotationError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
            .ok_or_else(|| {
                AnnotationError::unknown_class(format!(
                    "class index {} outside label map of {} names",
                    index,
                    self.names.len()
                ))
            })
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::coco()
    }
}

/// Load labels from `path` when given, COCO otherwise.
pub fn load_label_map(path: Option<&Path>) -> Result<LabelMap> {
    match path {
        Some(path) => LabelMap::from_file(path)
            .with_context(|| format!("loading label map from {}", path.display())),
        None => Ok(LabelMap::coco()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::io::Write;

    #[test]
    fn coco_table_is_torchvision_ordering() {
        let labels = LabelMap::coco();
        assert_eq!(labels.len(), 91);
        assert_eq!(labels.name(0).unwrap(), "__background__");
        assert_eq!(labels.name(1).unwrap(), "person");
        assert_eq!(labels.name(3).unwrap(), "car");
        assert_eq!(labels.name(12).unwrap(), "N/A");
        assert_eq!(labels.name(90).unwrap(), "toothbrush");
    }

    #[test]
    fn out_of_range_is_unknown_class() {
        let labels = LabelMap::coco();
        assert_eq!(labels.name(91).unwrap_err().kind, ErrorKind::UnknownClass);
        assert_eq!(labels.name(-1).unwrap_err().kind, ErrorKind::UnknownClass);
    }

    #[test]
    fn loads_custom_label_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"pedestrian\ncyclist \nvan\n")?;
        let labels = LabelMap::from_file(file.path())?;
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.name(1)?, "cyclist");
        assert_eq!(labels.name(2)?, "van");
        Ok(())
    }

    #[test]
    fn missing_label_file_is_io_failure() {
        let err = load_label_map(Some(Path::new("/nonexistent/labels.txt"))).unwrap_err();
        assert_eq!(crate::error_kind(&err), Some(ErrorKind::IoFailure));
    }
}
