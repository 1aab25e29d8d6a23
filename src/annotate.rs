//! Frame annotator: fetches canonical detections for a frame and draws them.

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;

use crate::detection::Detection;
use crate::format::{AnnotationFormat, FormatParser};
use crate::labels::LabelMap;
use crate::render::{Canvas, ImageCanvas, OverlayStyle, PixelRect, CAPTION_OFFSET};
use crate::Resolution;

pub struct FrameAnnotator {
    parser: Box<dyn FormatParser>,
    style: OverlayStyle,
}

impl FrameAnnotator {
    pub fn new(parser: Box<dyn FormatParser>, style: OverlayStyle) -> Self {
        Self { parser, style }
    }

    /// Annotator reading `format` from the real filesystem.
    pub fn for_format(format: AnnotationFormat, labels: Arc<LabelMap>, style: OverlayStyle) -> Self {
        Self::new(format.parser(labels), style)
    }

    pub fn format(&self) -> AnnotationFormat {
        self.parser.format()
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn detections(
        &self,
        source: &Path,
        frame_number: u64,
        resolution: Resolution,
    ) -> Result<Vec<Detection>> {
        self.parser
            .parse(source, frame_number, resolution)
            .with_context(|| format!("{} annotations for frame {}", self.format(), frame_number))
    }

    /// Draw every detection for `frame_number` onto `canvas`; returns the count.
    pub fn annotate_canvas<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        source: &Path,
        frame_number: u64,
        resolution: Resolution,
    ) -> Result<usize> {
        let detections = self.detections(source, frame_number, resolution)?;
        Ok(draw_detections(canvas, &detections, &self.style))
    }

    pub fn annotate_frame(
        &self,
        frame: &mut RgbImage,
        source: &Path,
        frame_number: u64,
        resolution: Resolution,
    ) -> Result<usize> {
        let drawn =
            self.annotate_canvas(&mut ImageCanvas::new(frame), source, frame_number, resolution)?;
        log::debug!("frame {}: {} detections drawn", frame_number, drawn);
        Ok(drawn)
    }
}

/// Box at the truncated pixel rectangle, caption baseline just above its
/// top-left corner. Degenerate boxes only get the caption.
pub fn draw_detections<C: Canvas + ?Sized>(
    canvas: &mut C,
    detections: &[Detection],
    style: &OverlayStyle,
) -> usize {
    for detection in detections {
        let rect = PixelRect::from_bbox(&detection.bbox);
        if rect.is_degenerate() {
            log::debug!("degenerate box for '{}', caption only", detection.label);
        } else {
            canvas.draw_box(rect, style);
        }
        let baseline_y = rect.y.saturating_sub(CAPTION_OFFSET);
        canvas.draw_caption(rect.x, baseline_y, &detection.caption(), style);
    }
    detections.len()
}

/// Annotate one frame in place with the COCO table and the default style
/// (bundled caption font).
pub fn annotate(
    frame: &mut RgbImage,
    frame_number: u64,
    resolution: Resolution,
    source: &Path,
    format: AnnotationFormat,
) -> Result<usize> {
    FrameAnnotator::for_format(format, Arc::new(LabelMap::coco()), OverlayStyle::default())
        .annotate_frame(frame, source, frame_number, resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::MemoryStore;
    use crate::{error_kind, ErrorKind};

    #[derive(Default)]
    struct RecordingCanvas {
        boxes: Vec<PixelRect>,
        captions: Vec<(i32, i32, String)>,
    }

    impl Canvas for RecordingCanvas {
        fn draw_box(&mut self, rect: PixelRect, _style: &OverlayStyle) {
            self.boxes.push(rect);
        }

        fn draw_caption(&mut self, x: i32, baseline_y: i32, text: &str, _style: &OverlayStyle) {
            self.captions.push((x, baseline_y, text.to_string()));
        }
    }

    fn yolo_annotator(files: &[(&str, &str)]) -> Result<FrameAnnotator> {
        let store = MemoryStore::new();
        store.add_dir("gt")?;
        for (name, body) in files {
            store.insert(Path::new("gt").join(name), *body)?;
        }
        let parser = AnnotationFormat::Yolo
            .parser_with_store(Arc::new(LabelMap::coco()), Arc::new(store));
        Ok(FrameAnnotator::new(parser, OverlayStyle::default()))
    }

    #[test]
    fn draws_box_and_caption_above_corner() -> Result<()> {
        let annotator = yolo_annotator(&[("frame0.txt", "1 0.5 0.5 0.2 0.2\n")])?;
        let mut canvas = RecordingCanvas::default();
        let drawn =
            annotator.annotate_canvas(&mut canvas, Path::new("gt"), 0, Resolution::new(100, 100))?;
        assert_eq!(drawn, 1);
        assert_eq!(
            canvas.boxes,
            vec![PixelRect {
                x: 40,
                y: 40,
                width: 20,
                height: 20
            }]
        );
        assert_eq!(canvas.captions, vec![(40, 35, "person: 1.0000".to_string())]);
        Ok(())
    }

    #[test]
    fn empty_frame_leaves_image_untouched() -> Result<()> {
        let annotator = yolo_annotator(&[("frame0.txt", "1 0.5 0.5 0.2 0.2\n")])?;
        let mut frame = RgbImage::new(16, 16);
        let before = frame.clone();
        let drawn = annotator.annotate_frame(&mut frame, Path::new("gt"), 5, Resolution::new(16, 16))?;
        assert_eq!(drawn, 0);
        assert_eq!(frame, before);
        Ok(())
    }

    #[test]
    fn annotated_frame_has_box_pixels() -> Result<()> {
        let annotator = yolo_annotator(&[("frame2.txt", "1 0.5 0.5 0.5 0.5\n")])?;
        let mut frame = RgbImage::new(32, 32);
        annotator.annotate_frame(&mut frame, Path::new("gt"), 2, Resolution::new(32, 32))?;
        assert_eq!(frame.get_pixel(8, 8).0, crate::render::DEFAULT_BOX_COLOR);
        assert_eq!(frame.get_pixel(16, 16).0, [0, 0, 0]);
        Ok(())
    }

    #[test]
    fn degenerate_box_draws_caption_only() {
        let detections = vec![Detection::new(
            crate::BoundingBox::new(3.0, 9.0, 0.5, 4.0),
            "car",
            0.5,
        )];
        let mut canvas = RecordingCanvas::default();
        let drawn = draw_detections(&mut canvas, &detections, &OverlayStyle::default());
        assert_eq!(drawn, 1);
        assert!(canvas.boxes.is_empty());
        assert_eq!(canvas.captions, vec![(3, 4, "car: 0.5000".to_string())]);
    }

    #[test]
    fn extreme_coordinates_are_drawn_without_overflow() -> Result<()> {
        let store = MemoryStore::new();
        store.add_dir("gt")?;
        store.insert(
            "gt/frame0.txt",
            "1 0.9 0 -1e12 10 10\n1 0.9 1e12 1e12 1e12 1e12\n1 0.9 -1e12 -1e12 2e12 2e12\n",
        )?;
        let parser = AnnotationFormat::AbsXywh
            .parser_with_store(Arc::new(LabelMap::coco()), Arc::new(store));
        let annotator = FrameAnnotator::new(parser, OverlayStyle::default());

        let mut frame = RgbImage::new(32, 32);
        let drawn = annotator.annotate_frame(&mut frame, Path::new("gt"), 0, Resolution::new(32, 32))?;
        assert_eq!(drawn, 3);

        let mut canvas = RecordingCanvas::default();
        annotator.annotate_canvas(&mut canvas, Path::new("gt"), 0, Resolution::new(32, 32))?;
        assert_eq!(canvas.captions[0].1, i32::MIN);
        Ok(())
    }

    #[test]
    fn annotate_draws_caption_above_box() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("frame0.txt"), "1 0.9 10 40 40 20\n")?;
        let mut frame = RgbImage::new(100, 100);
        let drawn = annotate(
            &mut frame,
            0,
            Resolution::new(100, 100),
            dir.path(),
            AnnotationFormat::AbsXywh,
        )?;
        assert_eq!(drawn, 1);

        // the box starts at row 40; everything above it is caption
        let caption_pixels = (0..40)
            .flat_map(|y| (0..100).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.get_pixel(x, y).0 != [0, 0, 0])
            .count();
        assert!(caption_pixels > 0);
        assert_eq!(frame.get_pixel(10, 40).0, crate::render::DEFAULT_BOX_COLOR);
        Ok(())
    }

    #[test]
    fn parse_errors_keep_their_kind() -> Result<()> {
        let annotator = yolo_annotator(&[("frame0.txt", "1 0.5 0.5 0.2\n")])?;
        let mut canvas = RecordingCanvas::default();
        let err = annotator
            .annotate_canvas(&mut canvas, Path::new("gt"), 0, Resolution::new(100, 100))
            .unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::MalformedRecord));
        assert!(canvas.boxes.is_empty());
        Ok(())
    }
}
