//! Image-annotation capability.
//!
//! The annotator only needs two primitives: a hollow rectangle and a line of
//! text. `Canvas` abstracts them so annotation logic can be exercised without
//! pixels; `ImageCanvas` draws onto an `RgbImage` with `imageproc`.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;
use std::sync::OnceLock;

use crate::config::RenderSettings;
use crate::detection::BoundingBox;
use crate::AnnotationError;

/// Default box colour, RGB.
pub const DEFAULT_BOX_COLOR: [u8; 3] = [0, 255, 155];
/// Border width in pixels. The stroke grows inward from the box edge rather
/// than being centred on it.
pub const DEFAULT_THICKNESS: u32 = 2;
pub const MAX_THICKNESS: u32 = 64;
pub const DEFAULT_FONT_SCALE: f32 = 16.0;
/// Gap between the caption baseline and the top edge of the box.
pub const CAPTION_OFFSET: i32 = 5;

static BUNDLED_FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// DejaVu Sans, compiled into the binary.
pub fn bundled_font() -> FontArc {
    static FONT: OnceLock<FontArc> = OnceLock::new();
    FONT.get_or_init(|| {
        FontArc::try_from_slice(BUNDLED_FONT_DATA).expect("bundled font is a valid TTF")
    })
    .clone()
}

/// Integer pixel rectangle, truncated from a canonical box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    /// Truncates toward zero, matching an integer cast of each component.
    /// Out-of-range values saturate at the `i32` bounds.
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self {
            x: bbox.x as i32,
            y: bbox.y as i32,
            width: bbox.width as i32,
            height: bbox.height as i32,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width < 1 || self.height < 1
    }

    /// Intersect with `[-margin, width + margin) x [-margin, height + margin)`.
    ///
    /// Edges cut by the clip land at least `margin` pixels outside the image,
    /// so with `margin >= thickness` the visible outline is unchanged.
    pub fn clipped_to(&self, width: u32, height: u32, margin: i32) -> Option<Self> {
        let margin = i64::from(margin);
        let left = i64::from(self.x).max(-margin);
        let top = i64::from(self.y).max(-margin);
        let right = (i64::from(self.x) + i64::from(self.width)).min(i64::from(width) + margin);
        let bottom = (i64::from(self.y) + i64::from(self.height)).min(i64::from(height) + margin);
        if right <= left || bottom <= top {
            return None;
        }
        // every bound is within the image grown by `margin`, which fits in i32
        Some(Self {
            x: left as i32,
            y: top as i32,
            width: (right - left) as i32,
            height: (bottom - top) as i32,
        })
    }
}

#[derive(Clone, Debug)]
pub struct OverlayStyle {
    pub color: Rgb<u8>,
    pub thickness: u32,
    pub font_scale: f32,
    pub font: FontArc,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Rgb(DEFAULT_BOX_COLOR),
            thickness: DEFAULT_THICKNESS,
            font_scale: DEFAULT_FONT_SCALE,
            font: bundled_font(),
        }
    }
}

impl OverlayStyle {
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = font;
        self
    }

    /// Style for a run. A configured font must load; without one the bundled
    /// font is used.
    pub fn from_settings(settings: &RenderSettings) -> Result<Self> {
        let style = Self {
            thickness: settings.thickness,
            font_scale: settings.font_scale,
            ..Self::default()
        };
        let Some(path) = settings.font_path.as_deref() else {
            return Ok(style);
        };
        let font = load_font(path).map_err(|e| {
            AnnotationError::invalid_config(format!("font {}: {:#}", path.display(), e))
        })?;
        log::debug!("caption font {}", path.display());
        Ok(style.with_font(font))
    }
}

/// Load a TTF/OTF font from disk.
pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading font file {}", path.display()))?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| anyhow::anyhow!("invalid font file {}: {}", path.display(), e))
}

/// Something boxes and captions can be drawn on.
pub trait Canvas {
    fn draw_box(&mut self, rect: PixelRect, style: &OverlayStyle);

    /// Draw `text` with its baseline at `baseline_y`, starting at `x`.
    fn draw_caption(&mut self, x: i32, baseline_y: i32, text: &str, style: &OverlayStyle);
}

/// Draws directly onto an RGB frame.
pub struct ImageCanvas<'a> {
    image: &'a mut RgbImage,
}

impl<'a> ImageCanvas<'a> {
    pub fn new(image: &'a mut RgbImage) -> Self {
        Self { image }
    }
}

impl Canvas for ImageCanvas<'_> {
    fn draw_box(&mut self, rect: PixelRect, style: &OverlayStyle) {
        if rect.is_degenerate() {
            return;
        }
        let thickness = style.thickness.min(MAX_THICKNESS) as i32;
        let (image_w, image_h) = self.image.dimensions();
        let Some(rect) = rect.clipped_to(image_w, image_h, thickness) else {
            return;
        };
        // Thickness grows inward so the outer edge stays on the annotated box.
        for t in 0..thickness {
            let width = rect.width - 2 * t;
            let height = rect.height - 2 * t;
            if width < 1 || height < 1 {
                break;
            }
            draw_hollow_rect_mut(
                self.image,
                Rect::at(rect.x + t, rect.y + t).of_size(width as u32, height as u32),
                style.color,
            );
        }
    }

    fn draw_caption(&mut self, x: i32, baseline_y: i32, text: &str, style: &OverlayStyle) {
        let scale = PxScale::from(style.font_scale);
        let scaled = style.font.as_scaled(scale);
        let (text_w, _) = text_size(scale, &style.font, text);
        let (image_w, image_h) = self.image.dimensions();
        // draw_text_mut puts the baseline `ascent` pixels below its y
        let top = i64::from(baseline_y) - scaled.ascent().ceil() as i64;
        let bottom = i64::from(baseline_y) + (-scaled.descent()).ceil() as i64;
        let visible = i64::from(x) < i64::from(image_w)
            && i64::from(x) + i64::from(text_w) >= 0
            && bottom >= 0
            && top < i64::from(image_h);
        if !visible {
            return;
        }
        draw_text_mut(
            self.image,
            style.color,
            x,
            top as i32,
            scale,
            &style.font,
            text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_rect_truncates_toward_zero() {
        let rect = PixelRect::from_bbox(&BoundingBox::new(39.9, -0.5, 20.7, 10.2));
        assert_eq!(
            rect,
            PixelRect {
                x: 39,
                y: 0,
                width: 20,
                height: 10
            }
        );
        assert!(PixelRect::from_bbox(&BoundingBox::new(0.0, 0.0, 0.9, 5.0)).is_degenerate());
    }

    #[test]
    fn box_outline_is_drawn_inside_bounds() {
        let mut image = RgbImage::new(20, 20);
        let style = OverlayStyle::default();
        ImageCanvas::new(&mut image).draw_box(
            PixelRect {
                x: 2,
                y: 3,
                width: 10,
                height: 8,
            },
            &style,
        );
        let color = Rgb(DEFAULT_BOX_COLOR);
        // outer and inner ring of a 2px border
        assert_eq!(*image.get_pixel(2, 3), color);
        assert_eq!(*image.get_pixel(3, 4), color);
        assert_eq!(*image.get_pixel(11, 10), color);
        // interior untouched
        assert_eq!(*image.get_pixel(6, 7), Rgb([0, 0, 0]));
        // outside untouched
        assert_eq!(*image.get_pixel(1, 3), Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_partly_off_frame_do_not_panic() {
        let mut image = RgbImage::new(10, 10);
        let style = OverlayStyle::default();
        let mut canvas = ImageCanvas::new(&mut image);
        canvas.draw_box(
            PixelRect {
                x: -5,
                y: -5,
                width: 30,
                height: 30,
            },
            &style,
        );
        canvas.draw_box(
            PixelRect {
                x: 0,
                y: 0,
                width: 0,
                height: 4,
            },
            &style,
        );
        canvas.draw_caption(0, -3, "person: 1.0000", &style);
    }

    #[test]
    fn missing_font_file_is_an_error() {
        assert!(load_font(Path::new("/nonexistent/font.ttf")).is_err());
    }

    #[test]
    fn configured_font_must_load() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font")?;
        let settings = RenderSettings {
            font_path: Some(bogus),
            thickness: 3,
            ..RenderSettings::default()
        };
        let err = OverlayStyle::from_settings(&settings).unwrap_err();
        assert_eq!(
            crate::error_kind(&err),
            Some(crate::ErrorKind::InvalidConfig)
        );
        Ok(())
    }

    #[test]
    fn settings_without_font_use_bundled_font() -> anyhow::Result<()> {
        let settings = RenderSettings {
            thickness: 3,
            ..RenderSettings::default()
        };
        let style = OverlayStyle::from_settings(&settings)?;
        assert_eq!(style.thickness, 3);
        assert_eq!(style.color, Rgb(DEFAULT_BOX_COLOR));

        let mut image = RgbImage::new(120, 40);
        ImageCanvas::new(&mut image).draw_caption(2, 30, "person: 0.9000", &style);
        assert!(image.pixels().any(|p| p.0 != [0, 0, 0]));
        Ok(())
    }

    #[test]
    fn caption_sits_above_baseline() {
        let mut image = RgbImage::new(120, 60);
        ImageCanvas::new(&mut image).draw_caption(
            4,
            35,
            "car: 0.5000",
            &OverlayStyle::default(),
        );
        let lit_rows: Vec<u32> = (0..60)
            .filter(|&y| (0..120).any(|x| image.get_pixel(x, y).0 != [0, 0, 0]))
            .collect();
        // no descenders in the text, so nothing lands more than a pixel below
        assert!(!lit_rows.is_empty());
        assert!(lit_rows.iter().all(|&y| y <= 36));
        assert!(lit_rows[0] >= 35 - DEFAULT_FONT_SCALE as u32);
    }

    #[test]
    fn clipping_keeps_on_frame_rects() {
        let rect = PixelRect {
            x: 2,
            y: 3,
            width: 10,
            height: 8,
        };
        assert_eq!(rect.clipped_to(20, 20, 2), Some(rect));
        assert_eq!(
            PixelRect {
                x: i32::MIN,
                y: 5,
                width: 10,
                height: 4
            }
            .clipped_to(20, 20, 2),
            None
        );
        assert_eq!(
            PixelRect {
                x: -1_000_000,
                y: 5,
                width: 1_000_010,
                height: 4
            }
            .clipped_to(20, 20, 2),
            Some(PixelRect {
                x: -2,
                y: 5,
                width: 12,
                height: 4
            })
        );
    }

    #[test]
    fn saturated_coordinates_do_not_panic() {
        let mut image = RgbImage::new(16, 16);
        let style = OverlayStyle::default();
        let mut canvas = ImageCanvas::new(&mut image);
        for rect in [
            PixelRect::from_bbox(&BoundingBox::new(0.0, -1e12, 10.0, 10.0)),
            PixelRect::from_bbox(&BoundingBox::new(1e12, 1e12, 1e12, 1e12)),
            PixelRect::from_bbox(&BoundingBox::new(-1e12, -1e12, 1e12, 1e12)),
            PixelRect {
                x: i32::MAX,
                y: i32::MAX,
                width: i32::MAX,
                height: i32::MAX,
            },
        ] {
            canvas.draw_box(rect, &style);
            canvas.draw_caption(rect.x, rect.y.saturating_sub(CAPTION_OFFSET), "x: 1.0000", &style);
        }
        canvas.draw_caption(i32::MIN, i32::MIN, "x: 1.0000", &style);
        canvas.draw_caption(i32::MAX, i32::MAX, "x: 1.0000", &style);
    }

    #[test]
    fn box_spanning_the_frame_outlines_only_its_visible_edges() {
        let mut image = RgbImage::new(16, 16);
        // left edge far off frame, right edge at x = 9
        ImageCanvas::new(&mut image).draw_box(
            PixelRect {
                x: -2_000_000_000,
                y: 2,
                width: 2_000_000_010,
                height: 8,
            },
            &OverlayStyle::default(),
        );
        let color = Rgb(DEFAULT_BOX_COLOR);
        assert_eq!(*image.get_pixel(9, 5), color);
        assert_eq!(*image.get_pixel(0, 2), color);
        assert_eq!(*image.get_pixel(0, 5), Rgb([0, 0, 0]));
    }
}
