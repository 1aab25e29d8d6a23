//! Canonical detection types.
//!
//! Every annotation format is normalized into a `BoundingBox` expressed as
//! top-left corner plus extent, in absolute pixels. No validation is applied:
//! malformed input can produce negative widths or heights.

use crate::Resolution;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// top-left x, pixels
    pub x: f64,
    /// top-left y, pixels
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from absolute corner coordinates.
    pub fn from_corners(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self::new(x_min, y_min, x_max - x_min, y_max - y_min)
    }

    /// Build from a center/extent box given as fractions of the frame size.
    pub fn from_relative_center(
        center_x: f64,
        center_y: f64,
        width: f64,
        height: f64,
        resolution: Resolution,
    ) -> Self {
        let frame_w = resolution.width as f64;
        let frame_h = resolution.height as f64;
        let center_x = center_x * frame_w;
        let center_y = center_y * frame_h;
        let width = width * frame_w;
        let height = height * frame_h;
        Self::new(
            center_x - (width / 2.0),
            center_y - (height / 2.0),
            width,
            height,
        )
    }

    pub fn x_max(&self) -> f64 {
        self.x + self.width
    }

    pub fn y_max(&self) -> f64 {
        self.y + self.height
    }
}

/// One recognized object in one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    /// 1.0 for ground-truth formats that carry no score.
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }

    /// Caption drawn above the box, e.g. `person: 0.9000`.
    pub fn caption(&self) -> String {
        format!("{}: {:.4}", self.label, self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_center_converts_to_top_left() {
        let b = BoundingBox::from_relative_center(0.5, 0.5, 0.2, 0.2, Resolution::new(100, 100));
        assert_eq!(b, BoundingBox::new(40.0, 40.0, 20.0, 20.0));
    }

    #[test]
    fn odd_pixel_extents_keep_their_fractions() {
        // 0.25 * 84 = 21 -> corner 42 - 10.5 = 31.5
        let small = BoundingBox::from_relative_center(0.5, 0.5, 0.25, 0.25, Resolution::new(84, 84));
        assert_eq!(small, BoundingBox::new(31.5, 31.5, 21.0, 21.0));

        let large =
            BoundingBox::from_relative_center(0.5, 0.5, 0.25, 0.25, Resolution::new(168, 168));
        assert_eq!(large.x, small.x * 2.0);
        assert_eq!(large.width, small.width * 2.0);
    }

    #[test]
    fn corners_round_trip() {
        let b = BoundingBox::from_corners(10.0, 20.0, 50.0, 80.0);
        assert_eq!(b.width, 40.0);
        assert_eq!(b.height, 60.0);
        assert_eq!(b.x_max(), 50.0);
        assert_eq!(b.y_max(), 80.0);
    }

    #[test]
    fn caption_uses_four_decimals() {
        let d = Detection::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), "person", 0.9);
        assert_eq!(d.caption(), "person: 0.9000");
        let d = Detection::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), "car", 0.123456);
        assert_eq!(d.caption(), "car: 0.1235");
    }
}
