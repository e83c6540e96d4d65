//! Detected subject regions.

use serde::{Deserialize, Serialize};

/// A region of interest found by a detection backend in one frame.
///
/// Coordinates are in source-frame pixels with the origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedRegion {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Region width
    pub width: f64,
    /// Region height
    pub height: f64,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f64,
    /// Whether the backend marked this region as the active speaker
    #[serde(default)]
    pub is_primary_speaker: bool,
}

impl DetectedRegion {
    /// Create a new region.
    pub fn new(x: f64, y: f64, width: f64, height: f64, confidence: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: confidence.clamp(0.0, 1.0),
            is_primary_speaker: false,
        }
    }

    /// Mark the region as the active speaker.
    pub fn with_speaker(mut self, is_primary_speaker: bool) -> Self {
        self.is_primary_speaker = is_primary_speaker;
        self
    }

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Center y-coordinate.
    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Region area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Area weighted by confidence, used to rank regions by prominence.
    #[inline]
    pub fn significance(&self) -> f64 {
        self.area() * self.confidence
    }

    /// Clip the region to the frame, dropping any part outside it.
    ///
    /// Returns `None` when nothing of the region remains inside the frame.
    pub fn clip_to_frame(&self, frame_width: u32, frame_height: u32) -> Option<DetectedRegion> {
        let fw = frame_width as f64;
        let fh = frame_height as f64;

        let x1 = self.x.max(0.0);
        let y1 = self.y.max(0.0);
        let x2 = (self.x + self.width).min(fw);
        let y2 = (self.y + self.height).min(fh);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(DetectedRegion {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            ..*self
        })
    }

    /// Pick the most prominent region (largest `area × confidence`).
    ///
    /// Ties resolve to the earliest region in the slice.
    pub fn most_significant(regions: &[DetectedRegion]) -> Option<DetectedRegion> {
        regions.iter().fold(None, |best: Option<DetectedRegion>, r| match best {
            Some(b) if b.significance() >= r.significance() => Some(b),
            _ => Some(*r),
        })
    }

    /// Pick the largest region by area, ignoring confidence.
    ///
    /// Ties resolve to the earliest region in the slice.
    pub fn largest(regions: &[DetectedRegion]) -> Option<DetectedRegion> {
        regions.iter().fold(None, |best: Option<DetectedRegion>, r| match best {
            Some(b) if b.area() >= r.area() => Some(b),
            _ => Some(*r),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_center_and_area() {
        let r = DetectedRegion::new(100.0, 50.0, 200.0, 100.0, 0.9);
        assert_eq!(r.cx(), 200.0);
        assert_eq!(r.cy(), 100.0);
        assert_eq!(r.area(), 20_000.0);
        assert!((r.significance() - 18_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_clamped() {
        let r = DetectedRegion::new(0.0, 0.0, 10.0, 10.0, 1.7);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn test_most_significant_weighs_confidence() {
        let big_unsure = DetectedRegion::new(0.0, 0.0, 200.0, 200.0, 0.1);
        let small_sure = DetectedRegion::new(500.0, 0.0, 100.0, 100.0, 0.9);

        let best = DetectedRegion::most_significant(&[big_unsure, small_sure]).unwrap();
        assert_eq!(best.x, 500.0);

        let largest = DetectedRegion::largest(&[big_unsure, small_sure]).unwrap();
        assert_eq!(largest.x, 0.0);
    }

    #[test]
    fn test_most_significant_tie_keeps_first() {
        let a = DetectedRegion::new(0.0, 0.0, 100.0, 100.0, 0.5);
        let b = DetectedRegion::new(300.0, 0.0, 100.0, 100.0, 0.5);
        assert_eq!(DetectedRegion::most_significant(&[a, b]).unwrap().x, 0.0);
        assert!(DetectedRegion::most_significant(&[]).is_none());
    }

    #[test]
    fn test_clip_to_frame() {
        let r = DetectedRegion::new(-50.0, 900.0, 200.0, 400.0, 0.8);
        let clipped = r.clip_to_frame(1920, 1080).unwrap();
        assert_eq!(clipped.x, 0.0);
        assert_eq!(clipped.width, 150.0);
        assert_eq!(clipped.height, 180.0);

        let outside = DetectedRegion::new(2000.0, 0.0, 10.0, 10.0, 0.8);
        assert!(outside.clip_to_frame(1920, 1080).is_none());
    }

    #[test]
    fn test_speaker_flag_defaults_false_in_json() {
        let json = r#"{"x":1.0,"y":2.0,"width":3.0,"height":4.0,"confidence":0.5}"#;
        let r: DetectedRegion = serde_json::from_str(json).unwrap();
        assert!(!r.is_primary_speaker);
    }
}
