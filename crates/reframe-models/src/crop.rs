//! Per-frame crop windows and aspect ratios.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::strategy::CropStrategy;

/// Crop window for one output frame, expressed as a center and a box size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropFrame {
    /// Window center x-coordinate in source pixels
    pub center_x: f64,
    /// Window center y-coordinate in source pixels
    pub center_y: f64,
    /// Window width in source pixels
    pub crop_width: u32,
    /// Window height in source pixels
    pub crop_height: u32,
    /// Strategy that produced this window
    pub strategy: CropStrategy,
}

impl CropFrame {
    /// Create a TRACK window.
    pub fn track(center_x: f64, center_y: f64, crop_width: u32, crop_height: u32) -> Self {
        Self {
            center_x,
            center_y,
            crop_width,
            crop_height,
            strategy: CropStrategy::Track,
        }
    }

    /// Create a GENERAL window: the whole frame, centered.
    pub fn general(frame_width: u32, frame_height: u32) -> Self {
        Self {
            center_x: (frame_width / 2) as f64,
            center_y: (frame_height / 2) as f64,
            crop_width: frame_width,
            crop_height: frame_height,
            strategy: CropStrategy::General,
        }
    }

    /// Interpolate the center between `a` and `b`.
    ///
    /// Only the position moves; size and strategy are carried from `a`.
    pub fn lerp_position(a: &CropFrame, b: &CropFrame, t: f64) -> CropFrame {
        CropFrame {
            center_x: a.center_x + t * (b.center_x - a.center_x),
            center_y: a.center_y + t * (b.center_y - a.center_y),
            ..*a
        }
    }

    /// Integer crop rectangle clamped inside the source frame.
    pub fn window(&self, frame_width: u32, frame_height: u32) -> CropRect {
        let width = self.crop_width.min(frame_width);
        let height = self.crop_height.min(frame_height);

        let max_x = (frame_width - width) as f64;
        let max_y = (frame_height - height) as f64;

        let x = (self.center_x - width as f64 / 2.0).round().clamp(0.0, max_x);
        let y = (self.center_y - height as f64 / 2.0).round().clamp(0.0, max_y);

        CropRect {
            x: x as u32,
            y: y as u32,
            width,
            height,
        }
    }
}

/// Integer crop rectangle (top-left corner plus size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Right edge (exclusive).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Aspect ratio specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Standard portrait (9:16) for TikTok/Reels/Shorts
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1,
        height: 1,
    };

    /// Create a new aspect ratio.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the aspect ratio as a decimal.
    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Largest box with this ratio that fits inside the frame.
    ///
    /// Uses the full frame height when possible; when the resulting width
    /// would overflow, derives the height from the full frame width instead.
    pub fn fit_within(&self, frame_width: u32, frame_height: u32) -> (u32, u32) {
        let mut crop_height = frame_height;
        let mut crop_width =
            (crop_height as u64 * self.width as u64 / self.height as u64) as u32;

        if crop_width > frame_width {
            crop_width = frame_width;
            crop_height = (crop_width as u64 * self.height as u64 / self.width as u64) as u32;
        }

        // Never collapse to an empty box on tiny frames.
        (
            crop_width.clamp(1, frame_width.max(1)),
            crop_height.clamp(1, frame_height.max(1)),
        )
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 {
            return Err(AspectRatioParseError::InvalidFormat(s.to_string()));
        }

        let width = parts[0]
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(parts[0].to_string()))?;
        let height = parts[1]
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(parts[1].to_string()))?;

        if width == 0 || height == 0 {
            return Err(AspectRatioParseError::ZeroValue);
        }

        Ok(AspectRatio { width, height })
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::PORTRAIT
    }
}

#[derive(Debug, Error)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H'")]
    InvalidFormat(String),
    #[error("Invalid number in aspect ratio: {0}")]
    InvalidNumber(String),
    #[error("Aspect ratio cannot have zero values")]
    ZeroValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portrait_fit_from_landscape() {
        let (w, h) = AspectRatio::PORTRAIT.fit_within(1920, 1080);
        assert_eq!(h, 1080);
        assert_eq!(w, 607);
    }

    #[test]
    fn test_portrait_fit_from_narrow_frame() {
        // 9:16 at full height would be 1080 wide, wider than the frame
        let (w, h) = AspectRatio::PORTRAIT.fit_within(500, 1920);
        assert_eq!(w, 500);
        assert_eq!(h, 888);
        assert!(h <= 1920);
    }

    #[test]
    fn test_fit_never_collapses_on_tiny_frames() {
        assert_eq!(AspectRatio::PORTRAIT.fit_within(1920, 1), (1, 1));
        assert_eq!(AspectRatio::PORTRAIT.fit_within(1, 1920), (1, 1));
        assert_eq!(AspectRatio::PORTRAIT.fit_within(4, 4), (2, 4));
    }

    #[test]
    fn test_lerp_moves_only_position() {
        let a = CropFrame::track(100.0, 200.0, 600, 1080);
        let b = CropFrame {
            crop_width: 10,
            ..CropFrame::track(300.0, 400.0, 600, 1080)
        };

        let mid = CropFrame::lerp_position(&a, &b, 0.5);
        assert!((mid.center_x - 200.0).abs() < 1e-9);
        assert!((mid.center_y - 300.0).abs() < 1e-9);
        assert_eq!(mid.crop_width, 600);
        assert_eq!(mid.strategy, CropStrategy::Track);
    }

    #[test]
    fn test_window_stays_inside_frame() {
        for (cx, cy) in [(0.0, 0.0), (1920.0, 1080.0), (960.0, 540.0), (-400.0, 2000.0)] {
            let rect = CropFrame::track(cx, cy, 607, 1080).window(1920, 1080);
            assert!(rect.right() <= 1920, "right edge {} out of frame", rect.right());
            assert!(rect.bottom() <= 1080, "bottom edge {} out of frame", rect.bottom());
            assert_eq!(rect.width, 607);
        }
    }

    #[test]
    fn test_general_window_is_full_frame() {
        let rect = CropFrame::general(1920, 1080).window(1920, 1080);
        assert_eq!(rect, CropRect { x: 0, y: 0, width: 1920, height: 1080 });
    }

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::PORTRAIT);
        assert!("0:16".parse::<AspectRatio>().is_err());
        assert!("wide".parse::<AspectRatio>().is_err());
    }
}
