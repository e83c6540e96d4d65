//! Center-weighted fallback region.

use reframe_models::DetectedRegion;

/// Synthetic subject placed where a speaker usually sits in a landscape shot.
///
/// Horizontally centered, vertical center on the upper third, one third of the
/// frame wide and one quarter tall.
#[derive(Debug, Clone, Copy)]
pub struct CenterHeuristic {
    pub confidence: f64,
}

impl Default for CenterHeuristic {
    fn default() -> Self {
        Self { confidence: 0.8 }
    }
}

impl CenterHeuristic {
    /// The fallback region for a frame of the given size.
    pub fn region(&self, frame_width: u32, frame_height: u32) -> DetectedRegion {
        let w = frame_width as f64;
        let h = frame_height as f64;

        let width = w / 3.0;
        let height = h / 4.0;
        let cx = w / 2.0;
        let cy = h / 3.0;

        DetectedRegion::new(cx - width / 2.0, cy - height / 2.0, width, height, self.confidence)
    }
}
