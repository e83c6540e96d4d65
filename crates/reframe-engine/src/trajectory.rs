//! Crop trajectory generation.
//!
//! Detection runs on every `skip`-th output frame only. Those keyframes are
//! stabilized, then every output frame in between is linearly interpolated,
//! so the result always has one [`CropFrame`] per output frame.

use std::path::Path;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use reframe_models::{
    CropFrame, CropRect, CropStrategy, DetectedRegion, SceneClassification, StabilizerConfig,
};

use crate::config::{EngineConfig, TrajectoryConfig};
use crate::detector::SubjectDetector;
use crate::error::EngineResult;
use crate::guard::{check_cancelled, check_segment};
use crate::metrics;
use crate::progress::ProgressSink;
use crate::source::{Frame, FrameSource, FrameSourceOpener};
use crate::stabilizer::Stabilizer;

/// A crop window computed from a real detection at output frame `index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub index: usize,
    pub frame: CropFrame,
}

/// Number of output frames in `[start, end]`.
///
/// Both bounds are converted to frame numbers by flooring, so adjacent
/// segments never overlap or leave a gap.
pub fn total_output_frames(start: f64, end: f64, fps: f64) -> usize {
    if !(fps.is_finite() && fps > 0.0) || end <= start {
        return 0;
    }
    frame_number(end, fps).saturating_sub(frame_number(start, fps))
}

fn frame_number(t: f64, fps: f64) -> usize {
    (t * fps + 1e-9).floor().max(0.0) as usize
}

/// Keyframe spacing that keeps detection near `target_fps` regardless of source rate.
pub fn skip_factor(fps: f64, target_fps: f64) -> usize {
    if !(fps.is_finite() && fps > 0.0 && target_fps > 0.0) {
        return 1;
    }
    ((fps / target_fps).round() as usize).max(1)
}

/// Expand sparse keyframes into one crop window per output frame.
///
/// Keyframes must be sorted by index. Between two keyframes only the center
/// moves; size and strategy come from the earlier one. Frames before the
/// first or after the last keyframe copy it.
pub fn interpolate(keyframes: &[Keyframe], total_frames: usize) -> Vec<CropFrame> {
    let (Some(first), Some(last)) = (keyframes.first(), keyframes.last()) else {
        return Vec::new();
    };

    let mut frames = Vec::with_capacity(total_frames);
    // First keyframe whose index is >= the current output index.
    let mut next = 0;

    for idx in 0..total_frames {
        while next < keyframes.len() && keyframes[next].index < idx {
            next += 1;
        }

        let frame = if idx <= first.index {
            first.frame
        } else if next == keyframes.len() {
            last.frame
        } else if keyframes[next].index == idx {
            keyframes[next].frame
        } else {
            let before = &keyframes[next - 1];
            let after = &keyframes[next];
            let t = (idx - before.index) as f64 / (after.index - before.index) as f64;
            CropFrame::lerp_position(&before.frame, &after.frame, t)
        };

        frames.push(frame);
    }

    frames
}

/// One static crop for renderers that cannot animate: mean center, first frame's box.
pub fn average_window(frames: &[CropFrame], frame_width: u32, frame_height: u32) -> Option<CropRect> {
    let first = frames.first()?;
    let n = frames.len() as f64;
    let center_x = frames.iter().map(|f| f.center_x).sum::<f64>() / n;
    let center_y = frames.iter().map(|f| f.center_y).sum::<f64>() / n;

    Some(
        CropFrame {
            center_x,
            center_y,
            ..*first
        }
        .window(frame_width, frame_height),
    )
}

/// Whether the center stays within `tolerance_fraction` of the crop size on both axes.
pub fn is_static(frames: &[CropFrame], tolerance_fraction: f64) -> bool {
    let Some(first) = frames.first() else {
        return true;
    };

    let range = |value: fn(&CropFrame) -> f64| {
        let (lo, hi) = frames
            .iter()
            .map(value)
            .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        hi - lo
    };

    range(|f| f.center_x) < tolerance_fraction * first.crop_width as f64
        && range(|f| f.center_y) < tolerance_fraction * first.crop_height as f64
}

/// Produces the per-frame crop sequence for a classified segment.
pub struct TrajectoryGenerator<'a> {
    detector: &'a SubjectDetector,
    stabilizer: StabilizerConfig,
    config: TrajectoryConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a> TrajectoryGenerator<'a> {
    pub fn new(
        detector: &'a SubjectDetector,
        stabilizer: StabilizerConfig,
        config: TrajectoryConfig,
    ) -> Self {
        Self {
            detector,
            stabilizer,
            config,
            cancel: None,
        }
    }

    pub fn from_config(detector: &'a SubjectDetector, config: &EngineConfig) -> Self {
        Self::new(detector, config.stabilizer, config.trajectory.clone())
    }

    /// Stop between keyframes once the flag turns true.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Open `path`, generate the trajectory for `[start, end]` and close the source.
    pub fn generate(
        &self,
        opener: &dyn FrameSourceOpener,
        path: &Path,
        start: f64,
        end: f64,
        classification: &SceneClassification,
        progress: &dyn ProgressSink,
    ) -> EngineResult<Vec<CropFrame>> {
        check_segment(start, end)?;

        let mut source = opener.open(path)?;
        let result = self.generate_from_source(source.as_mut(), start, end, classification, progress);
        source.close();
        result
    }

    /// Generate the trajectory for `[start, end]` on an already-open source.
    ///
    /// Returns an empty sequence when no keyframe could be decoded.
    pub fn generate_from_source(
        &self,
        source: &mut dyn FrameSource,
        start: f64,
        end: f64,
        classification: &SceneClassification,
        progress: &dyn ProgressSink,
    ) -> EngineResult<Vec<CropFrame>> {
        check_segment(start, end)?;
        let started = Instant::now();

        let strategy = classification.strategy;
        let fps = source.fps();
        let (width, height) = source.dimensions();
        let total_frames = total_output_frames(start, end, fps);

        if total_frames == 0 || width == 0 || height == 0 {
            warn!(
                segment_start = start,
                segment_end = end,
                fps,
                width,
                height,
                "Source has no frames for segment"
            );
            return Ok(Vec::new());
        }

        let skip = skip_factor(fps, self.config.target_detection_fps);
        let start_frame = frame_number(start, fps);
        let (crop_width, crop_height) = self.config.output_aspect.fit_within(width, height);

        let mut stabilizer = Stabilizer::new(self.stabilizer);
        stabilizer.reset((width / 2) as f64, (height / 2) as f64);

        info!(
            segment_start = start,
            segment_end = end,
            strategy = %strategy,
            total_frames,
            skip,
            "Generating crop trajectory"
        );
        progress.report(0.0, &format!("Generating {} crop trajectory", strategy));

        let mut keyframes: Vec<Keyframe> = Vec::with_capacity(total_frames / skip + 1);

        for index in (0..total_frames).step_by(skip) {
            check_cancelled(self.cancel.as_ref())?;

            let t = (start_frame + index) as f64 / fps;
            if let Err(e) = source.seek(t) {
                debug!(timestamp = t, error = %e, "Seek failed, skipping keyframe");
                metrics::record_decode_skip("generate");
                continue;
            }

            let frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!(index, "End of stream reached");
                    break;
                }
                Err(e) => {
                    debug!(index, error = %e, "Decode failed, skipping keyframe");
                    metrics::record_decode_skip("generate");
                    continue;
                }
            };

            let crop = match strategy {
                CropStrategy::Track => self.track_crop(
                    &mut stabilizer,
                    &frame,
                    (width, height),
                    (crop_width, crop_height),
                ),
                CropStrategy::General => CropFrame::general(width, height),
            };
            keyframes.push(Keyframe { index, frame: crop });

            if keyframes.len() % self.config.progress_every_keyframes == 0 {
                progress.report(
                    index as f64 / total_frames as f64 * 100.0,
                    &format!("Analyzing frame {}/{}", index, total_frames),
                );
            }
        }

        if keyframes.is_empty() {
            warn!(
                segment_start = start,
                segment_end = end,
                "No keyframes could be decoded, returning empty trajectory"
            );
            return Ok(Vec::new());
        }

        let frames = interpolate(&keyframes, total_frames);

        metrics::record_keyframes(strategy.as_str(), keyframes.len());
        metrics::record_generate_duration(strategy.as_str(), started.elapsed().as_secs_f64());
        info!(
            segment_start = start,
            segment_end = end,
            strategy = %strategy,
            keyframes = keyframes.len(),
            frames = frames.len(),
            "Crop trajectory complete"
        );
        progress.report(100.0, "Crop trajectory complete");

        Ok(frames)
    }

    /// TRACK keyframe: follow the largest region, or hold the center at low confidence.
    fn track_crop(
        &self,
        stabilizer: &mut Stabilizer,
        frame: &Frame,
        (width, height): (u32, u32),
        (crop_width, crop_height): (u32, u32),
    ) -> CropFrame {
        let regions = self.detector.detect(frame);

        let (x, y, confidence) = match DetectedRegion::largest(&regions) {
            Some(r) => (r.cx(), r.cy(), r.confidence),
            None => (
                (width / 2) as f64,
                (height / 2) as f64,
                self.config.fallback_confidence,
            ),
        };

        let (sx, sy) = stabilizer.update(x, y, confidence);
        CropFrame::track(sx, sy, crop_width, crop_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(index: usize, x: f64) -> Keyframe {
        Keyframe {
            index,
            frame: CropFrame::track(x, 100.0, 607, 1080),
        }
    }

    #[test]
    fn test_total_output_frames() {
        assert_eq!(total_output_frames(0.0, 10.0, 30.0), 300);
        assert_eq!(total_output_frames(2.5, 4.0, 29.97), 45);
        assert_eq!(total_output_frames(3.0, 3.0, 30.0), 0);
        assert_eq!(total_output_frames(0.0, 1.0, 0.0), 0);
    }

    #[test]
    fn test_skip_factor() {
        assert_eq!(skip_factor(30.0, 10.0), 3);
        assert_eq!(skip_factor(60.0, 10.0), 6);
        assert_eq!(skip_factor(25.0, 10.0), 3);
        assert_eq!(skip_factor(24.0, 10.0), 2);
        assert_eq!(skip_factor(5.0, 10.0), 1);
    }

    #[test]
    fn test_interpolate_between_keyframes() {
        let frames = interpolate(&[key(0, 0.0), key(3, 30.0), key(6, 90.0)], 7);
        let xs: Vec<f64> = frames.iter().map(|f| f.center_x).collect();
        let expected = [0.0, 10.0, 20.0, 30.0, 50.0, 70.0, 90.0];
        for (got, want) in xs.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{:?}", xs);
        }
    }

    #[test]
    fn test_interpolate_holds_ends() {
        let frames = interpolate(&[key(2, 50.0), key(4, 70.0)], 8);
        assert_eq!(frames.len(), 8);
        assert_eq!(frames[0].center_x, 50.0);
        assert_eq!(frames[1].center_x, 50.0);
        assert_eq!(frames[3].center_x, 60.0);
        assert_eq!(frames[5].center_x, 70.0);
        assert_eq!(frames[7].center_x, 70.0);
    }

    #[test]
    fn test_interpolate_carries_size_from_earlier_keyframe() {
        let a = key(0, 0.0);
        let mut b = key(4, 40.0);
        b.frame.crop_width = 100;
        let frames = interpolate(&[a, b], 5);
        assert_eq!(frames[2].crop_width, 607);
        assert_eq!(frames[4].crop_width, 100);
    }

    #[test]
    fn test_interpolate_without_keyframes_is_empty() {
        assert!(interpolate(&[], 30).is_empty());
    }

    #[test]
    fn test_average_window_and_static() {
        let frames = vec![
            CropFrame::track(900.0, 540.0, 607, 1080),
            CropFrame::track(1000.0, 540.0, 607, 1080),
        ];
        let rect = average_window(&frames, 1920, 1080).unwrap();
        assert_eq!(rect.width, 607);
        assert_eq!(rect.x, (950.0_f64 - 303.5).round() as u32);

        assert!(is_static(&frames, 0.2));
        assert!(!is_static(&frames, 0.1));
        assert!(is_static(&[], 0.1));
        assert!(average_window(&[], 1920, 1080).is_none());
    }
}
