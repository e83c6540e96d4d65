//! OpenCV YuNet face detection backend.
//!
//! YuNet is a lightweight CNN face detector exposed through OpenCV's
//! `FaceDetectorYN` API. Requires OpenCV 4.5+ with the DNN module.

use std::path::Path;
use std::sync::Mutex;

use opencv::core::{Mat, Ptr, Scalar, Size, CV_8UC3};
use opencv::dnn::{DNN_BACKEND_DEFAULT, DNN_BACKEND_OPENCV, DNN_TARGET_CPU};
use opencv::imgproc;
use opencv::objdetect::FaceDetectorYN;
use opencv::prelude::*;
use tracing::{debug, info, warn};

use reframe_models::DetectedRegion;

use super::{BackendFactory, DetectionBackend};
use crate::config::DetectorConfig;
use crate::error::{EngineError, EngineResult};
use crate::source::Frame;

const NMS_THRESHOLD: f32 = 0.3;
const TOP_K: i32 = 5000;

/// Smallest plausible model file; anything shorter is a broken download.
const MIN_MODEL_BYTES: u64 = 50_000;

/// Builds [`YuNetBackend`] from the configured model path.
#[derive(Debug, Clone)]
pub struct YuNetFactory {
    config: DetectorConfig,
}

impl YuNetFactory {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl BackendFactory for YuNetFactory {
    fn name(&self) -> &str {
        "yunet"
    }

    fn build(&self) -> EngineResult<Box<dyn DetectionBackend>> {
        Ok(Box::new(YuNetBackend::new(
            &self.config.yunet_model_path,
            self.config.min_confidence as f32,
        )?))
    }
}

/// Face detector wrapping `FaceDetectorYN`.
pub struct YuNetBackend {
    detector: Mutex<Ptr<FaceDetectorYN>>,
    score_threshold: f32,
}

impl YuNetBackend {
    /// Load the model, trying the default DNN backend first and plain OpenCV second.
    pub fn new(model_path: &Path, score_threshold: f32) -> EngineResult<Self> {
        let metadata = std::fs::metadata(model_path)
            .map_err(|_| EngineError::model_not_found(model_path.display().to_string()))?;
        if metadata.len() < MIN_MODEL_BYTES {
            return Err(EngineError::detection_failed(format!(
                "YuNet model file appears corrupted (size: {} bytes)",
                metadata.len()
            )));
        }

        let model = model_path.to_string_lossy();
        let backends = [
            (DNN_BACKEND_DEFAULT, "default"),
            (DNN_BACKEND_OPENCV, "opencv"),
        ];

        let mut last_error = String::new();
        for (backend_id, backend_name) in backends {
            match FaceDetectorYN::create(
                &model,
                "",
                Size::new(320, 320),
                score_threshold,
                NMS_THRESHOLD,
                TOP_K,
                backend_id,
                DNN_TARGET_CPU,
            ) {
                Ok(detector) => {
                    info!(model = %model, dnn_backend = backend_name, "YuNet detector initialized");
                    return Ok(Self {
                        detector: Mutex::new(detector),
                        score_threshold,
                    });
                }
                Err(e) => {
                    warn!("YuNet {} backend failed: {}", backend_name, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(EngineError::detection_failed(format!(
            "Failed to create YuNet detector with any backend: {}",
            last_error
        )))
    }

    /// Network input size for a frame: at most 960x544, multiples of 32.
    fn input_size(frame_width: u32, frame_height: u32) -> (i32, i32) {
        let scale = (frame_width as f64 / 960.0)
            .max(frame_height as f64 / 540.0)
            .max(1.0);

        const ALIGNMENT: i32 = 32;
        let align = |v: f64| (((v.round() as i32) + ALIGNMENT / 2) / ALIGNMENT) * ALIGNMENT;

        let width = align(frame_width as f64 / scale).clamp(160, 960);
        let height = align(frame_height as f64 / scale).clamp(128, 544);
        (width, height)
    }
}

/// Copy an RGB frame into a BGR `Mat`.
fn frame_to_bgr_mat(frame: &Frame) -> EngineResult<Mat> {
    let (width, height) = frame.dimensions();
    let mut mat =
        Mat::new_rows_cols_with_default(height as i32, width as i32, CV_8UC3, Scalar::all(0.0))
            .map_err(|e| EngineError::detection_failed(format!("mat alloc: {e}")))?;

    let dst = mat
        .data_bytes_mut()
        .map_err(|e| EngineError::detection_failed(format!("mat data: {e}")))?;
    for (out, px) in dst.chunks_exact_mut(3).zip(frame.pixels()) {
        out[0] = px[2];
        out[1] = px[1];
        out[2] = px[0];
    }

    Ok(mat)
}

impl DetectionBackend for YuNetBackend {
    fn name(&self) -> &str {
        "yunet"
    }

    fn detect(&self, frame: &Frame) -> EngineResult<Vec<DetectedRegion>> {
        let (frame_width, frame_height) = frame.dimensions();
        if frame_width == 0 || frame_height == 0 {
            return Ok(Vec::new());
        }

        let bgr = frame_to_bgr_mat(frame)?;
        let (input_width, input_height) = Self::input_size(frame_width, frame_height);

        let mut resized = Mat::default();
        imgproc::resize(
            &bgr,
            &mut resized,
            Size::new(input_width, input_height),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )
        .map_err(|e| EngineError::detection_failed(format!("yunet resize: {e}")))?;

        let mut detector = self
            .detector
            .lock()
            .map_err(|_| EngineError::internal("YuNet detector lock poisoned"))?;

        detector
            .set_input_size(Size::new(input_width, input_height))
            .map_err(|e| EngineError::detection_failed(format!("yunet input size: {e}")))?;

        let mut faces = Mat::default();
        detector
            .detect(&resized, &mut faces)
            .map_err(|e| EngineError::detection_failed(format!("yunet detect: {e}")))?;

        // Row layout: [x, y, w, h, 10 landmark coords, score]
        if faces.rows() <= 0 || faces.cols() < 15 {
            return Ok(Vec::new());
        }

        let scale_x = frame_width as f64 / input_width as f64;
        let scale_y = frame_height as f64 / input_height as f64;

        let mut regions = Vec::with_capacity(faces.rows() as usize);
        for i in 0..faces.rows() {
            let value = |col: i32| faces.at_2d::<f32>(i, col).map(|v| *v as f64);
            let (Ok(x), Ok(y), Ok(w), Ok(h), Ok(score)) =
                (value(0), value(1), value(2), value(3), value(14))
            else {
                continue;
            };

            if w <= 0.0 || h <= 0.0 || score < self.score_threshold as f64 {
                continue;
            }

            regions.push(DetectedRegion::new(
                x * scale_x,
                y * scale_y,
                w * scale_x,
                h * scale_y,
                score,
            ));
        }

        debug!(count = regions.len(), candidates = faces.rows(), "YuNet detection completed");
        Ok(regions)
    }
}
