//! YOLOv8 person detection through ONNX Runtime.
//!
//! Only COCO class 0 (person) is kept. Each person box is reduced to its
//! upper part, which is where the face sits in a typical talking-head shot.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use reframe_models::DetectedRegion;

use super::{BackendFactory, DetectionBackend};
use crate::config::DetectorConfig;
use crate::error::{EngineError, EngineResult};
use crate::source::Frame;

const INPUT_SIZE: u32 = 640;
const NUM_CLASSES: usize = 80;
const NUM_BOXES: usize = 8400;
const NMS_THRESHOLD: f32 = 0.45;
const PERSON_CLASS: usize = 0;

/// Builds [`YoloPersonBackend`] from the configured model path.
#[derive(Debug, Clone)]
pub struct YoloFactory {
    config: DetectorConfig,
}

impl YoloFactory {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl BackendFactory for YoloFactory {
    fn name(&self) -> &str {
        "yolov8"
    }

    fn build(&self) -> EngineResult<Box<dyn DetectionBackend>> {
        Ok(Box::new(YoloPersonBackend::new(&self.config)?))
    }
}

/// Person box in model output, frame pixel coordinates.
#[derive(Debug, Clone, Copy)]
struct PersonBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    confidence: f32,
}

/// YOLOv8 person detector reporting the upper part of each person as a face region.
pub struct YoloPersonBackend {
    session: Mutex<Session>,
    min_confidence: f32,
    face_fraction: f64,
}

impl YoloPersonBackend {
    /// Load the ONNX model and create a session.
    pub fn new(config: &DetectorConfig) -> EngineResult<Self> {
        let model_path = config.yolo_model_path.as_path();
        if !model_path.exists() {
            return Err(EngineError::model_not_found(model_path.display().to_string()));
        }

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %model_path.display(),
            input_size = INPUT_SIZE,
            "YOLOv8 person detector initialized"
        );

        Ok(Self {
            session,
            min_confidence: config.min_confidence as f32,
            face_fraction: config.person_face_fraction,
        })
    }

    /// Resize to the square model input and lay out as normalized NCHW.
    fn preprocess(&self, frame: &Frame) -> EngineResult<Value> {
        let resized = imageops::resize(frame, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let side = INPUT_SIZE as usize;

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * side * side);
        for c in 0..3 {
            for px in resized.pixels() {
                chw_data.push(px[c] as f32 / 255.0);
            }
        }

        let shape = vec![1usize, 3, side, side];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| EngineError::internal(format!("Failed to create tensor: {}", e)))
    }

    fn run_inference(&self, input: Value) -> EngineResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| EngineError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        // YOLOv8 output is [1, 84, 8400]
        let output = outputs
            .get("output0")
            .ok_or_else(|| EngineError::internal("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::internal(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.iter().copied().collect())
    }

    /// Keep confident person boxes, scaled back to frame pixels.
    fn postprocess(&self, outputs: &[f32], frame_width: u32, frame_height: u32) -> EngineResult<Vec<PersonBox>> {
        let num_features = 4 + NUM_CLASSES;
        if outputs.len() != num_features * NUM_BOXES {
            return Err(EngineError::internal(format!(
                "Unexpected output size: expected {}, got {}",
                num_features * NUM_BOXES,
                outputs.len()
            )));
        }

        let output_array = Array::from_shape_vec((num_features, NUM_BOXES), outputs.to_vec())
            .map_err(|e| EngineError::internal(format!("Failed to reshape output: {}", e)))?;
        let transposed = output_array.t();

        let scale_w = frame_width as f32 / INPUT_SIZE as f32;
        let scale_h = frame_height as f32 / INPUT_SIZE as f32;

        let mut candidates = Vec::new();
        for i in 0..NUM_BOXES {
            let (best_class, best_score) = (0..NUM_CLASSES)
                .map(|c| (c, transposed[[i, 4 + c]]))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

            if best_class != PERSON_CLASS || best_score <= self.min_confidence {
                continue;
            }

            let cx = transposed[[i, 0]];
            let cy = transposed[[i, 1]];
            let w = transposed[[i, 2]];
            let h = transposed[[i, 3]];

            candidates.push(PersonBox {
                x: (cx - w / 2.0) * scale_w,
                y: (cy - h / 2.0) * scale_h,
                width: w * scale_w,
                height: h * scale_h,
                confidence: best_score,
            });
        }

        Ok(non_maximum_suppression(candidates))
    }
}

impl DetectionBackend for YoloPersonBackend {
    fn name(&self) -> &str {
        "yolov8"
    }

    fn detect(&self, frame: &Frame) -> EngineResult<Vec<DetectedRegion>> {
        let (width, height) = frame.dimensions();
        let input = self.preprocess(frame)?;
        let outputs = self.run_inference(input)?;
        let people = self.postprocess(&outputs, width, height)?;

        debug!(count = people.len(), "Person detection completed");

        Ok(people
            .iter()
            .map(|p| face_region(p, self.face_fraction))
            .collect())
    }
}

/// Upper `fraction` of a person box, full width.
fn face_region(person: &PersonBox, fraction: f64) -> DetectedRegion {
    DetectedRegion::new(
        person.x as f64,
        person.y as f64,
        person.width as f64,
        (person.height as f64 * fraction).floor(),
        person.confidence as f64,
    )
}

/// Drop boxes overlapping a more confident box.
fn non_maximum_suppression(mut boxes: Vec<PersonBox>) -> Vec<PersonBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<PersonBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|k| iou(k, &candidate) <= NMS_THRESHOLD) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &PersonBox, b: &PersonBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Create ONNX Runtime session, preferring CUDA when compiled in.
fn create_session(model_path: &Path) -> EngineResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| EngineError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| EngineError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for person detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, using CPU");
    }

    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| EngineError::internal(format!("Failed to load ONNX model: {}", e)))
}
