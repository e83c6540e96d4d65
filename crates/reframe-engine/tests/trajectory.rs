//! End-to-end classification and trajectory runs over synthetic sources.

mod common;

use std::path::Path;

use tokio::sync::watch;

use common::{
    square, MissingOpener, RecordingProgress, ScriptedBackend, SyntheticOpener, SyntheticSource,
};
use reframe_engine::{
    CenterHeuristic, ClassifierConfig, EngineConfig, EngineError, NoopProgress, SceneClassifier,
    SubjectDetector, TrajectoryGenerator,
};
use reframe_models::{CropFrame, CropStrategy, SceneClassification};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const FPS: f64 = 30.0;

fn path() -> &'static Path {
    Path::new("synthetic.mp4")
}

fn ten_second_source() -> SyntheticSource {
    SyntheticSource::new(FPS, WIDTH, HEIGHT, 300)
}

fn classify(detector: &SubjectDetector, source: SyntheticSource) -> SceneClassification {
    SceneClassifier::new(detector, ClassifierConfig::default())
        .classify(&SyntheticOpener(source), path(), 0.0, 10.0)
        .unwrap()
}

fn generate(
    detector: &SubjectDetector,
    source: SyntheticSource,
    classification: &SceneClassification,
) -> Vec<CropFrame> {
    TrajectoryGenerator::from_config(detector, &EngineConfig::default())
        .generate(
            &SyntheticOpener(source),
            path(),
            0.0,
            10.0,
            classification,
            &NoopProgress,
        )
        .unwrap()
}

fn distance(frame: &CropFrame, (x, y): (f64, f64)) -> f64 {
    (frame.center_x - x).hypot(frame.center_y - y)
}

#[test]
fn test_fixed_subject_tracks_and_converges() {
    let detector = SubjectDetector::with_backend(Box::new(ScriptedBackend::fixed_subject(900.0, 300.0)));

    let classification = classify(&detector, ten_second_source());
    assert_eq!(classification.strategy, CropStrategy::Track);
    assert_eq!(classification.sampled_frames, 10);
    assert_eq!(classification.max_detections, 1);
    assert!((classification.avg_detections - 1.0).abs() < 1e-9);

    let primary = classification.primary_region.unwrap();
    assert!((primary.cx() - 900.0).abs() < 1e-9);

    let frames = generate(&detector, ten_second_source(), &classification);
    assert_eq!(frames.len(), 300);

    for f in &frames {
        assert_eq!(f.strategy, CropStrategy::Track);
        assert!(f.crop_width <= WIDTH && f.crop_height <= HEIGHT);
        let ratio = f.crop_width as f64 / f.crop_height as f64;
        assert!((ratio - 9.0 / 16.0).abs() < 0.01, "ratio {}", ratio);
    }

    let subject = (900.0, 300.0);
    let first = distance(&frames[0], subject);
    let last = distance(&frames[299], subject);
    assert!(last < first);
    assert!(last < EngineConfig::default().stabilizer.deadzone);
}

#[test]
fn test_interpolation_is_linear_between_keyframes() {
    let detector = SubjectDetector::with_backend(Box::new(ScriptedBackend::new(|idx| {
        vec![square(200.0 + idx as f64 * 3.0, 360.0, 0.9)]
    })));
    let classification = classify(&detector, ten_second_source());
    let frames = generate(&detector, ten_second_source(), &classification);
    assert_eq!(frames.len(), 300);

    // 30 fps sampled at 10 detections/s puts keyframes every 3 frames.
    for m in 0..99 {
        let k = 3 * m;
        let steps: Vec<f64> = (k..k + 3)
            .map(|i| frames[i + 1].center_x - frames[i].center_x)
            .collect();
        assert!((steps[0] - steps[1]).abs() < 1e-6, "frames {}..{}: {:?}", k, k + 3, steps);
        assert!((steps[1] - steps[2]).abs() < 1e-6, "frames {}..{}: {:?}", k, k + 3, steps);
        assert_eq!(frames[k + 1].crop_width, frames[k].crop_width);
    }

    // Past the last keyframe the window holds still.
    assert_eq!(frames[298], frames[297]);
    assert_eq!(frames[299], frames[297]);
}

#[test]
fn test_decode_failures_are_skipped() {
    let detector = SubjectDetector::with_backend(Box::new(ScriptedBackend::fixed_subject(900.0, 300.0)));
    let source = ten_second_source().failing_at([30, 31, 60]);

    // Samples 1 and 2 land on frames 30 and 60.
    let classification = classify(&detector, source.clone());
    assert_eq!(classification.sampled_frames, 8);
    assert_eq!(classification.strategy, CropStrategy::Track);

    let frames = generate(&detector, source, &classification);
    assert_eq!(frames.len(), 300);

    // Keyframes 30 and 60 are lost, so 27..33 and 57..63 each span one interpolated step.
    // The camera is still panning toward the subject across the first gap.
    let early_step = (frames[33].center_x - frames[27].center_x) / 6.0;
    assert!(early_step > 1e-6, "camera should still be panning, step {}", early_step);

    for (before, after) in [(27, 33), (57, 63)] {
        let step = (frames[after].center_x - frames[before].center_x) / (after - before) as f64;
        for i in before..after {
            let delta = frames[i + 1].center_x - frames[i].center_x;
            assert!((delta - step).abs() < 1e-6, "frame {}: {} vs {}", i, delta, step);
        }
    }
}

#[test]
fn test_end_of_stream_holds_last_keyframe() {
    let detector = SubjectDetector::with_backend(Box::new(ScriptedBackend::fixed_subject(900.0, 300.0)));
    let source = SyntheticSource::new(FPS, WIDTH, HEIGHT, 150);

    let classification = classify(&detector, source.clone());
    assert_eq!(classification.sampled_frames, 5);

    let frames = generate(&detector, source, &classification);
    assert_eq!(frames.len(), 300);
    assert_eq!(frames[299], frames[147]);
    assert_eq!(frames[200], frames[147]);
}

#[test]
fn test_degenerate_source() {
    let detector = SubjectDetector::with_backend(Box::new(ScriptedBackend::fixed_subject(900.0, 300.0)));
    let source = SyntheticSource::new(FPS, WIDTH, HEIGHT, 0);

    let classification = classify(&detector, source.clone());
    assert_eq!(classification.strategy, CropStrategy::General);
    assert_eq!(classification.avg_detections, 0.0);
    assert_eq!(classification.max_detections, 0);
    assert_eq!(classification.motion_score, 0.0);
    assert!(classification.primary_region.is_none());
    assert!(classification.reason.contains("No frames"));

    let frames = generate(&detector, source, &classification);
    assert!(frames.is_empty());
}

#[test]
fn test_without_backend_uses_heuristic_region() {
    let detector = SubjectDetector::heuristic_only();

    let classification = classify(&detector, ten_second_source());
    assert_eq!(
        classification.primary_region,
        Some(CenterHeuristic::default().region(WIDTH, HEIGHT))
    );
    assert_eq!(classification.strategy, CropStrategy::Track);

    let frames = generate(&detector, ten_second_source(), &classification);
    assert_eq!(frames.len(), 300);
}

fn counting_detector(pattern: [usize; 10]) -> SubjectDetector {
    // Sample i of a 10 s segment lands on frame 30 * i.
    SubjectDetector::with_backend(Box::new(ScriptedBackend::new(move |idx| {
        let n = pattern[(idx / 30).min(9)];
        (0..n)
            .map(|k| square(150.0 + k as f64 * 200.0, 300.0, 0.9))
            .collect()
    })))
}

#[test]
fn test_mode_thresholds() {
    let track = classify(&counting_detector([1, 1, 1, 1, 1, 1, 1, 1, 0, 2]), ten_second_source());
    assert!((track.avg_detections - 1.0).abs() < 1e-9);
    assert_eq!(track.max_detections, 2);
    assert_eq!(track.strategy, CropStrategy::Track);

    let peak = classify(&counting_detector([1, 1, 1, 1, 1, 1, 1, 0, 0, 3]), ten_second_source());
    assert!((peak.avg_detections - 1.0).abs() < 1e-9);
    assert_eq!(peak.max_detections, 3);
    assert_eq!(peak.strategy, CropStrategy::General);

    let crowded = classify(&counting_detector([2; 10]), ten_second_source());
    assert!((crowded.avg_detections - 2.0).abs() < 1e-9);
    assert_eq!(crowded.strategy, CropStrategy::General);
}

#[test]
fn test_general_strategy_emits_full_frame() {
    let detector = counting_detector([3; 10]);
    let classification = classify(&detector, ten_second_source());
    assert_eq!(classification.strategy, CropStrategy::General);
    assert_eq!(classification.recent_regions.len(), 10);

    let frames = generate(&detector, ten_second_source(), &classification);
    assert_eq!(frames.len(), 300);
    assert!(frames.iter().all(|f| *f == CropFrame::general(WIDTH, HEIGHT)));
}

#[test]
fn test_progress_reports() {
    let detector = SubjectDetector::with_backend(Box::new(ScriptedBackend::fixed_subject(900.0, 300.0)));
    let classification = classify(&detector, ten_second_source());
    let progress = RecordingProgress::default();

    TrajectoryGenerator::from_config(&detector, &EngineConfig::default())
        .generate(
            &SyntheticOpener(ten_second_source()),
            path(),
            0.0,
            10.0,
            &classification,
            &progress,
        )
        .unwrap();

    let events = progress.events();
    // Start, one report per 10 of the 100 keyframes, completion.
    assert_eq!(events.len(), 12);
    assert_eq!(events[0], (0.0, "Generating track crop trajectory".to_string()));
    assert_eq!(events[11], (100.0, "Crop trajectory complete".to_string()));
    assert!(events.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn test_cancellation_between_keyframes() {
    let detector = SubjectDetector::heuristic_only();
    let classification = classify(&detector, ten_second_source());
    let (_tx, rx) = watch::channel(true);

    let result = TrajectoryGenerator::from_config(&detector, &EngineConfig::default())
        .with_cancel(rx)
        .generate(
            &SyntheticOpener(ten_second_source()),
            path(),
            0.0,
            10.0,
            &classification,
            &NoopProgress,
        );
    assert!(matches!(result, Err(EngineError::Cancelled)));
}

#[test]
fn test_unavailable_source_is_an_error() {
    let detector = SubjectDetector::heuristic_only();

    let classified = SceneClassifier::new(&detector, ClassifierConfig::default()).classify(
        &MissingOpener,
        path(),
        0.0,
        10.0,
    );
    assert!(matches!(classified, Err(EngineError::SourceUnavailable { .. })));

    let generated = TrajectoryGenerator::from_config(&detector, &EngineConfig::default()).generate(
        &MissingOpener,
        path(),
        0.0,
        10.0,
        &SceneClassification::degenerate("unused"),
        &NoopProgress,
    );
    assert!(matches!(generated, Err(EngineError::SourceUnavailable { .. })));
}

#[test]
fn test_invalid_segment_is_rejected() {
    let detector = SubjectDetector::heuristic_only();
    let result = TrajectoryGenerator::from_config(&detector, &EngineConfig::default()).generate(
        &SyntheticOpener(ten_second_source()),
        path(),
        5.0,
        2.0,
        &SceneClassification::degenerate("unused"),
        &NoopProgress,
    );
    assert!(matches!(result, Err(EngineError::InvalidSegment(_))));
}
