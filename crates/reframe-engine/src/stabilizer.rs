//! Heavy-tripod camera stabilizer.
//!
//! A hysteretic, rate- and acceleration-limited tracker. Each tick takes a raw
//! detection and returns the camera position:
//! - offsets under the deadzone never move the camera
//! - a locked camera only starts moving once the offset exceeds the lock threshold
//! - a moving camera keeps going until it is back inside the deadzone, then re-locks
//! - velocity is low-pass filtered and clamped to the configured maximum
//!
//! One instance per segment. Not shared across threads.

use std::collections::VecDeque;

use reframe_models::StabilizerConfig;

/// Detections at or below this confidence do not move the target.
pub const CONFIDENCE_GATE: f64 = 0.5;

/// Number of positions kept for movement analysis.
pub const HISTORY_CAPACITY: usize = 300;

/// Mean per-tick movement below which the camera counts as static.
pub const STATIC_VELOCITY_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Vec2 {
    x: f64,
    y: f64,
}

impl Vec2 {
    fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    fn scale(self, k: f64) -> Vec2 {
        Vec2::new(self.x * k, self.y * k)
    }

    fn tuple(self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// Summary of the recent camera path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementStats {
    /// Positions in the history
    pub samples: usize,
    /// Sum of per-tick distances
    pub total_displacement: f64,
    /// Mean per-tick distance
    pub mean_velocity: f64,
    /// Largest per-tick distance
    pub max_velocity: f64,
    /// Mean per-tick distance under [`STATIC_VELOCITY_THRESHOLD`]
    pub is_static: bool,
}

#[derive(Debug, Clone)]
struct StabilizerState {
    current: Vec2,
    target: Vec2,
    velocity: Vec2,
    locked: bool,
    ticks_since_detection: u32,
    history: VecDeque<(f64, f64)>,
}

impl StabilizerState {
    fn at(x: f64, y: f64) -> Self {
        let p = Vec2::new(x, y);
        Self {
            current: p,
            target: p,
            velocity: Vec2::default(),
            locked: true,
            ticks_since_detection: 0,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    fn record(&mut self) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(self.current.tuple());
    }

    fn lock(&mut self) {
        self.locked = true;
        self.velocity = Vec2::default();
    }
}

/// Smooths a noisy subject position into a steady camera position.
#[derive(Debug, Clone)]
pub struct Stabilizer {
    config: StabilizerConfig,
    state: Option<StabilizerState>,
}

impl Stabilizer {
    /// Create an uninitialized stabilizer; the first update seeds it.
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Place the camera and target at `(x, y)`, locked, with no velocity or history.
    pub fn reset(&mut self, x: f64, y: f64) {
        self.state = Some(StabilizerState::at(x, y));
    }

    /// Feed one detection and return the smoothed camera position.
    pub fn update(&mut self, detected_x: f64, detected_y: f64, confidence: f64) -> (f64, f64) {
        let config = self.config;

        let Some(state) = self.state.as_mut() else {
            self.reset(detected_x, detected_y);
            return (detected_x, detected_y);
        };

        if confidence > CONFIDENCE_GATE {
            state.target = Vec2::new(detected_x, detected_y);
            state.ticks_since_detection = 0;
        } else {
            state.ticks_since_detection = state.ticks_since_detection.saturating_add(1);
        }

        let offset = state.target.sub(state.current);
        let distance = offset.length();

        if distance < config.deadzone {
            state.lock();
            state.record();
            return state.current.tuple();
        }

        if distance > config.lock_threshold {
            state.locked = false;
        }

        if state.locked {
            state.record();
            return state.current.tuple();
        }

        let desired = offset.scale(config.smoothing_factor);
        state.velocity = state
            .velocity
            .add(desired.sub(state.velocity).scale(config.acceleration_smoothing));

        let speed = state.velocity.length();
        if speed > config.max_velocity {
            state.velocity = state.velocity.scale(config.max_velocity / speed);
        }

        state.current = state.current.add(state.velocity);

        if state.target.sub(state.current).length() < config.deadzone {
            state.lock();
        }

        state.record();
        state.current.tuple()
    }

    /// Run a whole detection sequence from a fresh state.
    ///
    /// The first detection seeds the camera.
    pub fn smooth_path(&mut self, detections: &[(f64, f64, f64)]) -> Vec<(f64, f64)> {
        self.state = None;
        detections
            .iter()
            .map(|&(x, y, confidence)| self.update(x, y, confidence))
            .collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Current camera position, if initialized.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.state.as_ref().map(|s| s.current.tuple())
    }

    /// Current target, if initialized.
    pub fn target(&self) -> Option<(f64, f64)> {
        self.state.as_ref().map(|s| s.target.tuple())
    }

    /// Current velocity in pixels per tick.
    pub fn velocity(&self) -> (f64, f64) {
        self.state
            .as_ref()
            .map(|s| s.velocity.tuple())
            .unwrap_or((0.0, 0.0))
    }

    pub fn is_locked(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.locked)
    }

    /// Updates since the last confident detection.
    pub fn ticks_since_detection(&self) -> u32 {
        self.state
            .as_ref()
            .map(|s| s.ticks_since_detection)
            .unwrap_or(0)
    }

    /// Recent camera positions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.state.iter().flat_map(|s| s.history.iter().copied())
    }

    /// Movement statistics over the history.
    pub fn movement_stats(&self) -> MovementStats {
        let positions: Vec<(f64, f64)> = self.history().collect();
        let steps: Vec<f64> = positions
            .windows(2)
            .map(|w| (w[1].0 - w[0].0).hypot(w[1].1 - w[0].1))
            .collect();

        if steps.is_empty() {
            return MovementStats {
                samples: positions.len(),
                total_displacement: 0.0,
                mean_velocity: 0.0,
                max_velocity: 0.0,
                is_static: true,
            };
        }

        let total: f64 = steps.iter().sum();
        let mean = total / steps.len() as f64;
        let max = steps.iter().copied().fold(0.0, f64::max);

        MovementStats {
            samples: positions.len(),
            total_displacement: total,
            mean_velocity: mean,
            max_velocity: max,
            is_static: mean < STATIC_VELOCITY_THRESHOLD,
        }
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}
