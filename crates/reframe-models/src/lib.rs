//! Shared data models for the reframe engine.
//!
//! This crate provides Serde-serializable types for:
//! - Detected subject regions
//! - Crop strategies and scene classifications
//! - Stabilizer configuration
//! - Per-frame crop windows and aspect ratios
//! - Segment requests and crop plans

pub mod classification;
pub mod crop;
pub mod region;
pub mod segment;
pub mod stabilizer;
pub mod strategy;

// Re-export common types
pub use classification::SceneClassification;
pub use crop::{AspectRatio, AspectRatioParseError, CropFrame, CropRect};
pub use region::DetectedRegion;
pub use segment::{SegmentPlan, SegmentRequest, SourceInfo};
pub use stabilizer::{ConfigError, StabilizerConfig};
pub use strategy::{CropStrategy, CropStrategyParseError};
