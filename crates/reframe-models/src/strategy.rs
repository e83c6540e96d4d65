//! Crop strategy definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Framing strategy for a video segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropStrategy {
    /// Follow a single dominant subject with a 9:16 window
    Track,
    /// Full-frame center crop, composited over a blurred background downstream
    #[default]
    General,
}

impl CropStrategy {
    pub const ALL: &'static [CropStrategy] = &[CropStrategy::Track, CropStrategy::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            CropStrategy::Track => "track",
            CropStrategy::General => "general",
        }
    }

    /// Whether keyframes in this strategy need subject detection.
    pub fn uses_detection(&self) -> bool {
        matches!(self, CropStrategy::Track)
    }
}

impl fmt::Display for CropStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CropStrategy {
    type Err = CropStrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "track" => Ok(CropStrategy::Track),
            "general" => Ok(CropStrategy::General),
            _ => Err(CropStrategyParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown crop strategy: {0}")]
pub struct CropStrategyParseError(String);
