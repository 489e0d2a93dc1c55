use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::capture::CaptureConstraints;
use crate::encoder::ContainerFormat;

/// Capture frame rate, the same for every preset
pub const FRAME_RATE: u32 = 30;

/// Resolution preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    Medium,
    Low,
}

impl Quality {
    pub fn constraints(&self) -> CaptureConstraints {
        let (width, height) = match self {
            Quality::High => (1920, 1080),
            Quality::Medium => (1280, 720),
            Quality::Low => (854, 480),
        };

        CaptureConstraints {
            width,
            height,
            frame_rate: FRAME_RATE,
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Quality::High),
            "medium" => Ok(Quality::Medium),
            "low" => Ok(Quality::Low),
            other => Err(format!("Unknown quality preset: {}", other)),
        }
    }
}

/// User-selected recording configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub quality: Quality,
    /// Target video bitrate in kbps
    pub bitrate_kbps: u32,
    pub container: ContainerFormat,
    /// Request an audio track along with the video
    pub audio: bool,
}

impl SessionSettings {
    pub fn video_bits_per_second(&self) -> u32 {
        self.bitrate_kbps.saturating_mul(1000)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            quality: Quality::Medium,
            bitrate_kbps: 2500,
            container: ContainerFormat::WebM,
            audio: true,
        }
    }
}
