use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stream::{CaptureConstraints, CaptureStream};

/// Capture acquisition failures
///
/// Each variant carries the raw message, which is what the user sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The user or OS refused capture access
    #[error("{0}")]
    AccessDenied(String),

    /// The requested constraints or input format are unavailable
    #[error("{0}")]
    NotSupported(String),

    /// The capture device failed
    #[error("{0}")]
    Device(String),
}

/// Where captured video comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureSource {
    /// The platform's screen grabber
    Screen,
    /// A synthetic test pattern with a sine tone
    TestPattern,
}

/// Capture provider trait
///
/// Implementations:
/// - `FfmpegCaptureProvider`: platform screen grab devices through ffmpeg
/// - test fakes in `tests/common`
#[async_trait::async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Request capture access and return a live stream
    ///
    /// This is the only call in a session that waits on the user/OS.
    async fn acquire(
        &self,
        constraints: CaptureConstraints,
        audio: bool,
    ) -> Result<CaptureStream, CaptureError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
