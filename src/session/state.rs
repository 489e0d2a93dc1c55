use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::capture::CaptureError;
use crate::encoder::EncoderError;

/// Recording lifecycle: Idle → Requesting → Recording → Processing → Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Requesting,
    Recording,
    Processing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Recording => "recording",
            SessionState::Processing => "processing",
        };
        f.write_str(name)
    }
}

/// Identity of one start attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the status indicator shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Status {
    Ready,
    Requesting,
    Recording,
    Processing,
    Saved { file_name: String, size: String },
    Error { message: String },
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ready => f.write_str("Ready to record"),
            Status::Requesting => f.write_str("Waiting for capture access..."),
            Status::Recording => f.write_str("Recording"),
            Status::Processing => f.write_str("Processing..."),
            Status::Saved { file_name, size } => write!(f, "Saved {} ({})", file_name, size),
            Status::Error { message } => f.write_str(message),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error("A session is already {0}")]
    Busy(SessionState),

    #[error("No recording in progress")]
    NotRecording,

    #[error("Settings cannot change while a session is {0}")]
    ControlsLocked(SessionState),

    #[error("Failed to save recording: {0:#}")]
    Save(anyhow::Error),

    #[error("Recorder has shut down")]
    RecorderClosed,
}
