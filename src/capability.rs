//! Startup capability gate
//!
//! Recording needs both a capture capability and an encoder capability.
//! When either is missing the user gets a notice and nothing else starts.

use serde::Serialize;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

use crate::capture::CaptureSource;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Screen capture is not available: {0}")]
    CaptureUnavailable(String),

    #[error("Video encoding is not available: {0}")]
    EncoderUnavailable(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Capabilities {
    /// The encoder binary runs; carries its version line
    pub encoder: Option<String>,
    /// The grab input format needed by the capture source
    pub capture_format: String,
    pub capture: bool,
}

impl Capabilities {
    /// Inspect the ffmpeg binary for what the configured source needs
    pub async fn probe(binary: &str, source: CaptureSource) -> Self {
        let capture_format = required_input_format(source).to_string();

        let encoder = run(binary, &["-hide_banner", "-version"])
            .await
            .and_then(|out| out.lines().next().map(str::to_string));

        let capture = match &encoder {
            Some(_) => run(binary, &["-hide_banner", "-devices"])
                .await
                .map(|out| lists_input_device(&out, &capture_format))
                .unwrap_or(false),
            None => false,
        };

        info!(
            "Capabilities: encoder={:?} capture({})={}",
            encoder, capture_format, capture
        );

        Self {
            encoder,
            capture_format,
            capture,
        }
    }

    /// Fail with a user-facing notice when a capability is missing
    pub fn ensure(&self) -> Result<(), CapabilityError> {
        if self.encoder.is_none() {
            return Err(CapabilityError::EncoderUnavailable(
                "ffmpeg was not found; install it and make sure it is on PATH".to_string(),
            ));
        }

        if !self.capture {
            return Err(CapabilityError::CaptureUnavailable(format!(
                "this ffmpeg build has no '{}' input device",
                self.capture_format
            )));
        }

        Ok(())
    }
}

/// Input format the capture source depends on
pub fn required_input_format(source: CaptureSource) -> &'static str {
    match source {
        CaptureSource::TestPattern => "lavfi",
        CaptureSource::Screen if cfg!(target_os = "macos") => "avfoundation",
        CaptureSource::Screen if cfg!(target_os = "windows") => "gdigrab",
        CaptureSource::Screen => "x11grab",
    }
}

/// Whether `ffmpeg -devices` output lists `format` as a demuxing device
pub fn lists_input_device(listing: &str, format: &str) -> bool {
    listing.lines().any(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(flags), Some(name)) => flags.starts_with('D') && name.split(',').any(|n| n == format),
            _ => false,
        }
    })
}

async fn run(binary: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;

    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
}
