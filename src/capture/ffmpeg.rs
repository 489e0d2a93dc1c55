//! FFmpeg-backed capture provider
//!
//! Describes the platform grab device as stream tracks and checks access by
//! grabbing a single frame before handing the stream out.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use super::provider::{CaptureError, CaptureProvider, CaptureSource};
use super::stream::{CaptureConstraints, CaptureStream, Track, TrackKind};

pub struct FfmpegCaptureProvider {
    binary: String,
    source: CaptureSource,
    video_input: Option<String>,
    audio_input: Option<String>,
    probe_timeout: Duration,
}

impl FfmpegCaptureProvider {
    pub fn new(binary: impl Into<String>, source: CaptureSource) -> Self {
        Self {
            binary: binary.into(),
            source,
            video_input: None,
            audio_input: None,
            probe_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_video_input(mut self, input: Option<String>) -> Self {
        self.video_input = input;
        self
    }

    pub fn with_audio_input(mut self, input: Option<String>) -> Self {
        self.audio_input = input;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Build the track list for the configured source
    pub fn tracks(
        &self,
        constraints: CaptureConstraints,
        audio: bool,
    ) -> Result<Vec<Track>, CaptureError> {
        let mut tracks = vec![self.video_track(constraints)?];

        if audio {
            match self.audio_track() {
                Some(track) => tracks.push(track),
                None => warn!("No audio input available, recording video only"),
            }
        }

        Ok(tracks)
    }

    fn video_track(&self, c: CaptureConstraints) -> Result<Track, CaptureError> {
        let size = format!("{}x{}", c.width, c.height);
        let rate = c.frame_rate.to_string();

        let (format, input, input_options) = match self.source {
            CaptureSource::TestPattern => (
                "lavfi".to_string(),
                format!("testsrc2=size={}:rate={}", size, rate),
                vec!["-re".to_string()],
            ),
            CaptureSource::Screen => platform_video_input(&self.video_input, &size, &rate)?,
        };

        Ok(Track {
            kind: TrackKind::Video,
            format,
            input,
            input_options,
        })
    }

    fn audio_track(&self) -> Option<Track> {
        let (format, input, input_options) = match self.source {
            CaptureSource::TestPattern => (
                "lavfi".to_string(),
                "sine=frequency=440:sample_rate=48000".to_string(),
                vec!["-re".to_string()],
            ),
            CaptureSource::Screen => platform_audio_input(&self.audio_input)?,
        };

        Some(Track {
            kind: TrackKind::Audio,
            format,
            input,
            input_options,
        })
    }

    /// Grab one video frame to confirm the device opens
    async fn probe(&self, track: &Track) -> Result<(), CaptureError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-hide_banner", "-loglevel", "error", "-f", track.format.as_str()])
            .args(&track.input_options)
            .args(["-i", track.input.as_str(), "-frames:v", "1", "-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            CaptureError::NotSupported(format!("Failed to start {}: {}", self.binary, e))
        })?;

        let output = tokio::time::timeout(self.probe_timeout, child.wait_with_output())
            .await
            .map_err(|_| CaptureError::Device("Timed out waiting for capture access".to_string()))?
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        if output.status.success() {
            return Ok(());
        }

        Err(classify_failure(&String::from_utf8_lossy(&output.stderr)))
    }
}

#[async_trait::async_trait]
impl CaptureProvider for FfmpegCaptureProvider {
    async fn acquire(
        &self,
        constraints: CaptureConstraints,
        audio: bool,
    ) -> Result<CaptureStream, CaptureError> {
        if constraints.width == 0 || constraints.height == 0 || constraints.frame_rate == 0 {
            return Err(CaptureError::NotSupported(format!(
                "Unsupported capture constraints {}x{}@{}",
                constraints.width, constraints.height, constraints.frame_rate
            )));
        }

        let tracks = self.tracks(constraints, audio)?;
        self.probe(&tracks[0]).await?;

        info!(
            "Capture access granted: {}x{} @ {}fps ({} tracks)",
            constraints.width,
            constraints.height,
            constraints.frame_rate,
            tracks.len()
        );

        Ok(CaptureStream::new(constraints, tracks))
    }

    fn name(&self) -> &str {
        match self.source {
            CaptureSource::Screen => "ffmpeg-screen",
            CaptureSource::TestPattern => "ffmpeg-test-pattern",
        }
    }
}

/// Map ffmpeg's stderr from a failed grab onto the capture error taxonomy
pub fn classify_failure(stderr: &str) -> CaptureError {
    let message = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("Capture device failed")
        .trim()
        .to_string();
    let lower = stderr.to_lowercase();

    if lower.contains("permission denied")
        || lower.contains("not permitted")
        || lower.contains("not authorized")
    {
        CaptureError::AccessDenied(message)
    } else if lower.contains("unknown input format") || lower.contains("no such filter") {
        CaptureError::NotSupported(message)
    } else {
        CaptureError::Device(message)
    }
}

/// Demuxer, input and options for the platform screen grabber
pub fn platform_video_input(
    configured: &Option<String>,
    size: &str,
    rate: &str,
) -> Result<(String, String, Vec<String>), CaptureError> {
    if cfg!(target_os = "macos") {
        let input = configured.clone().unwrap_or_else(|| "1".to_string());
        Ok((
            "avfoundation".to_string(),
            input,
            vec!["-framerate".into(), rate.into(), "-capture_cursor".into(), "1".into()],
        ))
    } else if cfg!(target_os = "windows") {
        let input = configured.clone().unwrap_or_else(|| "desktop".to_string());
        Ok(("gdigrab".to_string(), input, vec!["-framerate".into(), rate.into()]))
    } else {
        let input = match configured {
            Some(input) => input.clone(),
            None => {
                let display = std::env::var("DISPLAY").map_err(|_| {
                    CaptureError::Device("No X display available (DISPLAY is not set)".to_string())
                })?;
                format!("{}+0,0", display)
            }
        };
        Ok((
            "x11grab".to_string(),
            input,
            vec!["-video_size".into(), size.into(), "-framerate".into(), rate.into()],
        ))
    }
}

fn platform_audio_input(configured: &Option<String>) -> Option<(String, String, Vec<String>)> {
    if cfg!(target_os = "macos") {
        let input = configured.clone().unwrap_or_else(|| ":0".to_string());
        Some(("avfoundation".to_string(), input, Vec::new()))
    } else if cfg!(target_os = "windows") {
        // dshow needs an explicit device name
        configured
            .clone()
            .map(|input| ("dshow".to_string(), input, Vec::new()))
    } else {
        let input = configured.clone().unwrap_or_else(|| "default".to_string());
        Some(("pulse".to_string(), input, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: CaptureConstraints = CaptureConstraints { width: 1280, height: 720, frame_rate: 30 };

    #[test]
    fn test_pattern_tracks_follow_constraints() {
        let provider = FfmpegCaptureProvider::new("ffmpeg", CaptureSource::TestPattern);
        let tracks = provider.tracks(HD, true).unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].kind, TrackKind::Video);
        assert_eq!(tracks[0].format, "lavfi");
        assert_eq!(tracks[0].input, "testsrc2=size=1280x720:rate=30");
        assert_eq!(tracks[1].kind, TrackKind::Audio);
    }

    #[test]
    fn audio_track_is_omitted_when_not_requested() {
        let provider = FfmpegCaptureProvider::new("ffmpeg", CaptureSource::TestPattern);
        let tracks = provider.tracks(HD, false).unwrap();

        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn configured_video_input_overrides_default() {
        let provider = FfmpegCaptureProvider::new("ffmpeg", CaptureSource::Screen)
            .with_video_input(Some("screen-7".to_string()));
        let tracks = provider.tracks(HD, false).unwrap();

        assert_eq!(tracks[0].input, "screen-7");
    }

    #[test]
    fn classifies_ffmpeg_failures() {
        assert!(matches!(
            classify_failure("[x11grab] Cannot open display :9, error 1.\n:9+0,0: Permission denied\n"),
            CaptureError::AccessDenied(_)
        ));
        assert_eq!(
            classify_failure("Unknown input format: 'x11grab'\n"),
            CaptureError::NotSupported("Unknown input format: 'x11grab'".to_string())
        );
        assert_eq!(
            classify_failure("Input/output error\n\n"),
            CaptureError::Device("Input/output error".to_string())
        );
        assert_eq!(
            classify_failure(""),
            CaptureError::Device("Capture device failed".to_string())
        );
    }

    #[tokio::test]
    async fn zero_sized_constraints_are_rejected() {
        let provider = FfmpegCaptureProvider::new("ffmpeg", CaptureSource::TestPattern);
        let err = provider
            .acquire(CaptureConstraints { width: 0, height: 720, frame_rate: 30 }, false)
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::NotSupported(_)));
    }
}
