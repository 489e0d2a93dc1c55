use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Requested capture resolution and frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

/// Media kind carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// A single input track of a capture stream
///
/// `format` and `input` name the demuxer and device the encoder reads from;
/// `input_options` are passed before the input (size, rate, ...).
#[derive(Debug, Clone)]
pub struct Track {
    pub kind: TrackKind,
    pub format: String,
    pub input: String,
    pub input_options: Vec<String>,
}

/// A live audio/video stream handed out by a capture provider
///
/// The stream stays live until `stop_tracks` is called. Every session exit
/// path calls it; calling it more than once is harmless.
#[derive(Debug)]
pub struct CaptureStream {
    constraints: CaptureConstraints,
    tracks: Vec<Track>,
    live: Arc<AtomicBool>,
}

impl CaptureStream {
    pub fn new(constraints: CaptureConstraints, tracks: Vec<Track>) -> Self {
        Self {
            constraints,
            tracks,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn constraints(&self) -> CaptureConstraints {
        self.constraints
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == TrackKind::Audio)
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Shared liveness flag, lets a provider observe when its stream is released
    pub fn live_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.live)
    }

    /// Stop every track of the stream
    pub fn stop_tracks(&mut self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!("Released capture stream ({} tracks)", self.tracks.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_track() -> Track {
        Track {
            kind: TrackKind::Video,
            format: "lavfi".to_string(),
            input: "testsrc2".to_string(),
            input_options: Vec::new(),
        }
    }

    #[test]
    fn stop_tracks_is_idempotent() {
        let constraints = CaptureConstraints { width: 854, height: 480, frame_rate: 30 };
        let mut stream = CaptureStream::new(constraints, vec![video_track()]);
        let flag = stream.live_flag();

        assert!(stream.is_live());
        assert!(!stream.has_audio());

        stream.stop_tracks();
        stream.stop_tracks();

        assert!(!stream.is_live());
        assert!(!flag.load(Ordering::SeqCst));
    }
}
