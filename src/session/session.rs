use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::artifact::EncodedArtifact;
use super::format::format_elapsed;
use super::settings::SessionSettings;
use super::state::{SessionError, SessionId, SessionState, Status};
use super::view::SessionView;
use crate::capture::{CaptureProvider, CaptureStream};
use crate::encoder::{negotiate_mime_type, Encoder, EncoderEvent, EncoderFactory, EncoderOptions};
use crate::storage::ArtifactSink;

/// How long the saved status stays up before reverting to ready
pub const READY_DELAY: Duration = Duration::from_secs(2);

/// External pieces a session drives
pub struct Collaborators {
    pub capture: Arc<dyn CaptureProvider>,
    pub encoders: Arc<dyn EncoderFactory>,
    pub sink: Arc<dyn ArtifactSink>,
    pub view: Box<dyn SessionView>,
}

/// Result of a completed and saved recording
#[derive(Debug, Clone)]
pub struct SavedRecording {
    pub session_id: SessionId,
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: usize,
    pub size_label: String,
    pub duration: Duration,
}

/// The recording state machine
///
/// Owns the capture stream, the encoder and the delivered chunks. Only one
/// recording is live at a time; the session object is reused for every
/// attempt and gets a fresh `SessionId` on each `start`.
pub struct RecordingSession {
    settings: SessionSettings,
    state: SessionState,
    id: SessionId,
    started_at: Option<Instant>,
    stopped_after: Option<Duration>,
    chunks: Vec<Vec<u8>>,
    stream: Option<CaptureStream>,
    encoder: Option<Box<dyn Encoder>>,
    capture: Arc<dyn CaptureProvider>,
    encoders: Arc<dyn EncoderFactory>,
    sink: Arc<dyn ArtifactSink>,
    view: Box<dyn SessionView>,
}

impl RecordingSession {
    pub fn new(settings: SessionSettings, collaborators: Collaborators) -> Self {
        let Collaborators {
            capture,
            encoders,
            sink,
            mut view,
        } = collaborators;

        view.set_status(Status::Ready);
        view.set_timer(&format_elapsed(Duration::ZERO));
        view.set_controls_enabled(true);

        Self {
            settings,
            state: SessionState::Idle,
            id: SessionId::new(),
            started_at: None,
            stopped_after: None,
            chunks: Vec::new(),
            stream: None,
            encoder: None,
            capture,
            encoders,
            sink,
            view,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    /// Time since recording began, frozen once stopped
    pub fn elapsed(&self) -> Duration {
        match (self.stopped_after, self.started_at) {
            (Some(d), _) => d,
            (None, Some(t)) => t.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    /// Change the selected settings; only allowed while idle
    pub fn configure(&mut self, settings: SessionSettings) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::ControlsLocked(self.state));
        }

        info!("Session settings updated: {:?}", settings);
        self.settings = settings;
        Ok(())
    }

    /// Request capture access and start encoding
    ///
    /// Returns the encoder's event receiver; the caller feeds its events
    /// back through `on_chunk` and `on_encoder_stopped`. On failure the
    /// session is idle again and the error text is on the status indicator.
    pub async fn start(&mut self) -> Result<mpsc::Receiver<EncoderEvent>, SessionError> {
        if self.state != SessionState::Idle {
            warn!("Start ignored, session is {}", self.state);
            return Err(SessionError::Busy(self.state));
        }

        self.id = SessionId::new();
        self.state = SessionState::Requesting;
        self.view.set_controls_enabled(false);
        self.view.set_status(Status::Requesting);

        info!(
            "Starting session {} via {} ({:?})",
            self.id,
            self.capture.name(),
            self.settings
        );

        match self.begin().await {
            Ok(events) => Ok(events),
            Err(e) => {
                error!("Failed to start recording: {}", e);
                self.reset();
                self.view.set_status(Status::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn begin(&mut self) -> Result<mpsc::Receiver<EncoderEvent>, SessionError> {
        let constraints = self.settings.quality.constraints();
        let stream = self.capture.acquire(constraints, self.settings.audio).await?;
        let stream = self.stream.insert(stream);

        let mime_type = negotiate_mime_type(self.settings.container, self.encoders.as_ref());
        if mime_type.is_none() {
            warn!(
                "No supported codec pairing for {}, leaving the choice to the encoder",
                self.settings.container
            );
        }

        let options = EncoderOptions {
            mime_type,
            container: self.settings.container,
            video_bits_per_second: self.settings.video_bits_per_second(),
        };
        let mut encoder = self.encoders.create(stream, options)?;
        let events = encoder.start().await?;

        self.encoder = Some(encoder);
        self.chunks.clear();
        self.started_at = Some(Instant::now());
        self.stopped_after = None;
        self.state = SessionState::Recording;

        self.view.set_timer(&format_elapsed(Duration::ZERO));
        self.view.set_status(Status::Recording);
        info!("Recording session {} started", self.id);

        Ok(events)
    }

    /// Append a delivered chunk; empty chunks are dropped
    pub fn on_chunk(&mut self, data: Vec<u8>) {
        match self.state {
            SessionState::Recording | SessionState::Processing => {
                if data.is_empty() {
                    return;
                }
                self.chunks.push(data);
            }
            state => warn!("Dropping {} byte chunk while {}", data.len(), state),
        }
    }

    /// Timer tick: refresh the elapsed display
    pub fn on_tick(&mut self) {
        if self.state == SessionState::Recording {
            let text = format_elapsed(self.elapsed());
            self.view.set_timer(&text);
        }
    }

    /// Ask the encoder to finish; completion arrives later as `Stopped`
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Recording {
            return Err(SessionError::NotRecording);
        }

        info!("Stopping recording session {}", self.id);
        self.enter_processing();

        if let Some(encoder) = self.encoder.as_mut() {
            if let Err(e) = encoder.finish().await {
                error!("Failed to finish encoder, aborting it: {}", e);
                encoder.abort();
            }
        }

        self.release_stream();
        Ok(())
    }

    /// Kill an encoder that did not stop after `finish`
    ///
    /// The caller completes the session with `on_encoder_stopped` without
    /// waiting for the encoder's own stop signal.
    pub fn abort_encoder(&mut self) {
        if let Some(encoder) = self.encoder.as_mut() {
            warn!("Aborting encoder for session {}", self.id);
            encoder.abort();
        }
        self.release_stream();
    }

    fn enter_processing(&mut self) {
        self.stopped_after = Some(self.elapsed());
        self.state = SessionState::Processing;
        self.view.set_status(Status::Processing);
    }

    /// Encoder's terminal signal: build, preview and save the artifact
    ///
    /// Also covers the encoder stopping on its own while recording.
    pub async fn on_encoder_stopped(&mut self) -> Result<Option<SavedRecording>, SessionError> {
        match self.state {
            SessionState::Processing => {}
            SessionState::Recording => {
                warn!("Encoder stopped without a stop request");
                self.enter_processing();
            }
            state => {
                debug!("Ignoring encoder stop while {}", state);
                return Ok(None);
            }
        }

        let duration = self.elapsed();
        let chunks = std::mem::take(&mut self.chunks);
        let artifact = EncodedArtifact::from_chunks(&chunks, self.settings.container, Utc::now());
        drop(chunks);

        let file_name = artifact.file_name();
        let size_bytes = artifact.len();
        let size_label = artifact.size_label();
        info!(
            "Recording session {} produced {} ({})",
            self.id, file_name, size_label
        );

        self.view.show_preview(&artifact);
        let saved = self.sink.save(artifact).await;

        self.reset();

        match saved {
            Ok(path) => {
                self.view.set_status(Status::Saved {
                    file_name: file_name.clone(),
                    size: size_label.clone(),
                });
                Ok(Some(SavedRecording {
                    session_id: self.id,
                    path,
                    file_name,
                    size_bytes,
                    size_label,
                    duration,
                }))
            }
            Err(e) => {
                let err = SessionError::Save(e);
                error!("{}", err);
                self.view.set_status(Status::Error {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Delayed "ready" status after a save
    ///
    /// Only applies if `id` is still the current session and nothing new has
    /// started since. Returns whether the status was changed.
    pub fn on_ready_timeout(&mut self, id: SessionId) -> bool {
        if self.id != id || self.state != SessionState::Idle {
            debug!("Stale ready callback for session {}", id);
            return false;
        }

        self.view.set_status(Status::Ready);
        true
    }

    fn release_stream(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.stop_tracks();
        }
    }

    /// Back to idle: drop encoder and stream, re-enable controls
    fn reset(&mut self) {
        self.release_stream();
        self.stream = None;
        self.encoder = None;
        self.chunks.clear();
        self.started_at = None;
        self.stopped_after = None;
        self.state = SessionState::Idle;
        self.view.set_timer(&format_elapsed(Duration::ZERO));
        self.view.set_controls_enabled(true);
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.release_stream();
    }
}
