// Test doubles for the session collaborators
//
// Each fake records what it was asked to do behind an Arc so tests can keep
// a clone and inspect it after handing the fake to a session.

#![allow(dead_code)]

use anyhow::Result;
use loqa_screen::capture::{
    CaptureConstraints, CaptureError, CaptureProvider, CaptureStream, Track, TrackKind,
};
use loqa_screen::encoder::{Encoder, EncoderError, EncoderEvent, EncoderFactory, EncoderOptions};
use loqa_screen::session::{
    Collaborators, EncodedArtifact, RecordingSession, SessionSettings, SessionView, Status,
};
use loqa_screen::storage::ArtifactSink;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ============================================================================
// Capture
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeCapture {
    pub fail_with: Arc<Mutex<Option<CaptureError>>>,
    pub requests: Arc<Mutex<Vec<(CaptureConstraints, bool)>>>,
    pub streams: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl FakeCapture {
    pub fn failing(error: CaptureError) -> Self {
        let capture = Self::default();
        *capture.fail_with.lock().unwrap() = Some(error);
        capture
    }

    pub fn last_request(&self) -> Option<(CaptureConstraints, bool)> {
        self.requests.lock().unwrap().last().copied()
    }

    /// Liveness of every stream handed out, in order
    pub fn live_streams(&self) -> Vec<bool> {
        self.streams
            .lock()
            .unwrap()
            .iter()
            .map(|flag| flag.load(Ordering::SeqCst))
            .collect()
    }
}

#[async_trait::async_trait]
impl CaptureProvider for FakeCapture {
    async fn acquire(
        &self,
        constraints: CaptureConstraints,
        audio: bool,
    ) -> Result<CaptureStream, CaptureError> {
        self.requests.lock().unwrap().push((constraints, audio));

        if let Some(error) = self.fail_with.lock().unwrap().clone() {
            return Err(error);
        }

        let mut tracks = vec![Track {
            kind: TrackKind::Video,
            format: "fake".to_string(),
            input: "screen".to_string(),
            input_options: Vec::new(),
        }];
        if audio {
            tracks.push(Track {
                kind: TrackKind::Audio,
                format: "fake".to_string(),
                input: "speaker".to_string(),
                input_options: Vec::new(),
            });
        }

        let stream = CaptureStream::new(constraints, tracks);
        self.streams.lock().unwrap().push(stream.live_flag());
        Ok(stream)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// Drives a fake encoder from the test side
#[derive(Clone)]
pub struct EncoderControl {
    pub options: EncoderOptions,
    tx: Arc<Mutex<Option<mpsc::Sender<EncoderEvent>>>>,
    pub finished: Arc<AtomicBool>,
    pub aborted: Arc<AtomicBool>,
    /// When set, `finish` is acknowledged but no stop signal follows
    pub ignore_finish: Arc<AtomicBool>,
    pub fail_finish: Arc<AtomicBool>,
}

impl EncoderControl {
    fn sender(&self) -> mpsc::Sender<EncoderEvent> {
        self.tx
            .lock()
            .unwrap()
            .clone()
            .expect("encoder not started")
    }

    pub async fn chunk(&self, data: Vec<u8>) {
        self.sender().send(EncoderEvent::Chunk(data)).await.unwrap();
    }

    /// Stop as if the encoder ended on its own
    pub async fn stop(&self) {
        self.sender().send(EncoderEvent::Stopped).await.unwrap();
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

struct FakeEncoder {
    control: EncoderControl,
}

#[async_trait::async_trait]
impl Encoder for FakeEncoder {
    async fn start(&mut self) -> Result<mpsc::Receiver<EncoderEvent>, EncoderError> {
        let (tx, rx) = mpsc::channel(64);
        *self.control.tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn finish(&mut self) -> Result<(), EncoderError> {
        self.control.finished.store(true, Ordering::SeqCst);
        if self.control.fail_finish.load(Ordering::SeqCst) {
            return Err(EncoderError::Start("stdin closed unexpectedly".to_string()));
        }
        if self.control.ignore_finish.load(Ordering::SeqCst) {
            return Ok(());
        }
        let tx = self.control.tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(EncoderEvent::Stopped).await;
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.control.aborted.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct FakeEncoders {
    pub supported: Vec<String>,
    pub fail_create: Arc<AtomicBool>,
    pub hang_on_finish: Arc<AtomicBool>,
    pub controls: Arc<Mutex<Vec<EncoderControl>>>,
}

impl FakeEncoders {
    pub fn supporting(types: &[&str]) -> Self {
        Self {
            supported: types.iter().map(|t| t.to_string()).collect(),
            fail_create: Arc::new(AtomicBool::new(false)),
            hang_on_finish: Arc::new(AtomicBool::new(false)),
            controls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn last(&self) -> EncoderControl {
        self.controls
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no encoder created")
    }

    pub fn created(&self) -> usize {
        self.controls.lock().unwrap().len()
    }
}

impl Default for FakeEncoders {
    fn default() -> Self {
        Self::supporting(&["video/webm;codecs=vp9,opus", "video/mp4;codecs=avc1,mp4a"])
    }
}

impl EncoderFactory for FakeEncoders {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|t| t == mime_type)
    }

    fn create(
        &self,
        _stream: &CaptureStream,
        options: EncoderOptions,
    ) -> Result<Box<dyn Encoder>, EncoderError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(EncoderError::NotSupported("Encoder rejected the stream".to_string()));
        }

        let control = EncoderControl {
            options,
            tx: Arc::new(Mutex::new(None)),
            finished: Arc::new(AtomicBool::new(false)),
            aborted: Arc::new(AtomicBool::new(false)),
            ignore_finish: Arc::new(AtomicBool::new(
                self.hang_on_finish.load(Ordering::SeqCst),
            )),
            fail_finish: Arc::new(AtomicBool::new(false)),
        };
        self.controls.lock().unwrap().push(control.clone());

        Ok(Box::new(FakeEncoder { control }))
    }
}

// ============================================================================
// Sink and view
// ============================================================================

#[derive(Clone, Default)]
pub struct MemorySink {
    pub saved: Arc<Mutex<Vec<EncodedArtifact>>>,
    pub fail: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn saved(&self) -> Vec<EncodedArtifact> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ArtifactSink for MemorySink {
    async fn save(&self, artifact: EncodedArtifact) -> Result<PathBuf> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }

        let path = PathBuf::from("/recordings").join(artifact.file_name());
        self.saved.lock().unwrap().push(artifact);
        Ok(path)
    }
}

#[derive(Debug, Default)]
pub struct ViewLog {
    pub statuses: Vec<Status>,
    pub timers: Vec<String>,
    pub controls: Vec<bool>,
    pub previews: usize,
}

#[derive(Clone, Default)]
pub struct RecordingView {
    pub log: Arc<Mutex<ViewLog>>,
}

impl RecordingView {
    pub fn status(&self) -> Status {
        self.log.lock().unwrap().statuses.last().cloned().unwrap()
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.log.lock().unwrap().statuses.clone()
    }

    pub fn timer(&self) -> String {
        self.log.lock().unwrap().timers.last().cloned().unwrap()
    }

    pub fn controls_enabled(&self) -> bool {
        *self.log.lock().unwrap().controls.last().unwrap()
    }

    pub fn previews(&self) -> usize {
        self.log.lock().unwrap().previews
    }
}

impl SessionView for RecordingView {
    fn set_status(&mut self, status: Status) {
        self.log.lock().unwrap().statuses.push(status);
    }

    fn set_timer(&mut self, text: &str) {
        self.log.lock().unwrap().timers.push(text.to_string());
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        self.log.lock().unwrap().controls.push(enabled);
    }

    fn show_preview(&mut self, _artifact: &EncodedArtifact) {
        self.log.lock().unwrap().previews += 1;
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub capture: FakeCapture,
    pub encoders: FakeEncoders,
    pub sink: MemorySink,
    pub view: RecordingView,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            capture: FakeCapture::default(),
            encoders: FakeEncoders::default(),
            sink: MemorySink::default(),
            view: RecordingView::default(),
        }
    }

    pub fn session(&self, settings: SessionSettings) -> RecordingSession {
        self.session_with_view(settings, Box::new(self.view.clone()))
    }

    pub fn session_with_view(
        &self,
        settings: SessionSettings,
        view: Box<dyn SessionView>,
    ) -> RecordingSession {
        RecordingSession::new(
            settings,
            Collaborators {
                capture: Arc::new(self.capture.clone()),
                encoders: Arc::new(self.encoders.clone()),
                sink: Arc::new(self.sink.clone()),
                view,
            },
        )
    }
}
