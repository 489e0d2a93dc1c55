use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use super::artifact::EncodedArtifact;
use super::state::Status;

/// The user-facing side of a session
///
/// Status indicator, timer display, configuration controls and preview.
pub trait SessionView: Send {
    fn set_status(&mut self, status: Status);

    fn set_timer(&mut self, text: &str);

    fn set_controls_enabled(&mut self, enabled: bool);

    fn show_preview(&mut self, _artifact: &EncodedArtifact) {}
}

/// Everything the view currently shows
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: Status,
    pub message: String,
    pub timer: String,
    pub controls_enabled: bool,
    #[serde(skip)]
    pub preview: Option<EncodedArtifact>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            message: Status::Ready.to_string(),
            status: Status::Ready,
            timer: "00:00".to_string(),
            controls_enabled: true,
            preview: None,
        }
    }
}

/// `SessionView` that logs every change and publishes a `StatusSnapshot`
/// to any number of watchers.
#[derive(Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionView for StatusBoard {
    fn set_status(&mut self, status: Status) {
        info!("Status: {}", status);
        self.tx.send_modify(|s| {
            s.message = status.to_string();
            s.status = status;
        });
    }

    fn set_timer(&mut self, text: &str) {
        self.tx.send_modify(|s| s.timer = text.to_string());
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        self.tx.send_modify(|s| s.controls_enabled = enabled);
    }

    fn show_preview(&mut self, artifact: &EncodedArtifact) {
        info!("Preview ready: {} ({})", artifact.mime_type(), artifact.size_label());
        self.tx.send_modify(|s| s.preview = Some(artifact.clone()));
    }
}
