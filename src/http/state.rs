use crate::recorder::RecorderHandle;
use crate::session::StatusBoard;
use crate::storage::ThemeStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub recorder: RecorderHandle,
    pub status: StatusBoard,
    pub theme: Arc<Mutex<ThemeStore>>,
}

impl AppState {
    pub fn new(recorder: RecorderHandle, status: StatusBoard, theme: ThemeStore) -> Self {
        Self {
            recorder,
            status,
            theme: Arc::new(Mutex::new(theme)),
        }
    }
}
