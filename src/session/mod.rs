//! Recording session management
//!
//! This module provides the `RecordingSession` state machine that manages:
//! - Capture access through a `CaptureProvider`
//! - The encoder and the chunks it delivers
//! - The elapsed-time display
//! - Building, previewing and saving the finished artifact

mod artifact;
mod format;
mod session;
mod settings;
mod state;
mod view;

pub use artifact::{artifact_file_name, EncodedArtifact};
pub use format::{format_elapsed, format_size_mib};
pub use session::{Collaborators, RecordingSession, SavedRecording, READY_DELAY};
pub use settings::{Quality, SessionSettings};
pub use state::{SessionError, SessionId, SessionState, Status};
pub use view::{SessionView, StatusBoard, StatusSnapshot};
