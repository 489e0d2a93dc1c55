pub mod capability;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod http;
pub mod recorder;
pub mod session;
pub mod storage;

pub use capability::{Capabilities, CapabilityError};
pub use capture::{CaptureConstraints, CaptureError, CaptureProvider, CaptureSource, CaptureStream};
pub use config::Config;
pub use encoder::{ContainerFormat, Encoder, EncoderEvent, EncoderFactory, EncoderOptions};
pub use http::{create_router, AppState};
pub use recorder::{Recorder, RecorderEvent, RecorderHandle};
pub use session::{
    Collaborators, EncodedArtifact, Quality, RecordingSession, SavedRecording, SessionError,
    SessionSettings, SessionState, SessionView, Status, StatusBoard,
};
pub use storage::{ArtifactSink, FileSink, Theme, ThemeStore};
