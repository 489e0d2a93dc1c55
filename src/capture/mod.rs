//! Capture providers
//!
//! A `CaptureProvider` turns requested constraints into a live `CaptureStream`.
//! The stream only describes its tracks; encoding is done elsewhere.

pub mod ffmpeg;
pub mod provider;
pub mod stream;

pub use ffmpeg::FfmpegCaptureProvider;
pub use provider::{CaptureError, CaptureProvider, CaptureSource};
pub use stream::{CaptureConstraints, CaptureStream, Track, TrackKind};
