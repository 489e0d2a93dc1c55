//! Encoders turning a live capture stream into container chunks

pub mod backend;
pub mod ffmpeg;
pub mod mime;

pub use backend::{Encoder, EncoderError, EncoderEvent, EncoderFactory, EncoderOptions};
pub use ffmpeg::{FfmpegEncoder, FfmpegEncoderFactory};
pub use mime::{negotiate_mime_type, ContainerFormat};
