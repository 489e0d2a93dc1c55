use thiserror::Error;
use tokio::sync::mpsc;

use super::mime::ContainerFormat;
use crate::capture::CaptureStream;

/// Events emitted by a running encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// A piece of encoded container data, in output order
    Chunk(Vec<u8>),
    /// Terminal signal, sent exactly once
    Stopped,
}

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("{0}")]
    NotSupported(String),

    #[error("{0}")]
    Start(String),

    #[error("Encoder IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options an encoder is constructed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Negotiated MIME type; `None` leaves the codec choice to the encoder
    pub mime_type: Option<String>,
    /// Container the output is written in
    pub container: ContainerFormat,
    pub video_bits_per_second: u32,
}

/// Encoder trait
///
/// `start` returns the event receiver. After `finish` the encoder flushes,
/// delivers its remaining chunks and then `EncoderEvent::Stopped`.
#[async_trait::async_trait]
pub trait Encoder: Send {
    async fn start(&mut self) -> Result<mpsc::Receiver<EncoderEvent>, EncoderError>;

    async fn finish(&mut self) -> Result<(), EncoderError>;

    /// Stop at once without flushing; buffered output may be lost
    fn abort(&mut self);
}

/// Builds encoders and answers MIME support queries
pub trait EncoderFactory: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn create(
        &self,
        stream: &CaptureStream,
        options: EncoderOptions,
    ) -> Result<Box<dyn Encoder>, EncoderError>;
}
