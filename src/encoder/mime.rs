use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::backend::EncoderFactory;

/// Output container selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    WebM,
    Mp4,
}

impl ContainerFormat {
    /// Token used as the file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::WebM => "webm",
            ContainerFormat::Mp4 => "mp4",
        }
    }

    /// MIME type of artifacts in this container
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContainerFormat::WebM => "video/webm",
            ContainerFormat::Mp4 => "video/mp4",
        }
    }

    /// Codec pairings to probe, most preferred first
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            ContainerFormat::WebM => &["video/webm;codecs=vp9,opus", "video/webm;codecs=vp8,opus"],
            ContainerFormat::Mp4 => &["video/mp4;codecs=avc1,mp4a"],
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ContainerFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webm" => Ok(ContainerFormat::WebM),
            "mp4" => Ok(ContainerFormat::Mp4),
            other => Err(format!("Unknown container format: {}", other)),
        }
    }
}

/// Pick the first candidate of `container` the encoder factory supports
///
/// Returns `None` when no pairing is supported. No other container is tried.
pub fn negotiate_mime_type(
    container: ContainerFormat,
    factory: &dyn EncoderFactory,
) -> Option<String> {
    container
        .candidates()
        .iter()
        .find(|candidate| factory.is_type_supported(candidate))
        .map(|candidate| candidate.to_string())
}
