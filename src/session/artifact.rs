use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::format::format_size_mib;
use crate::encoder::ContainerFormat;

/// The finished recording: every delivered chunk, concatenated
///
/// Cloning shares the bytes, so a preview can hold on to the artifact while
/// the original moves on to be saved.
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    data: Arc<[u8]>,
    container: ContainerFormat,
    created_at: DateTime<Utc>,
}

impl EncodedArtifact {
    pub fn from_chunks(chunks: &[Vec<u8>], container: ContainerFormat, created_at: DateTime<Utc>) -> Self {
        Self {
            data: chunks.concat().into(),
            container,
            created_at,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        self.container.mime_type()
    }

    pub fn size_label(&self) -> String {
        format_size_mib(self.len())
    }

    pub fn file_name(&self) -> String {
        artifact_file_name(self.created_at, self.container)
    }
}

/// `rec-2025-10-28T14-03-09.webm`: UTC, seconds precision, no colons
pub fn artifact_file_name(timestamp: DateTime<Utc>, container: ContainerFormat) -> String {
    format!(
        "rec-{}.{}",
        timestamp.format("%Y-%m-%dT%H-%M-%S"),
        container.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn concatenates_chunks_in_order() {
        let chunks = vec![vec![1u8, 2], vec![3], vec![4, 5, 6]];
        let artifact = EncodedArtifact::from_chunks(&chunks, ContainerFormat::WebM, Utc::now());

        assert_eq!(artifact.data(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(artifact.mime_type(), "video/webm");
    }

    #[test]
    fn empty_artifact_is_valid() {
        let artifact = EncodedArtifact::from_chunks(&[], ContainerFormat::Mp4, Utc::now());

        assert!(artifact.is_empty());
        assert_eq!(artifact.size_label(), "0.0mb");
    }

    #[test]
    fn file_name_uses_utc_seconds_without_colons() {
        let ts = Utc.with_ymd_and_hms(2025, 10, 28, 14, 3, 9).unwrap();

        assert_eq!(artifact_file_name(ts, ContainerFormat::WebM), "rec-2025-10-28T14-03-09.webm");
        assert_eq!(artifact_file_name(ts, ContainerFormat::Mp4), "rec-2025-10-28T14-03-09.mp4");
    }
}
