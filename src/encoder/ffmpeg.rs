//! FFmpeg-backed encoder
//!
//! Runs ffmpeg with the capture tracks as inputs and the container written to
//! stdout. Every stdout read becomes one chunk. `finish` sends `q` on stdin,
//! which makes ffmpeg flush the container and exit. `abort` kills the process
//! for when it does not.

use std::collections::HashSet;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::backend::{Encoder, EncoderError, EncoderEvent, EncoderFactory, EncoderOptions};
use super::mime::ContainerFormat;
use crate::capture::CaptureStream;

/// Size of a single stdout read
const READ_CHUNK_BYTES: usize = 64 * 1024;

/// ffmpeg encoders able to produce a MIME codec token, most preferred first
fn encoder_candidates(codec: &str) -> &'static [&'static str] {
    match codec {
        "vp9" => &["libvpx-vp9"],
        "vp8" => &["libvpx"],
        "avc1" | "h264" => &["libx264", "h264_videotoolbox", "h264_mf"],
        "opus" => &["libopus", "opus"],
        "mp4a" | "aac" => &["aac", "aac_at"],
        _ => &[],
    }
}

fn is_video_codec(codec: &str) -> bool {
    matches!(codec, "vp9" | "vp8" | "avc1" | "h264")
}

/// Split `video/webm;codecs=vp9,opus` into its container and codec tokens
pub fn parse_mime_type(mime_type: &str) -> Option<(ContainerFormat, Vec<String>)> {
    let mut parts = mime_type.split(';');
    let container = match parts.next()?.trim() {
        "video/webm" => ContainerFormat::WebM,
        "video/mp4" => ContainerFormat::Mp4,
        _ => return None,
    };

    let mut codecs = Vec::new();
    for param in parts {
        if let Some(list) = param.trim().strip_prefix("codecs=") {
            codecs.extend(
                list.trim_matches('"')
                    .split(',')
                    .map(|c| c.trim().split('.').next().unwrap_or("").to_ascii_lowercase())
                    .filter(|c| !c.is_empty()),
            );
        }
    }

    Some((container, codecs))
}

/// Encoders chosen for a MIME type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecSelection {
    pub video: Option<String>,
    pub audio: Option<String>,
}

pub struct FfmpegEncoderFactory {
    binary: String,
    encoders: HashSet<String>,
}

impl FfmpegEncoderFactory {
    /// Ask the ffmpeg binary which encoders it was built with
    pub async fn probe(binary: impl Into<String>) -> Result<Self, EncoderError> {
        let binary = binary.into();
        let output = Command::new(&binary)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EncoderError::NotSupported(format!("Failed to run {}: {}", binary, e)))?;

        if !output.status.success() {
            return Err(EncoderError::NotSupported(format!(
                "{} -encoders failed: {}",
                binary,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let encoders = parse_encoder_list(&String::from_utf8_lossy(&output.stdout));
        info!("ffmpeg reports {} encoders", encoders.len());

        Ok(Self { binary, encoders })
    }

    pub fn with_encoders<I, S>(binary: impl Into<String>, encoders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            binary: binary.into(),
            encoders: encoders.into_iter().map(Into::into).collect(),
        }
    }

    fn pick(&self, codec: &str) -> Option<String> {
        encoder_candidates(codec)
            .iter()
            .find(|name| self.encoders.contains(**name))
            .map(|name| name.to_string())
    }

    /// Resolve every codec of a MIME type to an available encoder
    pub fn select(&self, mime_type: &str) -> Option<(ContainerFormat, CodecSelection)> {
        let (container, codecs) = parse_mime_type(mime_type)?;
        let mut selection = CodecSelection::default();

        for codec in &codecs {
            let encoder = self.pick(codec)?;
            if is_video_codec(codec) {
                selection.video = Some(encoder);
            } else {
                selection.audio = Some(encoder);
            }
        }

        Some((container, selection))
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.select(mime_type).is_some()
    }

    fn create(
        &self,
        stream: &CaptureStream,
        options: EncoderOptions,
    ) -> Result<Box<dyn Encoder>, EncoderError> {
        if !stream.is_live() {
            return Err(EncoderError::Start("Capture stream was already released".to_string()));
        }

        let selection = match &options.mime_type {
            Some(mime_type) => {
                let (container, selection) = self.select(mime_type).ok_or_else(|| {
                    EncoderError::NotSupported(format!("Unsupported MIME type: {}", mime_type))
                })?;
                if container != options.container {
                    return Err(EncoderError::NotSupported(format!(
                        "{} does not match container {}",
                        mime_type, options.container
                    )));
                }
                selection
            }
            None => CodecSelection::default(),
        };

        let args = build_args(stream, &options, &selection);
        debug!("ffmpeg encoder args: {:?}", args);

        Ok(Box::new(FfmpegEncoder {
            binary: self.binary.clone(),
            args,
            options,
            stdin: None,
            kill: None,
        }))
    }
}

/// Parse the table printed by `ffmpeg -encoders`
pub fn parse_encoder_list(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            let is_flag_column = flags.len() == 6
                && flags.chars().all(|c| "VASFXBD.".contains(c))
                && name != "=";
            is_flag_column.then(|| name.to_string())
        })
        .collect()
}

/// Full ffmpeg argument list for one recording
pub fn build_args(
    stream: &CaptureStream,
    options: &EncoderOptions,
    selection: &CodecSelection,
) -> Vec<String> {
    let constraints = stream.constraints();
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for track in stream.tracks() {
        args.extend(track.input_options.iter().cloned());
        args.extend(["-f".to_string(), track.format.clone(), "-i".to_string(), track.input.clone()]);
    }

    args.extend([
        "-vf".to_string(),
        format!("scale={}:{}", constraints.width, constraints.height),
        "-r".to_string(),
        constraints.frame_rate.to_string(),
    ]);

    if let Some(video) = &selection.video {
        args.extend(["-c:v".to_string(), video.clone()]);
        match video.as_str() {
            "libvpx" | "libvpx-vp9" => args.extend(
                ["-deadline", "realtime", "-cpu-used", "8"].iter().map(|s| s.to_string()),
            ),
            "libx264" => args.extend(
                ["-preset", "veryfast", "-pix_fmt", "yuv420p"].iter().map(|s| s.to_string()),
            ),
            _ => {}
        }
    }
    args.extend(["-b:v".to_string(), options.video_bits_per_second.to_string()]);

    if stream.has_audio() {
        if let Some(audio) = &selection.audio {
            args.extend(["-c:a".to_string(), audio.clone()]);
        }
    }

    if options.container == ContainerFormat::Mp4 {
        // Plain MP4 needs a seekable output; fragments can stream to a pipe
        args.extend(["-movflags".to_string(), "frag_keyframe+empty_moov+default_base_moof".to_string()]);
    }

    args.extend([
        "-f".to_string(),
        options.container.extension().to_string(),
        "pipe:1".to_string(),
    ]);

    args
}

pub struct FfmpegEncoder {
    binary: String,
    args: Vec<String>,
    options: EncoderOptions,
    stdin: Option<ChildStdin>,
    kill: Option<oneshot::Sender<()>>,
}

#[async_trait::async_trait]
impl Encoder for FfmpegEncoder {
    async fn start(&mut self) -> Result<mpsc::Receiver<EncoderEvent>, EncoderError> {
        if self.kill.is_some() {
            return Err(EncoderError::Start("Encoder already started".to_string()));
        }

        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EncoderError::Start(format!("Failed to start ffmpeg encoder: {}", e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| EncoderError::Start("Failed to capture ffmpeg stdout".to_string()))?;
        let stderr = child.stderr.take();
        self.stdin = child.stdin.take();

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("ffmpeg: {}", line);
                }
            });
        }

        let (tx, rx) = mpsc::channel(64);
        let (kill, mut killed) = oneshot::channel::<()>();
        self.kill = Some(kill);

        tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK_BYTES];
            let mut total = 0usize;

            loop {
                tokio::select! {
                    read = stdout.read(&mut buf) => match read {
                        Ok(0) => break,
                        Ok(n) => {
                            total += n;
                            if tx.send(EncoderEvent::Chunk(buf[..n].to_vec())).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to read encoder output: {}", e);
                            break;
                        }
                    },
                    // Fires on abort and when the encoder is dropped
                    _ = &mut killed => {
                        warn!("Killing ffmpeg encoder");
                        if let Err(e) = child.start_kill() {
                            error!("Failed to kill ffmpeg encoder: {}", e);
                        }
                        break;
                    }
                }
            }

            match child.wait().await {
                Ok(status) if status.success() => {
                    info!("ffmpeg encoder finished ({} bytes)", total)
                }
                Ok(status) => warn!("ffmpeg encoder exited with {} ({} bytes)", status, total),
                Err(e) => error!("Failed to wait for ffmpeg encoder: {}", e),
            }

            let _ = tx.send(EncoderEvent::Stopped).await;
        });

        info!(
            "Encoder started: {} @ {} bps",
            self.options.mime_type.as_deref().unwrap_or("<encoder default>"),
            self.options.video_bits_per_second
        );

        Ok(rx)
    }

    async fn finish(&mut self) -> Result<(), EncoderError> {
        let Some(mut stdin) = self.stdin.take() else {
            warn!("Encoder finish requested but encoder is not running");
            return Ok(());
        };

        match stdin.write_all(b"q").await {
            Ok(()) => stdin.flush().await.or_else(ignore_broken_pipe)?,
            // Process already gone; the reader task reports the stop
            Err(e) => ignore_broken_pipe(e)?,
        }

        Ok(())
    }

    fn abort(&mut self) {
        self.stdin = None;
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

fn ignore_broken_pipe(e: std::io::Error) -> Result<(), std::io::Error> {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        Ok(())
    } else {
        Err(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConstraints, Track, TrackKind};
    use std::time::Duration;

    fn stream(audio: bool) -> CaptureStream {
        let mut tracks = vec![Track {
            kind: TrackKind::Video,
            format: "lavfi".to_string(),
            input: "testsrc2=size=1280x720:rate=30".to_string(),
            input_options: vec!["-re".to_string()],
        }];
        if audio {
            tracks.push(Track {
                kind: TrackKind::Audio,
                format: "lavfi".to_string(),
                input: "sine".to_string(),
                input_options: vec!["-re".to_string()],
            });
        }
        CaptureStream::new(CaptureConstraints { width: 1280, height: 720, frame_rate: 30 }, tracks)
    }

    fn factory() -> FfmpegEncoderFactory {
        FfmpegEncoderFactory::with_encoders("ffmpeg", ["libvpx-vp9", "libopus", "aac"])
    }

    #[test]
    fn parses_mime_codecs() {
        let (container, codecs) = parse_mime_type("video/webm;codecs=vp9,opus").unwrap();
        assert_eq!(container, ContainerFormat::WebM);
        assert_eq!(codecs, vec!["vp9", "opus"]);

        let (container, codecs) = parse_mime_type("video/mp4; codecs=\"avc1.42E01E,mp4a.40.2\"").unwrap();
        assert_eq!(container, ContainerFormat::Mp4);
        assert_eq!(codecs, vec!["avc1", "mp4a"]);

        assert!(parse_mime_type("audio/ogg").is_none());
    }

    #[test]
    fn support_requires_every_codec() {
        let factory = factory();

        assert!(factory.is_type_supported("video/webm;codecs=vp9,opus"));
        assert!(!factory.is_type_supported("video/webm;codecs=vp8,opus"));
        assert!(!factory.is_type_supported("video/mp4;codecs=avc1,mp4a"));
        assert!(factory.is_type_supported("video/webm"));
    }

    #[test]
    fn parses_encoder_listing() {
        let listing = "Encoders:\n V..... = Video\n A..... = Audio\n ------\n V....D libx264              libx264 H.264\n A....D aac                  AAC (Advanced Audio Coding)\n";
        let encoders = parse_encoder_list(listing);

        assert!(encoders.contains("libx264"));
        assert!(encoders.contains("aac"));
        assert!(!encoders.contains("="));
        assert_eq!(encoders.len(), 2);
    }

    #[test]
    fn args_carry_bitrate_codecs_and_pipe_output() {
        let options = EncoderOptions {
            mime_type: Some("video/webm;codecs=vp9,opus".to_string()),
            container: ContainerFormat::WebM,
            video_bits_per_second: 2_500_000,
        };
        let (_, selection) = factory().select("video/webm;codecs=vp9,opus").unwrap();
        let args = build_args(&stream(true), &options, &selection);
        let joined = args.join(" ");

        assert!(joined.contains("-re -f lavfi -i testsrc2=size=1280x720:rate=30"));
        assert!(joined.contains("-c:v libvpx-vp9"));
        assert!(joined.contains("-b:v 2500000"));
        assert!(joined.contains("-c:a libopus"));
        assert!(joined.ends_with("-f webm pipe:1"));
    }

    #[test]
    fn missing_mime_type_leaves_codecs_to_ffmpeg() {
        let options = EncoderOptions {
            mime_type: None,
            container: ContainerFormat::Mp4,
            video_bits_per_second: 1_000_000,
        };
        let args = build_args(&stream(false), &options, &CodecSelection::default());

        assert!(!args.iter().any(|a| a == "-c:v" || a == "-c:a"));
        assert!(args.iter().any(|a| a == "frag_keyframe+empty_moov+default_base_moof"));
        assert!(args.join(" ").ends_with("-f mp4 pipe:1"));
    }

    #[test]
    fn create_rejects_unsupported_mime_type() {
        let options = EncoderOptions {
            mime_type: Some("video/mp4;codecs=avc1,mp4a".to_string()),
            container: ContainerFormat::Mp4,
            video_bits_per_second: 1_000_000,
        };

        assert!(factory().create(&stream(false), options).is_err());
    }

    #[test]
    fn create_rejects_released_stream() {
        let options = EncoderOptions {
            mime_type: None,
            container: ContainerFormat::WebM,
            video_bits_per_second: 1_000_000,
        };
        let mut stream = stream(false);
        stream.stop_tracks();

        assert!(factory().create(&stream, options).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn abort_kills_encoder_that_ignores_finish() {
        // `sleep` never reads stdin, so the `q` from finish goes unanswered
        let mut encoder = FfmpegEncoder {
            binary: "sleep".to_string(),
            args: vec!["1000".to_string()],
            options: EncoderOptions {
                mime_type: None,
                container: ContainerFormat::WebM,
                video_bits_per_second: 1_000_000,
            },
            stdin: None,
            kill: None,
        };

        let mut events = encoder.start().await.unwrap();
        encoder.finish().await.unwrap();
        assert!(
            tokio::time::timeout(Duration::from_millis(200), events.recv()).await.is_err(),
            "Process should still be running"
        );

        encoder.abort();
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("Encoder should stop after abort");
        assert_eq!(event, Some(EncoderEvent::Stopped));
    }
}
