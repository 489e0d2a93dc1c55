use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::capture::CaptureSource;
use crate::encoder::ContainerFormat;
use crate::session::{Quality, SessionSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub recording: RecordingConfig,
    pub capture: CaptureConfig,
    pub ffmpeg: FfmpegConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    pub quality: Quality,
    /// Target video bitrate in kbps
    pub bitrate_kbps: u32,
    pub container: ContainerFormat,
    pub audio: bool,
    /// Where finished recordings are saved
    pub output_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    pub source: CaptureSource,
    /// Override for the platform's default video grab input (e.g. ":0.0+0,0")
    pub video_input: Option<String>,
    /// Override for the platform's default audio input
    pub audio_input: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FfmpegConfig {
    pub binary: String,
    /// Seconds to wait for the capture access probe
    pub probe_timeout_secs: u64,
    /// Seconds to wait for the encoder to flush after a stop before killing it
    pub finish_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON key/value file holding UI preferences (theme)
    pub settings_path: String,
}

impl Config {
    /// Load configuration from built-in defaults, an optional file at `path`
    /// and `LOQA_SCREEN` prefixed environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("recording.quality", "medium")?
            .set_default("recording.bitrate_kbps", 2500)?
            .set_default("recording.container", "webm")?
            .set_default("recording.audio", true)?
            .set_default("recording.output_dir", "~/Videos/loqa-screen")?
            .set_default("capture.source", "screen")?
            .set_default("ffmpeg.binary", "ffmpeg")?
            .set_default("ffmpeg.probe_timeout_secs", 10)?
            .set_default("ffmpeg.finish_timeout_secs", 10)?
            .set_default("http.bind", "127.0.0.1")?
            .set_default("http.port", 3030)?
            .set_default("storage.settings_path", "~/.config/loqa-screen/settings.json")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("LOQA_SCREEN").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        Ok(settings.try_deserialize()?)
    }

    /// Session settings selected by default before the user changes any control
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            quality: self.recording.quality,
            bitrate_kbps: self.recording.bitrate_kbps,
            container: self.recording.container,
            audio: self.recording.audio,
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_path(&self.recording.output_dir)
    }

    pub fn settings_path(&self) -> PathBuf {
        expand_path(&self.storage.settings_path)
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
