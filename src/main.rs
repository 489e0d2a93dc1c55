use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use loqa_screen::capture::{CaptureSource, FfmpegCaptureProvider};
use loqa_screen::encoder::{negotiate_mime_type, FfmpegEncoderFactory};
use loqa_screen::{
    create_router, AppState, Capabilities, Collaborators, Config, ContainerFormat, FileSink,
    Quality, Recorder, RecorderEvent, RecorderHandle, RecordingSession, SessionSettings,
    StatusBoard, ThemeStore,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loqa-screen", version, about = "Record the screen to WebM or MP4")]
struct Cli {
    /// Config file (without extension)
    #[arg(long, default_value = "config/loqa-screen")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record until Ctrl-C or the given duration
    Record(RecordArgs),
    /// Serve the HTTP control API
    Serve {
        /// Record a test pattern instead of the screen
        #[arg(long)]
        test_pattern: bool,
    },
    /// Show or toggle the stored UI theme
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },
    /// Report capture/encoder capabilities and codec support
    Probe,
}

#[derive(Args)]
struct RecordArgs {
    /// high, medium or low
    #[arg(long)]
    quality: Option<Quality>,
    /// Video bitrate in kbps
    #[arg(long)]
    bitrate: Option<u32>,
    /// webm or mp4
    #[arg(long)]
    container: Option<ContainerFormat>,
    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,
    #[arg(long)]
    no_audio: bool,
    /// Record a test pattern instead of the screen
    #[arg(long)]
    test_pattern: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum ThemeAction {
    Show,
    Toggle,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Loqa Screen v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Record(args) => record(cfg, args).await,
        Command::Serve { test_pattern } => serve(cfg, test_pattern).await,
        Command::Theme { action } => theme(&cfg, action.unwrap_or(ThemeAction::Show)),
        Command::Probe => probe(&cfg).await,
    }
}

fn capture_source(cfg: &Config, test_pattern: bool) -> CaptureSource {
    if test_pattern {
        CaptureSource::TestPattern
    } else {
        cfg.capture.source
    }
}

/// Check capabilities, then wire a session to a running recorder
async fn start_recorder(
    cfg: &Config,
    settings: SessionSettings,
    source: CaptureSource,
) -> Result<(RecorderHandle, StatusBoard)> {
    let caps = Capabilities::probe(&cfg.ffmpeg.binary, source).await;
    if let Err(notice) = caps.ensure() {
        error!("{}", notice);
        bail!(notice);
    }

    let encoders = FfmpegEncoderFactory::probe(cfg.ffmpeg.binary.clone())
        .await
        .context("Failed to query ffmpeg encoders")?;

    let capture = FfmpegCaptureProvider::new(cfg.ffmpeg.binary.clone(), source)
        .with_video_input(cfg.capture.video_input.clone())
        .with_audio_input(cfg.capture.audio_input.clone())
        .with_probe_timeout(Duration::from_secs(cfg.ffmpeg.probe_timeout_secs));

    let sink = FileSink::new(cfg.output_dir());
    info!("Recordings are saved to {:?}", sink.output_dir());

    let status = StatusBoard::new();
    let session = RecordingSession::new(
        settings,
        Collaborators {
            capture: Arc::new(capture),
            encoders: Arc::new(encoders),
            sink: Arc::new(sink),
            view: Box::new(status.clone()),
        },
    );

    let (recorder, handle) = Recorder::new(session);
    let recorder =
        recorder.with_finish_timeout(Duration::from_secs(cfg.ffmpeg.finish_timeout_secs));
    tokio::spawn(recorder.run());

    Ok((handle, status))
}

async fn record(cfg: Config, args: RecordArgs) -> Result<()> {
    let defaults = cfg.session_settings();
    let settings = SessionSettings {
        quality: args.quality.unwrap_or(defaults.quality),
        bitrate_kbps: args.bitrate.unwrap_or(defaults.bitrate_kbps),
        container: args.container.unwrap_or(defaults.container),
        audio: defaults.audio && !args.no_audio,
    };

    let source = capture_source(&cfg, args.test_pattern);
    let (recorder, status) = start_recorder(&cfg, settings, source).await?;
    let mut events = recorder.subscribe();

    // Live timer on the console
    let mut watcher = status.subscribe();
    tokio::spawn(async move {
        while watcher.changed().await.is_ok() {
            let timer = watcher.borrow_and_update().timer.clone();
            print!("\r{}", timer);
            std::io::stdout().flush().ok();
        }
    });

    recorder.start().await?;
    info!("Recording... press Ctrl-C to stop");

    // The encoder may end on its own before Ctrl-C or the duration
    let already_finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        _ = sleep_for(args.duration) => None,
        finished = wait_for_finish(&mut events) => Some(finished?),
    };

    let outcome = match already_finished {
        Some(event) => event,
        None => {
            println!();
            recorder.stop().await?;
            wait_for_finish(&mut events).await?
        }
    };

    report(outcome)
}

async fn sleep_for(secs: Option<u64>) {
    match secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => std::future::pending().await,
    }
}

async fn wait_for_finish(events: &mut broadcast::Receiver<RecorderEvent>) -> Result<RecorderEvent> {
    loop {
        match events.recv().await {
            Ok(RecorderEvent::Started(_)) => {}
            Ok(event) => return Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => warn!("Missed {} recorder events", n),
            Err(broadcast::error::RecvError::Closed) => bail!("Recorder stopped unexpectedly"),
        }
    }
}

fn report(event: RecorderEvent) -> Result<()> {
    match event {
        RecorderEvent::Saved(saved) => {
            println!(
                "\nSaved {} ({}, {:.1}s)",
                saved.path.display(),
                saved.size_label,
                saved.duration.as_secs_f64()
            );
            Ok(())
        }
        RecorderEvent::Failed(message) => bail!("Recording failed: {}", message),
        RecorderEvent::Started(_) => Ok(()),
    }
}

async fn serve(cfg: Config, test_pattern: bool) -> Result<()> {
    let theme = ThemeStore::open(cfg.settings_path())?;
    let source = capture_source(&cfg, test_pattern);
    let (recorder, status) = start_recorder(&cfg, cfg.session_settings(), source).await?;

    let app = create_router(AppState::new(recorder, status, theme));
    let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn theme(cfg: &Config, action: ThemeAction) -> Result<()> {
    let mut store = ThemeStore::open(cfg.settings_path())?;

    let theme = match action {
        ThemeAction::Show => store.current(),
        ThemeAction::Toggle => store.toggle()?,
    };
    println!("{}", theme);

    Ok(())
}

async fn probe(cfg: &Config) -> Result<()> {
    let caps = Capabilities::probe(&cfg.ffmpeg.binary, cfg.capture.source).await;
    println!("{}", serde_json::to_string_pretty(&caps)?);

    if let Err(notice) = caps.ensure() {
        println!("{}", notice);
        return Ok(());
    }

    let encoders = FfmpegEncoderFactory::probe(cfg.ffmpeg.binary.clone()).await?;
    for container in [ContainerFormat::WebM, ContainerFormat::Mp4] {
        match negotiate_mime_type(container, &encoders) {
            Some(mime_type) => println!("{}: {}", container, mime_type),
            None => println!("{}: no supported codec pairing", container),
        }
    }

    Ok(())
}
