//! Recorder event loop
//!
//! One task owns the `RecordingSession` and dispatches, in arrival order:
//! - commands from `RecorderHandle` (start, stop, configure)
//! - encoder chunk and stop events
//! - one-second timer ticks while recording
//! - the delayed "ready" status callback
//! - the deadline for an encoder that does not stop after `finish`

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{info, warn};

use crate::encoder::EncoderEvent;
use crate::session::{
    RecordingSession, SavedRecording, SessionError, SessionId, SessionSettings, SessionState,
    READY_DELAY,
};

const TICK: Duration = Duration::from_secs(1);

/// Default time an encoder gets to flush after a stop request
pub const FINISH_TIMEOUT: Duration = Duration::from_secs(10);

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Commands for the recorder task
pub enum RecorderCommand {
    Start(Reply<SessionId>),
    Stop(Reply<()>),
    Configure(SessionSettings, Reply<()>),
    Settings(Reply<(SessionSettings, SessionState)>),
}

/// Lifecycle notifications broadcast to subscribers
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    Started(SessionId),
    Saved(SavedRecording),
    Failed(String),
}

pub struct Recorder {
    session: RecordingSession,
    commands: mpsc::Receiver<RecorderCommand>,
    events: broadcast::Sender<RecorderEvent>,
    finish_timeout: Duration,
}

impl Recorder {
    pub fn new(session: RecordingSession) -> (Self, RecorderHandle) {
        let (tx, commands) = mpsc::channel(16);
        let (events, _) = broadcast::channel(16);

        let handle = RecorderHandle {
            tx,
            events: events.clone(),
        };

        (
            Self {
                session,
                commands,
                events,
                finish_timeout: FINISH_TIMEOUT,
            },
            handle,
        )
    }

    /// How long to wait for the encoder after a stop before aborting it
    pub fn with_finish_timeout(mut self, timeout: Duration) -> Self {
        self.finish_timeout = timeout;
        self
    }

    /// Run the recorder on its own task
    pub fn spawn(session: RecordingSession) -> RecorderHandle {
        let (recorder, handle) = Self::new(session);
        tokio::spawn(recorder.run());
        handle
    }

    /// Process events until every handle is dropped
    pub async fn run(mut self) {
        let mut encoder_events: Option<mpsc::Receiver<EncoderEvent>> = None;
        let mut ticker: Option<Interval> = None;
        let mut finish_deadline: Option<Pin<Box<Sleep>>> = None;
        let (ready_tx, mut ready_rx) = mpsc::unbounded_channel::<SessionId>();

        info!("Recorder started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command, &mut encoder_events).await;
                }
                event = next_event(&mut encoder_events) => match event {
                    Some(EncoderEvent::Chunk(data)) => self.session.on_chunk(data),
                    other => {
                        if other.is_none() {
                            warn!("Encoder went away without a stop signal");
                        }
                        encoder_events = None;
                        self.complete(&ready_tx).await;
                    }
                },
                _ = next_tick(&mut ticker) => self.session.on_tick(),
                Some(id) = ready_rx.recv() => {
                    self.session.on_ready_timeout(id);
                }
                _ = next_deadline(&mut finish_deadline) => {
                    warn!(
                        "Encoder did not stop within {:?}, completing without it",
                        self.finish_timeout
                    );
                    finish_deadline = None;
                    self.session.abort_encoder();
                    encoder_events = None;
                    self.complete(&ready_tx).await;
                }
            }

            // The timer only runs while recording
            match (self.session.state(), ticker.is_some()) {
                (SessionState::Recording, false) => {
                    let mut t = interval_at(Instant::now() + TICK, TICK);
                    t.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    ticker = Some(t);
                }
                (SessionState::Recording, true) => {}
                (_, true) => ticker = None,
                (_, false) => {}
            }

            // Processing is bounded by the finish deadline
            match (self.session.state(), finish_deadline.is_some()) {
                (SessionState::Processing, false) => {
                    finish_deadline = Some(Box::pin(sleep(self.finish_timeout)));
                }
                (SessionState::Processing, true) => {}
                (_, true) => finish_deadline = None,
                (_, false) => {}
            }
        }

        info!("Recorder stopped");
    }

    async fn handle_command(
        &mut self,
        command: RecorderCommand,
        encoder_events: &mut Option<mpsc::Receiver<EncoderEvent>>,
    ) {
        match command {
            RecorderCommand::Start(reply) => {
                let result = match self.session.start().await {
                    Ok(events) => {
                        *encoder_events = Some(events);
                        let id = self.session.id();
                        let _ = self.events.send(RecorderEvent::Started(id));
                        Ok(id)
                    }
                    Err(e) => {
                        if !matches!(e, SessionError::Busy(_)) {
                            let _ = self.events.send(RecorderEvent::Failed(e.to_string()));
                        }
                        Err(e)
                    }
                };
                let _ = reply.send(result);
            }
            RecorderCommand::Stop(reply) => {
                let _ = reply.send(self.session.stop().await);
            }
            RecorderCommand::Configure(settings, reply) => {
                let _ = reply.send(self.session.configure(settings));
            }
            RecorderCommand::Settings(reply) => {
                let _ = reply.send(Ok((self.session.settings(), self.session.state())));
            }
        }
    }

    async fn complete(&mut self, ready_tx: &mpsc::UnboundedSender<SessionId>) {
        match self.session.on_encoder_stopped().await {
            Ok(Some(saved)) => {
                let id = saved.session_id;
                let ready_tx = ready_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(READY_DELAY).await;
                    let _ = ready_tx.send(id);
                });
                let _ = self.events.send(RecorderEvent::Saved(saved));
            }
            Ok(None) => {}
            Err(e) => {
                let _ = self.events.send(RecorderEvent::Failed(e.to_string()));
            }
        }
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<EncoderEvent>>) -> Option<EncoderEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn next_deadline(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => pending().await,
    }
}

/// Cloneable control handle for the recorder task
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
    events: broadcast::Sender<RecorderEvent>,
}

impl RecorderHandle {
    pub async fn start(&self) -> Result<SessionId, SessionError> {
        self.request(RecorderCommand::Start).await
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request(RecorderCommand::Stop).await
    }

    pub async fn configure(&self, settings: SessionSettings) -> Result<(), SessionError> {
        self.request(|reply| RecorderCommand::Configure(settings, reply))
            .await
    }

    /// Current settings and session state
    pub async fn settings(&self) -> Result<(SessionSettings, SessionState), SessionError> {
        self.request(RecorderCommand::Settings).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RecorderCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::RecorderClosed)?;
        rx.await.map_err(|_| SessionError::RecorderClosed)?
    }
}
