//! The session controller: one worker task that owns the transcript and
//! drives each exchange from request to settled message.
//!
//! Callers talk to the worker through a [`SessionHandle`]. Commands arrive
//! over an mpsc channel and are answered on oneshot replies; every change to
//! the transcript or the exchange lifecycle is published as a
//! [`SessionSnapshot`] on a watch channel.

use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use narutalk_chat::{
    Directive, EventInterpreter, ExchangeOutcome, ExchangeState, ExchangeTransition, Frame,
    FrameDecoder, MessageId, SessionInfo, Transcript, TranscriptRejection, TranscriptUpdate,
    parse_event,
};
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::ChatConfig;
use crate::error::{ExchangeError, SessionError, SessionResult};
use crate::observer::{FinishReason, SessionObserver};
use crate::transport::{ChatRequest, ChatTransport};
use crate::watchdog::Watchdog;

const COMMAND_BUFFER: usize = 32;

/// Future that runs the session until every handle is dropped.
pub type SessionWorker = Pin<Box<dyn Future<Output = ()> + Send>>;

/// What a reader sees of the session at one point in time.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub transcript: Arc<Transcript>,
    pub exchange: ExchangeState,
}

impl SessionSnapshot {
    /// Whether input should be disabled.
    pub fn is_busy(&self) -> bool {
        self.exchange.is_in_flight()
    }
}

enum SessionCommand {
    Send {
        text: String,
        reply: oneshot::Sender<SessionResult<MessageId>>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    info: SessionInfo,
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn info(&self) -> SessionInfo {
        self.info
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Submits a user message.
    ///
    /// Resolves as soon as the exchange has begun, with the id of the
    /// assistant message that will carry the reply.
    pub async fn send(&self, text: impl Into<String>) -> SessionResult<MessageId> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Send {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        response.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// Resets the transcript to the greeting, cancelling any exchange in flight.
    pub async fn clear(&self) -> SessionResult<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Clear { reply })
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        response.await.map_err(|_| SessionError::SessionClosed)
    }

    /// Waits until no exchange is in flight and returns that snapshot.
    pub async fn wait_settled(&self) -> SessionResult<SessionSnapshot> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| !snapshot.is_busy())
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        Ok(snapshot.clone())
    }
}

/// Handle plus the worker future the caller must spawn.
pub struct SessionStart {
    pub handle: SessionHandle,
    pub worker: SessionWorker,
}

/// Why an exchange stopped before a terminal signal.
enum Interrupt {
    Clear(oneshot::Sender<()>),
    Shutdown,
}

enum Settlement {
    Completed,
    Failed(ExchangeError),
    Cancelled(Interrupt),
}

pub struct ChatSession {
    info: SessionInfo,
    config: ChatConfig,
    transport: Arc<dyn ChatTransport>,
    observer: Arc<dyn SessionObserver>,
    commands: mpsc::Receiver<SessionCommand>,
    snapshots: watch::Sender<SessionSnapshot>,
    transcript: Arc<Transcript>,
    exchange: ExchangeState,
    watchdog: Watchdog,
}

impl ChatSession {
    /// Creates a session showing the configured greeting.
    pub fn start(
        config: ChatConfig,
        transport: Arc<dyn ChatTransport>,
        observer: Arc<dyn SessionObserver>,
    ) -> SessionStart {
        let info = SessionInfo::generate();
        let transcript = Arc::new(Transcript::with_greeting(&config.greeting, Utc::now()));
        let exchange = ExchangeState::default();
        let (snapshots, snapshot_rx) = watch::channel(SessionSnapshot {
            transcript: Arc::clone(&transcript),
            exchange: exchange.clone(),
        });
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);

        let session = Self {
            info,
            watchdog: Watchdog::new(config.idle_timeout()),
            config,
            transport,
            observer,
            commands,
            snapshots,
            transcript,
            exchange,
        };

        tracing::info!(session_id = %info.session_id, "chat session started");

        SessionStart {
            handle: SessionHandle {
                info,
                commands: command_tx,
                snapshots: snapshot_rx,
            },
            worker: Box::pin(session.run()),
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                SessionCommand::Send { text, reply } => {
                    if self.handle_send(text, reply).await.is_break() {
                        break;
                    }
                }
                SessionCommand::Clear { reply } => {
                    self.clear_transcript();
                    let _ = reply.send(());
                }
            }
        }
        tracing::info!(session_id = %self.info.session_id, "chat session stopped");
    }

    async fn handle_send(
        &mut self,
        text: String,
        reply: oneshot::Sender<SessionResult<MessageId>>,
    ) -> ControlFlow<()> {
        let text = text.trim();
        let message_id = match self.begin(text) {
            Ok(message_id) => message_id,
            Err(error) => {
                self.observer.send_rejected(&error);
                let _ = reply.send(Err(error));
                return ControlFlow::Continue(());
            }
        };

        let _ = reply.send(Ok(message_id));
        self.observer.exchange_started(&self.info, message_id);

        let request = ChatRequest {
            message: text.to_string(),
            session_id: self.info.session_id.to_string(),
        };
        let settlement = self.drive_exchange(message_id, request).await;
        self.settle(message_id, settlement)
    }

    fn begin(&mut self, text: &str) -> SessionResult<MessageId> {
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if let Some(active) = self.exchange.in_flight() {
            return Err(SessionError::ExchangeInFlight { active });
        }

        let (transcript, message_id) = match self.transcript.begin_exchange(text, Utc::now()) {
            Ok(begun) => begun,
            Err(TranscriptRejection::ActiveMessageExists { active }) => {
                return Err(SessionError::ExchangeInFlight { active });
            }
        };

        self.transcript = Arc::new(transcript);
        self.transition(ExchangeTransition::Begin(message_id));
        self.watchdog.arm();
        self.publish();
        Ok(message_id)
    }

    async fn drive_exchange(&mut self, message_id: MessageId, request: ChatRequest) -> Settlement {
        let transport = Arc::clone(&self.transport);
        let mut opening = transport.open_stream(request);

        let mut body = loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    if let Some(interrupt) = self.intercept(message_id, command) {
                        return Settlement::Cancelled(interrupt);
                    }
                }
                _ = self.watchdog.expired() => return self.timed_out(),
                opened = &mut opening => match opened {
                    Ok(body) => break body,
                    Err(error) => return Settlement::Failed(error),
                },
            }
        };

        self.transition(ExchangeTransition::Open);
        self.publish();

        let mut decoder = FrameDecoder::new();
        let mut interpreter = EventInterpreter::new();
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    if let Some(interrupt) = self.intercept(message_id, command) {
                        return Settlement::Cancelled(interrupt);
                    }
                }
                _ = self.watchdog.expired() => return self.timed_out(),
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        self.watchdog.arm();
                        for frame in decoder.feed(&bytes) {
                            if let Some(settlement) =
                                self.apply_frame(message_id, &mut interpreter, frame)
                            {
                                return settlement;
                            }
                        }
                    }
                    Some(Err(source)) => {
                        return Settlement::Failed(ExchangeError::Transport { source });
                    }
                    None => {
                        if let Some(frame) = decoder.finish()
                            && let Some(settlement) =
                                self.apply_frame(message_id, &mut interpreter, frame)
                        {
                            return settlement;
                        }
                        self.observer
                            .stream_finished(message_id, FinishReason::EndOfBody);
                        return self
                            .apply_directive(message_id, interpreter.finish())
                            .unwrap_or(Settlement::Completed);
                    }
                },
            }
        }
    }

    /// Handles a command that arrived mid-exchange.
    fn intercept(
        &mut self,
        active: MessageId,
        command: Option<SessionCommand>,
    ) -> Option<Interrupt> {
        match command {
            Some(SessionCommand::Send { text, reply }) => {
                let error = if text.trim().is_empty() {
                    SessionError::EmptyMessage
                } else {
                    SessionError::ExchangeInFlight { active }
                };
                self.observer.send_rejected(&error);
                let _ = reply.send(Err(error));
                None
            }
            Some(SessionCommand::Clear { reply }) => Some(Interrupt::Clear(reply)),
            None => Some(Interrupt::Shutdown),
        }
    }

    fn timed_out(&self) -> Settlement {
        Settlement::Failed(ExchangeError::Timeout {
            idle: self.watchdog.timeout(),
        })
    }

    fn apply_frame(
        &mut self,
        message_id: MessageId,
        interpreter: &mut EventInterpreter,
        frame: Frame,
    ) -> Option<Settlement> {
        match frame {
            Frame::Done => {
                self.observer
                    .stream_finished(message_id, FinishReason::Sentinel);
                self.apply_directive(message_id, interpreter.finish())
            }
            Frame::Data(payload) => match parse_event(&payload) {
                Ok(event) => {
                    let directive = interpreter.interpret(&event);
                    self.observer.event_applied(message_id, &event);
                    self.apply_directive(message_id, directive)
                }
                Err(error) => {
                    self.observer.frame_rejected(message_id, &error);
                    None
                }
            },
        }
    }

    fn apply_directive(&mut self, message_id: MessageId, directive: Directive) -> Option<Settlement> {
        match directive {
            Directive::Continue(update) => {
                if let Some(update) = update {
                    self.apply_update(message_id, &update);
                }
                None
            }
            Directive::Complete(update) => {
                self.apply_update(message_id, &update);
                Some(Settlement::Completed)
            }
            Directive::Fail { message } => {
                Some(Settlement::Failed(ExchangeError::Application { message }))
            }
        }
    }

    fn apply_update(&mut self, message_id: MessageId, update: &TranscriptUpdate) {
        if let Some(next) = self.transcript.apply(message_id, update) {
            self.transcript = Arc::new(next);
            self.publish();
        }
    }

    fn settle(&mut self, message_id: MessageId, settlement: Settlement) -> ControlFlow<()> {
        self.watchdog.disarm();

        let (outcome, interrupt) = match settlement {
            Settlement::Completed => (ExchangeOutcome::Completed, None),
            Settlement::Failed(error) => {
                let update = TranscriptUpdate::Fail {
                    description: error.user_facing(self.config.debug_errors),
                };
                self.apply_update(message_id, &update);
                let outcome = ExchangeOutcome::Failed {
                    kind: error.kind(),
                    description: error.to_string(),
                };
                (outcome, None)
            }
            Settlement::Cancelled(interrupt) => {
                let update = TranscriptUpdate::Settle {
                    content: None,
                    agent: None,
                };
                self.apply_update(message_id, &update);
                (ExchangeOutcome::Cancelled, Some(interrupt))
            }
        };

        self.transition(ExchangeTransition::Settle(outcome.clone()));
        self.publish();
        self.observer.exchange_settled(message_id, &outcome);

        match interrupt {
            Some(Interrupt::Clear(reply)) => {
                self.clear_transcript();
                let _ = reply.send(());
                ControlFlow::Continue(())
            }
            Some(Interrupt::Shutdown) => ControlFlow::Break(()),
            None => ControlFlow::Continue(()),
        }
    }

    fn clear_transcript(&mut self) {
        self.transcript = Arc::new(self.transcript.cleared(&self.config.greeting, Utc::now()));
        self.transition(ExchangeTransition::Reset);
        self.publish();
        tracing::info!(session_id = %self.info.session_id, "chat transcript cleared");
    }

    fn transition(&mut self, transition: ExchangeTransition) {
        match self.exchange.apply(transition) {
            Ok(next) => self.exchange = next,
            Err(rejection) => tracing::warn!(
                state = ?self.exchange,
                rejection = ?rejection,
                "ignoring illegal exchange transition"
            ),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(SessionSnapshot {
            transcript: Arc::clone(&self.transcript),
            exchange: self.exchange.clone(),
        });
    }
}
