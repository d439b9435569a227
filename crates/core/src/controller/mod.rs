//! Session orchestration.
//!
//! [`SessionController`] is a cheap handle to an actor task that owns the live
//! connection, the tool router, the transcript and the message list. Callers
//! talk to it through commands and observe it through [`SessionSnapshot`]s.

mod actor;

use bytes::Bytes;
use gemini_realtime::ConnectionState;
use serde::Serialize;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::{
    audio::AudioIo, error::SessionError, history::HistoryStore, message::ChatMessage,
    settings::SessionSettings, tools::ToolBridge,
};

const COMMAND_CAPACITY: usize = 32;

/// Everything the presentation layer needs, published as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub active: bool,
    pub session_id: Option<Uuid>,
    pub connection: ConnectionState,
    pub model_speaking: bool,
    pub messages: Vec<ChatMessage>,
    pub pending_user: String,
    pub pending_assistant: String,
    pub tool_calls_in_flight: usize,
    /// The last failure, kept until the next start or stop.
    pub error: Option<String>,
}

#[derive(Debug)]
enum Command {
    Start(oneshot::Sender<Result<(), SessionError>>),
    Stop(oneshot::Sender<()>),
    SendText(String),
    VideoFrame(Bytes),
}

/// The outcome of a queued command.
#[derive(Debug)]
pub struct Reply<T>(oneshot::Receiver<T>);

impl<T> Reply<T> {
    pub async fn wait(self) -> Result<T, SessionError> {
        self.0.await.map_err(|_| SessionError::ControllerClosed)
    }
}

/// Handle to the session actor. Dropping every handle stops the session.
pub struct SessionController {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl SessionController {
    pub fn spawn(
        settings: SessionSettings,
        audio: Arc<dyn AudioIo>,
        tools: Arc<dyn ToolBridge>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let actor = actor::Actor::new(settings, audio, tools, history, commands_rx, snapshot_tx);
        let task = tokio::spawn(actor.run().instrument(info_span!("session_controller")));
        Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
            task,
        }
    }

    /// Starts a session and waits until audio is flowing or the start failed.
    ///
    /// A no-op while a session is active. Any failure leaves the controller
    /// fully stopped.
    pub async fn start_session(&self) -> Result<(), SessionError> {
        self.request_start().await?.wait().await?
    }

    /// Archives the conversation and tears everything down. Always safe to call.
    pub async fn stop_session(&self) -> Result<(), SessionError> {
        self.request_stop().await?.wait().await
    }

    /// Queues a start without waiting for its outcome.
    ///
    /// Commands queued by one caller reach the session in the order they were
    /// queued, so a start followed by a stop always ends stopped.
    pub async fn request_start(&self) -> Result<Reply<Result<(), SessionError>>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Start(reply_tx)).await?;
        Ok(Reply(reply_rx))
    }

    /// Queues a stop without waiting for the teardown.
    pub async fn request_stop(&self) -> Result<Reply<()>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Stop(reply_tx)).await?;
        Ok(Reply(reply_rx))
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::ControllerClosed)
    }

    /// Sends a typed user turn. Ignored unless the session is ready.
    pub async fn send_text_message(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::SendText(text.into())).await
    }

    /// Offers a JPEG camera frame; frames arriving faster than the configured
    /// interval are dropped.
    pub fn send_video_frame_if_throttled(&self, jpeg: Bytes) {
        if self.commands.try_send(Command::VideoFrame(jpeg)).is_err() {
            debug!("Command queue busy; dropping video frame");
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Stops any active session and waits for the actor to exit.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        let _ = task.await;
    }
}
