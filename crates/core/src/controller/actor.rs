use bytes::Bytes;
use chrono::{DateTime, Utc};
use gemini_realtime::{GeminiLiveClient, LiveEvent, ToolResponse};
use std::{future, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::{Command, SessionSnapshot};
use crate::{
    audio::{AudioIo, PcmChunker},
    error::SessionError,
    history::HistoryStore,
    message::{ChatMessage, SessionRecord},
    settings::SessionSettings,
    throttle::VideoThrottle,
    tools::{ToolBridge, ToolCallRouter},
    transcript::TranscriptAccumulator,
};

const CAPTURE_QUEUE: usize = 64;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One started session. Exists from a successful start until stop or disconnect.
struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    client: GeminiLiveClient,
    events: mpsc::UnboundedReceiver<LiveEvent>,
    router: ToolCallRouter,
    tool_results: mpsc::UnboundedReceiver<ToolResponse>,
    capture: Option<mpsc::Receiver<Bytes>>,
    capturing: bool,
    chunker: PcmChunker,
    throttle: VideoThrottle,
    transcript: TranscriptAccumulator,
    messages: Vec<ChatMessage>,
}

impl Session {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active: true,
            session_id: Some(self.id),
            connection: self.client.state(),
            model_speaking: self.client.is_model_speaking(),
            messages: self.messages.clone(),
            pending_user: self.transcript.pending_user().to_string(),
            pending_assistant: self.transcript.pending_assistant().to_string(),
            tool_calls_in_flight: self.router.in_flight(),
            error: None,
        }
    }

    fn commit_transcript(&mut self) {
        self.messages.extend(self.transcript.commit());
    }
}

enum Wake {
    Event(LiveEvent),
    ToolResult(ToolResponse),
    Capture(Option<Bytes>),
}

async fn recv_capture(capture: Option<&mut mpsc::Receiver<Bytes>>) -> Option<Bytes> {
    match capture {
        Some(capture) => capture.recv().await,
        None => future::pending().await,
    }
}

/// Waits for the next input of the active session; pends forever without one.
async fn next_wake(session: &mut Option<Session>) -> Wake {
    let Some(session) = session.as_mut() else {
        return future::pending().await;
    };
    let capture = session.capture.as_mut();
    tokio::select! {
        Some(event) = session.events.recv() => Wake::Event(event),
        Some(response) = session.tool_results.recv() => Wake::ToolResult(response),
        pcm = recv_capture(capture) => Wake::Capture(pcm),
    }
}

pub(super) struct Actor {
    settings: SessionSettings,
    audio: Arc<dyn AudioIo>,
    tools: Arc<dyn ToolBridge>,
    history: Arc<dyn HistoryStore>,
    commands: mpsc::Receiver<Command>,
    snapshot: watch::Sender<SessionSnapshot>,
    session: Option<Session>,
    error: Option<String>,
    deferred_stops: Vec<oneshot::Sender<()>>,
}

impl Actor {
    pub(super) fn new(
        settings: SessionSettings,
        audio: Arc<dyn AudioIo>,
        tools: Arc<dyn ToolBridge>,
        history: Arc<dyn HistoryStore>,
        commands: mpsc::Receiver<Command>,
        snapshot: watch::Sender<SessionSnapshot>,
    ) -> Self {
        Self {
            settings,
            audio,
            tools,
            history,
            commands,
            snapshot,
            session: None,
            error: None,
            deferred_stops: Vec::new(),
        }
    }

    pub(super) async fn run(mut self) {
        let mut poll = tokio::time::interval(self.settings.state_poll_interval.max(MIN_POLL_INTERVAL));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                wake = next_wake(&mut self.session) => self.handle_wake(wake).await,
                _ = poll.tick(), if self.session.is_some() => self.publish(),
            }
        }

        if let Some(session) = self.session.take() {
            self.finish(session).await;
        }
        debug!("Session controller stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                self.stop().await;
                let _ = reply.send(());
            }
            Command::SendText(text) => self.send_text(&text),
            Command::VideoFrame(jpeg) => self.send_video_frame(&jpeg),
        }
    }

    async fn start(&mut self) -> Result<(), SessionError> {
        if self.session.is_some() {
            debug!("Session already active; ignoring start");
            return Ok(());
        }
        self.error = None;

        match self.open().await {
            Ok(session) => {
                info!(session_id = %session.id, "Session started");
                self.session = Some(session);
                self.publish();
                Ok(())
            }
            Err(err) => {
                match &err {
                    SessionError::Stopped => info!("Session start aborted by stop"),
                    _ => {
                        warn!(error = %err, "Session start failed");
                        self.error = Some(err.to_string());
                    }
                }
                self.publish();
                for reply in self.deferred_stops.drain(..) {
                    let _ = reply.send(());
                }
                Err(err)
            }
        }
    }

    /// Builds a session: tool bridge reset, router, handshake, then capture.
    ///
    /// Anything started before a failing step is released before returning.
    async fn open(&mut self) -> Result<Session, SessionError> {
        if !self.settings.live.has_credentials() {
            return Err(SessionError::Configuration(
                "Gemini API key is not set".to_string(),
            ));
        }

        let declarations = self.tools.reset().await?;
        debug!(tools = declarations.len(), "Tool bridge reset");
        let mut live = self.settings.live.clone();
        live.tools = declarations;

        let (client, events) = GeminiLiveClient::new(live);
        let (router, tool_results) = ToolCallRouter::new(self.tools.clone());
        let mut session = Session {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            client,
            events,
            router,
            tool_results,
            capture: None,
            capturing: false,
            chunker: PcmChunker::new(self.settings.capture_chunk),
            throttle: VideoThrottle::new(self.settings.video_frame_interval),
            transcript: TranscriptAccumulator::new(),
            messages: Vec::new(),
        };
        self.snapshot.send_replace(session.snapshot());

        if let Err(err) = self.handshake(&session.client).await {
            session.client.disconnect().await;
            return Err(err);
        }

        let (capture_tx, capture_rx) = mpsc::channel(CAPTURE_QUEUE);
        if let Err(err) = self.audio.start_capture(capture_tx).await {
            session.client.disconnect().await;
            return Err(err.into());
        }
        session.capture = Some(capture_rx);
        session.capturing = true;
        Ok(session)
    }

    /// Connects `client`, mirroring its state and honoring a concurrent stop.
    async fn handshake(&mut self, client: &GeminiLiveClient) -> Result<(), SessionError> {
        let mut states = client.subscribe_state();
        let connect = client.connect();
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => return result.map_err(SessionError::from),
                Ok(()) = states.changed() => {
                    let connection = states.borrow_and_update().clone();
                    self.snapshot.send_modify(|snapshot| snapshot.connection = connection);
                }
                command = self.commands.recv() => match command {
                    Some(Command::Stop(reply)) => {
                        self.deferred_stops.push(reply);
                        return Err(SessionError::Stopped);
                    }
                    // Already starting.
                    Some(Command::Start(reply)) => {
                        let _ = reply.send(Ok(()));
                    }
                    Some(Command::SendText(_)) | Some(Command::VideoFrame(_)) => {
                        trace!("Dropping input received before the session is ready");
                    }
                    None => return Err(SessionError::ControllerClosed),
                },
            }
        }
    }

    async fn stop(&mut self) {
        self.error = None;
        match self.session.take() {
            Some(session) => self.finish(session).await,
            None => debug!("Stop requested without an active session"),
        }
        self.publish();
    }

    /// Archives the conversation and releases everything the session holds.
    async fn finish(&mut self, mut session: Session) {
        session.commit_transcript();
        if let Some(record) =
            SessionRecord::from_conversation(session.id, session.started_at, &session.messages)
        {
            let count = record.messages.len();
            match self.history.save(record).await {
                Ok(()) => info!(session_id = %session.id, messages = count, "Session archived"),
                Err(e) => error!(session_id = %session.id, error = ?e, "Failed to archive session"),
            }
        }

        session.router.cancel_all();
        if session.capturing {
            self.audio.stop_capture().await;
        }
        self.audio.stop_playback();
        session.client.disconnect().await;
        session.chunker.clear();
        info!(session_id = %session.id, "Session ended");
    }

    async fn handle_wake(&mut self, wake: Wake) {
        match wake {
            Wake::Event(event) => self.handle_event(event).await,
            Wake::ToolResult(response) => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                if let Some(response) = session.router.settle(response) {
                    debug!(id = %response.id, tool = %response.name, "Sending tool response");
                    session.client.send_tool_response(vec![response]);
                }
                self.publish();
            }
            Wake::Capture(Some(pcm)) => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                for chunk in session.chunker.push(&pcm) {
                    session.client.send_audio(&chunk);
                }
            }
            Wake::Capture(None) => {
                if let Some(session) = self.session.as_mut() {
                    warn!("Audio capture stream ended");
                    session.capture = None;
                }
            }
        }
    }

    async fn handle_event(&mut self, event: LiveEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match event {
            LiveEvent::SetupComplete => {}
            LiveEvent::GoAway { seconds } => {
                warn!(?seconds, "Server will close the session soon");
            }
            LiveEvent::Interrupted => {
                debug!("Model interrupted");
                self.audio.stop_playback();
            }
            LiveEvent::AudioChunk { data, sample_rate } => {
                self.audio.play(data, sample_rate);
            }
            LiveEvent::TurnComplete => session.commit_transcript(),
            LiveEvent::InputTranscription(text) => session.transcript.push_user(&text),
            LiveEvent::OutputTranscription(text) => {
                if let Some(user) = session.transcript.push_assistant(&text) {
                    session.messages.push(user);
                }
            }
            LiveEvent::ToolCall(calls) => session.router.dispatch(calls),
            LiveEvent::ToolCallCancellation(ids) => {
                let cancelled = session.router.cancel(&ids);
                debug!(requested = ids.len(), cancelled, "Tool calls cancelled");
            }
            LiveEvent::Disconnected(reason) => {
                warn!(%reason, "Live connection lost; ending session");
                if let Some(session) = self.session.take() {
                    self.finish(session).await;
                }
                self.error = Some(reason);
            }
        }
        self.publish();
    }

    fn send_text(&mut self, text: &str) {
        let text = text.trim();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if text.is_empty() || !session.client.state().is_ready() {
            debug!("Dropping text message: session is not ready");
            return;
        }
        if !session.client.send_text(text) {
            warn!("Text message was not queued; leaving the transcript unchanged");
            return;
        }
        session.messages.push(ChatMessage::user(text));
        session.transcript.clear_user();
        self.publish();
    }

    fn send_video_frame(&mut self, jpeg: &[u8]) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.client.state().is_ready() {
            return;
        }
        let now = Instant::now();
        if !session.throttle.ready(now) {
            trace!("Video frame throttled");
            return;
        }
        if session.client.send_video_frame(jpeg) {
            session.throttle.mark_sent(now);
        }
    }

    fn publish(&self) {
        let next = SessionSnapshot {
            error: self.error.clone(),
            ..self
                .session
                .as_ref()
                .map(Session::snapshot)
                .unwrap_or_default()
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
