//! The per-connection task: opens the socket, performs the handshake and then
//! multiplexes inbound frames with the outbound queue until the connection ends.

use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::{CloseFrame, Message},
};
use tracing::{debug, error, info, trace, warn};

use crate::{
    error::RealtimeError,
    pending::PendingConnect,
    state::{ConnectionState, LiveEvent},
    types::{ClientMessage, ServerContent, ServerMessage, TimeLeft, ToolCall},
};

/// A unit on the outbound queue.
#[derive(Debug)]
pub(crate) enum Outbound {
    Message(ClientMessage),
    Close,
}

/// State shared between the client handle and its connection tasks.
///
/// `epoch` identifies the live connection instance. Every write coming from a
/// connection task happens while holding the epoch lock and only if the task's
/// epoch is still current.
#[derive(Debug)]
pub(crate) struct Shared {
    state: watch::Sender<ConnectionState>,
    speaking: AtomicBool,
    events: mpsc::UnboundedSender<LiveEvent>,
    epoch: Mutex<u64>,
}

impl Shared {
    pub(crate) fn new(events: mpsc::UnboundedSender<LiveEvent>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state,
            speaking: AtomicBool::new(false),
            events,
            epoch: Mutex::new(0),
        }
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Opens a new connection instance in `Connecting`.
    pub(crate) fn begin(&self) -> Result<u64, ConnectionState> {
        let mut epoch = self.lock_epoch();
        let current = self.state();
        if !current.is_terminal() {
            return Err(current);
        }
        *epoch += 1;
        self.state.send_replace(ConnectionState::Connecting);
        self.speaking.store(false, Ordering::SeqCst);
        Ok(*epoch)
    }

    /// Retires the current instance from the owner's side.
    pub(crate) fn reset(&self, pending: &PendingConnect) {
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        self.state.send_replace(ConnectionState::Disconnected);
        self.speaking.store(false, Ordering::SeqCst);
        pending.fail(RealtimeError::Cancelled);
    }
}

pub(crate) enum Flow {
    Continue,
    Stop,
}

/// A connection task's view of [`Shared`], pinned to one epoch.
#[derive(Debug, Clone)]
pub(crate) struct Link {
    epoch: u64,
    shared: Arc<Shared>,
    pending: Arc<PendingConnect>,
}

impl Link {
    pub(crate) fn new(epoch: u64, shared: Arc<Shared>, pending: Arc<PendingConnect>) -> Self {
        Self {
            epoch,
            shared,
            pending,
        }
    }

    fn gate(&self) -> Option<MutexGuard<'_, u64>> {
        let guard = self.shared.lock_epoch();
        (*guard == self.epoch).then_some(guard)
    }

    fn transition(&self, to: ConnectionState) -> bool {
        match self.gate() {
            Some(_gate) => {
                debug!(state = %to, "Connection state changed");
                self.shared.state.send_replace(to);
                true
            }
            None => false,
        }
    }

    fn emit(&self, event: LiveEvent) {
        if let Some(_gate) = self.gate() {
            // The receiver may be gone during shutdown; nothing is left to notify.
            let _ = self.shared.events.send(event);
        }
    }

    /// Sets the speaking flag, returning its previous value.
    fn set_speaking(&self, speaking: bool) -> bool {
        match self.gate() {
            Some(_gate) => self.shared.speaking.swap(speaking, Ordering::SeqCst),
            None => speaking,
        }
    }

    /// `SettingUp` -> `Ready`, resolving the pending connect with success.
    fn complete_handshake(&self) -> bool {
        let Some(_gate) = self.gate() else {
            return false;
        };
        if *self.shared.state.borrow() != ConnectionState::SettingUp {
            return false;
        }
        self.shared.state.send_replace(ConnectionState::Ready);
        self.pending.resolve(Ok(()));
        let _ = self.shared.events.send(LiveEvent::SetupComplete);
        true
    }

    /// Ends this instance with `state`.
    ///
    /// The failure is reported exactly once: through the pending connect if
    /// it is still outstanding, otherwise as a `Disconnected` event.
    pub(crate) fn fail(&self, state: ConnectionState, err: RealtimeError) {
        let Some(mut gate) = self.gate() else {
            return;
        };
        *gate += 1;
        self.shared.state.send_replace(state);
        self.shared.speaking.store(false, Ordering::SeqCst);
        let reason = err.to_string();
        if !self.pending.fail(err) {
            let _ = self.shared.events.send(LiveEvent::Disconnected(reason));
        }
    }

    /// Fails the handshake because its deadline passed.
    ///
    /// Returns `false` when the handshake had already been resolved.
    pub(crate) fn time_out(&self) -> bool {
        let Some(mut gate) = self.gate() else {
            return false;
        };
        if !self.pending.fail(RealtimeError::HandshakeTimeout) {
            return false;
        }
        *gate += 1;
        self.shared
            .state
            .send_replace(ConnectionState::Error(RealtimeError::HandshakeTimeout.to_string()));
        self.shared.speaking.store(false, Ordering::SeqCst);
        true
    }

    fn handle_frame(&self, text: &str) -> Flow {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(msg) => self.dispatch(msg),
            Err(e) => {
                debug!(error = %e, "Dropping undecodable server frame");
                Flow::Continue
            }
        }
    }

    fn dispatch(&self, msg: ServerMessage) -> Flow {
        if msg.setup_complete.is_some() {
            if self.complete_handshake() {
                info!("Gemini Live setup complete. Ready for bidirectional streaming.");
            } else {
                warn!("Ignoring setupComplete received outside of SettingUp");
            }
            return Flow::Continue;
        }

        if let Some(go_away) = msg.go_away {
            let seconds = go_away.time_left.as_ref().and_then(TimeLeft::as_seconds);
            let hint = match seconds {
                Some(seconds) => format!("{}s left", seconds),
                None => "no time left given".to_string(),
            };
            warn!(?seconds, "Server sent goAway");
            self.emit(LiveEvent::GoAway { seconds });
            self.fail(ConnectionState::Disconnected, RealtimeError::GoAway(hint));
            return Flow::Stop;
        }

        if let Some(content) = msg.server_content {
            self.handle_server_content(content);
            return Flow::Continue;
        }

        if let Some(tool_call) = msg.tool_call {
            let calls: Vec<ToolCall> = tool_call
                .function_calls
                .into_iter()
                .map(ToolCall::from)
                .collect();
            if !calls.is_empty() {
                debug!(count = calls.len(), "Received tool call");
                self.emit(LiveEvent::ToolCall(calls));
            }
        }

        if let Some(cancellation) = msg.tool_call_cancellation {
            debug!(ids = ?cancellation.ids, "Received tool call cancellation");
            self.emit(LiveEvent::ToolCallCancellation(cancellation.ids));
        }

        Flow::Continue
    }

    fn handle_server_content(&self, content: ServerContent) {
        if content.interrupted == Some(true) {
            self.set_speaking(false);
            self.emit(LiveEvent::Interrupted);
            return;
        }

        if let Some(transcription) = content.input_transcription {
            if !transcription.text.is_empty() {
                self.emit(LiveEvent::InputTranscription(transcription.text));
            }
        }
        if let Some(transcription) = content.output_transcription {
            if !transcription.text.is_empty() {
                self.emit(LiveEvent::OutputTranscription(transcription.text));
            }
        }

        if let Some(turn) = content.model_turn {
            for blob in turn.parts.into_iter().filter_map(|part| part.inline_data) {
                if !blob.is_pcm_audio() {
                    trace!(mime_type = %blob.mime_type, "Skipping non-audio inline data");
                    continue;
                }
                match base64::engine::general_purpose::STANDARD.decode(&blob.data) {
                    Ok(pcm) => {
                        if !self.set_speaking(true) {
                            debug!("Model started speaking");
                        }
                        self.emit(LiveEvent::AudioChunk {
                            data: pcm.into(),
                            sample_rate: blob.sample_rate(),
                        });
                    }
                    Err(e) => debug!(error = %e, "Dropping undecodable audio part"),
                }
            }
        }

        if content.turn_complete == Some(true) {
            self.set_speaking(false);
            self.emit(LiveEvent::TurnComplete);
        }
    }
}

fn describe_close(frame: Option<&CloseFrame>) -> String {
    match frame {
        Some(frame) if frame.reason.is_empty() => format!("code {}", u16::from(frame.code)),
        Some(frame) => format!("code {}: {}", u16::from(frame.code), frame.reason.as_str()),
        None => "no close frame".to_string(),
    }
}

/// Runs one connection instance to completion.
pub(crate) async fn run(
    link: Link,
    url: String,
    setup: ClientMessage,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    let ws_stream = match connect_async(url).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!(error = %e, "Failed to open Gemini Live socket");
            link.fail(
                ConnectionState::Error(e.to_string()),
                RealtimeError::ConnectionFailed(e.to_string()),
            );
            return;
        }
    };
    info!("Connected to Gemini Live WebSocket.");
    let (mut sink, mut stream) = ws_stream.split();

    let setup_payload = match serde_json::to_string(&setup) {
        Ok(payload) => payload,
        Err(e) => {
            link.fail(
                ConnectionState::Error(e.to_string()),
                RealtimeError::ConnectionFailed(format!("could not encode setup: {}", e)),
            );
            return;
        }
    };
    if let Err(e) = sink.send(Message::Text(setup_payload.into())).await {
        link.fail(
            ConnectionState::Error(e.to_string()),
            RealtimeError::ConnectionFailed(e.to_string()),
        );
        return;
    }
    if !link.transition(ConnectionState::SettingUp) {
        let _ = sink.close().await;
        return;
    }

    loop {
        tokio::select! {
            frame = stream.next() => {
                let flow = match frame {
                    Some(Ok(Message::Text(text))) => link.handle_frame(&text),
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => link.handle_frame(text),
                        Err(_) => {
                            debug!(len = data.len(), "Dropping non-UTF-8 binary frame");
                            Flow::Continue
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = describe_close(frame.as_ref());
                        info!(%reason, "Gemini Live socket closed by server");
                        link.fail(ConnectionState::Disconnected, RealtimeError::Closed(reason));
                        Flow::Stop
                    }
                    Some(Ok(_)) => Flow::Continue,
                    Some(Err(e)) => {
                        error!(error = %e, "Error reading from Gemini Live socket");
                        link.fail(
                            ConnectionState::Error(e.to_string()),
                            RealtimeError::Transport(e.to_string()),
                        );
                        Flow::Stop
                    }
                    None => {
                        link.fail(
                            ConnectionState::Disconnected,
                            RealtimeError::Closed("stream ended".to_string()),
                        );
                        Flow::Stop
                    }
                };
                if let Flow::Stop = flow {
                    break;
                }
            },
            command = outbound.recv() => match command {
                Some(Outbound::Message(message)) => {
                    let payload = match serde_json::to_string(&message) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(error = %e, "Dropping outbound message that failed to encode");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(payload.into())).await {
                        error!(error = %e, "Error writing to Gemini Live socket");
                        link.fail(
                            ConnectionState::Error(e.to_string()),
                            RealtimeError::Transport(e.to_string()),
                        );
                        break;
                    }
                }
                Some(Outbound::Close) | None => break,
            },
        }
    }

    let _ = sink.close().await;
    debug!("Gemini Live connection task ended");
}
