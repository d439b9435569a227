use base64::Engine;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
    task::JoinHandle,
};
use tracing::{Instrument, debug, info, info_span, instrument, trace, warn};

use crate::{
    config::LiveConfig,
    connection::{self, Link, Outbound, Shared},
    error::{RealtimeError, RealtimeResult},
    pending::PendingConnect,
    state::{ConnectionState, LiveEvent},
    types::{
        Blob, ClientContent, ClientMessage, Content, FunctionResponse, INPUT_AUDIO_MIME, Part,
        RealtimeInput, ToolResponse, ToolResponseMessage, VIDEO_FRAME_MIME,
    },
};

const CLOSE_GRACE: Duration = Duration::from_millis(500);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Client for one Gemini Live session at a time.
///
/// Events from every connection instance go to the single receiver returned by
/// [`GeminiLiveClient::new`]. Sends are fire-and-forget and are dropped unless
/// the connection is `Ready`.
pub struct GeminiLiveClient {
    config: LiveConfig,
    shared: Arc<Shared>,
    pending: Mutex<Arc<PendingConnect>>,
    outbound: Mutex<Option<mpsc::Sender<Outbound>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl GeminiLiveClient {
    pub fn new(config: LiveConfig) -> (Self, mpsc::UnboundedReceiver<LiveEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let client = Self {
            config,
            shared: Arc::new(Shared::new(events_tx)),
            pending: Mutex::new(Arc::new(PendingConnect::resolved())),
            outbound: Mutex::new(None),
            task: Mutex::new(None),
        };
        (client, events_rx)
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.subscribe()
    }

    /// True between the first audio part of a model turn and its
    /// `turnComplete`, interruption or the end of the connection.
    pub fn is_model_speaking(&self) -> bool {
        self.shared.is_speaking()
    }

    /// Opens a fresh connection and resolves once the handshake finished.
    ///
    /// Allowed from `Disconnected` or `Error` only. A failure of the returned
    /// future is the only report of that failure: no `Disconnected` event is
    /// emitted for it.
    #[instrument(skip_all, fields(model = %self.config.model))]
    pub async fn connect(&self) -> RealtimeResult<()> {
        let (pending, mut outcome) = PendingConnect::new();
        let pending = Arc::new(pending);
        let epoch = self
            .shared
            .begin()
            .map_err(RealtimeError::InvalidState)?;
        *lock(&self.pending) = pending.clone();

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity.max(1));
        *lock(&self.outbound) = Some(outbound_tx);

        let link = Link::new(epoch, self.shared.clone(), pending);
        info!(epoch, "Connecting to Gemini Live");
        let handle = tokio::spawn(
            connection::run(
                link.clone(),
                self.config.url(),
                self.config.setup_message(),
                outbound_rx,
            )
            .instrument(info_span!("live_connection", epoch)),
        );
        if let Some(previous) = lock(&self.task).replace(handle) {
            previous.abort();
        }

        match tokio::time::timeout(self.config.handshake_timeout, &mut outcome).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RealtimeError::ConnectionFailed(
                "connection task ended before the handshake finished".to_string(),
            )),
            Err(_) => {
                if !link.time_out() {
                    // Resolved right at the deadline; report what actually happened.
                    return outcome.try_recv().unwrap_or(Err(RealtimeError::HandshakeTimeout));
                }
                warn!(timeout = ?self.config.handshake_timeout, "Gemini Live handshake timed out");
                self.abort_task();
                Err(RealtimeError::HandshakeTimeout)
            }
        }
    }

    /// Closes the connection and forces `Disconnected`.
    ///
    /// A `connect()` still waiting for its handshake fails with
    /// [`RealtimeError::Cancelled`]. Safe to call at any time.
    pub async fn disconnect(&self) {
        let pending = lock(&self.pending).clone();
        self.shared.reset(&pending);

        let outbound = lock(&self.outbound).take();
        let task = lock(&self.task).take();
        if let Some(outbound) = outbound {
            let _ = outbound.try_send(Outbound::Close);
        }
        if let Some(mut handle) = task {
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                debug!("Connection task did not stop in time; aborting it");
                handle.abort();
            }
        }
        info!("Disconnected from Gemini Live");
    }

    /// Queues one chunk of 16 kHz PCM16 mono microphone audio.
    pub fn send_audio(&self, pcm: &[u8]) -> bool {
        self.enqueue(ClientMessage::RealtimeInput(RealtimeInput {
            audio: Some(Blob {
                mime_type: INPUT_AUDIO_MIME.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(pcm),
            }),
            ..Default::default()
        }))
    }

    /// Queues one JPEG camera frame.
    pub fn send_video_frame(&self, jpeg: &[u8]) -> bool {
        self.enqueue(ClientMessage::RealtimeInput(RealtimeInput {
            video: Some(Blob {
                mime_type: VIDEO_FRAME_MIME.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(jpeg),
            }),
            ..Default::default()
        }))
    }

    /// Queues a complete typed user turn.
    pub fn send_text(&self, text: &str) -> bool {
        self.enqueue(ClientMessage::ClientContent(ClientContent {
            turns: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }],
            turn_complete: true,
        }))
    }

    pub fn send_tool_response(&self, responses: Vec<ToolResponse>) -> bool {
        if responses.is_empty() {
            return false;
        }
        self.enqueue(ClientMessage::ToolResponse(ToolResponseMessage {
            function_responses: responses.into_iter().map(FunctionResponse::from).collect(),
        }))
    }

    fn enqueue(&self, message: ClientMessage) -> bool {
        if !self.shared.state().is_ready() {
            trace!("Dropping outbound message: connection is not ready");
            return false;
        }
        let outbound = lock(&self.outbound);
        let Some(sender) = outbound.as_ref() else {
            return false;
        };
        match sender.try_send(Outbound::Message(message)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue is full; dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn abort_task(&self) {
        lock(&self.outbound).take();
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}

impl Drop for GeminiLiveClient {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}
