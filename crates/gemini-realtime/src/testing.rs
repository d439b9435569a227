//! An in-process stand-in for the Live endpoint, for tests of this crate and
//! of crates built on it.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    accept_async,
    tungstenite::protocol::{CloseFrame, Message, frame::coding::CloseCode},
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

enum Control {
    Send(String),
    Close(String),
    Drop,
}

/// Accepts one socket at a time, records every JSON frame the client sends
/// and replays whatever the test scripts.
///
/// Scripted frames queue up until a client is connected.
pub struct FakeLiveServer {
    addr: SocketAddr,
    received: mpsc::UnboundedReceiver<Value>,
    control: mpsc::UnboundedSender<Control>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeLiveServer {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (received_tx, received) = mpsc::unbounded_channel();
        let (control, control_rx) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));
        let task = tokio::spawn(serve(
            listener,
            received_tx,
            control_rx,
            connections.clone(),
        ));
        Ok(Self {
            addr,
            received,
            control,
            connections,
            task,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}/live", self.addr)
    }

    /// Number of sockets accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn send(&self, frame: Value) {
        let _ = self.control.send(Control::Send(frame.to_string()));
    }

    pub fn send_raw(&self, text: impl Into<String>) {
        let _ = self.control.send(Control::Send(text.into()));
    }

    pub fn send_setup_complete(&self) {
        self.send(json!({ "setupComplete": {} }));
    }

    /// Sends one model turn part of base64 PCM at 24 kHz.
    pub fn send_audio(&self, base64_pcm: &str) {
        self.send(json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [{ "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": base64_pcm } }]
                }
            }
        }));
    }

    pub fn send_turn_complete(&self) {
        self.send(json!({ "serverContent": { "turnComplete": true } }));
    }

    /// Closes the current socket with a normal close frame.
    pub fn close(&self, reason: impl Into<String>) {
        let _ = self.control.send(Control::Close(reason.into()));
    }

    /// Drops the current socket without a close frame.
    pub fn drop_connection(&self) {
        let _ = self.control.send(Control::Drop);
    }

    /// Next frame sent by the client, or `None` after a few seconds of silence.
    pub async fn recv(&mut self) -> Option<Value> {
        tokio::time::timeout(RECV_TIMEOUT, self.received.recv())
            .await
            .ok()
            .flatten()
    }

    pub fn try_recv(&mut self) -> Option<Value> {
        self.received.try_recv().ok()
    }

    /// Waits for the client's setup frame and returns its body.
    pub async fn recv_setup(&mut self) -> anyhow::Result<Value> {
        let frame = self
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("client never sent a frame"))?;
        match frame.get("setup") {
            Some(setup) => Ok(setup.clone()),
            None => anyhow::bail!("expected a setup frame, got {}", frame),
        }
    }

    /// Skips frames until one carrying `key` at the top level arrives.
    pub async fn recv_kind(&mut self, key: &str) -> anyhow::Result<Value> {
        loop {
            let frame = self
                .recv()
                .await
                .ok_or_else(|| anyhow::anyhow!("no {} frame arrived", key))?;
            if let Some(body) = frame.get(key) {
                return Ok(body.clone());
            }
        }
    }
}

impl Drop for FakeLiveServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    listener: TcpListener,
    received: mpsc::UnboundedSender<Value>,
    mut control: mpsc::UnboundedReceiver<Control>,
    connections: Arc<AtomicUsize>,
) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(ws_stream) = accept_async(stream).await else {
            continue;
        };
        connections.fetch_add(1, Ordering::SeqCst);
        let (mut sink, mut source) = ws_stream.split();

        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(value) = serde_json::from_str::<Value>(&text) {
                            let _ = received.send(value);
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                command = control.recv() => match command {
                    Some(Control::Send(text)) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Control::Close(reason)) => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: reason.into(),
                        };
                        let _ = sink.send(Message::Close(Some(frame))).await;
                        break;
                    }
                    Some(Control::Drop) => break,
                    None => return,
                },
            }
        }
    }
}
