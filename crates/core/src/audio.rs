//! The audio device contract and the capture re-framing in front of the socket.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Sample rate of capture audio sent to the model.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;
const BYTES_PER_SAMPLE: usize = 2;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio device unavailable: {0}")]
    Device(String),
    #[error("Audio capture is already running")]
    AlreadyCapturing,
}

/// Microphone and speaker, owned by the host.
///
/// Capture buffers are 16 kHz mono PCM16 little-endian of any length. Playback
/// chunks are PCM16 mono at the given sample rate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioIo: Send + Sync {
    /// Acquires the microphone and starts pushing buffers into `sink`.
    async fn start_capture(&self, sink: mpsc::Sender<Bytes>) -> Result<(), AudioError>;

    async fn stop_capture(&self);

    fn play(&self, chunk: Bytes, sample_rate: u32);

    /// Drops everything queued for playback.
    fn stop_playback(&self);
}

/// Re-frames arbitrary capture buffers into fixed-duration chunks.
#[derive(Debug)]
pub struct PcmChunker {
    chunk_bytes: usize,
    buffer: BytesMut,
}

impl PcmChunker {
    /// `chunk` of 16 kHz mono PCM16; 100 ms is 3200 bytes.
    pub fn new(chunk: Duration) -> Self {
        let samples = (u128::from(CAPTURE_SAMPLE_RATE) * chunk.as_millis() / 1000) as usize;
        let chunk_bytes = (samples * BYTES_PER_SAMPLE).max(BYTES_PER_SAMPLE);
        Self {
            chunk_bytes,
            buffer: BytesMut::with_capacity(chunk_bytes * 2),
        }
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    /// Buffers `pcm` and returns every complete chunk now available.
    pub fn push(&mut self, pcm: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(pcm);
        let mut chunks = Vec::new();
        while self.buffer.len() >= self.chunk_bytes {
            chunks.push(self.buffer.split_to(self.chunk_bytes).freeze());
        }
        chunks
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards a trailing partial chunk.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
