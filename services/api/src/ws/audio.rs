//! An [`AudioIo`] backed by the browser on the other end of the WebSocket.
//!
//! Capture arrives as binary frames at the browser rate and is resampled to
//! the model's input rate. Playback is resampled to the browser rate and sent
//! back as `audio_chunk` messages.

use async_trait::async_trait;
use bytes::Bytes;
use lumen_core::{AudioError, AudioIo, audio::CAPTURE_SAMPLE_RATE};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::protocol::ServerMessage;
use crate::audio_utils::{BROWSER_SAMPLE_RATE, StreamResampler, encode_base64};

struct Capture {
    sink: mpsc::Sender<Bytes>,
    resampler: StreamResampler,
}

struct Playback {
    source_rate: u32,
    resampler: StreamResampler,
}

pub struct BrowserAudio {
    outbound: mpsc::UnboundedSender<ServerMessage>,
    capture: Mutex<Option<Capture>>,
    playback: Mutex<Option<Playback>>,
}

impl BrowserAudio {
    pub fn new(outbound: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            outbound,
            capture: Mutex::new(None),
            playback: Mutex::new(None),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.lock().is_ok_and(|capture| capture.is_some())
    }

    /// Forwards one binary microphone frame. Dropped while capture is stopped.
    pub fn push_capture(&self, pcm16: &[u8]) {
        let Ok(mut guard) = self.capture.lock() else {
            return;
        };
        let Some(capture) = guard.as_mut() else {
            debug!("Microphone audio received while capture is stopped; dropping");
            return;
        };

        let resampled = capture.resampler.process(pcm16);
        if resampled.is_empty() {
            return;
        }
        match capture.sink.try_send(Bytes::from(resampled)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Capture consumer is behind; dropping microphone audio");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Capture consumer is gone");
                *guard = None;
            }
        }
    }
}

#[async_trait]
impl AudioIo for BrowserAudio {
    async fn start_capture(&self, sink: mpsc::Sender<Bytes>) -> Result<(), AudioError> {
        let resampler = StreamResampler::new(BROWSER_SAMPLE_RATE, CAPTURE_SAMPLE_RATE)
            .map_err(|e| AudioError::Device(e.to_string()))?;
        let mut guard = self
            .capture
            .lock()
            .map_err(|_| AudioError::Device("capture state poisoned".to_string()))?;
        if guard.is_some() {
            return Err(AudioError::AlreadyCapturing);
        }
        *guard = Some(Capture { sink, resampler });
        Ok(())
    }

    async fn stop_capture(&self) {
        if let Ok(mut guard) = self.capture.lock() {
            guard.take();
        }
    }

    fn play(&self, chunk: Bytes, sample_rate: u32) {
        let Ok(mut guard) = self.playback.lock() else {
            return;
        };
        if guard.as_ref().is_none_or(|p| p.source_rate != sample_rate) {
            match StreamResampler::new(sample_rate, BROWSER_SAMPLE_RATE) {
                Ok(resampler) => {
                    *guard = Some(Playback {
                        source_rate: sample_rate,
                        resampler,
                    })
                }
                Err(e) => {
                    warn!(error = %e, sample_rate, "Cannot play audio at this rate");
                    return;
                }
            }
        }
        let Some(playback) = guard.as_mut() else {
            return;
        };

        let pcm = playback.resampler.process(&chunk);
        if pcm.is_empty() {
            return;
        }
        let _ = self.outbound.send(ServerMessage::AudioChunk {
            data: encode_base64(&pcm),
        });
    }

    fn stop_playback(&self) {
        if let Ok(mut guard) = self.playback.lock() {
            if let Some(playback) = guard.as_mut() {
                playback.resampler.reset();
            }
        }
        let _ = self.outbound.send(ServerMessage::PlaybackStop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_utils::decode_base64;

    fn silence(samples: usize) -> Vec<u8> {
        vec![0u8; samples * 2]
    }

    #[tokio::test]
    async fn capture_is_resampled_to_model_rate() {
        let (outbound, _rx) = mpsc::unbounded_channel();
        let audio = BrowserAudio::new(outbound);
        let (sink, mut captured) = mpsc::channel(16);

        audio.push_capture(&silence(2_400));
        audio.start_capture(sink).await.unwrap();
        assert!(audio.is_capturing());

        // 100 ms at 24 kHz.
        audio.push_capture(&silence(2_400));
        let chunk = captured.recv().await.unwrap();
        assert!(chunk.len() / 2 <= 1_600);
        assert!(chunk.len() / 2 >= 1_000);

        audio.stop_capture().await;
        assert!(!audio.is_capturing());
        audio.push_capture(&silence(2_400));
        assert!(captured.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_capture_is_rejected() {
        let (outbound, _rx) = mpsc::unbounded_channel();
        let audio = BrowserAudio::new(outbound);
        let (sink, _captured) = mpsc::channel(1);

        audio.start_capture(sink.clone()).await.unwrap();
        assert!(matches!(
            audio.start_capture(sink).await,
            Err(AudioError::AlreadyCapturing)
        ));
    }

    #[tokio::test]
    async fn playback_at_browser_rate_passes_through() {
        let (outbound, mut rx) = mpsc::unbounded_channel();
        let audio = BrowserAudio::new(outbound);

        audio.play(Bytes::from_static(&[1, 0, 2, 0]), BROWSER_SAMPLE_RATE);
        match rx.recv().await.unwrap() {
            ServerMessage::AudioChunk { data } => {
                assert_eq!(decode_base64(&data), Some(vec![1, 0, 2, 0]));
            }
            other => panic!("unexpected message: {other:?}"),
        }

        audio.stop_playback();
        assert!(matches!(rx.recv().await, Some(ServerMessage::PlaybackStop)));
    }

    #[tokio::test]
    async fn playback_at_model_rate_is_upsampled() {
        let (outbound, mut rx) = mpsc::unbounded_channel();
        let audio = BrowserAudio::new(outbound);

        audio.play(Bytes::from(silence(16_000)), 16_000);
        let ServerMessage::AudioChunk { data } = rx.recv().await.unwrap() else {
            panic!("expected an audio chunk");
        };
        let samples = decode_base64(&data).unwrap().len() / 2;
        assert!(samples > 16_000);
    }
}
