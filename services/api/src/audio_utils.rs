use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// The browser records and plays PCM16 mono at this rate.
pub const BROWSER_SAMPLE_RATE: u32 = 24_000;
const RESAMPLER_CHUNK: usize = 480;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,                     // No cutoff frequency, pass all frequencies
        PolynomialDegree::Cubic, // Cubic interpolation for quality
        chunk_size,
        1, // 1 channel (mono)
    )?;
    Ok(resampler)
}

/// Resamples a continuous PCM16 stream delivered in arbitrarily sized pieces.
///
/// Samples that do not fill a whole resampler chunk are carried over to the
/// next call, so nothing is dropped at chunk boundaries. Equal rates pass
/// through untouched.
pub struct StreamResampler {
    resampler: Option<FastFixedIn<f32>>,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(in_rate: u32, out_rate: u32) -> anyhow::Result<Self> {
        let resampler = if in_rate == out_rate {
            None
        } else {
            Some(create_resampler(
                in_rate as f64,
                out_rate as f64,
                RESAMPLER_CHUNK,
            )?)
        };
        Ok(Self {
            resampler,
            pending: Vec::new(),
        })
    }

    /// Feeds PCM16 little-endian bytes and returns whatever is ready, as PCM16 bytes.
    pub fn process(&mut self, pcm16: &[u8]) -> Vec<u8> {
        let Some(resampler) = self.resampler.as_mut() else {
            return pcm16[..pcm16.len() - pcm16.len() % 2].to_vec();
        };

        self.pending
            .extend(convert_i16_to_f32(&bytes_to_i16(pcm16)));

        let mut out = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let chunk: Vec<f32> = self.pending.drain(..needed).collect();
            match resampler.process(&[chunk], None) {
                Ok(frames) => out.extend_from_slice(&frames[0]),
                Err(e) => {
                    tracing::warn!(error = %e, "Resampling failed; dropping chunk");
                }
            }
        }
        i16_to_bytes(&convert_f32_to_i16(&out))
    }

    /// Number of input samples waiting for a full chunk.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Converts a slice of i16 samples to a vector of f32 samples.
pub fn convert_i16_to_f32(pcm16: &[i16]) -> Vec<f32> {
    pcm16
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

/// Interprets little-endian byte pairs as samples; a trailing odd byte is ignored.
pub fn bytes_to_i16(pcm16_bytes: &[u8]) -> Vec<i16> {
    pcm16_bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

pub fn i16_to_bytes(pcm16: &[i16]) -> Vec<u8> {
    pcm16
        .iter()
        .flat_map(|&sample| sample.to_le_bytes())
        .collect()
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn decode_base64(fragment: &str) -> Option<Vec<u8>> {
    match base64::engine::general_purpose::STANDARD.decode(fragment) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode base64 payload");
            None
        }
    }
}
