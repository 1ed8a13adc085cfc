//! Streaming front end: decodes raw PCM, resamples to 16 kHz, removes DC
//! offset and cuts overlapping frames for the [`FeatureExtractor`].

use byteorder::{ByteOrder, LittleEndian};

use super::FeatureExtractor;
use crate::config::FrontEndConfig;
use crate::types::{FeatureVector, FRAME_LENGTH, TARGET_SAMPLE_RATE};
use crate::{RecognizerError, Result};

const OFFSET_COMPENSATION: f32 = 0.999;

/// Decodes signed 16-bit little-endian PCM into samples at integer scale.
pub fn decode_pcm16_le(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 2 != 0 {
        return Err(RecognizerError::new(format!(
            "PCM buffer has odd length {}; expected whole 16-bit samples",
            bytes.len()
        )));
    }
    let mut decoded = vec![0_i16; bytes.len() / 2];
    LittleEndian::read_i16_into(bytes, &mut decoded);
    Ok(decoded.into_iter().map(f32::from).collect())
}

/// Averages interleaved left/right pairs into a mono signal.
pub fn downmix_stereo(samples: &[f32]) -> Vec<f32> {
    samples
        .chunks_exact(2)
        .map(|pair| (pair[0] + pair[1]) / 2.0)
        .collect()
}

/// Caller-owned state for turning an arbitrary-rate sample stream into frames.
#[derive(Debug, Clone)]
pub struct FrontEnd {
    step: f64,
    phase: f64,
    previous_input: f32,
    offset_prev_in: f32,
    offset_prev_out: f32,
    frame_shift: usize,
    buffer: Vec<f32>,
    processed_samples: u64,
}

impl FrontEnd {
    pub fn new(config: &FrontEndConfig) -> Result<Self> {
        if config.input_sample_rate == 0 {
            return Err(RecognizerError::new("input sample rate must be positive"));
        }
        if config.frame_shift == 0 || config.frame_shift > FRAME_LENGTH {
            return Err(RecognizerError::new(format!(
                "frame shift must be within 1..={FRAME_LENGTH}, got {}",
                config.frame_shift
            )));
        }
        Ok(Self {
            step: config.input_sample_rate as f64 / TARGET_SAMPLE_RATE as f64,
            phase: 1.0,
            previous_input: 0.0,
            offset_prev_in: 0.0,
            offset_prev_out: 0.0,
            frame_shift: config.frame_shift,
            buffer: Vec::with_capacity(FRAME_LENGTH),
            processed_samples: 0,
        })
    }

    /// Number of input samples consumed so far.
    pub fn processed_samples(&self) -> u64 {
        self.processed_samples
    }

    /// Feeds input samples, returning a feature vector for every completed frame.
    pub fn feed(
        &mut self,
        samples: &[f32],
        extractor: &mut FeatureExtractor,
    ) -> Result<Vec<FeatureVector>> {
        let mut produced = Vec::new();
        for &sample in samples {
            while self.phase <= 1.0 {
                let interpolated = ((1.0 - self.phase) * self.previous_input as f64
                    + self.phase * sample as f64) as f32;
                self.push_resampled(interpolated, extractor, &mut produced)?;
                self.phase += self.step;
            }
            self.phase -= 1.0;
            self.previous_input = sample;
            self.processed_samples += 1;
        }
        Ok(produced)
    }

    fn push_resampled(
        &mut self,
        sample: f32,
        extractor: &mut FeatureExtractor,
        produced: &mut Vec<FeatureVector>,
    ) -> Result<()> {
        let compensated = sample - self.offset_prev_in + OFFSET_COMPENSATION * self.offset_prev_out;
        self.offset_prev_in = sample;
        self.offset_prev_out = compensated;
        self.buffer.push(compensated);
        if self.buffer.len() == FRAME_LENGTH {
            produced.push(extractor.extract(&self.buffer)?);
            self.buffer.drain(..self.frame_shift);
        }
        Ok(())
    }
}
