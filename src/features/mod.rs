pub mod endpoint;
pub mod fft;
pub mod frontend;
mod mel;

use std::f64::consts::PI;

use tracing::debug;

use self::endpoint::{DetectionMode, UtteranceDetector};
use self::frontend::FrontEnd;
use crate::config::FrontEndConfig;
use crate::types::{FeatureVector, Utterance, FEATURE_DIM, FFT_LENGTH, FRAME_LENGTH};
use crate::{RecognizerError, Result};

const PRE_EMPHASIS: f64 = 0.97;
const ENERGY_FLOOR: f64 = 2e-22;
const INITIAL_NOISE_FLOOR: f32 = 100.0;
const NOISE_FLOOR_DECAY: f32 = 0.999;

/// Caller-owned extraction context: turns 400-sample frames into cepstral
/// feature vectors while tracking the noise floor across calls.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    window: Vec<f64>,
    noise_floor: f32,
    next_sequence_number: u64,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        let window = (0..FRAME_LENGTH)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (FRAME_LENGTH - 1) as f64).cos())
            .collect();
        Self {
            window,
            noise_floor: INITIAL_NOISE_FLOOR,
            next_sequence_number: 1,
        }
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    pub fn extract(&mut self, frame: &[f32]) -> Result<FeatureVector> {
        if frame.len() != FRAME_LENGTH {
            return Err(RecognizerError::new(format!(
                "frame contains {} samples, expected {FRAME_LENGTH}",
                frame.len()
            )));
        }
        let mut samples: Vec<f64> = frame.iter().map(|&s| s as f64).collect();
        let log_energy = log_energy(&samples) as f32;

        pre_emphasize(&mut samples);
        for (sample, weight) in samples.iter_mut().zip(self.window.iter()) {
            *sample *= weight;
        }
        samples.resize(FFT_LENGTH, 0.0);

        let magnitude = fft::magnitude_spectrum(&samples);
        let mut bins = mel::filter_bank(&magnitude);
        mel::log_compress(&mut bins);
        let coefficients = mel::cepstrum(&bins);

        let mut cepstrum = [0.0_f32; FEATURE_DIM];
        for (dst, src) in cepstrum.iter_mut().zip(coefficients.iter()) {
            *dst = *src as f32;
        }

        self.noise_floor = log_energy
            .min(NOISE_FLOOR_DECAY * self.noise_floor + (1.0 - NOISE_FLOOR_DECAY) * log_energy);
        let sequence_number = self.next_sequence_number;
        self.next_sequence_number += 1;

        Ok(FeatureVector {
            log_energy,
            cepstrum,
            noise_floor_estimate: self.noise_floor,
            sequence_number,
        })
    }
}

/// Runs a whole recording through the front end, extractor and endpointer.
pub fn utterances_from_samples(
    samples: &[f32],
    config: &FrontEndConfig,
    mode: DetectionMode,
) -> Result<Vec<Utterance>> {
    let mut front_end = FrontEnd::new(config)?;
    let mut extractor = FeatureExtractor::new();
    let mut detector = UtteranceDetector::new(mode);
    let mut utterances = Vec::new();
    for frame in front_end.feed(samples, &mut extractor)? {
        utterances.extend(detector.push(frame));
    }
    utterances.extend(detector.flush());
    debug!(
        samples = front_end.processed_samples(),
        utterances = utterances.len(),
        "extracted utterances"
    );
    Ok(utterances)
}

fn log_energy(samples: &[f64]) -> f64 {
    let energy: f64 = samples.iter().map(|s| s * s).sum();
    (energy + ENERGY_FLOOR).ln()
}

/// First-order pre-emphasis, walking from the last sample down so each step
/// reads the unfiltered neighbour below it. Sample 0 has no neighbour and is kept.
fn pre_emphasize(samples: &mut [f64]) {
    for index in (1..samples.len()).rev() {
        let below = samples[index - 1];
        samples[index] -= PRE_EMPHASIS * below;
    }
}
