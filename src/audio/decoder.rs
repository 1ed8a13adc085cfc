use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::debug;

use crate::features::frontend::downmix_stereo;

/// Mono samples at 16-bit integer scale, with the rate they were recorded at.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a 16-bit PCM WAV file, averaging stereo channels down to mono.
pub fn decode_wav<P: AsRef<Path>>(path: P) -> Result<PcmAudio> {
    let path = path.as_ref();
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!(
            "{} is not 16-bit integer PCM ({} bits, {:?})",
            path.display(),
            spec.bits_per_sample,
            spec.sample_format
        );
    }

    let interleaved = reader
        .samples::<i16>()
        .map(|sample| sample.map(f32::from))
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read samples from {}", path.display()))?;

    let samples = match spec.channels {
        1 => interleaved,
        2 => downmix_stereo(&interleaved),
        other => bail!(
            "{} has {} channels; only mono and stereo are supported",
            path.display(),
            other
        ),
    };
    debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        samples = samples.len(),
        "decoded WAV"
    );
    Ok(PcmAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}
