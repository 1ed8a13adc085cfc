use std::f64::consts::PI;

use crate::types::FEATURE_DIM;

pub(crate) const MEL_BANDS: usize = 23;
const LOG_FLOOR: f64 = 2e-22;

/// FFT bin indices bounding the triangular filters: 64 Hz, 23 mel-spaced
/// centres, then 8 kHz, at 512-point resolution.
pub(crate) const BIN_CENTERS: [usize; MEL_BANDS + 2] = [
    2, 5, 8, 11, 14, 18, 23, 27, 33, 38, 45, 52, 60, 69, 79, 89, 101, 115, 129, 145, 163, 183, 205,
    229, 256,
];

/// Accumulates a magnitude spectrum into the triangular mel filter bank.
pub(crate) fn filter_bank(magnitude: &[f64]) -> [f64; MEL_BANDS] {
    let mut bins = [0.0; MEL_BANDS];
    for (k, bin) in bins.iter_mut().enumerate() {
        let (lower, center, upper) = (BIN_CENTERS[k], BIN_CENTERS[k + 1], BIN_CENTERS[k + 2]);
        let rising_width = (center - lower + 1) as f64;
        for i in lower..=center {
            *bin += (i - lower + 1) as f64 / rising_width * magnitude[i];
        }
        let falling_width = (upper - center + 1) as f64;
        for i in (center + 1)..=upper {
            *bin += (1.0 - (i - center) as f64 / falling_width) * magnitude[i];
        }
    }
    bins
}

/// Log-compresses filter bank energies, keeping silent bands finite.
pub(crate) fn log_compress(bins: &mut [f64; MEL_BANDS]) {
    for bin in bins.iter_mut() {
        *bin = (*bin + LOG_FLOOR).ln();
    }
}

/// Type-II cosine transform of the log filter bank, truncated to the cepstrum.
pub(crate) fn cepstrum(log_bins: &[f64; MEL_BANDS]) -> [f64; FEATURE_DIM] {
    let mut coefficients = [0.0; FEATURE_DIM];
    for (i, coefficient) in coefficients.iter_mut().enumerate() {
        *coefficient = log_bins
            .iter()
            .enumerate()
            .map(|(j, value)| (PI * i as f64 * (j as f64 + 0.5) / MEL_BANDS as f64).cos() * value)
            .sum();
    }
    coefficients
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FFT_LENGTH, TARGET_SAMPLE_RATE};

    fn mel(hz: f64) -> f64 {
        2595.0 * (1.0 + hz / 700.0).log10()
    }

    fn mel_inv(m: f64) -> f64 {
        (10f64.powf(m / 2595.0) - 1.0) * 700.0
    }

    fn to_bin(hz: f64) -> usize {
        (hz * FFT_LENGTH as f64 / TARGET_SAMPLE_RATE as f64).round() as usize
    }

    #[test]
    fn bin_centers_follow_mel_spacing() {
        let start = 64.0;
        let nyquist = TARGET_SAMPLE_RATE as f64 / 2.0;
        let step = (mel(nyquist) - mel(start)) / (MEL_BANDS as f64 + 1.0);
        let mut expected = vec![to_bin(start)];
        expected.extend((1..=MEL_BANDS).map(|i| to_bin(mel_inv(mel(start) + i as f64 * step))));
        expected.push(to_bin(nyquist));
        assert_eq!(expected, BIN_CENTERS.to_vec());
    }

    #[test]
    fn flat_spectrum_weights_match_triangle_areas() {
        let magnitude = vec![1.0; FFT_LENGTH / 2 + 1];
        let bins = filter_bank(&magnitude);
        // First filter spans bins 2..=8 around centre 5.
        let rising: f64 = (1..=4).map(|n| n as f64 / 4.0).sum();
        let falling: f64 = (1..=3).map(|n| 1.0 - n as f64 / 4.0).sum();
        assert!((bins[0] - (rising + falling)).abs() < 1e-12);
        assert!(bins.iter().all(|&b| b > 0.0));
    }

    #[test]
    fn silent_bands_stay_finite() {
        let mut bins = [0.0; MEL_BANDS];
        log_compress(&mut bins);
        assert!(bins.iter().all(|b| b.is_finite()));
    }

    #[test]
    fn constant_log_spectrum_lands_in_first_coefficient() {
        let coefficients = cepstrum(&[1.0; MEL_BANDS]);
        assert!((coefficients[0] - MEL_BANDS as f64).abs() < 1e-12);
        assert!(coefficients[1..].iter().all(|c| c.abs() < 1e-9));
    }
}
