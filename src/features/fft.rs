use std::f64::consts::PI;

use num_complex::Complex64;

/// Forward discrete Fourier transform by recursive radix-2 decimation in time.
///
/// Uses twiddle factors `exp(-2πi·k/N)` and no normalisation. Panics when the
/// input length is not a power of two; callers zero-pad first.
pub fn fft(input: &[Complex64]) -> Vec<Complex64> {
    assert!(
        input.len().is_power_of_two(),
        "transform length must be a power of two, got {}",
        input.len()
    );
    let mut output = vec![Complex64::new(0.0, 0.0); input.len()];
    transform_strided(input, 0, 1, &mut output);
    output
}

fn transform_strided(input: &[Complex64], start: usize, stride: usize, output: &mut [Complex64]) {
    let length = output.len();
    if length == 1 {
        output[0] = input[start];
        return;
    }
    let half = length / 2;
    let mut even = vec![Complex64::new(0.0, 0.0); half];
    let mut odd = vec![Complex64::new(0.0, 0.0); half];
    transform_strided(input, start, stride * 2, &mut even);
    transform_strided(input, start + stride, stride * 2, &mut odd);
    for k in 0..half {
        let twiddle = Complex64::from_polar(1.0, -2.0 * PI * k as f64 / length as f64);
        let product = twiddle * odd[k];
        output[k] = even[k] + product;
        output[k + half] = even[k] - product;
    }
}

/// Magnitude spectrum of a real signal whose length is a power of two.
pub fn magnitude_spectrum(samples: &[f64]) -> Vec<f64> {
    let complex: Vec<Complex64> = samples.iter().map(|&s| Complex64::new(s, 0.0)).collect();
    fft(&complex).iter().map(|bin| bin.norm()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_dft(input: &[Complex64]) -> Vec<Complex64> {
        let n = input.len();
        (0..n)
            .map(|k| {
                input
                    .iter()
                    .enumerate()
                    .map(|(t, x)| {
                        *x * Complex64::from_polar(1.0, -2.0 * PI * (t * k) as f64 / n as f64)
                    })
                    .sum()
            })
            .collect()
    }

    fn real(values: &[f64]) -> Vec<Complex64> {
        values.iter().map(|&v| Complex64::new(v, 0.0)).collect()
    }

    #[test]
    fn matches_known_four_point_transform() {
        let out = fft(&real(&[1.0, 2.0, 3.0, 4.0]));
        let expected = [
            Complex64::new(10.0, 0.0),
            Complex64::new(-2.0, 2.0),
            Complex64::new(-2.0, 0.0),
            Complex64::new(-2.0, -2.0),
        ];
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((*a - *b).norm() < 1e-12, "{a} != {b}");
        }
    }

    #[test]
    fn matches_direct_evaluation() {
        let input: Vec<Complex64> = (0..64)
            .map(|i| Complex64::new((i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()))
            .collect();
        let fast = fft(&input);
        let slow = naive_dft(&input);
        for (a, b) in fast.iter().zip(slow.iter()) {
            assert!((*a - *b).norm() <= 1e-9 * b.norm().max(1.0));
        }
    }

    #[test]
    fn fourfold_application_scales_by_length_squared() {
        let input = real(&[1.0, 2.0, 3.0, 4.0]);
        let mut value = input.clone();
        for _ in 0..4 {
            value = fft(&value);
        }
        for (a, x) in value.iter().zip(input.iter()) {
            assert!((*a - *x * 16.0).norm() < 1e-9);
        }
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two_length() {
        fft(&real(&[1.0, 2.0, 3.0]));
    }

    #[test]
    fn magnitude_of_impulse_is_flat() {
        let mut impulse = vec![0.0; 8];
        impulse[0] = 1.0;
        assert!(magnitude_spectrum(&impulse)
            .iter()
            .all(|m| (m - 1.0).abs() < 1e-12));
    }
}
