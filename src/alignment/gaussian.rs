use ndarray::{Array1, Array2, Axis};
use tracing::trace;

use crate::types::{Cepstrum, FEATURE_DIM};
use crate::{RecognizerError, Result};

/// Pivots smaller than this fraction of the largest covariance entry are
/// treated as zero.
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Maximum-likelihood multivariate Gaussian over one cluster of cepstra.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianState {
    mean: Array1<f64>,
    inverse_covariance: Array2<f64>,
    log_normalizer: f64,
}

impl GaussianState {
    /// Estimates a Gaussian from a non-empty cluster.
    ///
    /// A single-member cluster, or one whose covariance is singular or not
    /// positive definite, falls back to an identity covariance around the mean.
    pub fn from_cluster(cluster: &[Cepstrum]) -> Result<Self> {
        if cluster.is_empty() {
            return Err(RecognizerError::new(
                "cannot estimate a Gaussian from an empty cluster",
            ));
        }
        let mean = cluster_mean(cluster);
        if cluster.len() == 1 {
            return Ok(Self::identity(mean));
        }
        let covariance = cluster_covariance(cluster, &mean);
        match invert_with_log_determinant(&covariance) {
            Some((inverse_covariance, LogDeterminant { sign, log_abs })) if sign > 0.0 => {
                Ok(Self {
                    mean,
                    inverse_covariance,
                    log_normalizer: -0.5 * log_abs,
                })
            }
            _ => {
                trace!(
                    members = cluster.len(),
                    "singular cluster covariance; using identity"
                );
                Ok(Self::identity(mean))
            }
        }
    }

    /// Unit-covariance state centred on `mean`.
    pub fn identity(mean: Array1<f64>) -> Self {
        Self {
            mean,
            inverse_covariance: Array2::eye(FEATURE_DIM),
            log_normalizer: 0.0,
        }
    }

    /// Single-sample state used to seed a template from one frame.
    pub fn from_frame(frame: &Cepstrum) -> Self {
        Self::identity(frame.iter().map(|&v| v as f64).collect())
    }

    /// Reassembles a state from stored parameters.
    pub fn from_parts(
        mean: Array1<f64>,
        inverse_covariance: Array2<f64>,
        log_normalizer: f64,
    ) -> Result<Self> {
        if mean.len() != FEATURE_DIM
            || inverse_covariance.dim() != (FEATURE_DIM, FEATURE_DIM)
        {
            return Err(RecognizerError::new(format!(
                "Gaussian parameters have shape {} / {:?}, expected {FEATURE_DIM} / {FEATURE_DIM}x{FEATURE_DIM}",
                mean.len(),
                inverse_covariance.dim()
            )));
        }
        Ok(Self {
            mean,
            inverse_covariance,
            log_normalizer,
        })
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn inverse_covariance(&self) -> &Array2<f64> {
        &self.inverse_covariance
    }

    pub fn log_normalizer(&self) -> f64 {
        self.log_normalizer
    }

    /// Unnormalised log density; the `D·log(2π)` term is omitted since it
    /// cancels in every comparison.
    pub fn score(&self, x: &Cepstrum) -> f64 {
        let diff: Array1<f64> = x
            .iter()
            .zip(self.mean.iter())
            .map(|(&v, m)| v as f64 - m)
            .collect();
        self.log_normalizer - 0.5 * diff.dot(&self.inverse_covariance.dot(&diff))
    }
}

fn cluster_mean(cluster: &[Cepstrum]) -> Array1<f64> {
    let mut sum = Array1::<f64>::zeros(FEATURE_DIM);
    for vector in cluster {
        for (acc, &v) in sum.iter_mut().zip(vector.iter()) {
            *acc += v as f64;
        }
    }
    sum / cluster.len() as f64
}

fn cluster_covariance(cluster: &[Cepstrum], mean: &Array1<f64>) -> Array2<f64> {
    let mut covariance = Array2::<f64>::zeros((FEATURE_DIM, FEATURE_DIM));
    for vector in cluster {
        let centered: Array1<f64> = vector
            .iter()
            .zip(mean.iter())
            .map(|(&v, m)| v as f64 - m)
            .collect();
        let column = centered.view().insert_axis(Axis(1));
        let row = centered.view().insert_axis(Axis(0));
        covariance += &column.dot(&row);
    }
    covariance / cluster.len() as f64
}

/// Determinant kept as a sign and a log magnitude so that products of many
/// small pivots do not underflow.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LogDeterminant {
    sign: f64,
    log_abs: f64,
}

/// Gauss-Jordan elimination with partial pivoting. Returns the inverse and
/// log determinant, or `None` when the matrix is numerically singular.
fn invert_with_log_determinant(matrix: &Array2<f64>) -> Option<(Array2<f64>, LogDeterminant)> {
    let n = matrix.nrows();
    let scale = matrix.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let tolerance = scale * SINGULAR_TOLERANCE;
    let mut work = matrix.clone();
    let mut inverse = Array2::<f64>::eye(n);
    let mut sign = 1.0;
    let mut log_abs = 0.0;

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&a, &b| {
            work[[a, col]]
                .abs()
                .total_cmp(&work[[b, col]].abs())
        })?;
        let pivot = work[[pivot_row, col]];
        if pivot.abs() <= tolerance {
            return None;
        }
        if pivot_row != col {
            swap_rows(&mut work, pivot_row, col);
            swap_rows(&mut inverse, pivot_row, col);
            sign = -sign;
        }
        if pivot < 0.0 {
            sign = -sign;
        }
        log_abs += pivot.abs().ln();

        for j in 0..n {
            work[[col, j]] /= pivot;
            inverse[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                work[[row, j]] -= factor * work[[col, j]];
                inverse[[row, j]] -= factor * inverse[[col, j]];
            }
        }
    }
    let finite = log_abs.is_finite() && inverse.iter().all(|v| v.is_finite());
    finite.then_some((inverse, LogDeterminant { sign, log_abs }))
}

fn swap_rows(matrix: &mut Array2<f64>, a: usize, b: usize) {
    for j in 0..matrix.ncols() {
        matrix.swap([a, j], [b, j]);
    }
}
