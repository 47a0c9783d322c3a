//! Symmetric sigma point generation and moment recovery.
//!
//! For an n-dimensional distribution (μ, Σ) the generator produces 2n+1 columns:
//! - χ₀ = μ
//! - χᵢ = μ + √(λ+n)·Lᵢ for i = 1..n
//! - χᵢ₊ₙ = μ − √(λ+n)·Lᵢ
//!
//! where L is the lower Cholesky factor of Σ. Weights depend only on n and λ:
//! w₀ = λ/(λ+n), wᵢ = 1/(2(λ+n)).

use log::error;
use nalgebra::{SMatrix, SVector};

use crate::angles::normalize_angle;
use crate::error::{TrackerError, TrackerResult};

#[derive(Clone, Debug)]
pub struct SigmaPointGenerator<const N: usize, const S: usize> {
    lambda: f64,
    weights: SVector<f64, S>,
}

impl<const N: usize, const S: usize> SigmaPointGenerator<N, S> {
    // Evaluated at monomorphization: a generator with S != 2N+1 does not compile
    const POINT_COUNT_CHECK: () = assert!(S == 2 * N + 1, "sigma point count must be 2n + 1");

    /// Create a generator with spreading parameter `lambda` (requires λ + n > 0)
    pub fn new(lambda: f64) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::POINT_COUNT_CHECK;
        debug_assert!(lambda + N as f64 > 0.0, "lambda + n must be positive");

        let denom = lambda + N as f64;
        let mut weights = SVector::<f64, S>::from_element(0.5 / denom);
        weights[0] = lambda / denom;

        Self { lambda, weights }
    }

    /// λ = 3 − n
    pub fn with_default_lambda() -> Self {
        Self::new(3.0 - N as f64)
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn weights(&self) -> &SVector<f64, S> {
        &self.weights
    }

    /// √(λ + n)
    pub fn spread(&self) -> f64 {
        (self.lambda + N as f64).sqrt()
    }

    /// Generate sigma points from (mean, covariance).
    ///
    /// Fails with [`TrackerError::Divergence`] when the covariance is not positive
    /// definite (or contains non-finite entries), since no square root exists.
    pub fn generate(
        &self,
        mean: &SVector<f64, N>,
        covariance: &SMatrix<f64, N, N>,
    ) -> TrackerResult<SMatrix<f64, N, S>> {
        if mean.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
            error!("[UKF] Non-finite mean or covariance, cannot draw sigma points");
            return Err(TrackerError::Divergence);
        }

        let l_mat = match covariance.cholesky() {
            Some(chol) => chol.l(),
            None => {
                error!("[UKF] Cholesky decomposition failed, covariance lost positive definiteness");
                return Err(TrackerError::Divergence);
            }
        };

        let spread = self.spread();
        let mut sigmas = SMatrix::<f64, N, S>::zeros();
        sigmas.set_column(0, mean);
        for i in 0..N {
            let offset = l_mat.column(i) * spread;
            sigmas.set_column(i + 1, &(mean + &offset));
            sigmas.set_column(i + 1 + N, &(mean - &offset));
        }

        Ok(sigmas)
    }
}

/// Weighted mean of sigma point columns
pub fn weighted_mean<const R: usize, const S: usize>(
    points: &SMatrix<f64, R, S>,
    weights: &SVector<f64, S>,
) -> SVector<f64, R> {
    points * weights
}

/// Weighted mean that averages one angular component on the circle.
///
/// The angle is averaged as wrapped offsets from the first column, so points
/// straddling ±π do not cancel out. The result's angle lies in (-π, π].
pub fn weighted_mean_wrapped<const R: usize, const S: usize>(
    points: &SMatrix<f64, R, S>,
    weights: &SVector<f64, S>,
    angle_index: Option<usize>,
) -> SVector<f64, R> {
    let mut mean = weighted_mean(points, weights);
    if let Some(idx) = angle_index {
        let reference = points[(idx, 0)];
        let offset: f64 = (0..S)
            .map(|i| weights[i] * normalize_angle(points[(idx, i)] - reference))
            .sum();
        mean[idx] = normalize_angle(reference + offset);
    }
    mean
}

/// Residual of one sigma point column against the mean, optionally wrapping one angular component
pub fn residual<const R: usize, const S: usize>(
    points: &SMatrix<f64, R, S>,
    col: usize,
    mean: &SVector<f64, R>,
    angle_index: Option<usize>,
) -> SVector<f64, R> {
    let mut diff = points.column(col) - mean;
    if let Some(idx) = angle_index {
        diff[idx] = normalize_angle(diff[idx]);
    }
    diff
}

/// Weighted covariance Σ wᵢ (χᵢ − μ)(χᵢ − μ)ᵀ
pub fn weighted_covariance<const R: usize, const S: usize>(
    points: &SMatrix<f64, R, S>,
    mean: &SVector<f64, R>,
    weights: &SVector<f64, S>,
    angle_index: Option<usize>,
) -> SMatrix<f64, R, R> {
    let mut cov = SMatrix::<f64, R, R>::zeros();
    for i in 0..S {
        let diff = residual(points, i, mean, angle_index);
        cov += diff * diff.transpose() * weights[i];
    }
    cov
}
