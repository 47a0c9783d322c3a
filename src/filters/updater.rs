use log::{debug, error, warn};
use nalgebra::{SMatrix, SVector};

use super::measurement::MeasurementModel;
use super::predictor::Prediction;
use super::sigma_points::{residual, weighted_covariance, weighted_mean_wrapped};
use crate::angles::normalize_angle;
use crate::error::{TrackerError, TrackerResult};
use crate::types::{SigmaWeights, StateMat, StateVec, SIGMA_COUNT, STATE_DIM, YAW_INDEX};

/// Smallest ridge added to a non-positive-definite innovation covariance
const MIN_RIDGE: f64 = 1e-9;
const MAX_RIDGE_ATTEMPTS: usize = 12;

/// Posterior belief after one measurement update
#[derive(Clone, Debug)]
pub struct UpdateOutcome<const M: usize> {
    pub mean: StateVec,
    pub covariance: StateMat,
    /// Measurement minus predicted measurement (angle-wrapped)
    pub innovation: SVector<f64, M>,
    /// Innovation covariance S actually used for the gain
    pub innovation_covariance: SMatrix<f64, M, M>,
    /// Normalized innovation squared, yᵀ S⁻¹ y
    pub nis: f64,
}

/// Invert a symmetric innovation covariance.
///
/// Takes the Cholesky path when S is positive definite, otherwise adds a ridge
/// εI (ε growing by 10× from 1e-9 relative to the mean diagonal) until it is.
/// Returns the (possibly regularized) S together with its inverse.
pub fn invert_innovation<const M: usize>(
    s: &SMatrix<f64, M, M>,
) -> TrackerResult<(SMatrix<f64, M, M>, SMatrix<f64, M, M>)> {
    if let Some(chol) = s.cholesky() {
        return Ok((*s, chol.inverse()));
    }

    let scale = (s.trace().abs() / M as f64).max(1.0);
    let mut ridge = MIN_RIDGE * scale;
    for _ in 0..MAX_RIDGE_ATTEMPTS {
        let regularized = s + SMatrix::<f64, M, M>::identity() * ridge;
        if let Some(chol) = regularized.cholesky() {
            warn!(
                "[UKF] Innovation covariance not positive definite, regularized with ridge {:.1e}",
                ridge
            );
            return Ok((regularized, chol.inverse()));
        }
        ridge *= 10.0;
    }

    error!("[UKF] Innovation covariance could not be regularized");
    Err(TrackerError::Divergence)
}

/// Unscented measurement update shared by every sensor model.
///
/// Maps the cached predicted sigma points into measurement space, recovers the
/// predicted measurement mean and innovation covariance S, the state/measurement
/// cross-correlation T, and corrects the prior with K = T·S⁻¹.
pub fn update<const M: usize, Model: MeasurementModel<M>>(
    prediction: &Prediction,
    z: &SVector<f64, M>,
    model: &Model,
    weights: &SigmaWeights,
) -> TrackerResult<UpdateOutcome<M>> {
    let angle_index = Model::ANGLE_INDEX;

    // 1. Sigma points in measurement space
    let mut z_sigmas = SMatrix::<f64, M, SIGMA_COUNT>::zeros();
    for i in 0..SIGMA_COUNT {
        let x = prediction.sigma_points.column(i).into_owned();
        z_sigmas.set_column(i, &model.predict(&x));
    }

    // 2. Predicted measurement mean, bearing averaged on the circle
    let z_pred = weighted_mean_wrapped(&z_sigmas, weights, angle_index);

    // 3. Innovation covariance S = Σ wᵢ ΔzΔzᵀ + R
    let s_raw = weighted_covariance(&z_sigmas, &z_pred, weights, angle_index) + model.noise();
    let s_sym = (s_raw + s_raw.transpose()) * 0.5;

    // 4. Cross-correlation T = Σ wᵢ ΔxΔzᵀ
    let mut t_cross = SMatrix::<f64, STATE_DIM, M>::zeros();
    for i in 0..SIGMA_COUNT {
        let x_diff = residual(&prediction.sigma_points, i, &prediction.mean, Some(YAW_INDEX));
        let z_diff = residual(&z_sigmas, i, &z_pred, angle_index);
        t_cross += x_diff * z_diff.transpose() * weights[i];
    }

    // 5. Kalman gain
    let (s, s_inv) = invert_innovation(&s_sym)?;
    let k = t_cross * s_inv;

    // 6. Innovation
    let mut innovation = z - z_pred;
    if let Some(idx) = angle_index {
        innovation[idx] = normalize_angle(innovation[idx]);
    }

    // 7. Posterior, symmetrized against floating-point drift
    let mean = prediction.mean + k * innovation;
    let p = prediction.covariance - k * s * k.transpose();
    let covariance = (p + p.transpose()) * 0.5;

    // 8. NIS side output
    let nis = (innovation.transpose() * s_inv * innovation)[(0, 0)];

    debug!(
        "[UKF] {} update: innovation={:?} nis={:.3}",
        Model::SENSOR,
        innovation.as_slice(),
        nis
    );

    Ok(UpdateOutcome {
        mean,
        covariance,
        innovation,
        innovation_covariance: s,
        nis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorNoise;
    use crate::filters::measurement::{LidarModel, RadarModel};
    use crate::filters::predictor::Predictor;
    use crate::types::{LidarVec, RadarVec};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::Matrix2;

    fn prior() -> (Predictor, Prediction) {
        let predictor = Predictor::new(1.7, 0.5);
        let x = StateVec::new(5.0, 1.0, 2.0, 0.4, 0.1);
        let p = StateMat::identity() * 0.5;
        let prediction = predictor.predict(&x, &p, 0.1).unwrap();
        (predictor, prediction)
    }

    #[test]
    fn test_lidar_update_at_predicted_mean_has_zero_nis() {
        let (predictor, prediction) = prior();
        let model = LidarModel::new(&SensorNoise::default());
        let weights = predictor.weights();

        // Lidar is linear: predicted measurement mean is the predicted position
        let z = LidarVec::new(prediction.mean[0], prediction.mean[1]);
        let outcome = update(&prediction, &z, &model, weights).unwrap();

        assert_abs_diff_eq!(outcome.innovation.norm(), 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(outcome.nis, 0.0, epsilon = 1e-12);
        assert_relative_eq!(outcome.mean, prediction.mean, epsilon = 1e-10);
        assert!(outcome.covariance.trace() < prediction.covariance.trace());
    }

    #[test]
    fn test_lidar_update_pulls_toward_measurement() {
        let (predictor, prediction) = prior();
        let model = LidarModel::new(&SensorNoise::default());
        let z = LidarVec::new(prediction.mean[0] + 1.0, prediction.mean[1] - 1.0);
        let outcome = update(&prediction, &z, &model, predictor.weights()).unwrap();

        assert!(outcome.mean[0] > prediction.mean[0]);
        assert!(outcome.mean[0] < z[0]);
        assert!(outcome.mean[1] < prediction.mean[1]);
        assert!(outcome.nis > 0.0);
        assert_relative_eq!(outcome.covariance, outcome.covariance.transpose(), epsilon = 1e-15);
        assert!(outcome.covariance.cholesky().is_some());
    }

    #[test]
    fn test_radar_bearing_innovation_is_wrapped() {
        let predictor = Predictor::new(0.5, 0.2);
        // Target just below the negative x axis: bearing ≈ -π
        let x = StateVec::new(-10.0, -0.1, 1.0, 0.0, 0.0);
        let p = StateMat::identity() * 0.01;
        let prediction = predictor.predict(&x, &p, 0.05).unwrap();
        let model = RadarModel::new(&SensorNoise::default());

        // Measured bearing just above +π side
        let z = RadarVec::new(10.0, std::f64::consts::PI - 0.005, 1.0);
        let outcome = update(&prediction, &z, &model, predictor.weights()).unwrap();

        assert!(outcome.innovation[1].abs() < 0.1);
        assert!(outcome.mean.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_invert_positive_definite() {
        let s = Matrix2::new(2.0, 0.5, 0.5, 1.0);
        let (used, inv) = invert_innovation(&s).unwrap();
        assert_eq!(used, s);
        assert_relative_eq!(s * inv, Matrix2::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_invert_singular_is_regularized() {
        let s = Matrix2::new(1.0, 1.0, 1.0, 1.0);
        let (used, inv) = invert_innovation(&s).unwrap();
        assert!(used[(0, 0)] > 1.0);
        assert!(inv.iter().all(|v| v.is_finite()));
        assert_relative_eq!(used * inv, Matrix2::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_invert_nan_is_divergence() {
        let s = Matrix2::new(f64::NAN, 0.0, 0.0, 1.0);
        assert_eq!(invert_innovation(&s).unwrap_err(), TrackerError::Divergence);
    }
}
