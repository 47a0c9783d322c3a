use nalgebra::{Matrix2, Vector2};

use super::ctrv;
use super::sigma_points::{weighted_covariance, weighted_mean, SigmaPointGenerator};
use crate::error::TrackerResult;
use crate::types::{
    AugSigmaPoints, AugStateMat, AugStateVec, SigmaPoints, SigmaWeights, StateMat, StateVec,
    AUG_DIM, NOISE_DIM, SIGMA_COUNT, STATE_DIM, YAW_INDEX,
};

/// Prior belief produced by one prediction step.
///
/// `sigma_points` are the propagated state sigma points; the measurement
/// update consumes them unchanged.
#[derive(Clone, Debug)]
pub struct Prediction {
    pub mean: StateVec,
    pub covariance: StateMat,
    pub sigma_points: SigmaPoints,
}

/// Unscented prediction through the CTRV model with augmented process noise
#[derive(Clone, Debug)]
pub struct Predictor {
    generator: SigmaPointGenerator<AUG_DIM, SIGMA_COUNT>,
    /// diag(std_a², std_yawdd²)
    process_noise: Matrix2<f64>,
}

impl Predictor {
    pub fn new(std_a: f64, std_yawdd: f64) -> Self {
        Self {
            generator: SigmaPointGenerator::with_default_lambda(),
            process_noise: Matrix2::from_diagonal(&Vector2::new(
                std_a * std_a,
                std_yawdd * std_yawdd,
            )),
        }
    }

    /// Sigma point weights, fixed by the augmented dimension
    pub fn weights(&self) -> &SigmaWeights {
        self.generator.weights()
    }

    /// State padded with zero-mean noise, covariance extended block-diagonally with Q
    pub fn augment(&self, state: &StateVec, covariance: &StateMat) -> (AugStateVec, AugStateMat) {
        let mut x_aug = AugStateVec::zeros();
        x_aug.fixed_rows_mut::<STATE_DIM>(0).copy_from(state);

        let mut p_aug = AugStateMat::zeros();
        p_aug
            .fixed_view_mut::<STATE_DIM, STATE_DIM>(0, 0)
            .copy_from(covariance);
        p_aug
            .fixed_view_mut::<NOISE_DIM, NOISE_DIM>(STATE_DIM, STATE_DIM)
            .copy_from(&self.process_noise);

        (x_aug, p_aug)
    }

    /// Augmented sigma points for (state, covariance)
    pub fn augmented_sigma_points(
        &self,
        state: &StateVec,
        covariance: &StateMat,
    ) -> TrackerResult<AugSigmaPoints> {
        let (x_aug, p_aug) = self.augment(state, covariance);
        self.generator.generate(&x_aug, &p_aug)
    }

    /// Predict the state `dt` seconds ahead.
    ///
    /// Fails only when the augmented covariance has no Cholesky factor.
    pub fn predict(
        &self,
        state: &StateVec,
        covariance: &StateMat,
        dt: f64,
    ) -> TrackerResult<Prediction> {
        let aug_sigmas = self.augmented_sigma_points(state, covariance)?;

        let mut sigma_points = SigmaPoints::zeros();
        for i in 0..SIGMA_COUNT {
            let aug = aug_sigmas.column(i).into_owned();
            sigma_points.set_column(i, &ctrv::propagate(&aug, dt));
        }

        let weights = self.weights();
        let mean = weighted_mean(&sigma_points, weights);
        let covariance = weighted_covariance(&sigma_points, &mean, weights, Some(YAW_INDEX));

        Ok(Prediction {
            mean,
            covariance,
            sigma_points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use approx::assert_relative_eq;

    fn sample_covariance() -> StateMat {
        let mut p = StateMat::identity() * 0.2;
        p[(0, 2)] = 0.05;
        p[(2, 0)] = 0.05;
        p[(3, 4)] = -0.02;
        p[(4, 3)] = -0.02;
        p
    }

    #[test]
    fn test_augment_layout() {
        let predictor = Predictor::new(2.0, 0.5);
        let x = StateVec::new(1.0, 2.0, 3.0, 4.0, 5.0);
        let p = sample_covariance();
        let (x_aug, p_aug) = predictor.augment(&x, &p);

        assert_eq!(x_aug[4], 5.0);
        assert_eq!(x_aug[5], 0.0);
        assert_eq!(x_aug[6], 0.0);
        assert_eq!(p_aug.fixed_view::<5, 5>(0, 0).into_owned(), p);
        assert_eq!(p_aug[(5, 5)], 4.0);
        assert_eq!(p_aug[(6, 6)], 0.25);
        assert_eq!(p_aug[(5, 6)], 0.0);
        assert_eq!(p_aug[(0, 5)], 0.0);
    }

    #[test]
    fn test_zero_dt_keeps_mean_and_covariance() {
        let predictor = Predictor::new(1.7, 0.5);
        let x = StateVec::new(5.0, -1.0, 2.0, 0.3, 0.1);
        let p = sample_covariance();
        let prediction = predictor.predict(&x, &p, 0.0).unwrap();

        assert_relative_eq!(prediction.mean, x, epsilon = 1e-10);
        assert_relative_eq!(prediction.covariance, p, epsilon = 1e-10);
    }

    #[test]
    fn test_predict_moves_along_heading() {
        let predictor = Predictor::new(0.1, 0.1);
        let x = StateVec::new(0.0, 0.0, 10.0, 0.0, 0.0);
        let p = StateMat::identity() * 0.01;
        let prediction = predictor.predict(&x, &p, 0.5).unwrap();

        assert!((prediction.mean[0] - 5.0).abs() < 0.05);
        assert!(prediction.mean[1].abs() < 0.05);
        // Uncertainty grows along the direction of travel
        assert!(prediction.covariance[(0, 0)] > p[(0, 0)]);
        assert_relative_eq!(
            prediction.covariance,
            prediction.covariance.transpose(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_sigma_points_cached_in_prediction() {
        let predictor = Predictor::new(1.7, 0.5);
        let x = StateVec::new(5.0, 0.0, 0.0, 0.0, 0.0);
        let prediction = predictor.predict(&x, &StateMat::identity(), 0.1).unwrap();
        // Central column is the propagated mean point
        assert_relative_eq!(
            prediction.sigma_points.column(0).into_owned(),
            x,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_indefinite_covariance_fails() {
        let predictor = Predictor::new(1.7, 0.5);
        let mut p = StateMat::identity();
        p[(2, 2)] = -1.0;
        let result = predictor.predict(&StateVec::zeros(), &p, 0.1);
        assert_eq!(result.unwrap_err(), TrackerError::Divergence);
    }
}
