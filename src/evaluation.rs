use crate::types::{GroundTruth, StateVec};

/// CTRV state as (px, py, vx, vy)
pub fn state_to_cartesian(state: &StateVec) -> [f64; 4] {
    let v = state[2];
    let yaw = state[3];
    [state[0], state[1], v * yaw.cos(), v * yaw.sin()]
}

/// Per-component root mean squared error of estimates against ground truth.
///
/// Returns `None` for empty or mismatched inputs.
pub fn rmse(estimates: &[StateVec], truths: &[GroundTruth]) -> Option<[f64; 4]> {
    if estimates.is_empty() || estimates.len() != truths.len() {
        return None;
    }

    let mut sum_sq = [0.0; 4];
    for (estimate, truth) in estimates.iter().zip(truths) {
        let est = state_to_cartesian(estimate);
        let gt = truth.as_array();
        for k in 0..4 {
            sum_sq[k] += (est[k] - gt[k]).powi(2);
        }
    }

    let n = estimates.len() as f64;
    Some(sum_sq.map(|s| (s / n).sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_state_to_cartesian() {
        let c = state_to_cartesian(&StateVec::new(1.0, 2.0, 3.0, FRAC_PI_2, 0.4));
        assert_relative_eq!(c[0], 1.0);
        assert_relative_eq!(c[1], 2.0);
        assert!(c[2].abs() < 1e-12);
        assert_relative_eq!(c[3], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rmse() {
        let estimates = vec![
            StateVec::new(1.0, 0.0, 2.0, 0.0, 0.0),
            StateVec::new(3.0, 0.0, 2.0, 0.0, 0.0),
        ];
        let truths = vec![
            GroundTruth {
                px: 0.0,
                py: 0.0,
                vx: 2.0,
                vy: 0.0,
            },
            GroundTruth {
                px: 2.0,
                py: 0.0,
                vx: 2.0,
                vy: 1.0,
            },
        ];
        let r = rmse(&estimates, &truths).unwrap();
        assert_relative_eq!(r[0], 1.0);
        assert_relative_eq!(r[1], 0.0);
        assert_relative_eq!(r[2], 0.0);
        assert_relative_eq!(r[3], 0.5_f64.sqrt());
    }

    #[test]
    fn test_rmse_rejects_bad_input() {
        assert!(rmse(&[], &[]).is_none());
        assert!(rmse(&[StateVec::zeros()], &[]).is_none());
    }
}
