//! Linear algebra type system for the CTRV tracker
//!
//! Provides compile-time dimension checking and clean type aliases
//! for the unscented filter and its two measurement models.

use nalgebra::{SMatrix, SVector};

// ===== State Dimensions =====
pub const STATE_DIM: usize = 5; // px, py, v, yaw, yaw_rate
pub const AUG_DIM: usize = 7; // state + nu_a + nu_yawdd
pub const NOISE_DIM: usize = AUG_DIM - STATE_DIM;

/// Index of the yaw component inside the state vector
pub const YAW_INDEX: usize = 3;

// ===== Measurement Dimensions =====
pub const MEASURE_DIM_LIDAR: usize = 2; // (px, py)
pub const MEASURE_DIM_RADAR: usize = 3; // (rho, phi, rho_dot)

/// Index of the bearing component inside a radar measurement
pub const RADAR_BEARING_INDEX: usize = 1;

// ===== State Types =====
pub type StateVec = SVector<f64, STATE_DIM>;
pub type StateMat = SMatrix<f64, STATE_DIM, STATE_DIM>;

pub type AugStateVec = SVector<f64, AUG_DIM>;
pub type AugStateMat = SMatrix<f64, AUG_DIM, AUG_DIM>;

// Measurement types
pub type LidarVec = SVector<f64, MEASURE_DIM_LIDAR>;
pub type LidarNoise = SMatrix<f64, MEASURE_DIM_LIDAR, MEASURE_DIM_LIDAR>;
pub type RadarVec = SVector<f64, MEASURE_DIM_RADAR>;
pub type RadarNoise = SMatrix<f64, MEASURE_DIM_RADAR, MEASURE_DIM_RADAR>;

// ===== Sigma Point Types =====
pub const SIGMA_COUNT: usize = 2 * AUG_DIM + 1; // 15

/// Augmented sigma points, one per column (7×15)
pub type AugSigmaPoints = SMatrix<f64, AUG_DIM, SIGMA_COUNT>;
/// Sigma points propagated into state space, one per column (5×15)
pub type SigmaPoints = SMatrix<f64, STATE_DIM, SIGMA_COUNT>;
pub type SigmaWeights = SVector<f64, SIGMA_COUNT>;
