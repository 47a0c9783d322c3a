//! Measurement models mapping a state sigma point into sensor space.

use log::warn;
use nalgebra::{SMatrix, SVector};

use crate::config::SensorNoise;
use crate::types::{
    LidarNoise, LidarVec, RadarNoise, RadarVec, SensorKind, StateVec, MEASURE_DIM_LIDAR,
    MEASURE_DIM_RADAR, RADAR_BEARING_INDEX,
};

/// Radar range floor [m]; keeps the range-rate division finite near the sensor origin
pub const MIN_RADAR_RANGE: f64 = 1e-4;

pub trait MeasurementModel<const M: usize> {
    const SENSOR: SensorKind;

    /// Measurement component wrapped into (-π, π] in residuals, if any
    const ANGLE_INDEX: Option<usize>;

    /// Predicted measurement for one state sigma point
    fn predict(&self, state: &StateVec) -> SVector<f64, M>;

    /// Measurement noise covariance R
    fn noise(&self) -> &SMatrix<f64, M, M>;
}

/// Linear projection onto (px, py)
#[derive(Clone, Debug)]
pub struct LidarModel {
    noise: LidarNoise,
}

impl LidarModel {
    pub fn new(sensor_noise: &SensorNoise) -> Self {
        Self {
            noise: sensor_noise.lidar_covariance(),
        }
    }
}

impl MeasurementModel<MEASURE_DIM_LIDAR> for LidarModel {
    const SENSOR: SensorKind = SensorKind::Lidar;
    const ANGLE_INDEX: Option<usize> = None;

    fn predict(&self, state: &StateVec) -> LidarVec {
        LidarVec::new(state[0], state[1])
    }

    fn noise(&self) -> &LidarNoise {
        &self.noise
    }
}

/// Range, bearing and range rate seen from the sensor origin
#[derive(Clone, Debug)]
pub struct RadarModel {
    noise: RadarNoise,
}

impl RadarModel {
    pub fn new(sensor_noise: &SensorNoise) -> Self {
        Self {
            noise: sensor_noise.radar_covariance(),
        }
    }
}

impl MeasurementModel<MEASURE_DIM_RADAR> for RadarModel {
    const SENSOR: SensorKind = SensorKind::Radar;
    const ANGLE_INDEX: Option<usize> = Some(RADAR_BEARING_INDEX);

    fn predict(&self, state: &StateVec) -> RadarVec {
        let px = state[0];
        let py = state[1];
        let v = state[2];
        let yaw = state[3];

        let mut rho = (px * px + py * py).sqrt();
        if rho < MIN_RADAR_RANGE {
            warn!(
                "[UKF] Radar range {:.2e} m below floor, clamping to {:.0e} m",
                rho, MIN_RADAR_RANGE
            );
            rho = MIN_RADAR_RANGE;
        }
        let phi = py.atan2(px);
        let rho_dot = (px * yaw.cos() * v + py * yaw.sin() * v) / rho;

        RadarVec::new(rho, phi, rho_dot)
    }

    fn noise(&self) -> &RadarNoise {
        &self.noise
    }
}
