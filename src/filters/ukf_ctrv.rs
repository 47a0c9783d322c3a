use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::measurement::{LidarModel, RadarModel};
use super::predictor::{Prediction, Predictor};
use super::updater::update;
use crate::config::FilterConfig;
use crate::error::TrackerResult;
use crate::nis::NisSample;
use crate::types::{Measurement, MeasurementPackage, SensorKind, SigmaPoints, StateMat, StateVec};

/// Serializable snapshot of the tracker, for reports and logging
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UkfCtrvState {
    /// Position in the sensor frame [meters]
    pub position: (f64, f64),

    /// Speed along the heading [m/s]
    pub speed: f64,

    /// Heading [rad]
    pub yaw: f64,

    /// Turn rate [rad/s]
    pub yaw_rate: f64,

    /// Covariance trace for uncertainty
    pub covariance_trace: f64,

    /// Update counters
    pub lidar_updates: u64,
    pub radar_updates: u64,
}

/// What the controller did with one measurement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// First accepted measurement seeded the state; nothing was predicted
    Initialized,
    /// Predicted to the measurement time and corrected with it
    Updated(SensorKind),
    /// Predicted only; the sensor is disabled
    PredictedOnly(SensorKind),
    /// Uninitialized filter received a measurement from a disabled sensor
    Ignored(SensorKind),
}

/// Filter belief after processing one measurement
#[derive(Clone, Debug)]
pub struct FilterOutput {
    pub timestamp_us: i64,
    pub step: Step,
    pub state: StateVec,
    pub covariance: StateMat,
    /// Present only when an update step ran
    pub nis: Option<NisSample>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Running { last_timestamp_us: i64 },
}

/// Unscented Kalman filter tracking a CTRV target from lidar and radar.
///
/// State: [px, py, v, yaw, yaw_rate]. Each measurement is handled to completion
/// before the next; a rejected or failed measurement leaves the filter exactly
/// as it was, so the next Δt is measured from the last committed timestamp.
pub struct UkfCtrv {
    config: FilterConfig,
    predictor: Predictor,
    lidar: LidarModel,
    radar: RadarModel,

    phase: Phase,

    /// State vector [5D]
    state: StateVec,

    /// Covariance matrix [5x5]
    covariance: StateMat,

    /// Predicted sigma points from the last committed prediction
    sigma_points: Option<SigmaPoints>,

    lidar_updates: u64,
    radar_updates: u64,
}

impl UkfCtrv {
    pub fn new(config: FilterConfig) -> TrackerResult<Self> {
        config.validate()?;

        Ok(Self {
            predictor: Predictor::new(config.std_a, config.std_yawdd),
            lidar: LidarModel::new(&config.sensor_noise),
            radar: RadarModel::new(&config.sensor_noise),
            config,
            phase: Phase::Uninitialized,
            state: StateVec::zeros(),
            covariance: StateMat::identity(),
            sigma_points: None,
            lidar_updates: 0,
            radar_updates: 0,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn state(&self) -> &StateVec {
        &self.state
    }

    pub fn covariance(&self) -> &StateMat {
        &self.covariance
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    /// Timestamp of the last committed measurement
    pub fn last_timestamp_us(&self) -> Option<i64> {
        match self.phase {
            Phase::Uninitialized => None,
            Phase::Running { last_timestamp_us } => Some(last_timestamp_us),
        }
    }

    pub fn predicted_sigma_points(&self) -> Option<&SigmaPoints> {
        self.sigma_points.as_ref()
    }

    pub fn get_state(&self) -> UkfCtrvState {
        UkfCtrvState {
            position: (self.state[0], self.state[1]),
            speed: self.state[2],
            yaw: self.state[3],
            yaw_rate: self.state[4],
            covariance_trace: self.covariance.trace(),
            lidar_updates: self.lidar_updates,
            radar_updates: self.radar_updates,
        }
    }

    /// Drop the current belief; the next accepted measurement re-initializes.
    pub fn reset(&mut self) {
        info!("[UKF] Reset to uninitialized");
        self.phase = Phase::Uninitialized;
        self.state = StateVec::zeros();
        self.covariance = StateMat::identity();
        self.sigma_points = None;
        self.lidar_updates = 0;
        self.radar_updates = 0;
    }

    fn sensor_enabled(&self, sensor: SensorKind) -> bool {
        match sensor {
            SensorKind::Lidar => self.config.use_lidar,
            SensorKind::Radar => self.config.use_radar,
        }
    }

    /// Validate a raw record and process it.
    ///
    /// Malformed records are rejected before any filter math runs.
    pub fn process_measurement(&mut self, package: &MeasurementPackage) -> TrackerResult<FilterOutput> {
        let measurement = Measurement::try_from(package)?;
        self.process(&measurement)
    }

    pub fn process(&mut self, measurement: &Measurement) -> TrackerResult<FilterOutput> {
        let sensor = measurement.sensor();
        let timestamp_us = measurement.timestamp_us();

        let last_timestamp_us = match self.phase {
            Phase::Uninitialized => {
                if !self.sensor_enabled(sensor) {
                    debug!("[UKF] {} disabled, waiting for an enabled sensor to initialize", sensor);
                    return Ok(self.output(timestamp_us, Step::Ignored(sensor), None));
                }
                self.initialize(measurement);
                return Ok(self.output(timestamp_us, Step::Initialized, None));
            }
            Phase::Running { last_timestamp_us } => last_timestamp_us,
        };

        let dt = (timestamp_us - last_timestamp_us) as f64 / 1_000_000.0;
        if dt < 0.0 {
            warn!(
                "[UKF] Out-of-order {} measurement: dt = {:.6} s, predicting backward",
                sensor, dt
            );
        }

        let prediction = self.predictor.predict(&self.state, &self.covariance, dt)?;

        if !self.sensor_enabled(sensor) {
            self.commit(timestamp_us, &prediction.mean, &prediction.covariance, prediction.sigma_points);
            return Ok(self.output(timestamp_us, Step::PredictedOnly(sensor), None));
        }

        let (mean, covariance, nis) = self.correct(&prediction, measurement)?;
        self.commit(timestamp_us, &mean, &covariance, prediction.sigma_points);
        match sensor {
            SensorKind::Lidar => self.lidar_updates += 1,
            SensorKind::Radar => self.radar_updates += 1,
        }

        let sample = NisSample { sensor, value: nis };
        Ok(self.output(timestamp_us, Step::Updated(sensor), Some(sample)))
    }

    fn initialize(&mut self, measurement: &Measurement) {
        let (px, py) = measurement.position();
        self.state = StateVec::new(px, py, 0.0, 0.0, 0.0);
        self.covariance = StateMat::identity();
        self.sigma_points = None;
        self.phase = Phase::Running {
            last_timestamp_us: measurement.timestamp_us(),
        };
        info!(
            "[UKF] Initialized from {} at ({:.3}, {:.3}), t = {} us",
            measurement.sensor(),
            px,
            py,
            measurement.timestamp_us()
        );
    }

    fn correct(
        &self,
        prediction: &Prediction,
        measurement: &Measurement,
    ) -> TrackerResult<(StateVec, StateMat, f64)> {
        let weights = self.predictor.weights();
        match measurement {
            Measurement::Lidar { z, .. } => {
                let outcome = update(prediction, z, &self.lidar, weights)?;
                Ok((outcome.mean, outcome.covariance, outcome.nis))
            }
            Measurement::Radar { z, .. } => {
                let outcome = update(prediction, z, &self.radar, weights)?;
                Ok((outcome.mean, outcome.covariance, outcome.nis))
            }
        }
    }

    fn commit(&mut self, timestamp_us: i64, mean: &StateVec, covariance: &StateMat, sigma_points: SigmaPoints) {
        self.state = *mean;
        self.covariance = *covariance;
        self.sigma_points = Some(sigma_points);
        self.phase = Phase::Running {
            last_timestamp_us: timestamp_us,
        };
        debug!(
            "[UKF] t = {} us state = {:?} trace(P) = {:.4}",
            timestamp_us,
            self.state.as_slice(),
            self.covariance.trace()
        );
    }

    fn output(&self, timestamp_us: i64, step: Step, nis: Option<NisSample>) -> FilterOutput {
        FilterOutput {
            timestamp_us,
            step,
            state: self.state,
            covariance: self.covariance,
            nis,
        }
    }
}
