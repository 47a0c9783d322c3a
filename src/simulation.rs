//! Seeded CTRV target and sensor simulator.
//!
//! The true target moves under the same discrete CTRV model the filter uses,
//! driven by random longitudinal and yaw accelerations held constant over each
//! step. Measurements alternate lidar/radar and carry manufacturer noise.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::angles::normalize_angle;
use crate::config::SensorNoise;
use crate::error::{TrackerError, TrackerResult};
use crate::filters::ctrv;
use crate::filters::measurement::MIN_RADAR_RANGE;
use crate::sensors::LogRecord;
use crate::types::{AugStateVec, GroundTruth, MeasurementPackage, SensorKind, StateVec};

#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// True initial state [px, py, v, yaw, yaw_rate]
    pub initial_state: StateVec,
    /// Step length [s]
    pub dt: f64,
    pub std_a: f64,
    pub std_yawdd: f64,
    pub sensor_noise: SensorNoise,
    pub start_timestamp_us: i64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_state: StateVec::new(40.0, 20.0, 2.0, 0.5, 0.1),
            dt: 0.05,
            std_a: 0.5,
            std_yawdd: 0.2,
            sensor_noise: SensorNoise::default(),
            start_timestamp_us: 0,
            seed: 42,
        }
    }
}

fn normal(std: f64, what: &str) -> TrackerResult<Normal<f64>> {
    Normal::new(0.0, std)
        .map_err(|e| TrackerError::InvalidConfig(format!("{} std {}: {}", what, std, e)))
}

/// Generates measurement records from a simulated CTRV target.
pub struct CtrvSimulator {
    rng: ChaCha8Rng,
    truth: StateVec,
    dt: f64,
    dt_us: i64,
    timestamp_us: i64,
    next_sensor: SensorKind,
    accel: Normal<f64>,
    yaw_accel: Normal<f64>,
    lidar_x: Normal<f64>,
    lidar_y: Normal<f64>,
    radar_range: Normal<f64>,
    radar_bearing: Normal<f64>,
    radar_range_rate: Normal<f64>,
}

impl CtrvSimulator {
    pub fn new(config: &SimulationConfig) -> TrackerResult<Self> {
        if !(config.dt.is_finite() && config.dt > 0.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "simulation dt must be positive, got {}",
                config.dt
            )));
        }
        let noise = &config.sensor_noise;

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            truth: config.initial_state,
            dt: config.dt,
            dt_us: (config.dt * 1_000_000.0).round() as i64,
            timestamp_us: config.start_timestamp_us,
            next_sensor: SensorKind::Lidar,
            accel: normal(config.std_a, "std_a")?,
            yaw_accel: normal(config.std_yawdd, "std_yawdd")?,
            lidar_x: normal(noise.std_laspx, "std_laspx")?,
            lidar_y: normal(noise.std_laspy, "std_laspy")?,
            radar_range: normal(noise.std_radr, "std_radr")?,
            radar_bearing: normal(noise.std_radphi, "std_radphi")?,
            radar_range_rate: normal(noise.std_radrd, "std_radrd")?,
        })
    }

    /// Current true state
    pub fn truth(&self) -> &StateVec {
        &self.truth
    }

    fn ground_truth(&self) -> GroundTruth {
        let v = self.truth[2];
        let yaw = self.truth[3];
        GroundTruth {
            px: self.truth[0],
            py: self.truth[1],
            vx: v * yaw.cos(),
            vy: v * yaw.sin(),
        }
    }

    /// Measure the current truth, then advance it by one step.
    pub fn next_record(&mut self) -> LogRecord {
        let sensor = self.next_sensor;
        let x = self.truth;

        let raw = match sensor {
            SensorKind::Lidar => vec![
                x[0] + self.lidar_x.sample(&mut self.rng),
                x[1] + self.lidar_y.sample(&mut self.rng),
            ],
            SensorKind::Radar => {
                let rho = (x[0] * x[0] + x[1] * x[1]).sqrt().max(MIN_RADAR_RANGE);
                let phi = x[1].atan2(x[0]);
                let rho_dot = (x[0] * x[3].cos() + x[1] * x[3].sin()) * x[2] / rho;
                vec![
                    rho + self.radar_range.sample(&mut self.rng),
                    normalize_angle(phi + self.radar_bearing.sample(&mut self.rng)),
                    rho_dot + self.radar_range_rate.sample(&mut self.rng),
                ]
            }
        };

        let record = LogRecord {
            package: MeasurementPackage::new(sensor, self.timestamp_us, raw),
            ground_truth: Some(self.ground_truth()),
        };

        let mut aug = AugStateVec::zeros();
        aug.fixed_rows_mut::<5>(0).copy_from(&self.truth);
        aug[5] = self.accel.sample(&mut self.rng);
        aug[6] = self.yaw_accel.sample(&mut self.rng);
        self.truth = ctrv::propagate(&aug, self.dt);
        self.truth[3] = normalize_angle(self.truth[3]);
        self.timestamp_us += self.dt_us;
        self.next_sensor = match sensor {
            SensorKind::Lidar => SensorKind::Radar,
            SensorKind::Radar => SensorKind::Lidar,
        };

        record
    }

    pub fn run(&mut self, steps: usize) -> Vec<LogRecord> {
        (0..steps).map(|_| self.next_record()).collect()
    }
}
