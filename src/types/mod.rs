pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{TrackerError, TrackerResult};

/// Chi-square 95% threshold for 2 degrees of freedom (lidar)
pub const LIDAR_NIS_95: f64 = 5.991;
/// Chi-square 95% threshold for 3 degrees of freedom (radar)
pub const RADAR_NIS_95: f64 = 7.815;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Lidar,
    Radar,
}

impl SensorKind {
    /// Number of raw values a measurement of this kind carries
    pub fn measurement_dim(self) -> usize {
        match self {
            SensorKind::Lidar => MEASURE_DIM_LIDAR,
            SensorKind::Radar => MEASURE_DIM_RADAR,
        }
    }

    /// 95% chi-square bound for this sensor's NIS
    pub fn nis_threshold(self) -> f64 {
        match self {
            SensorKind::Lidar => LIDAR_NIS_95,
            SensorKind::Radar => RADAR_NIS_95,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Lidar => write!(f, "lidar"),
            SensorKind::Radar => write!(f, "radar"),
        }
    }
}

/// Raw measurement record as delivered by the input stream.
///
/// The vector length is not trusted; convert into a [`Measurement`] to validate it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPackage {
    pub sensor: SensorKind,
    /// Microseconds
    pub timestamp_us: i64,
    pub raw: Vec<f64>,
}

impl MeasurementPackage {
    pub fn new(sensor: SensorKind, timestamp_us: i64, raw: Vec<f64>) -> Self {
        Self {
            sensor,
            timestamp_us,
            raw,
        }
    }
}

/// Validated measurement with a dimension fixed by its sensor type
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Measurement {
    /// Cartesian position (px, py) in meters
    Lidar { timestamp_us: i64, z: LidarVec },
    /// Range [m], bearing [rad], range rate [m/s]
    Radar { timestamp_us: i64, z: RadarVec },
}

impl Measurement {
    pub fn lidar(timestamp_us: i64, px: f64, py: f64) -> Self {
        Measurement::Lidar {
            timestamp_us,
            z: LidarVec::new(px, py),
        }
    }

    pub fn radar(timestamp_us: i64, rho: f64, phi: f64, rho_dot: f64) -> Self {
        Measurement::Radar {
            timestamp_us,
            z: RadarVec::new(rho, phi, rho_dot),
        }
    }

    pub fn sensor(&self) -> SensorKind {
        match self {
            Measurement::Lidar { .. } => SensorKind::Lidar,
            Measurement::Radar { .. } => SensorKind::Radar,
        }
    }

    pub fn timestamp_us(&self) -> i64 {
        match self {
            Measurement::Lidar { timestamp_us, .. } | Measurement::Radar { timestamp_us, .. } => {
                *timestamp_us
            }
        }
    }

    /// Cartesian position implied by the measurement
    pub fn position(&self) -> (f64, f64) {
        match self {
            Measurement::Lidar { z, .. } => (z[0], z[1]),
            Measurement::Radar { z, .. } => {
                let (rho, phi) = (z[0], z[1]);
                (rho * phi.cos(), rho * phi.sin())
            }
        }
    }
}

impl TryFrom<&MeasurementPackage> for Measurement {
    type Error = TrackerError;

    fn try_from(package: &MeasurementPackage) -> TrackerResult<Self> {
        let expected = package.sensor.measurement_dim();
        if package.raw.len() != expected {
            return Err(TrackerError::MalformedMeasurement {
                sensor: package.sensor,
                expected,
                actual: package.raw.len(),
            });
        }
        if package.raw.iter().any(|v| !v.is_finite()) {
            return Err(TrackerError::NonFiniteMeasurement {
                sensor: package.sensor,
            });
        }

        let raw = &package.raw;
        Ok(match package.sensor {
            SensorKind::Lidar => Measurement::lidar(package.timestamp_us, raw[0], raw[1]),
            SensorKind::Radar => Measurement::radar(package.timestamp_us, raw[0], raw[1], raw[2]),
        })
    }
}

/// True target kinematics accompanying a logged measurement
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub px: f64,
    pub py: f64,
    pub vx: f64,
    pub vy: f64,
}

impl GroundTruth {
    pub fn as_array(&self) -> [f64; 4] {
        [self.px, self.py, self.vx, self.vy]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lidar_package_converts() {
        let package = MeasurementPackage::new(SensorKind::Lidar, 42, vec![1.0, 2.0]);
        let m = Measurement::try_from(&package).unwrap();
        assert_eq!(m, Measurement::lidar(42, 1.0, 2.0));
        assert_eq!(m.sensor(), SensorKind::Lidar);
        assert_eq!(m.timestamp_us(), 42);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let package = MeasurementPackage::new(SensorKind::Radar, 0, vec![1.0, 2.0]);
        let err = Measurement::try_from(&package).unwrap_err();
        assert_eq!(
            err,
            TrackerError::MalformedMeasurement {
                sensor: SensorKind::Radar,
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn test_nan_rejected() {
        let package = MeasurementPackage::new(SensorKind::Lidar, 0, vec![f64::NAN, 2.0]);
        assert!(matches!(
            Measurement::try_from(&package),
            Err(TrackerError::NonFiniteMeasurement { .. })
        ));
    }

    #[test]
    fn test_radar_position() {
        let m = Measurement::radar(0, 2.0, std::f64::consts::FRAC_PI_2, 0.0);
        let (px, py) = m.position();
        assert!(px.abs() < 1e-12);
        assert!((py - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sensor_kind_serde() {
        let json = serde_json::to_string(&SensorKind::Radar).unwrap();
        assert_eq!(json, "\"radar\"");
        let kind: SensorKind = serde_json::from_str("\"lidar\"").unwrap();
        assert_eq!(kind, SensorKind::Lidar);
    }
}
