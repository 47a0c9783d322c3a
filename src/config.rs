use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{TrackerError, TrackerResult};
use crate::types::{LidarNoise, RadarNoise};

// ─── Sensor noise ────────────────────────────────────────────────────────────

/// Measurement noise standard deviations provided by the sensor manufacturer.
///
/// Never deserialized from a config file: these are properties of the sensors,
/// not tuning knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorNoise {
    /// Lidar x position [m]
    pub std_laspx: f64,
    /// Lidar y position [m]
    pub std_laspy: f64,
    /// Radar range [m]
    pub std_radr: f64,
    /// Radar bearing [rad]
    pub std_radphi: f64,
    /// Radar range rate [m/s]
    pub std_radrd: f64,
}

impl Default for SensorNoise {
    fn default() -> Self {
        Self {
            std_laspx: 0.15,
            std_laspy: 0.15,
            std_radr: 0.3,
            std_radphi: 0.03,
            std_radrd: 0.3,
        }
    }
}

impl SensorNoise {
    pub fn lidar_covariance(&self) -> LidarNoise {
        LidarNoise::from_diagonal(&nalgebra::Vector2::new(
            self.std_laspx * self.std_laspx,
            self.std_laspy * self.std_laspy,
        ))
    }

    pub fn radar_covariance(&self) -> RadarNoise {
        RadarNoise::from_diagonal(&nalgebra::Vector3::new(
            self.std_radr * self.std_radr,
            self.std_radphi * self.std_radphi,
            self.std_radrd * self.std_radrd,
        ))
    }
}

// ─── Filter configuration ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    // ── Sensor gating ──
    /// If false, lidar measurements neither initialize nor correct the filter
    pub use_lidar: bool,
    /// If false, radar measurements neither initialize nor correct the filter
    pub use_radar: bool,

    // ── Process noise ──
    /// Longitudinal acceleration noise std [m/s²]
    pub std_a: f64,
    /// Yaw acceleration noise std [rad/s²]
    pub std_yawdd: f64,

    #[serde(skip)]
    pub sensor_noise: SensorNoise,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            use_lidar: true,
            use_radar: true,
            std_a: 1.7,
            std_yawdd: 0.5,
            sensor_noise: SensorNoise::default(),
        }
    }
}

impl FilterConfig {
    /// Reject std-devs that would make the augmented or innovation covariance degenerate
    pub fn validate(&self) -> TrackerResult<()> {
        let n = &self.sensor_noise;
        let named = [
            ("std_a", self.std_a),
            ("std_yawdd", self.std_yawdd),
            ("std_laspx", n.std_laspx),
            ("std_laspy", n.std_laspy),
            ("std_radr", n.std_radr),
            ("std_radphi", n.std_radphi),
            ("std_radrd", n.std_radrd),
        ];
        for (name, value) in named {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackerError::InvalidConfig(format!(
                    "{} must be finite and positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Load a JSON config file; missing fields fall back to defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> TrackerResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: FilterConfig = serde_json::from_str(&text)
            .map_err(|e| TrackerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FilterConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.use_lidar && config.use_radar);
        assert_eq!(config.std_a, 1.7);
        assert_eq!(config.std_yawdd, 0.5);
    }

    #[test]
    fn test_zero_process_noise_rejected() {
        let config = FilterConfig {
            std_a: 0.0,
            ..FilterConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TrackerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FilterConfig =
            serde_json::from_str(r#"{"use_radar": false, "std_a": 0.9}"#).unwrap();
        assert!(config.use_lidar);
        assert!(!config.use_radar);
        assert_eq!(config.std_a, 0.9);
        assert_eq!(config.std_yawdd, 0.5);
    }

    #[test]
    fn test_sensor_noise_cannot_be_configured() {
        let config: FilterConfig = serde_json::from_str(r#"{"sensor_noise": 5.0}"#).unwrap();
        assert_eq!(config.sensor_noise, SensorNoise::default());
    }

    #[test]
    fn test_noise_covariances() {
        let noise = SensorNoise::default();
        let r_lidar = noise.lidar_covariance();
        assert!((r_lidar[(0, 0)] - 0.0225).abs() < 1e-12);
        assert_eq!(r_lidar[(0, 1)], 0.0);
        let r_radar = noise.radar_covariance();
        assert!((r_radar[(1, 1)] - 0.0009).abs() < 1e-12);
        assert!((r_radar[(2, 2)] - 0.09).abs() < 1e-12);
    }
}
