//! Unscented Kalman filter tracking a constant turn rate and velocity (CTRV)
//! target from interleaved lidar and radar measurements.

pub mod angles;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod filters;
pub mod nis;
pub mod sensors;
pub mod simulation;
pub mod types;

pub use config::{FilterConfig, SensorNoise};
pub use error::{TrackerError, TrackerResult};
pub use filters::{FilterOutput, Step, UkfCtrv, UkfCtrvState};
pub use nis::{NisMonitor, NisSample, NisSummary};
pub use types::{GroundTruth, Measurement, MeasurementPackage, SensorKind};
