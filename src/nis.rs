//! Normalized Innovation Squared (NIS) consistency monitoring.
//!
//! The monitor is owned by the caller and fed the NIS sample returned with each
//! update step; it never touches filter state. For a well-tuned filter about 5%
//! of samples exceed the 95% chi-square bound of the sensor's measurement
//! dimension (5.991 for lidar, 7.815 for radar).

use serde::{Deserialize, Serialize};

use crate::types::SensorKind;

/// One NIS value tagged with the sensor that produced it
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NisSample {
    pub sensor: SensorKind,
    pub value: f64,
}

impl NisSample {
    pub fn exceeds_threshold(&self) -> bool {
        self.value > self.sensor.nis_threshold()
    }
}

#[derive(Clone, Debug, Default)]
struct NisAccumulator {
    count: u64,
    sum: f64,
    over_threshold: u64,
    last: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NisSummary {
    pub sensor: SensorKind,
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    pub over_threshold: u64,
    /// Fraction of samples above `threshold` (0 when empty)
    pub over_threshold_ratio: f64,
    pub threshold: f64,
    pub last: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct NisMonitor {
    lidar: NisAccumulator,
    radar: NisAccumulator,
}

impl NisMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn accumulator_mut(&mut self, sensor: SensorKind) -> &mut NisAccumulator {
        match sensor {
            SensorKind::Lidar => &mut self.lidar,
            SensorKind::Radar => &mut self.radar,
        }
    }

    fn accumulator(&self, sensor: SensorKind) -> &NisAccumulator {
        match sensor {
            SensorKind::Lidar => &self.lidar,
            SensorKind::Radar => &self.radar,
        }
    }

    /// Record a sample; returns true when it exceeds the sensor's 95% bound
    pub fn record(&mut self, sample: NisSample) -> bool {
        let over = sample.exceeds_threshold();
        let acc = self.accumulator_mut(sample.sensor);
        acc.count += 1;
        acc.sum += sample.value;
        if over {
            acc.over_threshold += 1;
        }
        acc.last = Some(sample.value);
        over
    }

    pub fn summary(&self, sensor: SensorKind) -> NisSummary {
        let acc = self.accumulator(sensor);
        let (mean, ratio) = if acc.count > 0 {
            (
                acc.sum / acc.count as f64,
                acc.over_threshold as f64 / acc.count as f64,
            )
        } else {
            (0.0, 0.0)
        };
        NisSummary {
            sensor,
            count: acc.count,
            sum: acc.sum,
            mean,
            over_threshold: acc.over_threshold,
            over_threshold_ratio: ratio,
            threshold: sensor.nis_threshold(),
            last: acc.last,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn reset_sensor(&mut self, sensor: SensorKind) {
        *self.accumulator_mut(sensor) = NisAccumulator::default();
    }
}
