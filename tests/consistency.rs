//! End-to-end filter runs against simulated CTRV targets

use std::fs::File;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use ukf_tracker_rs::evaluation::rmse;
use ukf_tracker_rs::sensors::{read_log, write_log, LogRecord};
use ukf_tracker_rs::simulation::{CtrvSimulator, SimulationConfig};
use ukf_tracker_rs::{FilterConfig, NisMonitor, SensorKind, Step, UkfCtrv};

const BURN_IN: usize = 100;

fn simulate(steps: usize, seed: u64) -> (SimulationConfig, Vec<LogRecord>) {
    let config = SimulationConfig {
        seed,
        ..SimulationConfig::default()
    };
    let records = CtrvSimulator::new(&config).unwrap().run(steps);
    (config, records)
}

fn matched_filter(sim: &SimulationConfig) -> UkfCtrv {
    UkfCtrv::new(FilterConfig {
        std_a: sim.std_a,
        std_yawdd: sim.std_yawdd,
        ..FilterConfig::default()
    })
    .unwrap()
}

#[test]
fn test_nis_exceedance_near_five_percent() {
    let (sim, records) = simulate(4000, 2024);
    let mut ukf = matched_filter(&sim);
    let mut monitor = NisMonitor::new();

    for (i, record) in records.iter().enumerate() {
        let output = ukf.process_measurement(&record.package).unwrap();
        if i < BURN_IN {
            continue;
        }
        if let Some(sample) = output.nis {
            monitor.record(sample);
        }
    }

    for sensor in [SensorKind::Lidar, SensorKind::Radar] {
        let summary = monitor.summary(sensor);
        assert!(summary.count > 1800, "{}: only {} samples", sensor, summary.count);
        assert!(
            summary.over_threshold_ratio > 0.01 && summary.over_threshold_ratio < 0.12,
            "{}: {:.1}% of NIS samples above {}",
            sensor,
            summary.over_threshold_ratio * 100.0,
            summary.threshold
        );
    }
}

#[test]
fn test_tracking_accuracy() {
    let (sim, records) = simulate(1000, 7);
    let mut ukf = matched_filter(&sim);

    let mut estimates = Vec::new();
    let mut truths = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let output = ukf.process_measurement(&record.package).unwrap();
        if i >= BURN_IN {
            estimates.push(output.state);
            truths.push(record.ground_truth.unwrap());
        }
    }

    let r = rmse(&estimates, &truths).unwrap();
    assert!(r[0] < 0.3 && r[1] < 0.3, "position RMSE {:?}", r);
    assert!(r[2] < 1.0 && r[3] < 1.0, "velocity RMSE {:?}", r);
}

#[test]
fn test_lidar_only_run_never_updates_on_radar() {
    let (sim, records) = simulate(200, 11);
    let mut ukf = UkfCtrv::new(FilterConfig {
        use_radar: false,
        std_a: sim.std_a,
        std_yawdd: sim.std_yawdd,
        ..FilterConfig::default()
    })
    .unwrap();

    for record in &records {
        let output = ukf.process_measurement(&record.package).unwrap();
        if record.package.sensor == SensorKind::Radar {
            assert_eq!(output.step, Step::PredictedOnly(SensorKind::Radar));
            assert!(output.nis.is_none());
        }
    }

    let snapshot = ukf.get_state();
    assert_eq!(snapshot.radar_updates, 0);
    assert_eq!(snapshot.lidar_updates, 99);
}

#[test]
fn test_gzipped_log_reads_back() {
    let (_, records) = simulate(20, 3);
    let path = std::env::temp_dir().join(format!("ukf_tracker_{}.log.gz", std::process::id()));

    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    writeln!(encoder, "# header").unwrap();
    write_log(&records, &mut encoder).unwrap();
    encoder.finish().unwrap();

    let parsed = read_log(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(parsed.rejected.is_empty());
    assert_eq!(parsed.records, records);
}
