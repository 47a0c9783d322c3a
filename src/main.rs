use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::warn;
use serde::Serialize;
use std::path::PathBuf;

use ukf_tracker_rs::evaluation::{rmse, state_to_cartesian};
use ukf_tracker_rs::sensors::read_log;
use ukf_tracker_rs::{
    FilterConfig, GroundTruth, NisMonitor, NisSummary, SensorKind, Step, TrackerError, UkfCtrv,
    UkfCtrvState,
};

#[derive(Parser, Debug)]
#[command(name = "ukf_tracker")]
#[command(about = "CTRV unscented Kalman filter over a lidar/radar measurement log", long_about = None)]
struct Args {
    /// Measurement log (plain text or .gz)
    #[arg(value_name = "LOG")]
    input: PathBuf,

    /// Write a JSON report of every filter step here
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON filter configuration (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip lidar updates (prediction still runs)
    #[arg(long, default_value_t = false)]
    disable_lidar: bool,

    /// Skip radar updates (prediction still runs)
    #[arg(long, default_value_t = false)]
    disable_radar: bool,

    /// Longitudinal acceleration noise std [m/s²]
    #[arg(long)]
    std_a: Option<f64>,

    /// Yaw acceleration noise std [rad/s²]
    #[arg(long)]
    std_yawdd: Option<f64>,
}

#[derive(Serialize)]
struct StepRecord {
    timestamp_us: i64,
    sensor: SensorKind,
    step: String,
    /// [px, py, v, yaw, yaw_rate]
    state: [f64; 5],
    covariance_trace: f64,
    nis: Option<f64>,
    ground_truth: Option<GroundTruth>,
}

#[derive(Serialize)]
struct Report {
    generated_at: String,
    input: String,
    config: FilterConfig,
    steps: Vec<StepRecord>,
    rejected_records: usize,
    nis: Vec<NisSummary>,
    rmse: Option<[f64; 4]>,
    final_state: UkfCtrvState,
}

fn step_label(step: Step) -> String {
    match step {
        Step::Initialized => "initialized".to_string(),
        Step::Updated(sensor) => format!("updated_{}", sensor),
        Step::PredictedOnly(sensor) => format!("predicted_only_{}", sensor),
        Step::Ignored(sensor) => format!("ignored_{}", sensor),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => FilterConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => FilterConfig::default(),
    };
    if args.disable_lidar {
        config.use_lidar = false;
    }
    if args.disable_radar {
        config.use_radar = false;
    }
    if let Some(std_a) = args.std_a {
        config.std_a = std_a;
    }
    if let Some(std_yawdd) = args.std_yawdd {
        config.std_yawdd = std_yawdd;
    }

    println!("[{}] UKF Tracker Starting", ts_now());
    println!("  Input: {}", args.input.display());
    println!("  Lidar: {}  Radar: {}", config.use_lidar, config.use_radar);
    println!("  std_a: {}  std_yawdd: {}", config.std_a, config.std_yawdd);

    let log = read_log(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    if !log.rejected.is_empty() {
        warn!("{} malformed log lines skipped", log.rejected.len());
    }

    let mut ukf = UkfCtrv::new(config.clone()).context("building filter")?;
    let mut monitor = NisMonitor::new();

    let mut steps = Vec::with_capacity(log.records.len());
    let mut estimates = Vec::new();
    let mut truths = Vec::new();
    let mut rejected = log.rejected.len();

    for record in &log.records {
        let output = match ukf.process_measurement(&record.package) {
            Ok(output) => output,
            Err(err @ TrackerError::Divergence) => {
                return Err(err).with_context(|| {
                    format!("filter diverged at t = {} us", record.package.timestamp_us)
                });
            }
            Err(err) => {
                warn!("Skipping measurement at t = {} us: {}", record.package.timestamp_us, err);
                rejected += 1;
                continue;
            }
        };

        if let Some(sample) = output.nis {
            monitor.record(sample);
        }
        if ukf.is_initialized() {
            if let Some(gt) = record.ground_truth {
                estimates.push(output.state);
                truths.push(gt);
            }
        }

        let mut state = [0.0; 5];
        state.copy_from_slice(output.state.as_slice());
        steps.push(StepRecord {
            timestamp_us: output.timestamp_us,
            sensor: record.package.sensor,
            step: step_label(output.step),
            state,
            covariance_trace: output.covariance.trace(),
            nis: output.nis.map(|s| s.value),
            ground_truth: record.ground_truth,
        });
    }

    println!("[{}] Processed {} measurements ({} rejected)", ts_now(), steps.len(), rejected);

    let summaries = vec![
        monitor.summary(SensorKind::Lidar),
        monitor.summary(SensorKind::Radar),
    ];
    for s in &summaries {
        println!(
            "  NIS {}: n={} mean={:.3} over {:.3}: {} ({:.1}%)",
            s.sensor,
            s.count,
            s.mean,
            s.threshold,
            s.over_threshold,
            s.over_threshold_ratio * 100.0
        );
    }

    let accuracy = rmse(&estimates, &truths);
    if let Some(r) = accuracy {
        println!(
            "  RMSE px={:.4} py={:.4} vx={:.4} vy={:.4}",
            r[0], r[1], r[2], r[3]
        );
    }

    let final_state = ukf.get_state();
    let [px, py, vx, vy] = state_to_cartesian(ukf.state());
    println!(
        "  Final: p=({:.3}, {:.3}) v=({:.3}, {:.3}) yaw_rate={:.4} trace(P)={:.4}",
        px, py, vx, vy, final_state.yaw_rate, final_state.covariance_trace
    );

    if let Some(path) = &args.output {
        let report = Report {
            generated_at: Utc::now().to_rfc3339(),
            input: args.input.display().to_string(),
            config,
            steps,
            rejected_records: rejected,
            nis: summaries,
            rmse: accuracy,
            final_state,
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("[{}] Report saved: {}", ts_now(), path.display());
    }

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
