use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use flate2::write::GzEncoder;
use flate2::Compression;
use ukf_tracker_rs::sensors::write_log;
use ukf_tracker_rs::simulation::{CtrvSimulator, SimulationConfig};
use ukf_tracker_rs::types::StateVec;

#[derive(Parser, Debug)]
#[command(name = "simulate")]
#[command(about = "Generate a synthetic lidar/radar log of a CTRV target", long_about = None)]
struct Args {
    /// Number of measurements (sensors alternate, lidar first)
    #[arg(long, default_value = "500")]
    steps: usize,

    /// Seconds between measurements
    #[arg(long, default_value = "0.05")]
    dt: f64,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Longitudinal acceleration noise std of the true target [m/s²]
    #[arg(long, default_value = "0.5")]
    std_a: f64,

    /// Yaw acceleration noise std of the true target [rad/s²]
    #[arg(long, default_value = "0.2")]
    std_yawdd: f64,

    /// Initial true state: px py v yaw yaw_rate
    #[arg(long, num_args = 5, value_names = ["PX", "PY", "V", "YAW", "YAW_RATE"])]
    initial: Option<Vec<f64>>,

    /// Output path; gzip-compressed when it ends in .gz, stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = SimulationConfig {
        dt: args.dt,
        seed: args.seed,
        std_a: args.std_a,
        std_yawdd: args.std_yawdd,
        ..SimulationConfig::default()
    };
    if let Some(init) = &args.initial {
        config.initial_state = StateVec::from_column_slice(init);
    }

    let mut simulator = CtrvSimulator::new(&config).context("invalid simulation parameters")?;
    let records = simulator.run(args.steps);

    match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            if path.extension().map(|e| e == "gz").unwrap_or(false) {
                let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
                write_log(&records, &mut encoder)?;
                encoder.finish()?.flush()?;
            } else {
                write_log(&records, BufWriter::new(file))?;
            }
            eprintln!("Wrote {} records to {}", records.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            writeln!(lock, "# simulated CTRV target, seed {}", args.seed)?;
            write_log(&records, lock)?;
        }
    }

    Ok(())
}
