use clap::Parser;
use feature_tracking::io::{object_from_json, write_run_report, write_sweep_report};
use feature_tracking::pipeline::{run_sequence_with, run_sweep, sweep_table};
use feature_tracking::{DatasetConfig, TrackingConfig, TrackingError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser)]
#[command(version, about, author)]
struct FeatureTrackingCli {
    /// detector: ["SHITOMASI", "HARRIS", "FAST", "BRISK", "ORB", "AKAZE", "SIFT"]
    #[arg(long = "detector_type", default_value = "SHITOMASI")]
    detector_type: String,

    /// matcher: ["MAT_BF", "MAT_FLANN"]
    #[arg(long = "matcher_type", default_value = "MAT_BF")]
    matcher_type: String,

    /// descriptor: ["BRISK", "BRIEF", "ORB", "FREAK", "AKAZE", "SIFT"]
    #[arg(long = "descriptor_type", default_value = "BRISK")]
    descriptor_type: String,

    /// selector: ["SEL_NN", "SEL_KNN"]
    #[arg(long = "selector_type", default_value = "SEL_NN")]
    selector_type: String,

    /// distance metric: ["HAMMING", "L2"], derived from the descriptor when omitted
    #[arg(long = "distance_metric")]
    distance_metric: Option<String>,

    /// only keep keypoints on the preceding vehicle
    #[arg(short = 'f', long)]
    focus_on_vehicle: bool,

    /// keep at most `max_keypoints` keypoints per frame
    #[arg(short = 'l', long)]
    limit_keypoints: bool,

    /// no progress logging and no visualization
    #[arg(short = 'q', long)]
    quiet: bool,

    /// dataset config json, the KITTI reference layout when omitted
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// write a json report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// rerun recording output
    #[arg(long, default_value = "feature_tracking.rrd")]
    recording: PathBuf,

    /// run every detector and descriptor combination with SEL_KNN
    #[arg(long)]
    sweep: bool,
}

fn run(cli: &FeatureTrackingCli) -> Result<(), TrackingError> {
    let mut config = TrackingConfig::resolve(
        &cli.detector_type,
        &cli.descriptor_type,
        &cli.matcher_type,
        &cli.selector_type,
        cli.distance_metric.as_deref(),
    )?;
    config.focus_on_vehicle = cli.focus_on_vehicle;
    config.limit_keypoints = cli.limit_keypoints;
    config.quiet = cli.quiet;

    let dataset: DatasetConfig = match &cli.config {
        Some(path) => object_from_json(path)?,
        None => DatasetConfig::default(),
    };
    let now = Instant::now();

    if cli.sweep {
        let entries = run_sweep(&config, &dataset)?;
        for line in sweep_table(&entries) {
            println!("{}", line);
        }
        if let Some(path) = &cli.report {
            write_sweep_report(path, &dataset, &entries)?;
        }
        log::info!("sweep took {:.3} sec", now.elapsed().as_secs_f64());
        return Ok(());
    }

    let recording = if cli.quiet {
        None
    } else {
        Some(rerun::RecordingStreamBuilder::new("feature_tracking").save(&cli.recording)?)
    };
    let summary = run_sequence_with(&config, &dataset, recording.as_ref(), |frame| {
        for line in frame.console_lines(&config) {
            println!("{}", line);
        }
    })?;
    if let Some(path) = &cli.report {
        write_run_report(path, &dataset, &summary)?;
    }
    let duration_sec = now.elapsed().as_secs_f64();
    log::info!(
        "{} frames took {:.3} sec, {} matches in total",
        summary.frames.len(),
        duration_sec,
        summary.total_matches()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = FeatureTrackingCli::parse();
    let default_filter = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
