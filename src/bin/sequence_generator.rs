use clap::Parser;
use feature_tracking::filter::Roi;
use feature_tracking::synthetic::SyntheticSequence;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Number of frames to generate
    #[arg(short, long, default_value = "10")]
    num_frames: usize,

    /// Image width
    #[arg(long, default_value = "1242")]
    width: u32,

    /// Image height
    #[arg(long, default_value = "375")]
    height: u32,

    /// Background scroll per frame in pixels
    #[arg(long, default_value = "2")]
    background_shift: u32,

    /// Vehicle patch as x,y,width,height
    #[arg(long, value_delimiter = ',', num_args = 4, default_values_t = [560, 200, 120, 100])]
    vehicle: Vec<i32>,

    #[arg(long, default_value = "2011")]
    seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let sequence = SyntheticSequence {
        width: args.width,
        height: args.height,
        frames: args.num_frames,
        background_shift: args.background_shift,
        vehicle: Roi::new(args.vehicle[0], args.vehicle[1], args.vehicle[2], args.vehicle[3]),
        seed: args.seed,
        ..Default::default()
    };
    let config = sequence.write(&args.output)?;
    println!(
        "Generated {} frames in {}, run with --config {}",
        args.num_frames,
        args.output.display(),
        args.output.join("dataset.json").display()
    );
    log::debug!("{:?}", config);
    Ok(())
}
