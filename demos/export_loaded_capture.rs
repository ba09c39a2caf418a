// Export a saved capture
//
// Loads a .sal file, then writes its raw data as CSV and binary into the
// output directory.

use std::path::PathBuf;

use clap::Parser;
use logic2_automation::{ChannelSelection, Manager, ManagerConfig, RawExportOptions, SaleaeError};

#[derive(Parser)]
#[command(name = "export_loaded_capture")]
#[command(about = "Export the raw data of a saved Logic2 capture")]
struct Args {
    /// Capture file to load
    capture: PathBuf,

    /// Output directory
    output: PathBuf,

    /// Digital channels to export
    #[arg(short, long, value_delimiter = ',', default_values_t = [0, 1])]
    digital: Vec<u32>,

    /// Analog channels to export
    #[arg(short, long, value_delimiter = ',')]
    analog: Vec<u32>,

    /// Keep every Nth analog sample
    #[arg(long, default_value_t = 1)]
    downsample: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    env_logger::init();

    let manager = Manager::connect(&ManagerConfig::from_env()?)?;

    let capture = match manager.load_capture(&args.capture) {
        Ok(capture) => capture,
        Err(SaleaeError::LoadCaptureFailed(msg)) => {
            eprintln!("Could not load {}: {}", args.capture.display(), msg);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let options = RawExportOptions::with_channels(ChannelSelection::new(args.analog, args.digital))
        .analog_downsample_ratio(args.downsample);

    let csv_dir = args.output.join("csv");
    let binary_dir = args.output.join("binary");
    std::fs::create_dir_all(&csv_dir)?;
    std::fs::create_dir_all(&binary_dir)?;

    capture.export_raw_data_csv(&csv_dir, options.clone().iso8601_timestamp(true))?;
    capture.export_raw_data_binary(&binary_dir, options)?;
    println!("Exported to {}", args.output.display());

    capture.close()?;
    Ok(())
}
