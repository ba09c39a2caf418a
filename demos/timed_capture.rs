// Timed capture example
//
// Records a few digital channels for a fixed duration, adds an Async Serial
// analyzer and exports both the raw samples and the analyzer data table.

use std::path::PathBuf;

use clap::Parser;
use logic2_automation::table::{read_data_table_csv, read_raw_csv, RawCsvKind};
use logic2_automation::{
    AnalyzerSettings, CaptureConfiguration, ChannelSelection, DataTableExportOptions,
    LogicDeviceConfiguration, Manager, ManagerConfig, RawExportOptions, TimedCaptureMode,
};

#[derive(Parser)]
#[command(name = "timed_capture")]
#[command(about = "Record a timed capture with Logic2 and export it")]
struct Args {
    /// Output directory for the exports
    output: PathBuf,

    /// Device id as printed by the basic_connection example. Logic2 picks the first device if omitted
    #[arg(short, long)]
    device_id: Option<String>,

    /// Capture duration in seconds
    #[arg(short = 't', long, default_value_t = 1.0)]
    duration: f64,

    /// Digital sample rate in samples per second
    #[arg(short, long, default_value_t = 10_000_000)]
    sample_rate: u32,

    /// Automation port Logic2 listens on
    #[arg(short, long, default_value_t = logic2_automation::config::DEFAULT_PORT)]
    port: u16,

    /// Launch Logic2 from this path instead of connecting to a running instance
    #[arg(long)]
    launch: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let config = ManagerConfig::new(args.port);
    let manager = match &args.launch {
        Some(path) => Manager::launch(&config.application_path(path))?,
        None => Manager::connect(&config)?,
    };

    let channels = [0, 1, 2, 3];
    let device = LogicDeviceConfiguration::new()
        .digital_channels(channels)
        .digital_sample_rate(args.sample_rate);
    let capture_config = CaptureConfiguration::new(TimedCaptureMode::new(args.duration));

    println!("Recording {} s...", args.duration);
    let capture = manager.start_capture(device, args.device_id.as_deref(), Some(capture_config))?;
    capture.wait()?;

    let serial = capture.add_analyzer(
        "Async Serial",
        Some("UART"),
        AnalyzerSettings::new()
            .set("Input Channel", 0)
            .set("Bit Rate (Bits/s)", 115_200),
    )?;

    std::fs::create_dir_all(&args.output)?;
    capture.export_raw_data_csv(&args.output, RawExportOptions::with_channels(ChannelSelection::digital(channels)))?;

    let table_path = args.output.join("uart.csv");
    capture.export_data_table(&table_path, [serial], DataTableExportOptions::default())?;
    capture.save_capture(args.output.join("capture.sal"))?;
    capture.close()?;

    let digital = read_raw_csv(&args.output, RawCsvKind::Digital)?;
    println!("Digital transitions:\n{}", digital.head(Some(10)));

    let table = read_data_table_csv(&table_path)?;
    println!("Decoded {} UART frames", table.height());

    manager.close();
    Ok(())
}
