//! # Logic2 Automation
//!
//! A blocking Rust client for the automation interface of the Saleae Logic 2
//! desktop application.
//!
//! Logic 2 does all the work: it talks to the hardware, runs the protocol
//! analyzers and writes the export files. This crate connects to its gRPC
//! automation server, checks the API version, forwards calls and turns the
//! errors Logic 2 reports into [`SaleaeError`] variants.
//!
//! ## Features
//!
//! - **Connect or launch**: attach to a running Logic 2, or start one with
//!   automation enabled and shut it down again on close
//! - **Capture modes**: manual, timed and digital trigger captures with a
//!   builder for trigger conditions
//! - **Analyzers**: add protocol analyzers and high level analyzers by name
//! - **Exports**: raw data as CSV or binary, analyzer data tables as CSV
//! - **DataFrame output**: read exported CSV files back with `polars`
//! - **Thread safe**: a [`Manager`] can be shared between threads
//!
//! ## Examples
//!
//! ### Timed Capture and Export
//!
//! ```rust,no_run
//! use logic2_automation::{
//!     CaptureConfiguration, ChannelSelection, LogicDeviceConfiguration, Manager, ManagerConfig,
//!     RawExportOptions, TimedCaptureMode,
//! };
//!
//! let manager = Manager::connect(&ManagerConfig::default())?;
//!
//! let device = LogicDeviceConfiguration::new()
//!     .digital_channels([0, 1, 2, 3])
//!     .digital_sample_rate(10_000_000);
//! let capture_config = CaptureConfiguration::new(TimedCaptureMode::new(1.0));
//!
//! let capture = manager.start_capture(device, None, Some(capture_config))?;
//! capture.wait()?;
//!
//! let options = RawExportOptions::with_channels(ChannelSelection::digital([0, 1, 2, 3]));
//! capture.export_raw_data_csv("/tmp/export", options)?;
//! capture.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Digital Trigger
//!
//! ```rust
//! use logic2_automation::{CaptureConfiguration, DigitalTriggerCaptureMode, DigitalTriggerType};
//!
//! // Trigger on a rising edge of channel 0 while channel 2 is high
//! let trigger = DigitalTriggerCaptureMode::start_capturing_when(0)
//!     .while_high(2)
//!     .rising_edge()
//!     .after_trigger_seconds(0.5);
//!
//! assert_eq!(trigger.trigger_type, DigitalTriggerType::Rising);
//! let config = CaptureConfiguration::new(trigger).buffer_size_megabytes(2048);
//! println!("{:?}", config);
//! ```
//!
//! ### Analyzers
//!
//! ```rust,no_run
//! use logic2_automation::{AnalyzerSettings, DataTableExportOptions, Manager, ManagerConfig};
//!
//! let manager = Manager::connect(&ManagerConfig::from_env()?)?;
//! let capture = manager.load_capture("/tmp/spi.sal")?;
//!
//! let spi = capture.add_analyzer(
//!     "SPI",
//!     Some("Flash"),
//!     AnalyzerSettings::new()
//!         .set("MISO", 0)
//!         .set("Clock", 1)
//!         .set("Enable", 2)
//!         .set("Bits per Transfer", "8 Bits per Transfer (Standard)"),
//! )?;
//!
//! capture.export_data_table("/tmp/spi.csv", [spi], DataTableExportOptions::default())?;
//! let table = logic2_automation::table::read_data_table_csv("/tmp/spi.csv")?;
//! println!("{} transfers", table.height());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Launching Logic 2
//!
//! ```rust,no_run
//! use logic2_automation::{Manager, ManagerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ManagerConfig::default().application_path("/opt/Logic/Logic");
//! let manager = Manager::launch(&config)?;
//!
//! for device in manager.get_devices(true)? {
//!     println!("{} ({})", device.device_id, device.device_type.as_str());
//! }
//!
//! // Shuts the launched application down
//! manager.close();
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::panic))]

pub mod capture;
pub mod capture_mode;
pub mod config;
pub mod errors;
pub mod launcher;
pub mod manager;
pub mod models;
pub mod proto;
pub mod table;

// Re-export the main types for convenience
pub use capture::Capture;

pub use capture_mode::{
    CaptureConfiguration, CaptureMode, DigitalTriggerBuilder, DigitalTriggerCaptureMode,
    DigitalTriggerLinkedChannel, DigitalTriggerLinkedChannelState, DigitalTriggerType,
    ManualCaptureMode, TimedCaptureMode,
};

pub use config::{ConfigError, ManagerConfig};

pub use errors::{ErrorCode, Result, SaleaeError};

pub use launcher::LaunchError;

pub use manager::{Manager, SUPPORTED_API_MAJOR};

pub use models::{
    AnalyzerHandle, AnalyzerSettingValue, AnalyzerSettings, AppInfo, ChannelSelection,
    DataTableAnalyzer, DataTableExportConfiguration, DataTableExportOptions, DataTableFilter,
    DeviceConfiguration, DeviceDesc, DeviceType, GlitchFilterEntry, HighLevelAnalyzerSettingValue,
    HighLevelAnalyzerSettings, LogicDeviceConfiguration, RadixType, RawExportOptions, Version,
};

pub use table::{RawCsvKind, TableError};
