//! Drives the blocking client against a stand-in Logic 2 automation server
//! built on the generated tonic server stub.

#![allow(clippy::panic, clippy::unwrap_used)]

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use logic2_automation::proto;
use logic2_automation::proto::manager_server::{Manager as AutomationService, ManagerServer};
use logic2_automation::table::{read_data_table_csv, read_raw_csv, RawCsvKind};
use logic2_automation::{
    AnalyzerSettings, CaptureConfiguration, ChannelSelection, DataTableExportConfiguration,
    DataTableExportOptions, DeviceType, DigitalTriggerCaptureMode, HighLevelAnalyzerSettings,
    LaunchError, LogicDeviceConfiguration, Manager, ManagerConfig, RadixType, RawExportOptions,
    SaleaeError, TimedCaptureMode,
};
use tonic::{Request, Response, Status};

const MOCK_PID: u64 = 4242;
const PHYSICAL_DEVICE: &str = "F4241";
const SIMULATION_DEVICE: &str = "SIM1";
const BROKEN_DEVICE: &str = "BROKEN";

#[derive(Debug, Default)]
struct CaptureRecord {
    manual: bool,
    analyzers: Vec<u64>,
    high_level_analyzers: Vec<u64>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    captures: HashMap<u64, CaptureRecord>,
    last_start: Option<proto::StartCaptureRequest>,
    last_add_analyzer: Option<proto::AddAnalyzerRequest>,
    last_table_export: Option<proto::ExportDataTableCsvRequest>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn capture(&mut self, capture_id: u64) -> Result<&mut CaptureRecord, Status> {
        self.captures
            .get_mut(&capture_id)
            .ok_or_else(|| aborted(10, &format!("Invalid capture id {capture_id}")))
    }
}

fn aborted(code: i32, message: &str) -> Status {
    Status::aborted(format!("{code}: {message}"))
}

fn validate_raw_export(channels: Option<&proto::LogicChannels>, ratio: u64) -> Result<(), Status> {
    let selected = channels.map_or(0, |c| c.analog_channels.len() + c.digital_channels.len());
    if selected == 0 {
        return Err(aborted(10, "No channels selected for export"));
    }
    if !(1..=1_000_000).contains(&ratio) {
        return Err(aborted(10, &format!("analog_downsample_ratio {ratio} out of range")));
    }
    Ok(())
}

#[derive(Clone)]
struct MockLogic2 {
    api_major: u32,
    /// GetAppInfo answers `UNAVAILABLE` until this file exists
    ready_marker: Option<PathBuf>,
    state: Arc<Mutex<State>>,
}

impl MockLogic2 {
    fn new(api_major: u32) -> Self {
        Self {
            api_major,
            ready_marker: None,
            state: Arc::new(Mutex::new(State::default())),
        }
    }
}

#[tonic::async_trait]
impl AutomationService for MockLogic2 {
    async fn get_app_info(
        &self,
        _request: Request<proto::GetAppInfoRequest>,
    ) -> Result<Response<proto::GetAppInfoReply>, Status> {
        if let Some(marker) = &self.ready_marker {
            if !marker.is_file() {
                return Err(Status::unavailable("still starting"));
            }
        }
        Ok(Response::new(proto::GetAppInfoReply {
            app_info: Some(proto::AppInfo {
                api_version: Some(proto::Version {
                    major: self.api_major,
                    minor: 3,
                    patch: 0,
                }),
                application_version: "2.4.22".to_string(),
                launch_pid: MOCK_PID,
            }),
        }))
    }

    async fn get_devices(
        &self,
        request: Request<proto::GetDevicesRequest>,
    ) -> Result<Response<proto::GetDevicesReply>, Status> {
        let mut devices = vec![proto::Device {
            device_id: PHYSICAL_DEVICE.to_string(),
            device_type: proto::DeviceType::LogicPro16 as i32,
            is_simulation: false,
        }];
        if request.into_inner().include_simulation_devices {
            devices.push(proto::Device {
                device_id: SIMULATION_DEVICE.to_string(),
                device_type: proto::DeviceType::Logic8 as i32,
                is_simulation: true,
            });
        }
        Ok(Response::new(proto::GetDevicesReply { devices }))
    }

    async fn start_capture(
        &self,
        request: Request<proto::StartCaptureRequest>,
    ) -> Result<Response<proto::StartCaptureReply>, Status> {
        let request = request.into_inner();
        match request.device_id.as_str() {
            "" | PHYSICAL_DEVICE | SIMULATION_DEVICE => {}
            BROKEN_DEVICE => return Err(aborted(51, "USB transfer failed")),
            other => return Err(aborted(50, &format!("Device {other} not found"))),
        }

        let manual = !matches!(
            request.capture_configuration.as_ref().and_then(|c| c.capture_mode.as_ref()),
            Some(
                proto::capture_configuration::CaptureMode::TimedCaptureMode(_)
                    | proto::capture_configuration::CaptureMode::DigitalCaptureMode(_)
            )
        );

        let mut state = self.state.lock().unwrap();
        let capture_id = state.next_id();
        state.captures.insert(
            capture_id,
            CaptureRecord {
                manual,
                ..CaptureRecord::default()
            },
        );
        state.last_start = Some(request);
        Ok(Response::new(proto::StartCaptureReply {
            capture_info: Some(proto::CaptureInfo { capture_id }),
        }))
    }

    async fn stop_capture(
        &self,
        request: Request<proto::StopCaptureRequest>,
    ) -> Result<Response<proto::StopCaptureReply>, Status> {
        self.state.lock().unwrap().capture(request.into_inner().capture_id)?;
        Ok(Response::new(proto::StopCaptureReply {}))
    }

    async fn wait_capture(
        &self,
        request: Request<proto::WaitCaptureRequest>,
    ) -> Result<Response<proto::WaitCaptureReply>, Status> {
        let mut state = self.state.lock().unwrap();
        if state.capture(request.into_inner().capture_id)?.manual {
            return Err(aborted(10, "WaitCapture is not supported in manual capture mode"));
        }
        Ok(Response::new(proto::WaitCaptureReply {}))
    }

    async fn load_capture(
        &self,
        request: Request<proto::LoadCaptureRequest>,
    ) -> Result<Response<proto::LoadCaptureReply>, Status> {
        let filepath = request.into_inner().filepath;
        if !Path::new(&filepath).is_file() {
            return Err(aborted(20, &format!("Failed to load {filepath}")));
        }

        let mut state = self.state.lock().unwrap();
        let capture_id = state.next_id();
        state.captures.insert(capture_id, CaptureRecord::default());
        Ok(Response::new(proto::LoadCaptureReply {
            capture_info: Some(proto::CaptureInfo { capture_id }),
        }))
    }

    async fn save_capture(
        &self,
        request: Request<proto::SaveCaptureRequest>,
    ) -> Result<Response<proto::SaveCaptureReply>, Status> {
        let request = request.into_inner();
        self.state.lock().unwrap().capture(request.capture_id)?;
        fs::write(&request.filepath, b"sal").map_err(|e| aborted(1, &e.to_string()))?;
        Ok(Response::new(proto::SaveCaptureReply {}))
    }

    async fn close_capture(
        &self,
        request: Request<proto::CloseCaptureRequest>,
    ) -> Result<Response<proto::CloseCaptureReply>, Status> {
        let capture_id = request.into_inner().capture_id;
        let mut state = self.state.lock().unwrap();
        state.capture(capture_id)?;
        state.captures.remove(&capture_id);
        Ok(Response::new(proto::CloseCaptureReply {}))
    }

    async fn add_analyzer(
        &self,
        request: Request<proto::AddAnalyzerRequest>,
    ) -> Result<Response<proto::AddAnalyzerReply>, Status> {
        let request = request.into_inner();
        match request.analyzer_name.as_str() {
            "SPI" | "Async Serial" | "I2C" => {}
            "Crash" => return Err(Status::internal("analyzer host crashed")),
            "Garbled" => return Err(Status::aborted("no code in this detail")),
            other => return Err(aborted(10, &format!("Unknown analyzer {other}"))),
        }

        let mut state = self.state.lock().unwrap();
        let analyzer_id = state.next_id();
        state.capture(request.capture_id)?.analyzers.push(analyzer_id);
        state.last_add_analyzer = Some(request);
        Ok(Response::new(proto::AddAnalyzerReply { analyzer_id }))
    }

    async fn remove_analyzer(
        &self,
        request: Request<proto::RemoveAnalyzerRequest>,
    ) -> Result<Response<proto::RemoveAnalyzerReply>, Status> {
        let request = request.into_inner();
        let mut state = self.state.lock().unwrap();
        let capture = state.capture(request.capture_id)?;
        let before = capture.analyzers.len();
        capture.analyzers.retain(|id| *id != request.analyzer_id);
        if capture.analyzers.len() == before {
            return Err(aborted(10, "Invalid analyzer id"));
        }
        Ok(Response::new(proto::RemoveAnalyzerReply {}))
    }

    async fn add_high_level_analyzer(
        &self,
        request: Request<proto::AddHighLevelAnalyzerRequest>,
    ) -> Result<Response<proto::AddHighLevelAnalyzerReply>, Status> {
        let request = request.into_inner();
        let mut state = self.state.lock().unwrap();
        let analyzer_id = state.next_id();
        let capture = state.capture(request.capture_id)?;
        if !capture.analyzers.contains(&request.input_analyzer_id) {
            return Err(aborted(10, "Invalid input analyzer id"));
        }
        capture.high_level_analyzers.push(analyzer_id);
        Ok(Response::new(proto::AddHighLevelAnalyzerReply { analyzer_id }))
    }

    async fn remove_high_level_analyzer(
        &self,
        request: Request<proto::RemoveHighLevelAnalyzerRequest>,
    ) -> Result<Response<proto::RemoveHighLevelAnalyzerReply>, Status> {
        let request = request.into_inner();
        let mut state = self.state.lock().unwrap();
        let capture = state.capture(request.capture_id)?;
        let before = capture.high_level_analyzers.len();
        capture.high_level_analyzers.retain(|id| *id != request.analyzer_id);
        if capture.high_level_analyzers.len() == before {
            return Err(aborted(10, "Invalid high level analyzer id"));
        }
        Ok(Response::new(proto::RemoveHighLevelAnalyzerReply {}))
    }

    async fn export_raw_data_csv(
        &self,
        request: Request<proto::ExportRawDataCsvRequest>,
    ) -> Result<Response<proto::ExportRawDataCsvReply>, Status> {
        let request = request.into_inner();
        self.state.lock().unwrap().capture(request.capture_id)?;
        validate_raw_export(request.logic_channels.as_ref(), request.analog_downsample_ratio)?;

        let channels = request.logic_channels.unwrap_or_default();
        if !channels.digital_channels.is_empty() {
            let header: Vec<String> = channels
                .digital_channels
                .iter()
                .map(|c| format!("Channel {c}"))
                .collect();
            let zeros = vec!["0"; channels.digital_channels.len()].join(",");
            let ones = vec!["1"; channels.digital_channels.len()].join(",");
            let contents = format!(
                "Time [s],{}\n0.000000000,{zeros}\n0.000250000,{ones}\n0.000500000,{zeros}\n",
                header.join(",")
            );
            fs::write(Path::new(&request.directory).join("digital.csv"), contents)
                .map_err(|e| aborted(21, &e.to_string()))?;
        }
        Ok(Response::new(proto::ExportRawDataCsvReply {}))
    }

    async fn export_raw_data_binary(
        &self,
        request: Request<proto::ExportRawDataBinaryRequest>,
    ) -> Result<Response<proto::ExportRawDataBinaryReply>, Status> {
        let request = request.into_inner();
        self.state.lock().unwrap().capture(request.capture_id)?;
        validate_raw_export(request.logic_channels.as_ref(), request.analog_downsample_ratio)?;
        Ok(Response::new(proto::ExportRawDataBinaryReply {}))
    }

    async fn export_data_table_csv(
        &self,
        request: Request<proto::ExportDataTableCsvRequest>,
    ) -> Result<Response<proto::ExportDataTableCsvReply>, Status> {
        let request = request.into_inner();
        let mut state = self.state.lock().unwrap();
        let capture = state.capture(request.capture_id)?;
        if request.analyzers.is_empty() {
            return Err(aborted(10, "No analyzers selected for export"));
        }
        if let Some(unknown) = request
            .analyzers
            .iter()
            .find(|a| !capture.analyzers.contains(&a.analyzer_id))
        {
            return Err(aborted(10, &format!("Invalid analyzer id {}", unknown.analyzer_id)));
        }

        fs::write(
            &request.filepath,
            "name,type,start_time,duration,data\nSPI,result,0.0001,0.00002,0x9F\nSPI,result,0.0002,0.00002,0xEF\n",
        )
        .map_err(|e| aborted(21, &e.to_string()))?;
        state.last_table_export = Some(request);
        Ok(Response::new(proto::ExportDataTableCsvReply {}))
    }

    async fn legacy_export_analyzer(
        &self,
        request: Request<proto::LegacyExportAnalyzerRequest>,
    ) -> Result<Response<proto::LegacyExportAnalyzerReply>, Status> {
        let request = request.into_inner();
        let mut state = self.state.lock().unwrap();
        if !state.capture(request.capture_id)?.analyzers.contains(&request.analyzer_id) {
            return Err(aborted(10, "Invalid analyzer id"));
        }
        Ok(Response::new(proto::LegacyExportAnalyzerReply {}))
    }
}

/// A mock server running on its own runtime until dropped.
struct MockServer {
    _runtime: tokio::runtime::Runtime,
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
}

impl MockServer {
    fn start() -> Self {
        Self::start_with_major(1)
    }

    fn start_with_major(api_major: u32) -> Self {
        Self::start_with(MockLogic2::new(api_major))
    }

    fn start_with(mock: MockLogic2) -> Self {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Self::serve(&runtime, listener, mock);
        Self {
            _runtime: runtime,
            addr,
            state,
        }
    }

    fn serve(
        runtime: &tokio::runtime::Runtime,
        listener: tokio::net::TcpListener,
        mock: MockLogic2,
    ) -> Arc<Mutex<State>> {
        let state = Arc::clone(&mock.state);
        runtime.spawn(
            tonic::transport::Server::builder()
                .add_service(ManagerServer::new(mock))
                .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener)),
        );
        state
    }

    fn config(&self) -> ManagerConfig {
        ManagerConfig::new(self.addr.port()).connect_timeout(Duration::from_secs(5))
    }

    fn connect(&self) -> Manager {
        Manager::connect(&self.config()).unwrap()
    }
}

fn digital_device() -> LogicDeviceConfiguration {
    LogicDeviceConfiguration::new()
        .digital_channels([0, 1, 2, 3])
        .digital_sample_rate(10_000_000)
        .digital_threshold_volts(3.3)
}

#[test]
fn test_handshake_reports_app_info() {
    let server = MockServer::start();
    let manager = server.connect();

    let info = manager.get_app_info().unwrap();
    assert_eq!(info.api_version.major, 1);
    assert_eq!(info.api_version.to_string(), "1.3.0");
    assert_eq!(info.app_version, "2.4.22");
    assert_eq!(info.app_pid, MOCK_PID);
}

#[test]
fn test_incompatible_api_major() {
    let server = MockServer::start_with_major(2);
    match Manager::connect(&server.config()) {
        Err(SaleaeError::IncompatibleApiVersion { supported, actual }) => {
            assert_eq!(supported, 1);
            assert_eq!(actual, "2.3.0");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_unreachable_server_is_unavailable() {
    // Reserve a port, then free it so nothing listens there
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let config = ManagerConfig::new(port).connect_timeout(Duration::from_millis(500));
    let start = Instant::now();
    match Manager::connect(&config) {
        Err(SaleaeError::Transport(status)) => assert_eq!(status.code(), tonic::Code::Unavailable),
        other => panic!("unexpected result {other:?}"),
    }
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[test]
fn test_handshake_retries_until_server_is_up() {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = std_listener.local_addr().unwrap().port();
    drop(std_listener);

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let handle = runtime.handle().clone();
    let starter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(400));
        let listener = handle
            .block_on(tokio::net::TcpListener::bind(("127.0.0.1", port)))
            .unwrap();
        let mock = MockLogic2::new(1);
        handle.spawn(
            tonic::transport::Server::builder()
                .add_service(ManagerServer::new(mock))
                .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener)),
        );
    });

    let manager = Manager::connect(&ManagerConfig::new(port).connect_timeout(Duration::from_secs(10))).unwrap();
    starter.join().unwrap();
    assert_eq!(manager.get_app_info().unwrap().app_pid, MOCK_PID);
    drop(manager);
    drop(runtime);
}

#[test]
fn test_get_devices() {
    let server = MockServer::start();
    let manager = server.connect();

    let devices = manager.get_devices(false).unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_id, PHYSICAL_DEVICE);
    assert_eq!(devices[0].device_type, DeviceType::LogicPro16);
    assert!(!devices[0].is_simulation);

    let devices = manager.get_devices(true).unwrap();
    assert_eq!(devices.len(), 2);
    assert!(devices.iter().any(|d| d.is_simulation && d.device_type == DeviceType::Logic8));
}

#[test]
fn test_manual_capture_lifecycle() {
    let server = MockServer::start();
    let manager = server.connect();

    let capture = manager.start_capture(digital_device(), Some(PHYSICAL_DEVICE), None).unwrap();
    {
        let state = server.state.lock().unwrap();
        let start = state.last_start.as_ref().unwrap();
        assert_eq!(start.device_id, PHYSICAL_DEVICE);
        let config = start.capture_configuration.as_ref();
        assert!(config.is_none(), "manual mode is the default");
    }

    // Waiting on a manual capture is refused by Logic 2
    assert!(matches!(capture.wait(), Err(SaleaeError::InvalidRequest(_))));

    capture.stop().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let sal = dir.path().join("capture.sal");
    capture.save_capture(&sal).unwrap();
    assert!(sal.is_file());

    let id = capture.id();
    capture.close().unwrap();
    assert!(!server.state.lock().unwrap().captures.contains_key(&id));

    // The handle is gone but the id can be reattached; Logic 2 no longer knows it
    assert!(matches!(manager.capture(id).stop(), Err(SaleaeError::InvalidRequest(_))));
}

#[test]
fn test_timed_and_trigger_captures_wait() {
    let server = MockServer::start();
    let manager = server.connect();

    let timed = CaptureConfiguration::new(TimedCaptureMode::new(0.5)).buffer_size_megabytes(128);
    let capture = manager.start_capture(digital_device(), None, Some(timed)).unwrap();
    capture.wait().unwrap();
    {
        let state = server.state.lock().unwrap();
        let config = state.last_start.as_ref().unwrap().capture_configuration.as_ref().unwrap();
        assert_eq!(config.buffer_size_megabytes, 128);
        match config.capture_mode.as_ref().unwrap() {
            proto::capture_configuration::CaptureMode::TimedCaptureMode(mode) => {
                assert!((mode.duration_seconds - 0.5).abs() < f64::EPSILON);
                assert_eq!(mode.trim_data_seconds, None);
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }
    capture.close().unwrap();

    let trigger = DigitalTriggerCaptureMode::start_capturing_when(1)
        .while_low(2)
        .pulse_high()
        .pulse_width(Some(1e-6), None);
    let capture = manager
        .start_capture(digital_device(), None, Some(CaptureConfiguration::new(trigger)))
        .unwrap();
    capture.wait().unwrap();
    {
        let state = server.state.lock().unwrap();
        let config = state.last_start.as_ref().unwrap().capture_configuration.as_ref().unwrap();
        match config.capture_mode.as_ref().unwrap() {
            proto::capture_configuration::CaptureMode::DigitalCaptureMode(mode) => {
                assert_eq!(mode.trigger_type, proto::DigitalTriggerType::PulseHigh as i32);
                assert_eq!(mode.trigger_channel_index, 1);
                assert_eq!(mode.min_pulse_width_seconds, Some(1e-6));
                assert_eq!(mode.max_pulse_width_seconds, None);
                assert_eq!(mode.linked_channels.len(), 1);
                assert_eq!(
                    mode.linked_channels[0].state,
                    proto::DigitalTriggerLinkedChannelState::Low as i32
                );
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }
}

#[test]
fn test_aborted_codes_become_errors() {
    let server = MockServer::start();
    let manager = server.connect();

    match manager.start_capture(digital_device(), Some("NOPE"), None) {
        Err(SaleaeError::MissingDevice(msg)) => assert_eq!(msg, "Device NOPE not found"),
        other => panic!("unexpected result {other:?}"),
    }

    let err = manager.start_capture(digital_device(), Some(BROKEN_DEVICE), None).unwrap_err();
    assert!(matches!(err, SaleaeError::Device(_)));
    assert!(err.is_capture_error());

    assert!(matches!(
        manager.load_capture("/no/such/file.sal"),
        Err(SaleaeError::LoadCaptureFailed(_))
    ));

    let capture = manager.start_capture(digital_device(), None, None).unwrap();

    // Malformed details fall back to Unknown
    match capture.add_analyzer("Garbled", None, AnalyzerSettings::new()) {
        Err(SaleaeError::Unknown(msg)) => assert_eq!(msg, "no code in this detail"),
        other => panic!("unexpected result {other:?}"),
    }

    // Statuses other than aborted pass through untouched
    match capture.add_analyzer("Crash", None, AnalyzerSettings::new()) {
        Err(SaleaeError::Transport(status)) => {
            assert_eq!(status.code(), tonic::Code::Internal);
            assert_eq!(status.message(), "analyzer host crashed");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_analyzers_and_data_table_export() {
    let server = MockServer::start();
    let manager = server.connect();
    let dir = tempfile::tempdir().unwrap();

    let sal = dir.path().join("spi.sal");
    fs::write(&sal, b"sal").unwrap();
    let capture = manager.load_capture(&sal).unwrap();

    let spi = capture
        .add_analyzer(
            "SPI",
            Some("Flash"),
            AnalyzerSettings::new()
                .set("MISO", 0)
                .set("Clock", 1)
                .set("Enable", 2)
                .set("Bits per Transfer", "8 Bits per Transfer (Standard)"),
        )
        .unwrap();
    {
        let state = server.state.lock().unwrap();
        let request = state.last_add_analyzer.as_ref().unwrap();
        assert_eq!(request.analyzer_label, "Flash");
        assert_eq!(request.settings.len(), 4);
        assert_eq!(
            request.settings["Clock"].value,
            Some(proto::analyzer_setting_value::Value::Int64Value(1))
        );
    }

    let hla = capture
        .add_high_level_analyzer(
            dir.path(),
            "Flash Decoder",
            spi,
            HighLevelAnalyzerSettings::new().set("Page size", 256.0),
            None,
        )
        .unwrap();

    let table = dir.path().join("table.csv");
    let options = DataTableExportOptions {
        columns: vec!["data".to_string()],
        iso8601_timestamp: true,
        ..DataTableExportOptions::default()
    };
    capture
        .export_data_table(
            &table,
            [DataTableExportConfiguration {
                analyzer: spi,
                radix: RadixType::Hexadecimal,
            }],
            options,
        )
        .unwrap();
    {
        let state = server.state.lock().unwrap();
        let request = state.last_table_export.as_ref().unwrap();
        assert_eq!(request.analyzers[0].radix_type, proto::RadixType::Hexadecimal as i32);
        assert_eq!(request.export_columns, vec!["data"]);
        assert!(request.iso8601_timestamp);
        assert!(request.filter.is_none());
    }

    let df = read_data_table_csv(&table).unwrap();
    assert_eq!(df.height(), 2);

    capture
        .legacy_export_analyzer(dir.path().join("legacy.txt"), spi, RadixType::Ascii)
        .unwrap();

    capture.remove_high_level_analyzer(hla).unwrap();
    capture.remove_analyzer(spi).unwrap();
    assert!(matches!(capture.remove_analyzer(spi), Err(SaleaeError::InvalidRequest(_))));

    // Nothing left to export
    assert!(matches!(
        capture.export_data_table(&table, [spi], DataTableExportOptions::default()),
        Err(SaleaeError::InvalidRequest(_))
    ));
}

#[test]
fn test_raw_csv_export_reads_back() {
    let server = MockServer::start();
    let manager = server.connect();
    let dir = tempfile::tempdir().unwrap();

    let capture = manager.start_capture(digital_device(), None, None).unwrap();
    capture.stop().unwrap();
    capture
        .export_raw_data_csv(dir.path(), RawExportOptions::with_channels(ChannelSelection::digital([0, 3])))
        .unwrap();

    let df = read_raw_csv(dir.path(), RawCsvKind::Digital).unwrap();
    assert_eq!(df.height(), 3);
    assert_eq!(logic2_automation::table::channel_columns(&df), vec!["Channel 0", "Channel 3"]);

    capture
        .export_raw_data_binary(dir.path(), RawExportOptions::with_channels(ChannelSelection::digital([0])))
        .unwrap();
}

#[test]
fn test_raw_export_validation_is_format_independent() {
    let server = MockServer::start();
    let manager = server.connect();
    let dir = tempfile::tempdir().unwrap();

    let capture = manager.start_capture(digital_device(), None, None).unwrap();
    capture.stop().unwrap();

    let channels = ChannelSelection::digital([0]);
    let invalid = [
        RawExportOptions::with_channels(ChannelSelection::default()),
        RawExportOptions::with_channels(channels.clone()).analog_downsample_ratio(0),
        RawExportOptions::with_channels(channels.clone()).analog_downsample_ratio(1_000_001),
    ];

    for options in invalid {
        let csv = capture.export_raw_data_csv(dir.path(), options.clone());
        let binary = capture.export_raw_data_binary(dir.path(), options.clone());
        match (csv, binary) {
            (Err(SaleaeError::InvalidRequest(a)), Err(SaleaeError::InvalidRequest(b))) => assert_eq!(a, b),
            other => panic!("{options:?} gave {other:?}"),
        }
    }

    // Both bounds are inclusive
    for ratio in [1, 1_000_000] {
        let options = RawExportOptions::with_channels(channels.clone()).analog_downsample_ratio(ratio);
        capture.export_raw_data_csv(dir.path(), options.clone()).unwrap();
        capture.export_raw_data_binary(dir.path(), options).unwrap();
    }
}

#[test]
fn test_calls_after_close_fail() {
    let server = MockServer::start();
    let manager = server.connect();
    let capture = manager.start_capture(digital_device(), None, None).unwrap();

    manager.close();
    assert!(manager.is_closed());
    assert!(matches!(manager.get_app_info(), Err(SaleaeError::Closed)));
    assert!(matches!(manager.get_devices(true), Err(SaleaeError::Closed)));
    assert!(matches!(capture.stop(), Err(SaleaeError::Closed)));
    assert!(matches!(
        capture.export_raw_data_csv("/tmp", RawExportOptions::default()),
        Err(SaleaeError::Closed)
    ));
    assert!(matches!(capture.close(), Err(SaleaeError::Closed)));

    // Closing twice is harmless
    manager.close();
}

#[test]
fn test_concurrent_calls_from_threads() {
    let server = MockServer::start();
    let manager = server.connect();

    let ids: Vec<u64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    let capture = manager.start_capture(digital_device(), None, None).unwrap();
                    capture.stop().unwrap();
                    let id = capture.id();
                    capture.close().unwrap();
                    id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
    assert!(server.state.lock().unwrap().captures.is_empty());
}

/// Shell script standing in for the Logic 2 binary. It records its pid in
/// `pid_file` and then sleeps, ignoring the automation flags.
#[cfg(unix)]
fn write_fake_logic2(dir: &Path, pid_file: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("Logic");
    let staging = dir.join("pid.tmp");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho $$ > '{}'\nmv '{}' '{}'\nexec sleep 30\n",
            staging.display(),
            staging.display(),
            pid_file.display()
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

#[cfg(unix)]
fn process_alive(pid: &str) -> bool {
    std::process::Command::new("kill")
        .args(["-0", pid])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap()
        .success()
}

#[test]
#[cfg(unix)]
fn test_launch_rejects_foreign_instance_and_kills_child() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("logic2.pid");
    let application = write_fake_logic2(dir.path(), &pid_file);

    // The server answers with its own pid once the launched process is up,
    // as an instance already holding the port would
    let server = MockServer::start_with(MockLogic2 {
        ready_marker: Some(pid_file.clone()),
        ..MockLogic2::new(1)
    });
    let config = server
        .config()
        .connect_timeout(Duration::from_secs(10))
        .application_path(&application);

    match Manager::launch(&config) {
        Err(LaunchError::Connect(SaleaeError::Logic2AlreadyRunning)) => {}
        other => panic!("unexpected result {other:?}"),
    }

    let pid = fs::read_to_string(&pid_file).unwrap();
    let pid = pid.trim();
    assert_ne!(pid, MOCK_PID.to_string());
    assert!(!process_alive(pid), "launched process {pid} still running");
}

#[test]
fn test_message_size_limit() {
    let server = MockServer::start();
    let manager = Manager::connect(&server.config().max_message_size(48)).unwrap();

    let capture = manager.start_capture(LogicDeviceConfiguration::new(), None, None).unwrap();
    let settings = AnalyzerSettings::new().set("Bits per Transfer", "8 Bits per Transfer (Standard)");
    match capture.add_analyzer("SPI", Some("a label long enough to go over the limit"), settings) {
        Err(SaleaeError::Transport(status)) => assert_ne!(status.code(), tonic::Code::Aborted),
        other => panic!("unexpected result {other:?}"),
    }

    // Refused before it reached the server
    assert!(server.state.lock().unwrap().last_add_analyzer.is_none());
}
