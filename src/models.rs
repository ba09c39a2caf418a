use std::collections::HashMap;

use crate::proto;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Logic 2 application information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Version of the automation API the application speaks
    pub api_version: Version,
    pub app_version: String,
    /// PID of the main application process
    pub app_pid: u64,
}

impl From<proto::AppInfo> for AppInfo {
    fn from(info: proto::AppInfo) -> Self {
        let api_version = info.api_version.unwrap_or_default();
        Self {
            api_version: Version {
                major: api_version.major,
                minor: api_version.minor,
                patch: api_version.patch,
            },
            app_version: info.application_version,
            app_pid: info.launch_pid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Unspecified,
    Logic,
    Logic4,
    Logic8,
    Logic16,
    LogicPro8,
    LogicPro16,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Unspecified => "Unknown",
            DeviceType::Logic => "Logic",
            DeviceType::Logic4 => "Logic 4",
            DeviceType::Logic8 => "Logic 8",
            DeviceType::Logic16 => "Logic 16",
            DeviceType::LogicPro8 => "Logic Pro 8",
            DeviceType::LogicPro16 => "Logic Pro 16",
        }
    }
}

impl From<i32> for DeviceType {
    fn from(value: i32) -> Self {
        match proto::DeviceType::try_from(value) {
            Ok(proto::DeviceType::Logic) => DeviceType::Logic,
            Ok(proto::DeviceType::Logic4) => DeviceType::Logic4,
            Ok(proto::DeviceType::Logic8) => DeviceType::Logic8,
            Ok(proto::DeviceType::Logic16) => DeviceType::Logic16,
            Ok(proto::DeviceType::LogicPro8) => DeviceType::LogicPro8,
            Ok(proto::DeviceType::LogicPro16) => DeviceType::LogicPro16,
            Ok(proto::DeviceType::Unspecified) | Err(_) => DeviceType::Unspecified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDesc {
    pub device_id: String,
    pub device_type: DeviceType,
    /// True for the simulated devices Logic 2 offers when no hardware is attached
    pub is_simulation: bool,
}

impl From<proto::Device> for DeviceDesc {
    fn from(device: proto::Device) -> Self {
        Self {
            device_type: DeviceType::from(device.device_type),
            device_id: device.device_id,
            is_simulation: device.is_simulation,
        }
    }
}

/// Glitch filter for a single digital channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlitchFilterEntry {
    pub channel_index: u32,
    /// Minimum pulse width. Logic 2 rounds this to the nearest sample.
    pub pulse_width_seconds: f64,
}

impl From<GlitchFilterEntry> for proto::GlitchFilterEntry {
    fn from(entry: GlitchFilterEntry) -> Self {
        Self {
            channel_index: entry.channel_index,
            pulse_width_seconds: entry.pulse_width_seconds,
        }
    }
}

/// Capture configuration for Logic 8, Logic Pro 8 and Logic Pro 16.
///
/// Sample rates must match one offered by the application for the enabled
/// channel set. Leave the analog rate unset when no analog channel is
/// enabled, and the threshold unset on a Logic 8.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicDeviceConfiguration {
    pub enabled_analog_channels: Vec<u32>,
    pub enabled_digital_channels: Vec<u32>,
    pub analog_sample_rate: Option<u32>,
    pub digital_sample_rate: Option<u32>,
    /// 1.2, 1.8 or 3.3 volts, Pro models only
    pub digital_threshold_volts: Option<f64>,
    pub glitch_filters: Vec<GlitchFilterEntry>,
}

impl LogicDeviceConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn digital_channels(mut self, channels: impl IntoIterator<Item = u32>) -> Self {
        self.enabled_digital_channels = channels.into_iter().collect();
        self
    }

    pub fn analog_channels(mut self, channels: impl IntoIterator<Item = u32>) -> Self {
        self.enabled_analog_channels = channels.into_iter().collect();
        self
    }

    pub fn digital_sample_rate(mut self, samples_per_second: u32) -> Self {
        self.digital_sample_rate = Some(samples_per_second);
        self
    }

    pub fn analog_sample_rate(mut self, samples_per_second: u32) -> Self {
        self.analog_sample_rate = Some(samples_per_second);
        self
    }

    pub fn digital_threshold_volts(mut self, volts: f64) -> Self {
        self.digital_threshold_volts = Some(volts);
        self
    }

    pub fn glitch_filter(mut self, channel_index: u32, pulse_width_seconds: f64) -> Self {
        self.glitch_filters.push(GlitchFilterEntry {
            channel_index,
            pulse_width_seconds,
        });
        self
    }
}

impl From<LogicDeviceConfiguration> for proto::LogicDeviceConfiguration {
    fn from(config: LogicDeviceConfiguration) -> Self {
        Self {
            logic_channels: Some(proto::LogicChannels {
                analog_channels: config.enabled_analog_channels,
                digital_channels: config.enabled_digital_channels,
            }),
            digital_sample_rate: config.digital_sample_rate.unwrap_or_default(),
            analog_sample_rate: config.analog_sample_rate.unwrap_or_default(),
            digital_threshold_volts: config.digital_threshold_volts.unwrap_or_default(),
            glitch_filters: config.glitch_filters.into_iter().map(Into::into).collect(),
        }
    }
}

/// Device-specific configuration passed to `start_capture`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceConfiguration {
    Logic(LogicDeviceConfiguration),
}

impl From<LogicDeviceConfiguration> for DeviceConfiguration {
    fn from(config: LogicDeviceConfiguration) -> Self {
        Self::Logic(config)
    }
}

impl From<DeviceConfiguration> for proto::start_capture_request::DeviceConfiguration {
    fn from(config: DeviceConfiguration) -> Self {
        match config {
            DeviceConfiguration::Logic(logic) => Self::LogicDeviceConfiguration(logic.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadixType {
    Binary,
    Decimal,
    Hexadecimal,
    Ascii,
}

impl From<RadixType> for proto::RadixType {
    fn from(radix: RadixType) -> Self {
        match radix {
            RadixType::Binary => proto::RadixType::Binary,
            RadixType::Decimal => proto::RadixType::Decimal,
            RadixType::Hexadecimal => proto::RadixType::Hexadecimal,
            RadixType::Ascii => proto::RadixType::Ascii,
        }
    }
}

/// Reference to an analyzer or high level analyzer added to a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalyzerHandle {
    pub analyzer_id: u64,
}

/// An analyzer to include in a data table export, with its display radix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTableExportConfiguration {
    pub analyzer: AnalyzerHandle,
    pub radix: RadixType,
}

/// Either a bare analyzer handle or a handle with an explicit radix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTableAnalyzer {
    Handle(AnalyzerHandle),
    Configured(DataTableExportConfiguration),
}

impl From<AnalyzerHandle> for DataTableAnalyzer {
    fn from(handle: AnalyzerHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<DataTableExportConfiguration> for DataTableAnalyzer {
    fn from(config: DataTableExportConfiguration) -> Self {
        Self::Configured(config)
    }
}

impl From<DataTableAnalyzer> for proto::DataTableAnalyzerConfiguration {
    fn from(analyzer: DataTableAnalyzer) -> Self {
        match analyzer {
            DataTableAnalyzer::Handle(handle) => Self {
                analyzer_id: handle.analyzer_id,
                radix_type: proto::RadixType::Unspecified as i32,
            },
            DataTableAnalyzer::Configured(config) => Self {
                analyzer_id: config.analyzer.analyzer_id,
                radix_type: proto::RadixType::from(config.radix) as i32,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTableFilter {
    /// Columns to search
    pub columns: Vec<String>,
    pub query: String,
}

impl From<DataTableFilter> for proto::DataTableFilter {
    fn from(filter: DataTableFilter) -> Self {
        Self {
            query: filter.query,
            columns: filter.columns,
        }
    }
}

/// Optional parts of a data table export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTableExportOptions {
    /// Columns to include. All columns when empty.
    pub columns: Vec<String>,
    pub filter: Option<DataTableFilter>,
    /// Wall clock timestamps instead of capture-relative ones
    pub iso8601_timestamp: bool,
}

/// Value of a protocol analyzer setting, exactly as shown in the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerSettingValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for AnalyzerSettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AnalyzerSettingValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AnalyzerSettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AnalyzerSettingValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for AnalyzerSettingValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for AnalyzerSettingValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AnalyzerSettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<AnalyzerSettingValue> for proto::AnalyzerSettingValue {
    fn from(value: AnalyzerSettingValue) -> Self {
        use proto::analyzer_setting_value::Value;

        let value = match value {
            AnalyzerSettingValue::String(s) => Value::StringValue(s),
            AnalyzerSettingValue::Int(i) => Value::Int64Value(i),
            AnalyzerSettingValue::Float(f) => Value::DoubleValue(f),
            AnalyzerSettingValue::Bool(b) => Value::BoolValue(b),
        };
        Self { value: Some(value) }
    }
}

/// Value of a high level analyzer setting.
#[derive(Debug, Clone, PartialEq)]
pub enum HighLevelAnalyzerSettingValue {
    String(String),
    Number(f64),
}

impl From<&str> for HighLevelAnalyzerSettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for HighLevelAnalyzerSettingValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for HighLevelAnalyzerSettingValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for HighLevelAnalyzerSettingValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<HighLevelAnalyzerSettingValue> for proto::HighLevelAnalyzerSettingValue {
    fn from(value: HighLevelAnalyzerSettingValue) -> Self {
        use proto::high_level_analyzer_setting_value::Value;

        let value = match value {
            HighLevelAnalyzerSettingValue::String(s) => Value::StringValue(s),
            HighLevelAnalyzerSettingValue::Number(n) => Value::NumberValue(n),
        };
        Self { value: Some(value) }
    }
}

/// Named settings for an analyzer, keyed exactly as shown in the Logic 2 UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings<V>(HashMap<String, V>);

pub type AnalyzerSettings = Settings<AnalyzerSettingValue>;
pub type HighLevelAnalyzerSettings = Settings<HighLevelAnalyzerSettingValue>;

impl<V> Default for Settings<V> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<V> Settings<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<V>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn into_proto<P>(self) -> HashMap<String, P>
    where
        V: Into<P>,
    {
        self.0.into_iter().map(|(k, v)| (k, v.into())).collect()
    }
}

impl<V> From<HashMap<String, V>> for Settings<V> {
    fn from(map: HashMap<String, V>) -> Self {
        Self(map)
    }
}

/// Channels to include in a raw data export. Logic 2 refuses an export that
/// selects no channel, or a channel that was not recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSelection {
    pub analog: Vec<u32>,
    pub digital: Vec<u32>,
}

impl ChannelSelection {
    pub fn new(
        analog: impl IntoIterator<Item = u32>,
        digital: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            analog: analog.into_iter().collect(),
            digital: digital.into_iter().collect(),
        }
    }

    pub fn digital(channels: impl IntoIterator<Item = u32>) -> Self {
        Self::new([], channels)
    }

    pub fn analog(channels: impl IntoIterator<Item = u32>) -> Self {
        Self::new(channels, [])
    }

    pub fn is_empty(&self) -> bool {
        self.analog.is_empty() && self.digital.is_empty()
    }
}

impl From<ChannelSelection> for proto::LogicChannels {
    fn from(channels: ChannelSelection) -> Self {
        Self {
            analog_channels: channels.analog,
            digital_channels: channels.digital,
        }
    }
}

/// Options shared by the CSV and binary raw data exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExportOptions {
    pub channels: ChannelSelection,
    /// Keep every Nth analog sample. Logic 2 accepts 1 to 1,000,000.
    pub analog_downsample_ratio: u64,
    /// Wall clock timestamps instead of capture-relative ones. CSV only.
    pub iso8601_timestamp: bool,
}

impl Default for RawExportOptions {
    fn default() -> Self {
        Self {
            channels: ChannelSelection::default(),
            analog_downsample_ratio: 1,
            iso8601_timestamp: false,
        }
    }
}

impl RawExportOptions {
    pub fn with_channels(channels: ChannelSelection) -> Self {
        Self {
            channels,
            ..Self::default()
        }
    }

    pub fn analog_downsample_ratio(mut self, ratio: u64) -> Self {
        self.analog_downsample_ratio = ratio;
        self
    }

    pub fn iso8601_timestamp(mut self, enabled: bool) -> Self {
        self.iso8601_timestamp = enabled;
        self
    }
}
