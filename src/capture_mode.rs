use crate::proto;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalTriggerType {
    Rising,
    Falling,
    PulseHigh,
    PulseLow,
}

impl DigitalTriggerType {
    pub fn is_pulse(&self) -> bool {
        matches!(self, DigitalTriggerType::PulseHigh | DigitalTriggerType::PulseLow)
    }
}

impl From<DigitalTriggerType> for proto::DigitalTriggerType {
    fn from(trigger_type: DigitalTriggerType) -> Self {
        match trigger_type {
            DigitalTriggerType::Rising => proto::DigitalTriggerType::Rising,
            DigitalTriggerType::Falling => proto::DigitalTriggerType::Falling,
            DigitalTriggerType::PulseHigh => proto::DigitalTriggerType::PulseHigh,
            DigitalTriggerType::PulseLow => proto::DigitalTriggerType::PulseLow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalTriggerLinkedChannelState {
    Low,
    High,
}

impl From<DigitalTriggerLinkedChannelState> for proto::DigitalTriggerLinkedChannelState {
    fn from(state: DigitalTriggerLinkedChannelState) -> Self {
        match state {
            DigitalTriggerLinkedChannelState::Low => proto::DigitalTriggerLinkedChannelState::Low,
            DigitalTriggerLinkedChannelState::High => proto::DigitalTriggerLinkedChannelState::High,
        }
    }
}

/// A digital channel that must hold a level while the trigger event happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalTriggerLinkedChannel {
    pub channel_index: u32,
    pub state: DigitalTriggerLinkedChannelState,
}

impl From<DigitalTriggerLinkedChannel> for proto::DigitalTriggerLinkedChannel {
    fn from(channel: DigitalTriggerLinkedChannel) -> Self {
        Self {
            channel_index: channel.channel_index,
            state: proto::DigitalTriggerLinkedChannelState::from(channel.state) as i32,
        }
    }
}

/// Record until stopped with `Capture::stop`. `Capture::wait` fails in this mode.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualCaptureMode {
    /// Seconds of data at the end of the capture to keep. All data when unset.
    pub trim_data_seconds: Option<f64>,
}

/// Record for a fixed duration. `Capture::wait` returns once it is recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedCaptureMode {
    pub duration_seconds: f64,
    /// Retains roughly the latest `trim_data_seconds` of the recording.
    pub trim_data_seconds: Option<f64>,
}

impl TimedCaptureMode {
    pub fn new(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            trim_data_seconds: None,
        }
    }
}

/// Record until a digital edge or pulse is found and the post-trigger length
/// has been recorded. `Capture::wait` returns once that has happened.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitalTriggerCaptureMode {
    pub trigger_type: DigitalTriggerType,
    pub trigger_channel_index: u32,
    /// Pulse triggers only. Zero for no minimum.
    pub min_pulse_width_seconds: Option<f64>,
    /// Pulse triggers only.
    pub max_pulse_width_seconds: Option<f64>,
    pub linked_channels: Vec<DigitalTriggerLinkedChannel>,
    pub trim_data_seconds: Option<f64>,
    /// Seconds of data to record after the trigger
    pub after_trigger_seconds: Option<f64>,
}

impl DigitalTriggerCaptureMode {
    pub fn new(trigger_type: DigitalTriggerType, trigger_channel_index: u32) -> Self {
        Self {
            trigger_type,
            trigger_channel_index,
            min_pulse_width_seconds: None,
            max_pulse_width_seconds: None,
            linked_channels: Vec::new(),
            trim_data_seconds: None,
            after_trigger_seconds: None,
        }
    }

    pub fn start_capturing_when(trigger_channel_index: u32) -> DigitalTriggerBuilder {
        DigitalTriggerBuilder::new(trigger_channel_index)
    }
}

#[derive(Debug)]
pub struct DigitalTriggerBuilder {
    trigger_channel_index: u32,
    linked_channels: Vec<DigitalTriggerLinkedChannel>,
}

impl DigitalTriggerBuilder {
    pub fn new(trigger_channel_index: u32) -> Self {
        Self {
            trigger_channel_index,
            linked_channels: Vec::new(),
        }
    }

    /// Require `channel_index` to be at `state` while the trigger event occurs.
    pub fn while_channel(mut self, channel_index: u32, state: DigitalTriggerLinkedChannelState) -> Self {
        self.linked_channels.push(DigitalTriggerLinkedChannel {
            channel_index,
            state,
        });
        self
    }

    pub fn while_high(self, channel_index: u32) -> Self {
        self.while_channel(channel_index, DigitalTriggerLinkedChannelState::High)
    }

    pub fn while_low(self, channel_index: u32) -> Self {
        self.while_channel(channel_index, DigitalTriggerLinkedChannelState::Low)
    }

    pub fn rising_edge(self) -> DigitalTriggerCaptureMode {
        self.into_mode(DigitalTriggerType::Rising)
    }

    pub fn falling_edge(self) -> DigitalTriggerCaptureMode {
        self.into_mode(DigitalTriggerType::Falling)
    }

    pub fn pulse_high(self) -> DigitalTriggerCaptureMode {
        self.into_mode(DigitalTriggerType::PulseHigh)
    }

    pub fn pulse_low(self) -> DigitalTriggerCaptureMode {
        self.into_mode(DigitalTriggerType::PulseLow)
    }

    fn into_mode(self, trigger_type: DigitalTriggerType) -> DigitalTriggerCaptureMode {
        DigitalTriggerCaptureMode {
            linked_channels: self.linked_channels,
            ..DigitalTriggerCaptureMode::new(trigger_type, self.trigger_channel_index)
        }
    }
}

impl DigitalTriggerCaptureMode {
    pub fn pulse_width(mut self, min_seconds: Option<f64>, max_seconds: Option<f64>) -> Self {
        self.min_pulse_width_seconds = min_seconds;
        self.max_pulse_width_seconds = max_seconds;
        self
    }

    pub fn after_trigger_seconds(mut self, seconds: f64) -> Self {
        self.after_trigger_seconds = Some(seconds);
        self
    }

    pub fn trim_data_seconds(mut self, seconds: f64) -> Self {
        self.trim_data_seconds = Some(seconds);
        self
    }
}

/// How a capture ends. Forwarded to Logic 2 as is.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureMode {
    Manual(ManualCaptureMode),
    Timed(TimedCaptureMode),
    DigitalTrigger(DigitalTriggerCaptureMode),
}

impl Default for CaptureMode {
    fn default() -> Self {
        Self::Manual(ManualCaptureMode::default())
    }
}

impl From<ManualCaptureMode> for CaptureMode {
    fn from(mode: ManualCaptureMode) -> Self {
        Self::Manual(mode)
    }
}

impl From<TimedCaptureMode> for CaptureMode {
    fn from(mode: TimedCaptureMode) -> Self {
        Self::Timed(mode)
    }
}

impl From<DigitalTriggerCaptureMode> for CaptureMode {
    fn from(mode: DigitalTriggerCaptureMode) -> Self {
        Self::DigitalTrigger(mode)
    }
}

impl From<CaptureMode> for proto::capture_configuration::CaptureMode {
    fn from(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Manual(manual) => Self::ManualCaptureMode(proto::ManualCaptureMode {
                trim_data_seconds: manual.trim_data_seconds,
            }),
            CaptureMode::Timed(timed) => Self::TimedCaptureMode(proto::TimedCaptureMode {
                duration_seconds: timed.duration_seconds,
                trim_data_seconds: timed.trim_data_seconds,
            }),
            CaptureMode::DigitalTrigger(digital) => {
                Self::DigitalCaptureMode(proto::DigitalTriggerCaptureMode {
                    trigger_type: proto::DigitalTriggerType::from(digital.trigger_type) as i32,
                    trigger_channel_index: digital.trigger_channel_index,
                    min_pulse_width_seconds: digital.min_pulse_width_seconds,
                    max_pulse_width_seconds: digital.max_pulse_width_seconds,
                    linked_channels: digital.linked_channels.into_iter().map(Into::into).collect(),
                    trim_data_seconds: digital.trim_data_seconds,
                    after_trigger_seconds: digital.after_trigger_seconds,
                })
            }
        }
    }
}

/// Top-level capture settings for `Manager::start_capture`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureConfiguration {
    pub buffer_size_megabytes: Option<u32>,
    pub capture_mode: CaptureMode,
}

impl CaptureConfiguration {
    pub fn new(capture_mode: impl Into<CaptureMode>) -> Self {
        Self {
            buffer_size_megabytes: None,
            capture_mode: capture_mode.into(),
        }
    }

    pub fn buffer_size_megabytes(mut self, megabytes: u32) -> Self {
        self.buffer_size_megabytes = Some(megabytes);
        self
    }
}

impl From<CaptureConfiguration> for proto::CaptureConfiguration {
    fn from(config: CaptureConfiguration) -> Self {
        Self {
            buffer_size_megabytes: config.buffer_size_megabytes.unwrap_or_default(),
            capture_mode: Some(config.capture_mode.into()),
        }
    }
}
