//! Error types and translation of wire failures.
//!
//! The Logic 2 application reports domain failures as gRPC `ABORTED` statuses
//! whose details read `"<code>: <message>"`, where `<code>` is an
//! [`ErrorCode`]. [`translate_status`] turns those into [`SaleaeError`]
//! variants. Every other status is handed back untouched as
//! [`SaleaeError::Transport`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::proto;

// Codes are ASCII digits only. A single trailing newline is tolerated.
const ERROR_DETAIL_PATTERN: &str = r"^((?-u:\d)+): (.*)\n?$";

static ERROR_DETAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(ERROR_DETAIL_PATTERN).expect("error detail pattern must compile"));

#[derive(Debug, thiserror::Error)]
pub enum SaleaeError {
    /// The error reported by Logic 2 was not understood. This can indicate a
    /// version mismatch between this crate and the application.
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// An unexpected error occurred inside Logic 2.
    #[error("Internal server error: {0}")]
    InternalServer(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The file does not exist, was saved by a newer Logic 2, or is not a
    /// capture file.
    #[error("Failed to load capture: {0}")]
    LoadCaptureFailed(String),

    /// Raw data, analyzer, or data table export failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// The requested device is not attached or was not detected.
    #[error("Missing device: {0}")]
    MissingDevice(String),

    /// USB, bandwidth, calibration or disconnection failure while capturing.
    #[error("Device error: {0}")]
    Device(String),

    /// The capture buffer filled and the capture was terminated.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// A launched Logic 2 reported a pid other than the one we spawned, which
    /// means another instance already owns the automation port.
    #[error("Logic 2 is already running")]
    Logic2AlreadyRunning,

    #[error("Incompatible automation API version: supported major {supported}, Logic 2 reports {actual}")]
    IncompatibleApiVersion { supported: u32, actual: String },

    /// The manager was used after `close()`.
    #[error("Cannot use Manager after it has been closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(tonic::Status),

    #[error("Connection error: {0}")]
    Connection(#[from] tonic::transport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SaleaeError {
    /// True for failures that end a capture. A capture that failed this way
    /// should not be saved or exported; start a new one instead.
    pub fn is_capture_error(&self) -> bool {
        matches!(self, Self::Device(_) | Self::OutOfMemory(_))
    }

    /// The wire code this error was translated from, if any.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Unknown(_) => Some(ErrorCode::Unspecified),
            Self::InternalServer(_) => Some(ErrorCode::InternalException),
            Self::InvalidRequest(_) => Some(ErrorCode::InvalidRequest),
            Self::LoadCaptureFailed(_) => Some(ErrorCode::LoadCaptureFailed),
            Self::Export(_) => Some(ErrorCode::ExportFailed),
            Self::MissingDevice(_) => Some(ErrorCode::MissingDevice),
            Self::Device(_) => Some(ErrorCode::DeviceError),
            Self::OutOfMemory(_) => Some(ErrorCode::OutOfMemory),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SaleaeError>;

/// Status codes carried in the details of an aborted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unspecified,
    InternalException,
    InvalidRequest,
    LoadCaptureFailed,
    ExportFailed,
    MissingDevice,
    DeviceError,
    OutOfMemory,
}

impl ErrorCode {
    pub const ALL: [Self; 8] = [
        Self::Unspecified,
        Self::InternalException,
        Self::InvalidRequest,
        Self::LoadCaptureFailed,
        Self::ExportFailed,
        Self::MissingDevice,
        Self::DeviceError,
        Self::OutOfMemory,
    ];

    pub fn from_i32(code: i32) -> Option<Self> {
        let wire = proto::ErrorCode::try_from(code).ok()?;
        Some(match wire {
            proto::ErrorCode::Unspecified => Self::Unspecified,
            proto::ErrorCode::InternalException => Self::InternalException,
            proto::ErrorCode::InvalidRequest => Self::InvalidRequest,
            proto::ErrorCode::LoadCaptureFailed => Self::LoadCaptureFailed,
            proto::ErrorCode::ExportFailed => Self::ExportFailed,
            proto::ErrorCode::MissingDevice => Self::MissingDevice,
            proto::ErrorCode::DeviceError => Self::DeviceError,
            proto::ErrorCode::OutOfMemory => Self::OutOfMemory,
        })
    }

    pub fn as_i32(self) -> i32 {
        let wire = match self {
            Self::Unspecified => proto::ErrorCode::Unspecified,
            Self::InternalException => proto::ErrorCode::InternalException,
            Self::InvalidRequest => proto::ErrorCode::InvalidRequest,
            Self::LoadCaptureFailed => proto::ErrorCode::LoadCaptureFailed,
            Self::ExportFailed => proto::ErrorCode::ExportFailed,
            Self::MissingDevice => proto::ErrorCode::MissingDevice,
            Self::DeviceError => proto::ErrorCode::DeviceError,
            Self::OutOfMemory => proto::ErrorCode::OutOfMemory,
        };
        wire as i32
    }

    pub fn into_error(self, message: impl Into<String>) -> SaleaeError {
        let message = message.into();
        match self {
            Self::Unspecified => SaleaeError::Unknown(message),
            Self::InternalException => SaleaeError::InternalServer(message),
            Self::InvalidRequest => SaleaeError::InvalidRequest(message),
            Self::LoadCaptureFailed => SaleaeError::LoadCaptureFailed(message),
            Self::ExportFailed => SaleaeError::Export(message),
            Self::MissingDevice => SaleaeError::MissingDevice(message),
            Self::DeviceError => SaleaeError::Device(message),
            Self::OutOfMemory => SaleaeError::OutOfMemory(message),
        }
    }
}

/// Parse the `"<code>: <message>"` detail of an aborted call.
///
/// The code must be ASCII digits and the message a single line; one trailing
/// newline is dropped. A detail of any other shape becomes
/// [`SaleaeError::Unknown`] carrying the whole detail. A code that is not a
/// known [`ErrorCode`] becomes [`SaleaeError::Unknown`] carrying the message.
pub fn parse_error_detail(detail: &str) -> SaleaeError {
    let Some(captures) = ERROR_DETAIL_REGEX.captures(detail) else {
        return SaleaeError::Unknown(detail.to_string());
    };

    let message = captures.get(2).map_or("", |m| m.as_str());
    let code = captures
        .get(1)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .and_then(ErrorCode::from_i32);

    match code {
        Some(code) => code.into_error(message),
        None => SaleaeError::Unknown(message.to_string()),
    }
}

/// Translate a failed call into a [`SaleaeError`].
pub fn translate_status(status: tonic::Status) -> SaleaeError {
    if status.code() != tonic::Code::Aborted {
        return SaleaeError::Transport(status);
    }

    let error = parse_error_detail(status.message());
    log::debug!("Logic 2 aborted the call: {}", error);
    error
}
