use std::path::PathBuf;
use std::time::Duration;

use tonic::transport::Endpoint;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 10430;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

pub const ENV_ADDRESS: &str = "LOGIC2_AUTOMATION_ADDRESS";
pub const ENV_PORT: &str = "LOGIC2_AUTOMATION_PORT";
pub const ENV_CONNECT_TIMEOUT: &str = "LOGIC2_CONNECT_TIMEOUT_SECONDS";
pub const ENV_APPLICATION_PATH: &str = "LOGIC2_APPLICATION_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where to find Logic 2 and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    pub address: String,
    pub port: u16,
    /// How long the handshake keeps retrying while Logic 2 is unreachable
    pub connect_timeout: Duration,
    /// Deadline applied to every call after the handshake. None waits forever,
    /// which `Capture::wait` usually needs.
    pub request_timeout: Option<Duration>,
    /// Logic 2 binary used by `Manager::launch`
    pub application_path: Option<PathBuf>,
    /// HTTP/2 keepalive ping interval. None disables pings.
    pub keepalive_interval: Option<Duration>,
    /// Largest message sent or accepted, in bytes. None keeps the gRPC
    /// defaults (4 MiB received, unlimited sent).
    pub max_message_size: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            application_path: None,
            keepalive_interval: None,
            max_message_size: None,
        }
    }
}

impl ManagerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn application_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.application_path = Some(path.into());
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = Some(bytes);
        self
    }

    /// Defaults overridden by any `LOGIC2_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(address) = lookup(ENV_ADDRESS) {
            config.address = address;
        }

        if let Some(port) = lookup(ENV_PORT) {
            config.port = port.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    name: ENV_PORT,
                    value: port.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        if let Some(timeout) = lookup(ENV_CONNECT_TIMEOUT) {
            let seconds: f64 = timeout.trim().parse().map_err(|e: std::num::ParseFloatError| {
                ConfigError::InvalidValue {
                    name: ENV_CONNECT_TIMEOUT,
                    value: timeout.clone(),
                    reason: e.to_string(),
                }
            })?;
            config.connect_timeout = Duration::try_from_secs_f64(seconds).map_err(|e| {
                ConfigError::InvalidValue {
                    name: ENV_CONNECT_TIMEOUT,
                    value: timeout.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        if let Some(path) = lookup(ENV_APPLICATION_PATH) {
            config.application_path = Some(PathBuf::from(path));
        }

        log::debug!("Loaded manager config from environment: {:?}", config);
        Ok(config)
    }

    pub(crate) fn endpoint_uri(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }

    pub(crate) fn endpoint(&self) -> Result<Endpoint, tonic::transport::Error> {
        let mut endpoint = Endpoint::from_shared(self.endpoint_uri())?;
        if let Some(interval) = self.keepalive_interval {
            endpoint = endpoint
                .http2_keep_alive_interval(interval)
                .keep_alive_while_idle(true);
        }
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.port, 10430);
        assert_eq!(config.connect_timeout, Duration::from_secs(20));
        assert_eq!(config.endpoint_uri(), "http://127.0.0.1:10430");
    }

    #[test]
    fn test_from_lookup() {
        let config = ManagerConfig::from_lookup(lookup_from(&[
            (ENV_PORT, "50051"),
            (ENV_CONNECT_TIMEOUT, "2.5"),
            (ENV_APPLICATION_PATH, "/opt/Logic/Logic"),
        ]))
        .unwrap();

        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.port, 50051);
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.application_path, Some(PathBuf::from("/opt/Logic/Logic")));
    }

    #[test]
    fn test_endpoint() {
        let config = ManagerConfig::new(50051)
            .address("10.0.0.5")
            .keepalive_interval(Duration::from_secs(30))
            .max_message_size(64 << 20);
        assert_eq!(config.keepalive_interval, Some(Duration::from_secs(30)));
        assert_eq!(config.max_message_size, Some(64 << 20));

        let endpoint = config.endpoint().unwrap();
        assert_eq!(endpoint.uri().host(), Some("10.0.0.5"));
        assert_eq!(endpoint.uri().port_u16(), Some(50051));

        assert!(ManagerConfig::default().address("not a host").endpoint().is_err());
    }

    #[test]
    fn test_invalid_values() {
        let err = ManagerConfig::from_lookup(lookup_from(&[(ENV_PORT, "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: ENV_PORT, .. }));

        let err =
            ManagerConfig::from_lookup(lookup_from(&[(ENV_CONNECT_TIMEOUT, "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: ENV_CONNECT_TIMEOUT, .. }));
    }
}
