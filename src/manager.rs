use std::future::Future;
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use tonic::transport::Channel;

use crate::capture::Capture;
use crate::capture_mode::CaptureConfiguration;
use crate::config::{ManagerConfig, DEFAULT_ADDRESS};
use crate::errors::{translate_status, Result, SaleaeError};
use crate::launcher::{find_application, LaunchError, Logic2Process};
use crate::models::{AppInfo, DeviceConfiguration, DeviceDesc};
use crate::proto;
use crate::proto::manager_client::ManagerClient;

/// Major version of the automation API this crate speaks.
pub const SUPPORTED_API_MAJOR: u32 = proto::ThisApiVersion::Major as u32;

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Connection to a running Logic 2 instance.
///
/// Every method is a single blocking call into the application. The manager
/// can be shared between threads; concurrent calls are forwarded as they come
/// and Logic 2 orders them.
///
/// Blocking happens on a runtime owned by the manager, so methods must not be
/// called from inside another tokio runtime.
pub struct Manager {
    runtime: tokio::runtime::Runtime,
    client: RwLock<Option<ManagerClient<Channel>>>,
    process: Mutex<Option<Logic2Process>>,
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("closed", &self.is_closed())
            .field("launched_pid", &self.launched_pid())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Manager {
    /// Connect to an instance of Logic 2 that is already running with
    /// automation enabled.
    pub fn connect(config: &ManagerConfig) -> Result<Self> {
        Self::connect_with_process(config, None)
    }

    /// Start Logic 2 and connect to it. The application is shut down again
    /// when the manager is closed or dropped, and when the handshake fails.
    ///
    /// Shutdown runs from `close` and `Drop` only. If the calling process
    /// is killed or aborts (the release profile sets `panic = "abort"`),
    /// the launched Logic 2 keeps running and holds the automation port; the
    /// next `launch` on that port then fails with
    /// [`SaleaeError::Logic2AlreadyRunning`].
    pub fn launch(config: &ManagerConfig) -> std::result::Result<Self, LaunchError> {
        let application = find_application(config.application_path.as_deref())?;
        let process = Logic2Process::spawn(&application, config.port)?;

        let local = ManagerConfig {
            address: DEFAULT_ADDRESS.to_string(),
            ..config.clone()
        };
        Self::connect_with_process(&local, Some(process)).map_err(LaunchError::from)
    }

    fn connect_with_process(config: &ManagerConfig, process: Option<Logic2Process>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("logic2-automation")
            .enable_all()
            .build()?;

        log::debug!("Connecting to Logic2 at {}", config.endpoint_uri());
        let endpoint = config.endpoint()?;
        let channel = {
            let _guard = runtime.enter();
            endpoint.connect_lazy()
        };

        let mut client = ManagerClient::new(channel);
        if let Some(limit) = config.max_message_size {
            client = client
                .max_decoding_message_size(limit)
                .max_encoding_message_size(limit);
        }

        let manager = Self {
            runtime,
            client: RwLock::new(Some(client)),
            process: Mutex::new(process),
            request_timeout: config.request_timeout,
        };

        if let Err(e) = manager.handshake(config.connect_timeout) {
            manager.close();
            return Err(e);
        }
        Ok(manager)
    }

    /// Wait for Logic 2 to answer and check it is the instance we expect.
    fn handshake(&self, connect_timeout: Duration) -> Result<AppInfo> {
        let start = Instant::now();
        let app_info = loop {
            match self.get_app_info() {
                Ok(app_info) => break app_info,
                Err(SaleaeError::Transport(status))
                    if status.code() == tonic::Code::Unavailable
                        && start.elapsed() < connect_timeout =>
                {
                    log::trace!("Logic2 not reachable yet: {}", status.message());
                    thread::sleep(CONNECT_RETRY_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(pid) = self.launched_pid() {
            if u64::from(pid) != app_info.app_pid {
                log::error!(
                    "Launched Logic2 has pid {} but pid {} answered on the automation port",
                    pid,
                    app_info.app_pid
                );
                return Err(SaleaeError::Logic2AlreadyRunning);
            }
        }

        if app_info.api_version.major != SUPPORTED_API_MAJOR {
            log::error!(
                "Incompatible Saleae Automation API Version encountered. Supported Major Version={}, Logic2 Version={}",
                SUPPORTED_API_MAJOR,
                app_info.api_version
            );
            return Err(SaleaeError::IncompatibleApiVersion {
                supported: SUPPORTED_API_MAJOR,
                actual: app_info.api_version.to_string(),
            });
        }

        log::info!(
            "Connected to Logic2 {} (API {}, pid {})",
            app_info.app_version,
            app_info.api_version,
            app_info.app_pid
        );
        Ok(app_info)
    }

    fn stub(&self) -> Result<ManagerClient<Channel>> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SaleaeError::Closed)
    }

    fn launched_pid(&self) -> Option<u32> {
        self.process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Logic2Process::pid)
    }

    pub fn is_closed(&self) -> bool {
        self.client.read().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    /// Forward one unary call and translate its failure.
    pub(crate) fn call<Req, Rep, F, Fut>(&self, method: &'static str, request: Req, rpc: F) -> Result<Rep>
    where
        F: FnOnce(ManagerClient<Channel>, tonic::Request<Req>) -> Fut,
        Fut: Future<Output = std::result::Result<tonic::Response<Rep>, tonic::Status>>,
    {
        let stub = self.stub()?;
        let mut request = tonic::Request::new(request);
        if let Some(timeout) = self.request_timeout {
            request.set_timeout(timeout);
        }

        let span = tracing::debug_span!("logic2_call", method);
        let _entered = span.enter();
        log::debug!("Calling {}", method);

        let start = Instant::now();
        let result = self.runtime.block_on(rpc(stub, request));
        log::trace!("{} returned after {:?}", method, start.elapsed());

        result.map(tonic::Response::into_inner).map_err(translate_status)
    }

    /// Information about the connected Logic 2 instance.
    pub fn get_app_info(&self) -> Result<AppInfo> {
        let reply = self.call("GetAppInfo", proto::GetAppInfoRequest {}, |mut stub, request| async move {
            stub.get_app_info(request).await
        })?;
        Ok(reply.app_info.unwrap_or_default().into())
    }

    /// Devices attached to the machine. Use this to find a device id for
    /// [`start_capture`](Self::start_capture).
    pub fn get_devices(&self, include_simulation_devices: bool) -> Result<Vec<DeviceDesc>> {
        let request = proto::GetDevicesRequest {
            include_simulation_devices,
        };
        let reply = self.call("GetDevices", request, |mut stub, request| async move {
            stub.get_devices(request).await
        })?;
        Ok(reply.devices.into_iter().map(DeviceDesc::from).collect())
    }

    /// Start a new capture.
    ///
    /// All settings must be provided; whatever is configured in the UI is
    /// ignored. Without a capture configuration the capture runs in manual
    /// mode. The returned capture is still recording: call
    /// [`Capture::wait`] or [`Capture::stop`] before anything else.
    pub fn start_capture(
        &self,
        device_configuration: impl Into<DeviceConfiguration>,
        device_id: Option<&str>,
        capture_configuration: Option<CaptureConfiguration>,
    ) -> Result<Capture<'_>> {
        let request = proto::StartCaptureRequest {
            device_id: device_id.unwrap_or_default().to_string(),
            device_configuration: Some(device_configuration.into().into()),
            capture_configuration: capture_configuration.map(Into::into),
        };

        let reply = self.call("StartCapture", request, |mut stub, request| async move {
            stub.start_capture(request).await
        })?;
        let capture_id = reply.capture_info.unwrap_or_default().capture_id;
        log::debug!("Started capture {}", capture_id);
        Ok(Capture::new(self, capture_id))
    }

    /// Load a `.sal` file. The capture is fully loaded when this returns.
    pub fn load_capture(&self, filepath: impl AsRef<Path>) -> Result<Capture<'_>> {
        let request = proto::LoadCaptureRequest {
            filepath: filepath.as_ref().to_string_lossy().into_owned(),
        };

        let reply = self.call("LoadCapture", request, |mut stub, request| async move {
            stub.load_capture(request).await
        })?;
        let capture_id = reply.capture_info.unwrap_or_default().capture_id;
        log::debug!("Loaded {} as capture {}", filepath.as_ref().display(), capture_id);
        Ok(Capture::new(self, capture_id))
    }

    /// Handle for a capture id obtained elsewhere.
    pub fn capture(&self, capture_id: u64) -> Capture<'_> {
        Capture::new(self, capture_id)
    }

    /// Drop the connection, and shut Logic 2 down if this manager launched it.
    ///
    /// Every later call through this manager or its captures returns
    /// [`SaleaeError::Closed`]. Closing twice is a no-op.
    pub fn close(&self) {
        let client = self.client.write().unwrap_or_else(PoisonError::into_inner).take();
        if client.is_some() {
            log::debug!("Closing connection to Logic2");
        }
        drop(client);

        if let Some(mut process) = self.process.lock().unwrap_or_else(PoisonError::into_inner).take() {
            process.terminate();
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_api_major() {
        assert_eq!(SUPPORTED_API_MAJOR, 1);
    }

    #[test]
    fn test_unreachable_server_times_out() {
        // Nothing listens on port 1
        let config = ManagerConfig::new(1).connect_timeout(Duration::from_millis(300));
        let start = Instant::now();
        let err = Manager::connect(&config).unwrap_err();
        match err {
            SaleaeError::Transport(status) => assert_eq!(status.code(), tonic::Code::Unavailable),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_invalid_address() {
        let config = ManagerConfig::default().address("not a host name");
        assert!(matches!(Manager::connect(&config), Err(SaleaeError::Connection(_))));
    }
}
