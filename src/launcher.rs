use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::errors::SaleaeError;

const TERMINATE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Logic2 application not found: {0}")]
    ApplicationNotFound(String),

    #[error("Launching Logic2 is not supported on {0} without an application path")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Connect(#[from] SaleaeError),
}

/// Locate the Logic 2 binary.
///
/// An explicit path must exist. Without one, only Windows has a well-known
/// install location.
pub fn find_application(application_path: Option<&Path>) -> Result<PathBuf, LaunchError> {
    if let Some(path) = application_path {
        if !path.exists() {
            return Err(LaunchError::ApplicationNotFound(format!(
                "application path \"{}\" does not exist",
                path.display()
            )));
        }
        return Ok(path.to_path_buf());
    }

    match std::env::consts::OS {
        "windows" => {
            let program_files = std::env::var_os("ProgramW6432").ok_or_else(|| {
                LaunchError::ApplicationNotFound("\"Program Files\" not found".to_string())
            })?;
            let logic2_bin = PathBuf::from(program_files).join("Logic").join("Logic.exe");
            if !logic2_bin.exists() {
                return Err(LaunchError::ApplicationNotFound(
                    "Logic2 install not found. Go to https://www.saleae.com/downloads/ to download the installer."
                        .to_string(),
                ));
            }
            Ok(logic2_bin)
        }
        "linux" => Err(LaunchError::Unsupported("Linux")),
        "macos" => Err(LaunchError::Unsupported("MacOS")),
        other => Err(LaunchError::Unsupported(other)),
    }
}

/// Command line that starts Logic 2 with its automation server on `port`.
pub fn launch_command(application: &Path, port: u16) -> Command {
    let mut command = Command::new(application);
    command
        .arg("--automation")
        .arg("--automationPort")
        .arg(port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    command
}

/// A Logic 2 process started by this crate.
#[derive(Debug)]
pub struct Logic2Process {
    child: Option<Child>,
    pid: u32,
}

impl Logic2Process {
    pub fn spawn(application: &Path, port: u16) -> Result<Self, LaunchError> {
        log::info!("Launching {} on automation port {}", application.display(), port);
        let child = launch_command(application, port).spawn()?;
        let pid = child.id();
        log::debug!("Logic2 started with pid {}", pid);
        Ok(Self {
            child: Some(child),
            pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Kill the process and wait briefly for it to exit. Safe to call twice.
    pub fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        log::debug!("Terminating Logic2 (pid {})", self.pid);
        if let Err(e) = child.kill() {
            log::debug!("Failed to kill Logic2: {}", e);
        }

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    log::debug!("Logic2 exited with {}", status);
                    return;
                }
                Ok(None) if start.elapsed() < TERMINATE_GRACE => {
                    thread::sleep(Duration::from_millis(50));
                }
                Ok(None) => {
                    log::warn!("Logic2 (pid {}) did not exit within {:?}", self.pid, TERMINATE_GRACE);
                    return;
                }
                Err(e) => {
                    log::warn!("Failed to wait for Logic2: {}", e);
                    return;
                }
            }
        }
    }
}

impl Drop for Logic2Process {
    fn drop(&mut self) {
        self.terminate();
    }
}
