//! # Docker Checker
//!
//! k3d runs every node as a Docker container, so "installed" here means the
//! daemon answers `docker info`, not merely that the CLI is on PATH.
//!
//! Two failure shapes are told apart:
//! - **not installed**: the `docker` binary is missing; the install plan
//!   runs (Docker Desktop cask on macOS, get.docker.com on Linux).
//! - **installed but stopped**: the binary works but the daemon doesn't;
//!   [`DockerChecker::start_daemon`] launches it and waits for it to answer.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::package_manager::{brew_cask, script};
use super::{InstallError, InstallStep, Installability, ToolChecker, run_steps};
use crate::libs::executor::{CommandExecutor, ExecutorExt};
use crate::libs::utilities::platform::{Os, detect_os};
use crate::{log_debug, log_info};

/// How long to wait for a freshly started daemon.
const DAEMON_START_ATTEMPTS: u32 = 30;
const DAEMON_START_INTERVAL: Duration = Duration::from_secs(2);

pub struct DockerChecker {
    executor: Arc<dyn CommandExecutor>,
    os: Os,
    start_interval: Duration,
}

impl DockerChecker {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            os: detect_os(),
            start_interval: DAEMON_START_INTERVAL,
        }
    }

    pub fn for_os(mut self, os: Os) -> Self {
        self.os = os;
        self
    }

    /// Shortens the daemon start polling interval (tests).
    pub fn with_start_interval(mut self, interval: Duration) -> Self {
        self.start_interval = interval;
        self
    }

    /// True when the `docker` CLI runs at all, whether or not the daemon is up.
    pub fn is_binary_present(&self) -> bool {
        self.executor.execute("docker", &["--version"]).is_ok()
    }

    pub fn is_daemon_running(&self) -> bool {
        self.executor.execute("docker", &["info"]).is_ok()
    }

    /// Installed but stopped: worth offering a start instead of an install.
    pub fn is_stopped(&self) -> bool {
        self.is_binary_present() && !self.is_daemon_running()
    }

    fn start_step(&self) -> Option<InstallStep> {
        match self.os {
            Os::MacOs => Some(InstallStep::new("start Docker Desktop", "open", &["-a", "Docker"])),
            Os::Linux => Some(InstallStep::new(
                "start docker service",
                "sudo",
                &["systemctl", "start", "docker"],
            )),
            Os::Windows => Some(InstallStep::new(
                "start Docker Desktop",
                "powershell",
                &[
                    "-Command",
                    "Start-Process 'C:\\Program Files\\Docker\\Docker\\Docker Desktop.exe'",
                ],
            )),
            Os::Other => None,
        }
    }

    /// Starts the daemon and waits until `docker info` answers.
    pub fn start_daemon(&self) -> Result<(), InstallError> {
        let step = self
            .start_step()
            .ok_or_else(|| InstallError::UnsupportedPlatform { tool: self.name() })?;
        log_info!("Starting Docker...");
        run_steps(self.executor.as_ref(), &[step])?;

        for attempt in 1..=DAEMON_START_ATTEMPTS {
            if self.is_daemon_running() {
                log_info!("Docker is running");
                return Ok(());
            }
            log_debug!(
                "[Docker] waiting for daemon ({}/{})",
                attempt,
                DAEMON_START_ATTEMPTS
            );
            thread::sleep(self.start_interval);
        }
        Err(InstallError::Verification(
            "Docker was started but the daemon did not become ready in time".to_string(),
        ))
    }

    fn start_help(&self) -> String {
        match self.os {
            Os::MacOs => "Docker: Docker is installed but not running. Start Docker Desktop with 'open -a Docker'".into(),
            Os::Linux => "Docker: Docker is installed but not running. Start it with 'sudo systemctl start docker'".into(),
            Os::Windows => "Docker: Docker is installed but not running. Start Docker Desktop from the Start menu".into(),
            Os::Other => "Docker: Docker is installed but not running. Start the Docker daemon".into(),
        }
    }

    fn install_plan(&self) -> Option<Vec<InstallStep>> {
        match self.os {
            Os::MacOs => Some(vec![brew_cask("docker")]),
            Os::Linux => Some(vec![script("Docker install script", "https://get.docker.com")]),
            _ => None,
        }
    }
}

impl ToolChecker for DockerChecker {
    fn name(&self) -> String {
        "Docker".to_string()
    }

    fn is_installed(&self) -> bool {
        self.is_daemon_running()
    }

    fn install_help(&self) -> String {
        if self.is_stopped() {
            return self.start_help();
        }
        match self.os {
            Os::MacOs => "Docker: Run 'brew install --cask docker' or download Docker Desktop from https://docs.docker.com/desktop/install/mac-install/".into(),
            Os::Linux => "Docker: Run 'curl -fsSL https://get.docker.com | sh' or see https://docs.docker.com/engine/install/".into(),
            Os::Windows => "Docker: Download Docker Desktop from https://docs.docker.com/desktop/install/windows-install/".into(),
            Os::Other => "Docker: See https://docs.docker.com/get-docker/".into(),
        }
    }

    fn install(&self) -> Result<(), InstallError> {
        if self.is_daemon_running() {
            return Ok(());
        }
        if self.is_binary_present() {
            return self.start_daemon();
        }
        let steps = self
            .install_plan()
            .ok_or_else(|| InstallError::UnsupportedPlatform { tool: self.name() })?;
        run_steps(self.executor.as_ref(), &steps)?;
        self.start_daemon()
    }

    fn installability(&self) -> Installability {
        Installability::Automatic
    }
}
