//! Service-manager lifecycle: install, uninstall, start, stop, restart.
//!
//! Backed by systemd. The unit runs `netrevive run` and is restarted by
//! systemd whenever the watchdog exits, including after a fatal error.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use netrevive_core::RemediationError;
use netrevive_health::remediation::{self, CommandLine};

pub const SERVICE_NAME: &str = "netrevive";
pub const UNIT_PATH: &str = "/etc/systemd/system/netrevive.service";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service management requires systemd, which is not available on this platform")]
    Unsupported,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Command(#[from] RemediationError),
}

/// Lifecycle verbs passed straight to the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceAction::Start => write!(f, "start"),
            ServiceAction::Stop => write!(f, "stop"),
            ServiceAction::Restart => write!(f, "restart"),
        }
    }
}

/// Render the systemd unit for `exe`.
pub fn render_unit(exe: &Path, config: Option<&Path>) -> String {
    let mut exec = format!("\"{}\" run", exe.display());
    if let Some(config) = config {
        exec.push_str(&format!(" --config \"{}\"", config.display()));
    }

    format!(
        "[Unit]
Description=NetRevive: keeping servers online with automated recovery
After=network-online.target
Wants=network-online.target

[Service]
Type=simple
ExecStart={exec}
Restart=always
RestartSec=10

[Install]
WantedBy=multi-user.target
"
    )
}

/// Manages the NetRevive unit.
#[derive(Debug, Clone)]
pub struct ServiceManager {
    unit_path: PathBuf,
}

impl ServiceManager {
    pub fn systemd() -> Self {
        Self {
            unit_path: PathBuf::from(UNIT_PATH),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.unit_path.exists()
    }

    /// Write and enable the unit. Does nothing if it is already installed.
    pub async fn install(&self, exe: &Path, config: Option<&Path>) -> Result<(), ServiceError> {
        ensure_supported()?;
        if self.is_installed() {
            info!(unit = %self.unit_path.display(), "service already installed");
            return Ok(());
        }

        std::fs::write(&self.unit_path, render_unit(exe, config)).map_err(|source| {
            ServiceError::Io {
                path: self.unit_path.clone(),
                source,
            }
        })?;
        systemctl(&["daemon-reload"]).await?;
        systemctl(&["enable", SERVICE_NAME]).await?;
        Ok(())
    }

    /// Stop, disable and remove the unit.
    pub async fn uninstall(&self) -> Result<(), ServiceError> {
        ensure_supported()?;
        if !self.is_installed() {
            info!("service is not installed");
            return Ok(());
        }

        systemctl(&["disable", "--now", SERVICE_NAME]).await?;
        std::fs::remove_file(&self.unit_path).map_err(|source| ServiceError::Io {
            path: self.unit_path.clone(),
            source,
        })?;
        systemctl(&["daemon-reload"]).await?;
        Ok(())
    }

    pub async fn control(&self, action: ServiceAction) -> Result<(), ServiceError> {
        ensure_supported()?;
        let verb = action.to_string();
        systemctl(&[verb.as_str(), SERVICE_NAME]).await?;
        Ok(())
    }
}

fn ensure_supported() -> Result<(), ServiceError> {
    if cfg!(target_os = "linux") {
        Ok(())
    } else {
        Err(ServiceError::Unsupported)
    }
}

async fn systemctl(args: &[&str]) -> Result<String, RemediationError> {
    remediation::run(CommandLine {
        program: "systemctl",
        args: args.iter().map(|a| a.to_string()).collect(),
    })
    .await
}
