//! netrevive — the NetRevive daemon.
//!
//! Single binary that watches the gateway and escalates remediation:
//! - Settings file (NetRevive.json)
//! - Console + incident-file logging
//! - Privilege check and boot hardening
//! - Escalation controller (probe → adapter reset → reboot)
//! - Service-manager lifecycle commands
//!
//! # Usage
//!
//! ```text
//! netrevive                 # run in the foreground
//! netrevive install         # register as a system service
//! netrevive run --config /etc/netrevive/NetRevive.json
//! ```

mod boot;
mod logging;
mod privilege;
mod service;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use netrevive_core::{ConfigError, ConfigOrigin, Settings};
use netrevive_health::{CycleTiming, EscalationController, PingProber, SystemRemediator};

use crate::logging::{INCIDENT_LOG_MAX_LINES, IncidentLog};
use crate::service::{ServiceAction, ServiceManager};

/// Wait after an unprivileged start before giving up.
const PRIVILEGE_EXIT_DELAY: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(
    name = "netrevive",
    about = "NetRevive — keeps a host online by resetting its network adapter or rebooting it",
    version
)]
struct Cli {
    /// Settings file (default: NetRevive.json next to the executable).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the watchdog in the foreground (used by the service unit).
    Run {
        /// Seconds to wait before the first probe, letting the network settle after boot.
        #[arg(long, default_value = "300")]
        startup_grace: u64,
    },
    /// Install NetRevive as a system service.
    Install,
    /// Remove the system service.
    Uninstall,
    /// Start the installed service.
    Start,
    /// Stop the installed service.
    Stop,
    /// Restart the installed service.
    Restart,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(fatal = true, "{e:#}");
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let default_grace = CycleTiming::default().startup_grace;

    match cli.command {
        None => run_watchdog(cli.config, default_grace, false).await,
        Some(Command::Run { startup_grace }) => {
            run_watchdog(cli.config, Duration::from_secs(startup_grace), true).await
        }
        Some(Command::Install) => {
            logging::init(None);
            let exe = std::env::current_exe().context("locating the netrevive executable")?;
            let config = cli.config.map(std::path::absolute).transpose()?;
            ServiceManager::systemd()
                .install(&exe, config.as_deref())
                .await
                .context("error installing service")?;
            info!("service installed successfully");
            Ok(())
        }
        Some(Command::Uninstall) => {
            logging::init(None);
            let uninstalled = ServiceManager::systemd().uninstall().await;
            // The boot options outlive the service; tell the user how to revert them.
            if boot::applies() {
                warn!("{}", boot::UNDO_INSTRUCTIONS);
            }
            uninstalled.context("error uninstalling service")?;
            info!("service uninstalled successfully");
            Ok(())
        }
        Some(Command::Start) => control(ServiceAction::Start).await,
        Some(Command::Stop) => control(ServiceAction::Stop).await,
        Some(Command::Restart) => control(ServiceAction::Restart).await,
    }
}

async fn control(action: ServiceAction) -> anyhow::Result<()> {
    logging::init(None);
    ServiceManager::systemd()
        .control(action)
        .await
        .with_context(|| format!("error running service {action}"))?;
    info!("service {action} succeeded");
    Ok(())
}

async fn run_watchdog(
    config: Option<PathBuf>,
    startup_grace: Duration,
    as_service: bool,
) -> anyhow::Result<()> {
    let loaded = match config {
        Some(path) => Ok(path),
        None => Settings::default_path(),
    }
    .and_then(|path| Settings::load_or_create(&path).map(|(s, origin)| (s, origin, path)));

    logging::init(incident_log_for(
        loaded.as_ref().map(|(settings, _, _)| settings),
        IncidentLog::default_path(),
    ));

    let (settings, origin, path) = loaded.context("error loading settings")?;

    info!("running NetRevive");
    if !as_service {
        warn!("the program isn't running as a service, which is highly recommended");
        warn!("to install it as a service in the current location, run 'netrevive install'");
        warn!("to uninstall the service, run 'netrevive uninstall'");
    }
    log_settings(&settings, origin, &path);

    if !privilege::is_elevated() {
        error!("this program is NOT running with admin permissions, exiting in 1 minute...");
        tokio::time::sleep(PRIVILEGE_EXIT_DELAY).await;
        anyhow::bail!("please run the program with admin permissions");
    }

    boot::harden().await?;

    let timing = CycleTiming {
        startup_grace,
        ..CycleTiming::default()
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller = EscalationController::new(
        settings.router_ip_address,
        settings.ethernet_adapter_name,
        PingProber::new(),
        SystemRemediator::new(),
    )
    .with_timing(timing)
    .with_shutdown(shutdown_rx);

    let mut handle = tokio::spawn(controller.run());

    tokio::select! {
        result = &mut handle => {
            result.context("ethernet checker task panicked")??;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            handle.await.context("ethernet checker task panicked")??;
        }
    }

    info!("exiting NetRevive");
    Ok(())
}

/// Incident log for the loaded settings.
///
/// Only an explicit `log_incidents = false` disables it; a settings failure
/// keeps it so the fatal record reaches the file.
fn incident_log_for(
    settings: Result<&Settings, &ConfigError>,
    log_path: std::io::Result<PathBuf>,
) -> Option<IncidentLog> {
    if settings.is_ok_and(|s| !s.log_incidents) {
        return None;
    }
    match log_path {
        Ok(path) => Some(IncidentLog::new(path, INCIDENT_LOG_MAX_LINES)),
        Err(e) => {
            eprintln!("incident log disabled: {e}");
            None
        }
    }
}

fn log_settings(settings: &Settings, origin: ConfigOrigin, path: &Path) {
    match origin {
        ConfigOrigin::Created => info!(path = %path.display(), "created settings file with defaults"),
        ConfigOrigin::Loaded => info!(path = %path.display(), "settings loaded"),
    }
    info!("ethernet_adapter_name: {}", settings.ethernet_adapter_name);
    info!("router_ip_address: {}", settings.router_ip_address);
    info!("log_incidents: {}", settings.log_incidents);
}

/// Resolves on Ctrl-C, or SIGTERM from the service manager.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
