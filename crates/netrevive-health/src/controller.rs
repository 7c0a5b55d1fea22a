//! Escalation controller — the long-running watchdog loop.
//!
//! Each cycle:
//! 1. applies the remediation tier due for the failures of earlier rounds
//!    (reboot before adapter reset),
//! 2. probes the gateway,
//! 3. folds the outcome into [`EscalationState`] and sleeps before the
//!    next cycle (10 s after a failure, 60 s after a success).
//!
//! The loop runs until an optional shutdown signal fires or a reboot
//! leaves it with nothing more to do.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use netrevive_core::{ProbeOutcome, REBOOT_THRESHOLD, RemediationTier, WatchdogError};

use crate::escalation::EscalationState;
use crate::probe::Prober;
use crate::remediation::Remediator;

/// Fixed delays of the watchdog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleTiming {
    /// Wait before the first cycle so the host network can settle after boot.
    pub startup_grace: Duration,
    /// Wait after the forced adapter enable at startup.
    pub post_enable_settle: Duration,
    /// Gap between disabling and re-enabling the adapter.
    pub adapter_toggle_gap: Duration,
    /// Wait after re-enabling the adapter.
    pub adapter_settle: Duration,
    /// Gap between enabling the adapter and issuing the reboot.
    pub pre_reboot_gap: Duration,
    /// How long to wait for the OS to take the process down after a reboot.
    pub reboot_wait: Duration,
    /// Pause after a failed round.
    pub failure_pause: Duration,
    /// Pause after a successful round.
    pub success_pause: Duration,
}

impl Default for CycleTiming {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_secs(5 * 60),
            post_enable_settle: Duration::from_secs(10),
            adapter_toggle_gap: Duration::from_secs(5),
            adapter_settle: Duration::from_secs(20),
            pre_reboot_gap: Duration::from_secs(5),
            reboot_wait: Duration::from_secs(5 * 60),
            failure_pause: Duration::from_secs(10),
            success_pause: Duration::from_secs(60),
        }
    }
}

/// What happened in one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Remediation applied before the probe.
    pub tier: RemediationTier,
    /// Packets requested from the prober.
    pub packets_requested: u32,
    pub outcome: ProbeOutcome,
    /// Failure count after folding in the outcome.
    pub consecutive_failures: u32,
}

/// Result of [`EscalationController::run_cycle`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cycle {
    Completed(CycleReport),
    /// The shutdown signal fired; no further cycles should run.
    Shutdown,
}

/// Drives the prober in an endless cycle and escalates remediation.
pub struct EscalationController<P, R> {
    target: String,
    adapter: String,
    prober: P,
    remediator: R,
    timing: CycleTiming,
    state: EscalationState,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<P: Prober, R: Remediator> EscalationController<P, R> {
    /// Create a controller probing `target` and remediating through `adapter`.
    pub fn new(
        target: impl Into<String>,
        adapter: impl Into<String>,
        prober: P,
        remediator: R,
    ) -> Self {
        Self {
            target: target.into(),
            adapter: adapter.into(),
            prober,
            remediator,
            timing: CycleTiming::default(),
            state: EscalationState::new(),
            shutdown: None,
        }
    }

    pub fn with_timing(mut self, timing: CycleTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Stop cooperatively once `shutdown` carries `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn state(&self) -> &EscalationState {
        &self.state
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// Startup sequence followed by cycles until shutdown.
    ///
    /// Only returns an error for unrecoverable conditions; every other
    /// failure is absorbed by the escalation ladder.
    pub async fn run(mut self) -> Result<(), WatchdogError> {
        info!(gateway = %self.target, adapter = %self.adapter, "starting ethernet checker");

        if !self.pause(self.timing.startup_grace).await {
            return Ok(());
        }

        // Leave the adapter enabled no matter how the previous run ended.
        self.toggle_adapter(true, true).await;
        if !self.pause(self.timing.post_enable_settle).await {
            return Ok(());
        }

        loop {
            if let Cycle::Shutdown = self.run_cycle().await? {
                info!("ethernet checker stopped");
                return Ok(());
            }
        }
    }

    /// Run a single cycle: remediation check, probe round, state update, pause.
    pub async fn run_cycle(&mut self) -> Result<Cycle, WatchdogError> {
        if self.stop_requested() {
            return Ok(Cycle::Shutdown);
        }

        let tier = self.state.tier();
        match tier {
            RemediationTier::Reboot => return self.reboot().await,
            RemediationTier::AdapterReset => {
                if !self.reset_adapter().await {
                    return Ok(Cycle::Shutdown);
                }
            }
            RemediationTier::None => {}
        }

        let packets_requested = self.state.packet_count();
        let outcome = self.prober.probe(&self.target, packets_requested).await;
        let consecutive_failures = self.state.record(&outcome);

        let pause = if outcome.is_failure() {
            if outcome.valid {
                warn!(
                    attempt = consecutive_failures,
                    packets = packets_requested,
                    "unable to ping the router, try {consecutive_failures}/{REBOOT_THRESHOLD}: {outcome}"
                );
            } else {
                warn!(
                    attempt = consecutive_failures,
                    packets = packets_requested,
                    "unable to ping the router, try {consecutive_failures}/{REBOOT_THRESHOLD}: pinger results unavailable"
                );
            }
            self.timing.failure_pause
        } else {
            info!("ping OK -> {outcome}");
            self.timing.success_pause
        };

        if !self.pause(pause).await {
            return Ok(Cycle::Shutdown);
        }

        Ok(Cycle::Completed(CycleReport {
            tier,
            packets_requested,
            outcome,
            consecutive_failures,
        }))
    }

    /// Disable, then re-enable the adapter.
    ///
    /// Toggle errors are logged and otherwise ignored: if the reset does
    /// not help, the failure count keeps climbing toward a reboot.
    /// Returns `false` if shutdown was requested while waiting.
    pub async fn reset_adapter(&mut self) -> bool {
        warn!(adapter = %self.adapter, "resetting ethernet adapter");
        self.toggle_adapter(false, false).await;
        if !self.pause(self.timing.adapter_toggle_gap).await {
            return false;
        }
        self.toggle_adapter(true, false).await;
        if !self.pause(self.timing.adapter_settle).await {
            return false;
        }
        warn!(adapter = %self.adapter, "ethernet adapter has been reset");
        true
    }

    /// Enable the adapter and restart the machine.
    ///
    /// The OS is expected to kill the process during `reboot_wait`;
    /// surviving it is unrecoverable, as is failing to issue the reboot.
    async fn reboot(&mut self) -> Result<Cycle, WatchdogError> {
        warn!(
            failures = self.state.consecutive_failures(),
            "router unreachable after {REBOOT_THRESHOLD} tries, rebooting"
        );
        self.toggle_adapter(true, false).await;
        if !self.pause(self.timing.pre_reboot_gap).await {
            return Ok(Cycle::Shutdown);
        }

        let output = self
            .remediator
            .reboot()
            .await
            .map_err(WatchdogError::RebootFailed)?;
        warn!(%output, "rebooting the system");

        if !self.pause(self.timing.reboot_wait).await {
            return Ok(Cycle::Shutdown);
        }
        Err(WatchdogError::RebootDidNotTakeEffect {
            waited: self.timing.reboot_wait,
        })
    }

    async fn toggle_adapter(&self, enable: bool, quiet: bool) {
        let action = if enable { "enabled" } else { "disabled" };
        match self.remediator.set_adapter(&self.adapter, enable).await {
            Ok(output) if quiet => {
                info!(adapter = %self.adapter, %output, "ethernet adapter {action}");
            }
            Ok(output) => {
                warn!(adapter = %self.adapter, %output, "ethernet adapter {action}");
            }
            Err(e) => {
                error!(adapter = %self.adapter, error = %e, "failed to toggle ethernet adapter");
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleep for `duration`. Returns `false` if shutdown was requested.
    async fn pause(&mut self, duration: Duration) -> bool {
        let Some(shutdown) = self.shutdown.as_mut() else {
            tokio::time::sleep(duration).await;
            return true;
        };
        if *shutdown.borrow() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = stop_signal(shutdown) => false,
        }
    }
}

/// Resolves once the shutdown flag turns `true`.
async fn stop_signal(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // Sender gone: no stop can arrive any more.
        std::future::pending::<()>().await;
    }
}
