//! Escalation state machine.
//!
//! Tracks consecutive probe failures and the packet count of the next
//! round. The remediation tier is derived from the failure count that
//! was accumulated by *previous* rounds, so a tier fires on the cycle
//! after the round that crossed its threshold.

use tracing::debug;

use netrevive_core::{
    BASE_PACKET_COUNT, MAX_PACKET_COUNT, ProbeOutcome, RemediationTier,
};

/// Mutable run-time state of the watchdog. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationState {
    /// Probe rounds since the last round with at least one reply.
    consecutive_failures: u32,
    /// Packets to send in the next round.
    packet_count: u32,
}

impl Default for EscalationState {
    fn default() -> Self {
        Self::new()
    }
}

impl EscalationState {
    pub fn new() -> Self {
        Self {
            consecutive_failures: 0,
            packet_count: BASE_PACKET_COUNT,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Packets for the next probe round, within `1..=MAX_PACKET_COUNT`.
    pub fn packet_count(&self) -> u32 {
        self.packet_count.clamp(1, MAX_PACKET_COUNT)
    }

    /// Remediation due before the next probe round.
    pub fn tier(&self) -> RemediationTier {
        RemediationTier::for_failures(self.consecutive_failures)
    }

    /// Fold a probe outcome into the state and return the new failure count.
    pub fn record(&mut self, outcome: &ProbeOutcome) -> u32 {
        if outcome.is_failure() {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            // Doubling past the cap is indistinguishable from the cap itself.
            self.packet_count = self.packet_count.saturating_mul(2).min(MAX_PACKET_COUNT);
        } else {
            if self.consecutive_failures > 0 {
                debug!(
                    failures = self.consecutive_failures,
                    "gateway reachable again, resetting escalation"
                );
            }
            self.consecutive_failures = 0;
            self.packet_count = BASE_PACKET_COUNT;
        }
        self.consecutive_failures
    }
}
