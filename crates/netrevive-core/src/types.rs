//! Shared types used across NetRevive crates.

use std::fmt;

/// Consecutive failures after which the adapter is reset before probing.
pub const ADAPTER_RESET_THRESHOLD: u32 = 4;
/// Consecutive failures after which the host is rebooted before probing.
/// Must stay above [`ADAPTER_RESET_THRESHOLD`].
pub const REBOOT_THRESHOLD: u32 = 6;

/// Packets sent in a round after a success (and on the first round).
pub const BASE_PACKET_COUNT: u32 = 2;
/// Upper bound on packets sent in one round.
pub const MAX_PACKET_COUNT: u32 = 8;

/// Aggregate statistics of one probe round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub packets_sent: u32,
    pub packets_received: u32,
    /// Fraction of packets lost, 0.0 to 1.0.
    pub loss: f64,
    /// False when the probe could not be executed at all.
    pub valid: bool,
}

impl ProbeOutcome {
    /// Build a valid outcome from raw counts.
    pub fn from_counts(sent: u32, received: u32) -> Self {
        let received = received.min(sent);
        let loss = if sent == 0 {
            1.0
        } else {
            f64::from(sent - received) / f64::from(sent)
        };
        Self {
            packets_sent: sent,
            packets_received: received,
            loss,
            valid: true,
        }
    }

    /// The probe mechanism could not be constructed or failed while running.
    pub fn unavailable() -> Self {
        Self {
            packets_sent: 0,
            packets_received: 0,
            loss: 1.0,
            valid: false,
        }
    }

    /// No packet came back, or the probe never ran.
    pub fn is_failure(&self) -> bool {
        !self.valid || self.packets_received == 0
    }

    pub fn loss_percent(&self) -> f64 {
        self.loss * 100.0
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sent: {} Recv: {} Loss: {:.0}%",
            self.packets_sent,
            self.packets_received,
            self.loss_percent()
        )
    }
}

/// Remediation applied before a probe round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RemediationTier {
    None,
    /// Disable then re-enable the adapter.
    AdapterReset,
    /// Restart the machine.
    Reboot,
}

impl RemediationTier {
    /// Select the tier for a consecutive-failure count, most severe first.
    pub fn for_failures(failures: u32) -> Self {
        if failures >= REBOOT_THRESHOLD {
            RemediationTier::Reboot
        } else if failures >= ADAPTER_RESET_THRESHOLD {
            RemediationTier::AdapterReset
        } else {
            RemediationTier::None
        }
    }
}

impl fmt::Display for RemediationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationTier::None => write!(f, "none"),
            RemediationTier::AdapterReset => write!(f, "adapter-reset"),
            RemediationTier::Reboot => write!(f, "reboot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_thresholds() {
        assert_eq!(RemediationTier::for_failures(0), RemediationTier::None);
        assert_eq!(RemediationTier::for_failures(3), RemediationTier::None);
        assert_eq!(RemediationTier::for_failures(4), RemediationTier::AdapterReset);
        assert_eq!(RemediationTier::for_failures(5), RemediationTier::AdapterReset);
        assert_eq!(RemediationTier::for_failures(6), RemediationTier::Reboot);
        assert_eq!(RemediationTier::for_failures(40), RemediationTier::Reboot);
    }

    #[test]
    fn reboot_wins_over_adapter_reset() {
        // 6 satisfies both thresholds; only the stronger tier is chosen.
        assert!(REBOOT_THRESHOLD > ADAPTER_RESET_THRESHOLD);
        assert_eq!(
            RemediationTier::for_failures(REBOOT_THRESHOLD),
            RemediationTier::Reboot
        );
    }

    #[test]
    fn outcome_loss_from_counts() {
        let outcome = ProbeOutcome::from_counts(4, 1);
        assert!(outcome.valid);
        assert!((outcome.loss - 0.75).abs() < f64::EPSILON);
        assert!(!outcome.is_failure());
        assert_eq!(outcome.to_string(), "Sent: 4 Recv: 1 Loss: 75%");
    }

    #[test]
    fn zero_received_is_failure() {
        let outcome = ProbeOutcome::from_counts(2, 0);
        assert!(outcome.valid);
        assert!(outcome.is_failure());
        assert_eq!(outcome.loss, 1.0);
    }

    #[test]
    fn unavailable_is_failure() {
        let outcome = ProbeOutcome::unavailable();
        assert!(!outcome.valid);
        assert_eq!(outcome.packets_received, 0);
        assert!(outcome.is_failure());
    }

    #[test]
    fn received_never_exceeds_sent() {
        // Duplicate replies must not produce negative loss.
        let outcome = ProbeOutcome::from_counts(2, 3);
        assert_eq!(outcome.packets_received, 2);
        assert_eq!(outcome.loss, 0.0);
    }
}
