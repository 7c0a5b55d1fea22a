//! netrevive-health — gateway probing and remediation escalation.
//!
//! Probes the configured gateway with ICMP echo rounds and escalates
//! through adapter reset and reboot when it stays unreachable.
//!
//! # Architecture
//!
//! ```text
//! EscalationController (single sequential loop)
//!   ├── EscalationState (consecutive failures, packet count)
//!   ├── Prober::probe() → ProbeOutcome        (PingProber)
//!   └── Remediator::set_adapter() / reboot()  (SystemRemediator)
//! ```
//!
//! # Escalation
//!
//! Before each round the failure count of earlier rounds selects a tier:
//! `>= 6` reboots, `>= 4` resets the adapter, anything lower does nothing.
//! Each failed round doubles the packet count (2 → 4 → 8, capped at 8);
//! any reply resets both the count and the packet count.

pub mod controller;
pub mod escalation;
pub mod probe;
pub mod remediation;

pub use controller::{Cycle, CycleReport, CycleTiming, EscalationController};
pub use escalation::EscalationState;
pub use probe::{PingFlavor, PingProber, Prober};
pub use remediation::{Remediator, SystemRemediator};
