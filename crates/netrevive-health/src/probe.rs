//! Probe executor.
//!
//! One call sends a round of ICMP echo requests to the gateway and
//! reports aggregate statistics. The system `ping` binary does the ICMP
//! work so the daemon needs no raw-socket handling of its own.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, error};

use netrevive_core::{MAX_PACKET_COUNT, ProbeOutcome};

/// Total time a probe round may take, child process included.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// Executes one probe round against a target.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Send `count` echo requests to `target`.
    ///
    /// Never fails: a probe that cannot run yields
    /// [`ProbeOutcome::unavailable`].
    async fn probe(&self, target: &str, count: u32) -> ProbeOutcome;
}

/// Output dialect of the platform `ping` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingFlavor {
    /// iputils / BSD ping (Linux, macOS).
    Unix,
    /// `ping.exe`.
    Windows,
}

impl PingFlavor {
    /// Dialect of the platform this binary was built for.
    pub fn native() -> Self {
        if cfg!(windows) {
            PingFlavor::Windows
        } else {
            PingFlavor::Unix
        }
    }

    /// Arguments for one round of `count` packets at 1 s intervals, waiting
    /// at most one second per reply.
    pub fn args(&self, target: &str, count: u32, deadline: Duration) -> Vec<String> {
        match self {
            PingFlavor::Unix => {
                // BSD ping takes the reply wait in milliseconds and the deadline as -t.
                let (reply_wait, deadline_flag) = if cfg!(target_os = "macos") {
                    ("1000", "-t")
                } else {
                    ("1", "-w")
                };
                vec![
                    "-n".to_string(),
                    "-c".to_string(),
                    count.to_string(),
                    "-i".to_string(),
                    "1".to_string(),
                    "-W".to_string(),
                    reply_wait.to_string(),
                    deadline_flag.to_string(),
                    deadline.as_secs().max(1).to_string(),
                    target.to_string(),
                ]
            }
            // ping.exe paces replies at one second and has no overall deadline.
            PingFlavor::Windows => vec![
                "-n".to_string(),
                count.to_string(),
                "-w".to_string(),
                "1000".to_string(),
                target.to_string(),
            ],
        }
    }

    /// Extract round statistics from ping output.
    ///
    /// Returns `None` when the output carries no statistics at all, for
    /// example when the host name could not be resolved.
    pub fn parse(&self, output: &str, requested: u32) -> Option<ProbeOutcome> {
        match self {
            PingFlavor::Unix => {
                let caps = unix_summary_re().captures(output)?;
                let sent = caps[1].parse().ok()?;
                let received = caps[2].parse().ok()?;
                Some(ProbeOutcome::from_counts(sent, received))
            }
            PingFlavor::Windows => {
                if output.trim().is_empty() {
                    return None;
                }
                // Localised builds print the summary in another language.
                let sent = windows_summary_re()
                    .captures(output)
                    .and_then(|caps| caps[1].parse().ok())
                    .unwrap_or(requested);
                // The summary counts "destination unreachable" answers as
                // received; echo replies always carry TTL=.
                let replies = output
                    .lines()
                    .filter(|line| line.to_ascii_uppercase().contains("TTL="))
                    .count();
                let received = u32::try_from(replies).unwrap_or(u32::MAX);
                Some(ProbeOutcome::from_counts(sent, received))
            }
        }
    }
}

fn windows_summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Sent = (\d+), Received = (\d+)").expect("static regex is valid")
    })
}

fn unix_summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received")
            .expect("static regex is valid")
    })
}

/// [`Prober`] backed by the system `ping` command.
#[derive(Debug, Clone)]
pub struct PingProber {
    program: String,
    flavor: PingFlavor,
    timeout: Duration,
}

impl Default for PingProber {
    fn default() -> Self {
        Self::new()
    }
}

impl PingProber {
    pub fn new() -> Self {
        Self {
            program: "ping".to_string(),
            flavor: PingFlavor::native(),
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the round timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a different `ping` executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, target: &str, count: u32) -> Result<ProbeOutcome, String> {
        if target.is_empty() || target.starts_with('-') {
            return Err(format!("refusing to probe target {target:?}"));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(self.flavor.args(target, count, self.timeout))
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("failed to start {}: {e}", self.program)),
            Err(_) => return Err(format!("probe exceeded {:?}", self.timeout)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(status = %output.status, %target, "ping finished");

        // Total loss exits non-zero but still prints a usable summary.
        self.flavor.parse(&stdout, count).ok_or_else(|| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            format!(
                "no statistics in ping output ({}): {}",
                output.status,
                stderr.trim()
            )
        })
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, target: &str, count: u32) -> ProbeOutcome {
        let count = count.clamp(1, MAX_PACKET_COUNT);
        match self.run(target, count).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, %target, "error running pinger");
                ProbeOutcome::unavailable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_OK: &str = "\
PING 192.168.178.1 (192.168.178.1) 56(84) bytes of data.
64 bytes from 192.168.178.1: icmp_seq=1 ttl=64 time=0.512 ms
64 bytes from 192.168.178.1: icmp_seq=2 ttl=64 time=0.498 ms

--- 192.168.178.1 ping statistics ---
2 packets transmitted, 2 received, 0% packet loss, time 1001ms
rtt min/avg/max/mdev = 0.498/0.505/0.512/0.007 ms
";

    const LINUX_LOSS: &str = "\
PING 192.168.178.1 (192.168.178.1) 56(84) bytes of data.

--- 192.168.178.1 ping statistics ---
4 packets transmitted, 0 received, +4 errors, 100% packet loss, time 3060ms
";

    const MACOS_PARTIAL: &str = "\
--- 10.0.0.1 ping statistics ---
8 packets transmitted, 6 packets received, 25.0% packet loss
round-trip min/avg/max/stddev = 1.1/1.5/2.0/0.3 ms
";

    const WINDOWS_OK: &str = "\
Pinging 192.168.178.1 with 32 bytes of data:
Reply from 192.168.178.1: bytes=32 time<1ms TTL=64
Reply from 192.168.178.1: bytes=32 time=1ms TTL=64

Ping statistics for 192.168.178.1:
    Packets: Sent = 2, Received = 2, Lost = 0 (0% loss),
";

    const WINDOWS_UNREACHABLE: &str = "\
Pinging 192.168.178.1 with 32 bytes of data:
Reply from 192.168.178.20: Destination host unreachable.
Reply from 192.168.178.20: Destination host unreachable.

Ping statistics for 192.168.178.1:
    Packets: Sent = 2, Received = 2, Lost = 0 (0% loss),
";

    #[test]
    fn parses_linux_success() {
        let outcome = PingFlavor::Unix.parse(LINUX_OK, 2).unwrap();
        assert_eq!(outcome, ProbeOutcome::from_counts(2, 2));
        assert!(!outcome.is_failure());
    }

    #[test]
    fn parses_linux_total_loss() {
        let outcome = PingFlavor::Unix.parse(LINUX_LOSS, 4).unwrap();
        assert_eq!(outcome.packets_sent, 4);
        assert_eq!(outcome.packets_received, 0);
        assert!(outcome.valid);
        assert!(outcome.is_failure());
    }

    #[test]
    fn parses_macos_summary() {
        let outcome = PingFlavor::Unix.parse(MACOS_PARTIAL, 8).unwrap();
        assert_eq!(outcome.packets_sent, 8);
        assert_eq!(outcome.packets_received, 6);
        assert!((outcome.loss - 0.25).abs() < 1e-9);
    }

    #[test]
    fn unix_output_without_summary_is_unparsable() {
        let output = "ping: unknown host router.invalid\n";
        assert_eq!(PingFlavor::Unix.parse(output, 2), None);
    }

    #[test]
    fn parses_windows_replies() {
        let outcome = PingFlavor::Windows.parse(WINDOWS_OK, 2).unwrap();
        assert_eq!(outcome, ProbeOutcome::from_counts(2, 2));
    }

    #[test]
    fn windows_unreachable_replies_are_not_received() {
        let outcome = PingFlavor::Windows.parse(WINDOWS_UNREACHABLE, 2).unwrap();
        assert_eq!(outcome.packets_received, 0);
        assert!(outcome.is_failure());
    }

    #[test]
    fn windows_sent_count_comes_from_summary() {
        let output = "\
Reply from 192.168.178.1: bytes=32 time=1ms TTL=64

    Packets: Sent = 3, Received = 1, Lost = 2 (66% loss),
";
        let outcome = PingFlavor::Windows.parse(output, 4).unwrap();
        assert_eq!(outcome, ProbeOutcome::from_counts(3, 1));
    }

    #[test]
    fn windows_localised_summary_falls_back_to_requested() {
        let output = "\
Antwort von 192.168.178.1: Bytes=32 Zeit<1ms TTL=64

    Pakete: Gesendet = 2, Empfangen = 1, Verloren = 1
";
        let outcome = PingFlavor::Windows.parse(output, 2).unwrap();
        assert_eq!(outcome, ProbeOutcome::from_counts(2, 1));
    }

    #[test]
    fn unix_args_carry_count_reply_wait_and_deadline() {
        let args = PingFlavor::Unix.args("192.168.178.1", 4, PROBE_TIMEOUT);
        assert_eq!(args[0..6], ["-n", "-c", "4", "-i", "1", "-W"]);
        assert_eq!(args[8], "20");
        assert_eq!(args.last().map(String::as_str), Some("192.168.178.1"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_args_match_iputils() {
        let args = PingFlavor::Unix.args("192.168.178.1", 2, PROBE_TIMEOUT);
        assert_eq!(
            args,
            ["-n", "-c", "2", "-i", "1", "-W", "1", "-w", "20", "192.168.178.1"]
        );
    }

    #[test]
    fn windows_args_carry_count() {
        let args = PingFlavor::Windows.args("gateway", 8, PROBE_TIMEOUT);
        assert_eq!(args, ["-n", "8", "-w", "1000", "gateway"]);
    }

    #[tokio::test]
    async fn missing_binary_yields_unavailable() {
        let prober = PingProber::new().with_program("netrevive-no-such-ping-binary");
        let outcome = prober.probe("127.0.0.1", 2).await;
        assert_eq!(outcome, ProbeOutcome::unavailable());
    }

    #[tokio::test]
    async fn option_like_target_is_rejected() {
        let outcome = PingProber::new().probe("-f", 2).await;
        assert!(!outcome.valid);
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn hung_ping_is_cut_off_at_round_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hung-ping");
        std::fs::write(&script, "#!/bin/sh\nsleep 120\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let prober = PingProber::new().with_program(script.to_string_lossy());
        let started = tokio::time::Instant::now();
        let outcome = prober.probe("192.168.178.1", 2).await;

        assert_eq!(outcome, ProbeOutcome::unavailable());
        assert_eq!(started.elapsed(), PROBE_TIMEOUT);
    }
}
