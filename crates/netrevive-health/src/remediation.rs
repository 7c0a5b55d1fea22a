//! OS-level remediation primitives: toggling the adapter and rebooting.
//!
//! These only execute commands. Deciding when to call them belongs to
//! the controller.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use netrevive_core::RemediationError;

/// Executes remediation commands against the host.
#[async_trait]
pub trait Remediator: Send + Sync {
    /// Enable or disable the named adapter. Returns the command output.
    async fn set_adapter(&self, adapter: &str, enable: bool) -> Result<String, RemediationError>;

    /// Ask the OS to restart the machine. Returns the command output.
    async fn reboot(&self) -> Result<String, RemediationError>;
}

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: &'static str,
    pub args: Vec<String>,
}

/// Command toggling `adapter` on this platform.
pub fn adapter_command(adapter: &str, enable: bool) -> CommandLine {
    if cfg!(windows) {
        let action = if enable { "enable" } else { "disable" };
        CommandLine {
            program: "netsh",
            args: vec![
                "interface".to_string(),
                "set".to_string(),
                "interface".to_string(),
                format!("name={adapter}"),
                action.to_string(),
            ],
        }
    } else {
        let state = if enable { "up" } else { "down" };
        CommandLine {
            program: "ip",
            args: vec![
                "link".to_string(),
                "set".to_string(),
                "dev".to_string(),
                adapter.to_string(),
                state.to_string(),
            ],
        }
    }
}

/// Command restarting the machine on this platform.
pub fn reboot_command() -> CommandLine {
    if cfg!(windows) {
        CommandLine {
            program: "shutdown",
            args: vec!["/r".to_string()],
        }
    } else {
        CommandLine {
            program: "shutdown",
            args: vec!["-r".to_string(), "now".to_string()],
        }
    }
}

/// [`Remediator`] that shells out to the platform network and power tools.
#[derive(Debug, Clone, Default)]
pub struct SystemRemediator;

impl SystemRemediator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Remediator for SystemRemediator {
    async fn set_adapter(&self, adapter: &str, enable: bool) -> Result<String, RemediationError> {
        run(adapter_command(adapter, enable)).await
    }

    async fn reboot(&self) -> Result<String, RemediationError> {
        run(reboot_command()).await
    }
}

/// Run a command to completion and return its trimmed combined output.
pub async fn run(command: CommandLine) -> Result<String, RemediationError> {
    debug!(program = command.program, args = ?command.args, "running remediation command");

    let output = Command::new(command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| RemediationError::Spawn {
            program: command.program.to_string(),
            source,
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let combined = combined.trim().to_string();

    if !output.status.success() {
        return Err(RemediationError::Failed {
            program: command.program.to_string(),
            status: output.status.to_string(),
            output: combined,
        });
    }

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_command_names_the_adapter() {
        let enable = adapter_command("Ethernet 2", true);
        let disable = adapter_command("Ethernet 2", false);
        assert_eq!(enable.program, disable.program);

        if cfg!(windows) {
            assert!(enable.args.contains(&"name=Ethernet 2".to_string()));
            assert_eq!(enable.args.last().map(String::as_str), Some("enable"));
            assert_eq!(disable.args.last().map(String::as_str), Some("disable"));
        } else {
            assert_eq!(enable.args, ["link", "set", "dev", "Ethernet 2", "up"]);
            assert_eq!(disable.args, ["link", "set", "dev", "Ethernet 2", "down"]);
        }
    }

    #[test]
    fn reboot_command_restarts() {
        let cmd = reboot_command();
        assert_eq!(cmd.program, "shutdown");
        assert!(cmd.args.iter().any(|a| a == "/r" || a == "-r"));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = run(CommandLine {
            program: "netrevive-no-such-tool",
            args: vec![],
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RemediationError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_failed_with_output() {
        let err = run(CommandLine {
            program: "sh",
            args: vec!["-c".to_string(), "echo no such device >&2; exit 1".to_string()],
        })
        .await
        .unwrap_err();
        match err {
            RemediationError::Failed { output, .. } => assert_eq!(output, "no such device"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_returns_trimmed_output() {
        let out = run(CommandLine {
            program: "sh",
            args: vec!["-c".to_string(), "echo '  link up  '".to_string()],
        })
        .await
        .unwrap();
        assert_eq!(out, "link up");
    }
}
