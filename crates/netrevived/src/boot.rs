//! Boot options that keep an unattended machine rebooting.
//!
//! After several failed boots Windows stops at a recovery screen that
//! waits for keyboard input. The watchdog may reboot the host many times
//! in a row, so that screen is disabled on startup.

use tracing::debug;

use netrevive_health::remediation::{self, CommandLine};

/// `bcdedit` invocations applied on startup.
pub fn hardening_commands() -> Vec<CommandLine> {
    vec![
        CommandLine {
            program: "bcdedit",
            args: ["/set", "{current}", "bootstatuspolicy", "IgnoreAllFailures"]
                .map(String::from)
                .to_vec(),
        },
        CommandLine {
            program: "bcdedit",
            args: ["/set", "recoveryenabled", "NO"].map(String::from).to_vec(),
        },
    ]
}

/// Whether [`harden`] changes anything on this platform.
pub fn applies() -> bool {
    cfg!(windows)
}

/// How to revert [`harden`], shown when the service is uninstalled.
pub const UNDO_INSTRUCTIONS: &str = "\
To prevent the operating system from getting stuck on a manual input screen after repeated reboots,
NetRevive applied these boot options on Windows:
    bcdedit /set {current} bootstatuspolicy IgnoreAllFailures
    bcdedit /set recoveryenabled NO

To undo them, run:
    bcdedit /set {current} bootstatuspolicy DisplayAllFailures
    bcdedit /set recoveryenabled YES";

/// Apply the boot options. Does nothing outside Windows.
pub async fn harden() -> anyhow::Result<()> {
    if !applies() {
        debug!("boot hardening not needed on this platform");
        return Ok(());
    }

    for command in hardening_commands() {
        let rendered = format!("{} {}", command.program, command.args.join(" "));
        remediation::run(command)
            .await
            .map_err(|e| anyhow::anyhow!("error setting boot option `{rendered}`: {e}"))?;
    }
    debug!("boot options applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_disable_recovery_prompts() {
        let commands = hardening_commands();
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| c.program == "bcdedit"));
        assert_eq!(commands[0].args.last().map(String::as_str), Some("IgnoreAllFailures"));
        assert_eq!(commands[1].args, ["/set", "recoveryenabled", "NO"]);
    }

    #[test]
    fn undo_instructions_revert_every_option() {
        let (applied, undo) = UNDO_INSTRUCTIONS
            .split_once("To undo them")
            .expect("undo section present");
        for command in hardening_commands() {
            let rendered = format!("{} {}", command.program, command.args.join(" "));
            assert!(applied.contains(&rendered), "{rendered} not listed");

            let (option, value) = rendered.rsplit_once(' ').unwrap();
            let undo_line = undo
                .lines()
                .map(str::trim)
                .find(|line| line.starts_with(option))
                .unwrap_or_else(|| panic!("no undo for {option}"));
            assert_ne!(undo_line, rendered);
            assert!(!undo_line.ends_with(value));
        }
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn harden_is_noop_off_windows() {
        assert!(harden().await.is_ok());
    }
}
