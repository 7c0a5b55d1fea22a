//! Error types shared across NetRevive crates.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors reading or writing the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Errors from the OS-level remediation commands.
#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },
}

/// Unrecoverable conditions that end the watchdog loop.
///
/// The binary turns these into a process exit; nothing inside the loop
/// terminates the process on its own.
#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("failed to reboot the host: {0}")]
    RebootFailed(#[source] RemediationError),

    #[error("reboot was issued but the host was still running after {waited:?}")]
    RebootDidNotTakeEffect { waited: Duration },
}
