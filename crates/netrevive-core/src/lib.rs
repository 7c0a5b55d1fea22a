pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigOrigin, Settings};
pub use error::{ConfigError, RemediationError, WatchdogError};
pub use types::*;
