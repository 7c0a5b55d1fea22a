//! Logging setup and the on-disk incident log.
//!
//! Everything goes to stderr through `tracing-subscriber`. Warnings and
//! errors are additionally appended to `NetRevive.log` next to the
//! executable, which keeps only its most recent lines.

use std::fmt::{self, Write as _};
use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const INCIDENT_LOG_FILE_NAME: &str = "NetRevive.log";
pub const INCIDENT_LOG_MAX_LINES: usize = 1000;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Console filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,netrevive=debug";

/// Event field marking a record that ends the process.
pub const FATAL_FIELD: &str = "fatal";

/// Install the global subscriber.
///
/// `incidents` is `None` when incident logging is disabled in the settings.
pub fn init(incidents: Option<IncidentLog>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter))
        .with(incidents.map(|log| IncidentLayer::new(log).with_filter(LevelFilter::WARN)))
        .init();
}

/// Append-only log file truncated to its last `max_lines` lines.
#[derive(Debug)]
pub struct IncidentLog {
    path: PathBuf,
    max_lines: usize,
    lock: Mutex<()>,
}

impl IncidentLog {
    pub fn new(path: impl Into<PathBuf>, max_lines: usize) -> Self {
        Self {
            path: path.into(),
            max_lines,
            lock: Mutex::new(()),
        }
    }

    /// `NetRevive.log` in the directory of the running executable.
    pub fn default_path() -> io::Result<PathBuf> {
        let exe = std::env::current_exe()?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(dir.join(INCIDENT_LOG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entry` and drop the oldest lines beyond the limit.
    pub fn append(&self, entry: &str) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            writeln!(file, "{entry}")?;
        }

        let content = fs::read_to_string(&self.path)?;
        let lines: Vec<&str> = content.lines().collect();
        if lines.len() > self.max_lines {
            let mut kept = lines[lines.len() - self.max_lines..].join("\n");
            kept.push('\n');
            fs::write(&self.path, kept)?;
        }
        Ok(())
    }
}

/// Layer persisting events into an [`IncidentLog`].
pub struct IncidentLayer {
    log: Arc<IncidentLog>,
}

impl IncidentLayer {
    pub fn new(log: IncidentLog) -> Self {
        Self { log: Arc::new(log) }
    }
}

impl<S: Subscriber> Layer<S> for IncidentLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN {
            return;
        }

        let mut visitor = IncidentVisitor::default();
        event.record(&mut visitor);

        let entry = format_entry(
            &chrono::Local::now().format(TIME_FORMAT).to_string(),
            level_tag(level, visitor.fatal),
            &visitor.message,
            &visitor.fields,
        );
        if let Err(e) = self.log.append(&entry) {
            // Never let a full disk or a locked file disturb the watchdog.
            eprintln!("failed to write {}: {e}", self.log.path().display());
        }
    }
}

fn level_tag(level: Level, fatal: bool) -> &'static str {
    match level {
        Level::ERROR if fatal => "FATL",
        Level::ERROR => "ERRO",
        Level::WARN => "WARN",
        _ => level.as_str(),
    }
}

fn format_entry(timestamp: &str, tag: &str, message: &str, fields: &str) -> String {
    format!("[{timestamp}] [{tag}] {message}{fields}")
}

#[derive(Default)]
struct IncidentVisitor {
    message: String,
    fields: String,
    fatal: bool,
}

impl Visit for IncidentVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == FATAL_FIELD {
            self.fatal = value;
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
