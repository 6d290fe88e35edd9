use crate::infrastructure::error::InfraError;
use chrono::Utc;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

pub const LOG_FILE_NAME: &str = "timeline.log";

static LOGGER: OnceLock<JsonLinesLogger> = OnceLock::new();
static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Appends one JSON object per record to `<logs_dir>/timeline.log`.
struct JsonLinesLogger {
    logs_dir: PathBuf,
    level: LevelFilter,
    write_guard: Mutex<()>,
}

impl JsonLinesLogger {
    fn path(&self) -> PathBuf {
        self.logs_dir.join(LOG_FILE_NAME)
    }
}

impl Log for JsonLinesLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Ok(_guard) = self.write_guard.lock() else {
            return;
        };
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": record.level().as_str().to_ascii_lowercase(),
            "target": record.target(),
            "message": record.args().to_string(),
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(self.path()) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn flush(&self) {}
}

/// Installs the JSON-lines file sink as the process-wide `log` backend.
///
/// Repeating the call with the same directory and level is a no-op. A
/// different directory or level is rejected once a sink is active.
pub fn init_logging(logs_dir: &Path, level: &str) -> Result<(), InfraError> {
    let level = parse_level(level)?;
    if let Some(active) = LOGGER.get() {
        return ensure_matches(active, logs_dir, level);
    }

    fs::create_dir_all(logs_dir)?;
    let logger = LOGGER.get_or_init(|| JsonLinesLogger {
        logs_dir: logs_dir.to_path_buf(),
        level,
        write_guard: Mutex::new(()),
    });
    ensure_matches(logger, logs_dir, level)?;

    let installed = *INSTALLED.get_or_init(|| {
        log::set_logger(logger)
            .map(|()| log::set_max_level(logger.level))
            .is_ok()
    });
    if !installed {
        return Err(InfraError::InvalidConfig(
            "another logger is already installed for this process".to_string(),
        ));
    }

    log::info!(
        target: "calendar_timeline::logging",
        "logging initialized level={} log_dir={}",
        logger.level,
        logger.logs_dir.display()
    );
    Ok(())
}

/// Directory of the active sink, if one is installed.
pub fn active_logs_dir() -> Option<PathBuf> {
    LOGGER.get().map(|logger| logger.logs_dir.clone())
}

fn ensure_matches(
    active: &JsonLinesLogger,
    logs_dir: &Path,
    level: LevelFilter,
) -> Result<(), InfraError> {
    if active.logs_dir != logs_dir {
        return Err(InfraError::InvalidConfig(format!(
            "logging already initialized at {}; refusing to switch to {}",
            active.logs_dir.display(),
            logs_dir.display()
        )));
    }
    if active.level != level {
        return Err(InfraError::InvalidConfig(format!(
            "logging already initialized with level {}; refusing to switch to {}",
            active.level, level
        )));
    }
    Ok(())
}

fn parse_level(level: &str) -> Result<LevelFilter, InfraError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        "off" => Ok(LevelFilter::Off),
        other => Err(InfraError::InvalidConfig(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        ))),
    }
}
