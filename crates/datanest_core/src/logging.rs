//! Logging bootstrap for container tooling.
//!
//! # Responsibility
//! - Start rotating file logs once per process from a [`LoggingConfig`].
//! - Record panics as sanitized `panic_captured` events.
//!
//! # Invariants
//! - Initialization never panics.
//! - A second call with an equal config is a no-op; any other config is
//!   rejected while logging is active.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "datanest";
const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

/// File logging settings. Missing fields take defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub max_file_size_bytes: u64,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: std::env::temp_dir().join(LOG_FILE_BASENAME).join("logs"),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: level.into(),
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }
}

/// Normalized form of a config, compared on re-initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveConfig {
    level: &'static str,
    log_dir: PathBuf,
    max_file_size_bytes: u64,
    max_files: usize,
}

struct LoggingState {
    active: ActiveConfig,
    _logger: LoggerHandle,
}

/// Starts file logging.
///
/// # Errors
/// - Unsupported level, relative or empty `log_dir`, zero rotation limits.
/// - The log directory cannot be created or the backend fails to start.
/// - Logging is already active with a different config.
pub fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    let requested = normalize(config)?;

    if let Some(state) = LOGGING_STATE.get() {
        return ensure_same(&state.active, &requested);
    }

    let state = LOGGING_STATE.get_or_try_init(|| start(requested.clone()))?;
    ensure_same(&state.active, &requested)
}

/// Active `(level, log_dir)`, or `None` before initialization.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.active.level, state.active.log_dir.clone()))
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(active: ActiveConfig) -> Result<LoggingState, String> {
    std::fs::create_dir_all(&active.log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            active.log_dir.display()
        )
    })?;

    let logger = Logger::try_with_str(active.level)
        .map_err(|err| format!("invalid log level `{}`: {err}", active.level))?
        .log_to_file(
            FileSpec::default()
                .directory(active.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(active.max_file_size_bytes),
            Naming::Numbers,
            Cleanup::KeepLogFiles(active.max_files),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook_once();

    info!(
        "event=logging_init module=logging status=ok level={} log_dir={} max_file_size_bytes={} max_files={} version={}",
        active.level,
        active.log_dir.display(),
        active.max_file_size_bytes,
        active.max_files,
        env!("CARGO_PKG_VERSION")
    );

    Ok(LoggingState {
        active,
        _logger: logger,
    })
}

fn ensure_same(active: &ActiveConfig, requested: &ActiveConfig) -> Result<(), String> {
    if active == requested {
        return Ok(());
    }
    Err(format!(
        "logging already initialized with level `{}` at `{}`; refusing to switch to level `{}` at `{}`",
        active.level,
        active.log_dir.display(),
        requested.level,
        requested.log_dir.display()
    ))
}

fn normalize(config: &LoggingConfig) -> Result<ActiveConfig, String> {
    if config.max_file_size_bytes == 0 || config.max_files == 0 {
        return Err("max_file_size_bytes and max_files must be positive".to_string());
    }
    Ok(ActiveConfig {
        level: normalize_level(&config.level)?,
        log_dir: normalize_log_dir(&config.log_dir)?,
        max_file_size_bytes: config.max_file_size_bytes,
        max_files: config.max_files,
    })
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &Path) -> Result<PathBuf, String> {
    if log_dir.as_os_str().is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    if !log_dir.is_absolute() {
        return Err(format!(
            "log_dir must be an absolute path, got `{}`",
            log_dir.display()
        ));
    }
    Ok(log_dir.to_path_buf())
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Payloads may carry file paths or attribute values; keep them short
        // and on one line.
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        error!(
            "event=panic_captured module=logging status=error location={} payload={}",
            location,
            panic_payload_summary(panic_info)
        );
        previous_hook(panic_info);
    }));
}

fn panic_payload_summary(info: &std::panic::PanicHookInfo<'_>) -> String {
    let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };
    sanitize_message(&payload, MAX_PANIC_PAYLOAD_CHARS)
}

fn sanitize_message(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::{
        init_logging, logging_status, normalize, normalize_level, sanitize_message, LoggingConfig,
    };

    #[test]
    fn level_names_are_normalized() {
        assert_eq!(normalize_level("INFO").unwrap(), "info");
        assert_eq!(normalize_level(" warning ").unwrap(), "warn");
        assert!(normalize_level("verbose").is_err());
    }

    #[test]
    fn relative_dir_and_zero_limits_are_rejected() {
        let relative = LoggingConfig::new("info", "logs/dev");
        assert!(normalize(&relative).unwrap_err().contains("absolute"));

        let mut zero = LoggingConfig::new("info", std::env::temp_dir());
        zero.max_files = 0;
        assert!(normalize(&zero).is_err());
    }

    #[test]
    fn sanitize_strips_newlines_and_truncates() {
        let sanitized = sanitize_message("line1\nline2\rline3", 8);
        assert!(!sanitized.contains('\n'));
        assert!(!sanitized.contains('\r'));
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn init_is_idempotent_and_rejects_conflicts() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let config = LoggingConfig::new("info", first.path());

        init_logging(&config).unwrap();
        init_logging(&config).unwrap();

        let louder = LoggingConfig::new("debug", first.path());
        assert!(init_logging(&louder).unwrap_err().contains("refusing to switch"));
        let elsewhere = LoggingConfig::new("info", second.path());
        assert!(init_logging(&elsewhere).unwrap_err().contains("refusing to switch"));

        let (level, dir) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(dir, first.path());
    }
}
