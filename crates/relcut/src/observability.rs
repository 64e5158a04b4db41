//! Structured JSONL logging.
//!
//! stdout carries command output only (human text or `--json`). Log records
//! go to a JSONL file, or to stderr when no log file can be opened.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "RELCUT_LOG_PATH";
const ENV_LOG_DIR: &str = "RELCUT_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where log records should go.
#[derive(Clone, Debug, Default)]
pub struct ObservabilityConfig {
    /// Service name, used for the default log file name.
    pub service: String,
    /// Exact log file, from `RELCUT_LOG_PATH`.
    pub log_path: Option<PathBuf>,
    /// Log directory, from `RELCUT_LOG_DIR` or the `log_dir` config key.
    pub log_dir: Option<PathBuf>,
}

impl ObservabilityConfig {
    /// Read the environment, falling back to `config_log_dir` for the directory.
    pub fn from_env(config_log_dir: Option<PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_path: std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
            log_dir: std::env::var_os(ENV_LOG_DIR)
                .map(PathBuf::from)
                .or(config_log_dir),
        }
    }

    /// Resolve the log file, creating its directory if needed.
    ///
    /// Order: explicit path, explicit or configured directory, then the
    /// platform data directory.
    fn resolve(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log_path {
            if path.file_name().is_none() {
                bail!("{ENV_LOG_PATH} must include a file name");
            }
            ensure_writable(path)?;
            return Ok(path.clone());
        }

        let file_name = format!("{}{LOG_FILE_SUFFIX}", self.service);
        if let Some(dir) = &self.log_dir {
            let path = dir.join(&file_name);
            ensure_writable(&path)?;
            return Ok(path);
        }

        let dirs = directories::ProjectDirs::from("", "", &self.service)
            .context("no home directory for default log location")?;
        let path = dirs.data_local_dir().join("logs").join(file_name);
        ensure_writable(&path)?;
        Ok(path)
    }
}

/// Keeps the background log writer alive; drop it last.
pub struct ObservabilityGuard {
    _log_guard: WorkerGuard,
}

/// Install the global subscriber.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, guard) = match cfg.resolve().and_then(|path| file_writer(&path)) {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("Warning: {err:#}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_span_list(true)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::debug!("observability initialized");
    Ok(ObservabilityGuard { _log_guard: guard })
}

/// Build an `EnvFilter` from CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > RUST_LOG env > default_level
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn ensure_writable(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(log_path: Option<PathBuf>, log_dir: Option<PathBuf>) -> ObservabilityConfig {
        ObservabilityConfig {
            service: "demo".into(),
            log_path,
            log_dir,
        }
    }

    #[test]
    fn env_filter_quiet_overrides() {
        assert_eq!(env_filter(true, 3, "info").to_string(), "error");
    }

    #[test]
    fn env_filter_verbose_maps_to_debug_and_trace() {
        assert_eq!(env_filter(false, 1, "info").to_string(), "debug");
        assert_eq!(env_filter(false, 2, "info").to_string(), "trace");
    }

    #[test]
    fn explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("custom.jsonl");
        let cfg = config(Some(path.clone()), Some(tmp.path().join("ignored")));

        assert_eq!(cfg.resolve().unwrap(), path);
        assert!(path.is_file());
        assert!(!tmp.path().join("ignored").exists());
    }

    #[test]
    fn directory_gets_service_file_name() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(None, Some(tmp.path().to_path_buf()));

        assert_eq!(cfg.resolve().unwrap(), tmp.path().join("demo.jsonl"));
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        // A regular file cannot be used as a directory
        let cfg = config(None, Some(blocker.join("logs")));

        assert!(cfg.resolve().is_err());
    }
}
