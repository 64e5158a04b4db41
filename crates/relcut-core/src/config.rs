//! Configuration loading and discovery.
//!
//! Config is layered with figment, lowest precedence first:
//! defaults, user config, project config, explicit files, then
//! `RELCUT_*` environment variables.
//!
//! # Config file locations
//! - `.relcut.<ext>` or `relcut.<ext>` in the current directory or any parent
//!   (the walk stops at a directory containing `.git`)
//! - `~/.config/relcut/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use relcut_core::config::ConfigLoader;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! ```

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::git::{Identity, parse_owner_repo};
use crate::publish::{DEFAULT_API_BASE, DEFAULT_TIMEOUT};

/// The configuration for relcut.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Where the version lives and how tags and commits are named.
    pub release: Option<ReleaseConfig>,
    /// Git identity for the tag and commit. Unset keeps the repository's own.
    pub identity: Option<Identity>,
    /// Remote release publication.
    pub publish: Option<PublishConfig>,
}

impl Config {
    /// Path of the version record, relative to the project root.
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.release
            .as_ref()
            .and_then(|r| r.manifest.clone())
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_MANIFEST))
    }

    /// Whether remote publication is switched on.
    pub fn publish_enabled(&self) -> bool {
        self.publish
            .as_ref()
            .and_then(|p| p.enabled)
            .unwrap_or(false)
    }

    /// API base for the release host.
    pub fn api_base(&self) -> &str {
        self.publish
            .as_ref()
            .and_then(|p| p.api_base.as_deref())
            .unwrap_or(DEFAULT_API_BASE)
    }

    /// Resolve the repository to publish to.
    ///
    /// Configured `publish.owner` / `publish.repo` win; anything missing is
    /// inferred from `remote_url` when it points at a GitHub-style host.
    pub fn publish_target(&self, remote_url: Option<&str>) -> ConfigResult<(String, String)> {
        let publish = self.publish.clone().unwrap_or_default();
        let inferred = remote_url.and_then(parse_owner_repo);
        let (inferred_owner, inferred_repo) = inferred.unzip();

        let owner = publish
            .owner
            .or(inferred_owner)
            .ok_or(ConfigError::PublishTarget { missing: "owner" })?;
        let repo = publish
            .repo
            .or(inferred_repo)
            .ok_or(ConfigError::PublishTarget { missing: "repo" })?;
        Ok((owner, repo))
    }

    /// Per-request timeout for the release host.
    pub fn publish_timeout(&self) -> Duration {
        self.publish
            .as_ref()
            .and_then(|p| p.timeout_secs)
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs)
    }
}

/// Default version record.
pub const DEFAULT_MANIFEST: &str = "package.json";

/// Release naming and location settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Version record path (default: `package.json`).
    pub manifest: Option<Utf8PathBuf>,
    /// Remote to push to (default: `origin`).
    pub remote: Option<String>,
    /// Tag prefix (default: `v`). Use `""` for bare version tags.
    pub tag_prefix: Option<String>,
    /// Tag annotation template.
    pub tag_message: Option<String>,
    /// Version-record commit message template.
    pub commit_message: Option<String>,
}

/// Remote release publication settings.
///
/// Templates support `{version}`, `{prev_version}`, `{tag}`, `{owner}`, `{repo}`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PublishConfig {
    /// Create a remote release after pushing the tag (default: `false`).
    pub enabled: Option<bool>,
    /// Repository owner. Inferred from the remote URL when unset.
    pub owner: Option<String>,
    /// Repository name. Inferred from the remote URL when unset.
    pub repo: Option<String>,
    /// API base URL (default: `https://api.github.com`).
    pub api_base: Option<String>,
    /// Release title template (default: `{tag}`).
    pub title: Option<String>,
    /// Release body template (default: `Release {version}`).
    pub body: Option<String>,
    /// Create as draft (default: `false`).
    pub draft: Option<bool>,
    /// Mark as prerelease (default: `false`).
    pub prerelease: Option<bool>,
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: Option<u64>,
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "relcut";

/// Project config search stops at the directory containing this entry.
const BOUNDARY_MARKER: &str = ".git";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "RELCUT_";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
    /// Whether `RELCUT_*` environment variables override file values.
    include_env: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            explicit_files: Vec::new(),
            include_env: true,
        }
    }

    /// Set the starting directory for project config search.
    ///
    /// The loader will walk up from this directory looking for config files.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/relcut/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set whether `RELCUT_*` environment variables are merged last.
    pub const fn with_env(mut self, include: bool) -> Self {
        self.include_env = include;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. `RELCUT_*` environment variables (when enabled)
    /// 2. Explicit files (in order added via `with_file`)
    /// 3. Project config (closest to search root)
    /// 4. User config (`~/.config/relcut/config.<ext>`)
    /// 5. Default values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Start with user config (lowest precedence of file sources)
        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        // Add project config
        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        // Add explicit files
        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        // Environment wins over every file, e.g. RELCUT_PUBLISH__ENABLED=true
        if self.include_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::debug!(
            log_level = config.log_level.as_str(),
            publish = config.publish_enabled(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Find project config by walking up from the given directory.
    ///
    /// The directory holding the boundary marker is searched, its parents
    /// are not.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start);

        while let Some(dir) = current {
            for ext in CONFIG_EXTENSIONS {
                // Dotfile first (.relcut.toml), then the plain name (relcut.toml)
                for name in [format!(".{APP_NAME}.{ext}"), format!("{APP_NAME}.{ext}")] {
                    let candidate = dir.join(name);
                    if candidate.is_file() {
                        return Some(candidate);
                    }
                }
            }

            if dir.join(BOUNDARY_MARKER).exists() {
                break;
            }

            current = dir.parent();
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
        let config_dir = proj_dirs.config_dir();

        // Try each supported extension
        for ext in CONFIG_EXTENSIONS {
            let config_path = config_dir.join(format!("config.{ext}"));
            if config_path.is_file() {
                return Utf8PathBuf::from_path_buf(config_path).ok();
            }
        }

        None
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("toml") => figment.merge(Toml::file_exact(path.as_str())),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
///
/// Uses the same `.git` boundary as [`ConfigLoader::load`], so the result is
/// the file a default loader would pick up.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new().find_project_config(start.as_ref())
}


/// User configuration directory (`~/.config/relcut` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
    Utf8PathBuf::from_path_buf(dirs.config_dir().to_path_buf()).ok()
}
