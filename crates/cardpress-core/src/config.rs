//! Configuration module for Cardpress.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Cardpress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub publish: PublishConfig,
    pub library: LibraryConfig,
    pub logging: LoggingConfig,
}

/// Authentication / device-code settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// OAuth client ID. `None` uses the built-in public client.
    pub client_id: Option<String>,
}

/// Remote platform endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the authorization server.
    pub auth_base_url: String,
    /// Base URL of the content/media API.
    pub api_base_url: String,
}

/// Publish pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Seconds between transcode status polls.
    pub transcode_poll_interval: u64,
    /// Maximum transcode status polls per file before giving up.
    pub transcode_poll_attempts: u32,
}

/// Local playlist library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory holding the playlist documents.
    pub dir: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cardpress/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cardpress")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.
// (clippy::derivable_impls)

// AuthConfig derives Default (Option<String> defaults to None).
// (clippy::derivable_impls)

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            auth_base_url: "https://login.yotoplay.com".to_string(),
            api_base_url: "https://api.yotoplay.com".to_string(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            transcode_poll_interval: 2,
            transcode_poll_attempts: 30,
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            dir: dirs::audio_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("cardpress"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"publish.transcode_poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- api ---
        for (field, url) in [
            ("api.auth_base_url", &self.api.auth_base_url),
            ("api.api_base_url", &self.api.api_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("must be an http(s) URL, got '{url}'"),
                });
            }
        }

        // --- publish ---
        if self.publish.transcode_poll_interval == 0 {
            errors.push(ValidationError {
                field: "publish.transcode_poll_interval".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.publish.transcode_poll_attempts == 0 {
            errors.push(ValidationError {
                field: "publish.transcode_poll_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- auth ---
        if let Some(client_id) = &self.auth.client_id {
            if client_id.trim().is_empty() {
                errors.push(ValidationError {
                    field: "auth.client_id".into(),
                    message: "must not be blank when set".into(),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use cardpress_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .library_dir(PathBuf::from("/home/user/Music/cardpress"))
///     .transcode_poll_interval(5)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- auth ---

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.auth.client_id = Some(client_id.into());
        self
    }

    // --- api ---

    pub fn auth_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.auth_base_url = url.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.api_base_url = url.into();
        self
    }

    // --- publish ---

    pub fn transcode_poll_interval(mut self, seconds: u64) -> Self {
        self.config.publish.transcode_poll_interval = seconds;
        self
    }

    pub fn transcode_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.publish.transcode_poll_attempts = attempts;
        self
    }

    // --- library ---

    pub fn library_dir(mut self, dir: PathBuf) -> Self {
        self.config.library.dir = dir;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
