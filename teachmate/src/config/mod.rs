//! Configuration system for the `TeachMate` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/teachmate/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use teachmate_proto::MAX_TASK_TITLE_LENGTH;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// Could not determine where to keep the session flag.
    #[error("could not determine data directory for the session file (set --session-file)")]
    NoDataDir,
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    auth: AuthFileConfig,
    tasks: TasksFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    tasks_path: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[auth]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AuthFileConfig {
    user_id: Option<String>,
    password: Option<String>,
    session_file: Option<PathBuf>,
}

/// `[tasks]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TasksFileConfig {
    max_title_len: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Where the task resource lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Scheme and host of the backend, e.g. `https://teachmate-backend.onrender.com`.
    pub base_url: String,
    /// Collection path below the base URL.
    pub tasks_path: String,
    /// Per-request HTTP timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://teachmate-backend.onrender.com".to_string(),
            tasks_path: "taskmanager".to_string(),
            request_timeout: None,
        }
    }
}

impl ApiConfig {
    /// Full URL of the task collection, always with a trailing slash.
    #[must_use]
    pub fn collection_url(&self) -> String {
        format!(
            "{}/{}/",
            self.base_url.trim_end_matches('/'),
            self.tasks_path.trim_matches('/')
        )
    }
}

/// The configured login and where the session flag is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    /// Expected user id.
    pub user_id: Option<String>,
    /// Expected password.
    pub password: Option<String>,
    /// Session flag file. `None` when no data directory is known.
    pub session_file: Option<PathBuf>,
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Task resource location.
    pub api: ApiConfig,
    /// Login settings.
    pub auth: AuthConfig,
    /// Maximum task title length in characters.
    pub max_title_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            auth: AuthConfig {
                session_file: default_session_file(),
                ..AuthConfig::default()
            },
            max_title_len: MAX_TASK_TITLE_LENGTH,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// CLI args and env vars are parsed via `clap`. If `--config` is given
    /// and the file does not exist, returns an error. If no `--config` is
    /// given, the default path (`~/.config/teachmate/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            api: ApiConfig {
                base_url: cli
                    .api_url
                    .clone()
                    .or_else(|| file.api.base_url.clone())
                    .unwrap_or(defaults.api.base_url),
                tasks_path: cli
                    .tasks_path
                    .clone()
                    .or_else(|| file.api.tasks_path.clone())
                    .unwrap_or(defaults.api.tasks_path),
                request_timeout: cli
                    .request_timeout_secs
                    .or(file.api.request_timeout_secs)
                    .map(Duration::from_secs)
                    .or(defaults.api.request_timeout),
            },
            auth: AuthConfig {
                user_id: cli
                    .auth_user_id
                    .clone()
                    .or_else(|| file.auth.user_id.clone()),
                password: cli
                    .auth_password
                    .clone()
                    .or_else(|| file.auth.password.clone()),
                session_file: cli
                    .session_file
                    .clone()
                    .or_else(|| file.auth.session_file.clone())
                    .or(defaults.auth.session_file),
            },
            max_title_len: file
                .tasks
                .max_title_len
                .unwrap_or(defaults.max_title_len),
        }
    }

    /// Path of the persisted session flag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoDataDir`] if no path was configured and the
    /// platform data directory is unknown.
    pub fn session_path(&self) -> Result<PathBuf, ConfigError> {
        self.auth.session_file.clone().ok_or(ConfigError::NoDataDir)
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "TeachMate task client")]
pub struct CliArgs {
    /// Base URL of the TeachMate backend.
    #[arg(long, env = "TEACHMATE_API_URL")]
    pub api_url: Option<String>,

    /// Path of the task collection below the base URL.
    #[arg(long)]
    pub tasks_path: Option<String>,

    /// HTTP request timeout in seconds (default: none).
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// User id the login is checked against.
    #[arg(long, env = "TEACHMATE_USER_ID", hide_env_values = true)]
    pub auth_user_id: Option<String>,

    /// Password the login is checked against.
    #[arg(long, env = "TEACHMATE_USER_PASSWORD", hide_env_values = true)]
    pub auth_password: Option<String>,

    /// Where the session flag is stored (default: `<data dir>/teachmate/session.toml`).
    #[arg(long)]
    pub session_file: Option<PathBuf>,

    /// Path to config file (default: `~/.config/teachmate/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use the built-in sample task list instead of the backend.
    #[arg(long)]
    pub offline: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TEACHMATE_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/teachmate.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do (default: show the dashboard).
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Top-level subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in with the configured credentials.
    Login {
        /// User id.
        #[arg(long)]
        user_id: String,
        /// Password.
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session.
    Logout,
    /// Show the dashboard with the compact task widget.
    Dashboard {
        /// Toggle completion of the task with this id first.
        #[arg(long)]
        toggle: Option<String>,
    },
    /// Manage the task list.
    Tasks {
        /// Task action (default: list).
        #[command(subcommand)]
        action: Option<TaskCommand>,
    },
}

/// Task list actions.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    /// Show all tasks.
    List,
    /// Create a task.
    Add {
        /// Task title (words are joined with spaces).
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },
    /// Flip a task between open and completed.
    Toggle {
        /// Task id.
        id: String,
    },
    /// Delete a task.
    Rm {
        /// Task id.
        id: String,
    },
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Default location of the session flag file.
fn default_session_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("teachmate").join("session.toml"))
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            // No config dir available, use defaults.
            return Ok(ConfigFile::default());
        };
        config_dir.join("teachmate").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
