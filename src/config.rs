/// Run configuration: built-in defaults, an optional TOML defaults file,
/// and CLI overrides, merged in that order.
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_WAIT_SECS: u64 = 2;

/// Optional defaults file (reaper.toml). Every key is optional; a missing
/// file means built-in defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub kill: KillDefaults,
    pub protect: ProtectConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KillDefaults {
    pub timeout_seconds: u64,
    pub wait_time_seconds: u64,
}

impl Default for KillDefaults {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            wait_time_seconds: DEFAULT_WAIT_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ProtectConfig {
    /// Process names protected in addition to the built-in set.
    pub extra: Vec<String>,
}

/// Errors loading the defaults file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl FileConfig {
    /// Load the defaults file; a missing file is not an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Fully resolved termination settings for one run.
#[derive(Debug, Clone)]
pub struct KillConfig {
    pub force: bool,
    pub nuclear: bool,
    pub timeout_seconds: u64,
    pub wait_time_seconds: u64,
    pub dry_run: bool,
    pub auto_confirm: bool,
    pub extra_protected: Vec<String>,
}

impl Default for KillConfig {
    fn default() -> Self {
        Self {
            force: false,
            nuclear: false,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            wait_time_seconds: DEFAULT_WAIT_SECS,
            dry_run: false,
            auto_confirm: false,
            extra_protected: Vec::new(),
        }
    }
}

/// CLI-side override knobs; `None` means "not given on the command line".
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub force: bool,
    pub nuclear: bool,
    pub timeout: Option<u64>,
    pub wait: Option<u64>,
    pub dry_run: bool,
    pub auto_confirm: bool,
}

impl KillConfig {
    pub fn merge(file: &FileConfig, cli: &CliOverrides) -> Self {
        Self {
            force: cli.force,
            nuclear: cli.nuclear,
            timeout_seconds: cli.timeout.unwrap_or(file.kill.timeout_seconds),
            wait_time_seconds: cli.wait.unwrap_or(file.kill.wait_time_seconds),
            dry_run: cli.dry_run,
            auto_confirm: cli.auto_confirm,
            extra_protected: file.protect.extra.clone(),
        }
    }
}
