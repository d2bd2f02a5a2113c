use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from `~/.decree/config.toml`.
///
/// Tokens are read from the environment at runtime and are never written
/// back out when the config is serialized.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecreeConfig {
    #[serde(default)]
    pub github: GitHubSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSettings {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Filled from `GITHUB_TOKEN`; never persisted.
    #[serde(skip_serializing, default)]
    pub token: Option<String>,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            default_branch: default_branch(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_spec_dir")]
    pub spec_dir: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            spec_dir: default_spec_dir(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_spec_dir() -> String {
    "specs".to_string()
}

impl DecreeConfig {
    /// Load config from the default path, falling back to defaults when
    /// the file does not exist. Environment variables are applied last.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let mut cfg = if path.exists() {
            let text =
                std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
            toml::from_str::<DecreeConfig>(&text).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            DecreeConfig::default()
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific path without consulting the environment.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: DecreeConfig =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay `GITHUB_TOKEN`, `GITHUB_OWNER`, and `GITHUB_REPO` from the
    /// environment onto the file-provided values.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Ok(owner) = std::env::var("GITHUB_OWNER") {
            self.github.owner = owner;
        }
        if let Ok(repo) = std::env::var("GITHUB_REPO") {
            self.github.repo = repo;
        }
    }

    /// Semantic validation beyond what the type system checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github.owner.is_empty() {
            return Err(ConfigError::Invalid("github.owner must be set".into()));
        }
        if self.github.repo.is_empty() {
            return Err(ConfigError::Invalid("github.repo must be set".into()));
        }
        if self.sync.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.poll_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(".decree")
            .join("config.toml")
    }
}
