use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Configuration for minigit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Whole-request timeout for discovery and pack transfer, in seconds
    #[serde(default = "defaults::http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// User-Agent header and `agent=` capability value
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
    /// Materialize HEAD's tree into the working directory after a clone
    #[serde(default = "defaults::checkout")]
    pub checkout: bool,
    /// Show progress bars while ingesting packs
    #[serde(default = "defaults::progress")]
    pub progress: bool,
    /// Identity written by commit-tree
    #[serde(default = "defaults::author_name")]
    pub author_name: String,
    #[serde(default = "defaults::author_email")]
    pub author_email: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout_secs: defaults::http_timeout_secs(),
            user_agent: defaults::user_agent(),
            checkout: defaults::checkout(),
            progress: defaults::progress(),
            author_name: defaults::author_name(),
            author_email: defaults::author_email(),
        }
    }
}

impl Config {
    /// Load the config file if there is one, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => {
                tracing::debug!("loading minigit config from {:?}", path);
                Self::load_from_file(&path)?
            }
            _ => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Apply `MINIGIT_*` and `GIT_AUTHOR_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timeout) = lookup("MINIGIT_HTTP_TIMEOUT") {
            self.http_timeout_secs = timeout
                .parse()
                .context("Failed to parse MINIGIT_HTTP_TIMEOUT as seconds")?;
        }
        if let Some(agent) = lookup("MINIGIT_USER_AGENT") {
            self.user_agent = agent;
        }
        if let Some(name) = lookup("GIT_AUTHOR_NAME") {
            self.author_name = name;
        }
        if let Some(email) = lookup("GIT_AUTHOR_EMAIL") {
            self.author_email = email;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Default config file path; `MINIGIT_CONFIG` wins when set
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = env::var("MINIGIT_CONFIG") {
            return Some(expand_tilde(Path::new(&path)));
        }
        dirs::home_dir().map(|home| home.join(".config/minigit/config.yaml"))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

mod defaults {
    pub(crate) fn http_timeout_secs() -> u64 {
        30
    }

    pub(crate) fn user_agent() -> String {
        format!("minigit/{}", env!("CARGO_PKG_VERSION"))
    }

    pub(crate) fn checkout() -> bool {
        true
    }

    pub(crate) fn progress() -> bool {
        true
    }

    pub(crate) fn author_name() -> String {
        "minigit".to_string()
    }

    pub(crate) fn author_email() -> String {
        "minigit@localhost".to_string()
    }
}
