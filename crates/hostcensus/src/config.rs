//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{WrapErr, bail};
use serde::{Deserialize, Serialize};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "HOSTCENSUS_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// How sessions reach hosts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SshConfig {
    /// Login user
    #[serde(default = "default_user")]
    pub user: String,
    /// SSH port, also used for the liveness probe
    #[serde(default = "default_port")]
    pub port: u16,
    /// Private key file (`~/` expanded)
    pub key_path: Option<String>,
    /// Environment variable holding a base64 private key
    pub key_env: Option<String>,
    /// Remote PowerShell executable
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            port: default_port(),
            key_path: None,
            key_env: None,
            shell: default_shell(),
        }
    }
}

fn default_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "Administrator".to_string())
}

fn default_port() -> u16 {
    22
}

fn default_shell() -> String {
    "powershell".to_string()
}

/// Bounds on every network step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    #[serde(default = "default_probe_ms")]
    pub probe_ms: u64,
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_query_secs")]
    pub query_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_ms: default_probe_ms(),
            connect_secs: default_connect_secs(),
            query_secs: default_query_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs)
    }
}

fn default_probe_ms() -> u64 {
    1000
}

fn default_connect_secs() -> u64 {
    15
}

fn default_query_secs() -> u64 {
    60
}

/// Run and report settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Hosts processed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Where saved reports go
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Field delimiter of saved reports
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            output_dir: default_output_dir(),
            delimiter: default_delimiter(),
        }
    }
}

impl RunConfig {
    /// Delimiter as the single byte the CSV writer wants
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }
}

fn default_concurrency() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or fails validation
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read config {}", path.display()))?;
        Self::parse(&content).wrap_err_with(|| format!("invalid config {}", path.display()))
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns error on TOML syntax, unknown keys or invalid values
    pub fn parse(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the explicit path, else the first default location, else defaults
    ///
    /// # Errors
    /// Returns error if a found file cannot be loaded
    pub fn load_default(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        let mut paths = vec![PathBuf::from("hostcensus.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("hostcensus/hostcensus.toml"));
        }

        for path in paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(&path);
            }
        }

        tracing::warn!("no config file found, using defaults");
        Ok(Config::default())
    }

    /// Check values the type system cannot
    ///
    /// # Errors
    /// Returns error naming the first invalid setting
    pub fn validate(&self) -> eyre::Result<()> {
        if self.run.concurrency == 0 {
            bail!("run.concurrency must be at least 1");
        }
        if self.run.delimiter.len() != 1 {
            bail!(
                "run.delimiter must be a single ASCII character, got {:?}",
                self.run.delimiter
            );
        }
        if self.timeouts.probe_ms == 0 || self.timeouts.query_secs == 0 || self.timeouts.connect_secs == 0 {
            bail!("timeouts must be greater than zero");
        }
        if self.ssh.shell.trim().is_empty() {
            bail!("ssh.shell must not be empty");
        }
        Ok(())
    }
}
