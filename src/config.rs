//! Run settings
//!
//! Settings are merged from TOML files, later files overriding earlier ones:
//!
//! 1. `$XDG_CONFIG_DIRS/driverclaw/config.toml` (default `/etc/xdg`)
//! 2. `$XDG_CONFIG_HOME/driverclaw/config.toml`
//! 3. an explicit `--config <file>`
//!
//! ```toml
//! http_timeout_secs = 60
//! user_agent = "Mozilla/5.0 ..."
//! referer_exempt_hosts = ["sourceforge", "geeks3d"]
//! extractor = "7z"
//! seven_zip = "/usr/bin/7z"
//! ```
//!
//! `DRIVERCLAW_HTTP_TIMEOUT` and `PATH_LIB_7ZIP` override the file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:138.0) Gecko/20100101 Firefox/138.0";

/// Hosts whose CDNs reject or do not need a referer.
const DEFAULT_REFERER_EXEMPT_HOSTS: &[&str] = &["sourceforge", "geeks3d"];

const DEFAULT_SEVEN_ZIP: &str = "7z";

/// Which archive tool unpacks and packs archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    #[default]
    Native,
    #[serde(rename = "7z")]
    SevenZip,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct SettingsToml {
    http_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    referer_exempt_hosts: Option<Vec<String>>,
    extractor: Option<ExtractorKind>,
    seven_zip: Option<String>,
}

impl SettingsToml {
    fn merge(&mut self, other: SettingsToml) {
        if other.http_timeout_secs.is_some() {
            self.http_timeout_secs = other.http_timeout_secs;
        }
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
        if other.referer_exempt_hosts.is_some() {
            self.referer_exempt_hosts = other.referer_exempt_hosts;
        }
        if other.extractor.is_some() {
            self.extractor = other.extractor;
        }
        if other.seven_zip.is_some() {
            self.seven_zip = other.seven_zip;
        }
    }
}

/// Resolved settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub http_timeout: Duration,
    pub user_agent: String,
    pub referer_exempt_hosts: Vec<String>,
    pub extractor: ExtractorKind,
    pub seven_zip: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        build_resolved(&SettingsToml::default(), &EnvOverrides::default())
    }
}

/// Environment values that take precedence over config files.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub http_timeout_secs: Option<String>,
    pub seven_zip: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            http_timeout_secs: std::env::var("DRIVERCLAW_HTTP_TIMEOUT").ok(),
            seven_zip: std::env::var("PATH_LIB_7ZIP").ok(),
        }
    }
}

fn split_xdg_config_dirs() -> Vec<PathBuf> {
    let raw = std::env::var("XDG_CONFIG_DIRS").unwrap_or_else(|_| "/etc/xdg".to_owned());
    raw.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn xdg_config_home() -> PathBuf {
    if let Ok(raw) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".").join(".config"))
}

fn find_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for dir in split_xdg_config_dirs() {
        paths.push(dir.join("driverclaw").join("config.toml"));
    }
    paths.push(xdg_config_home().join("driverclaw").join("config.toml"));
    paths
}

fn read_toml(path: &Path) -> Result<SettingsToml> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str::<SettingsToml>(&text)
        .with_context(|| format!("Invalid TOML in {}", path.display()))
}

fn build_resolved(cfg: &SettingsToml, env: &EnvOverrides) -> Settings {
    let timeout_secs = env
        .http_timeout_secs
        .as_deref()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .or(cfg.http_timeout_secs)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)
        .clamp(5, 300);

    let seven_zip = env
        .seven_zip
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| cfg.seven_zip.clone())
        .unwrap_or_else(|| DEFAULT_SEVEN_ZIP.to_owned());

    Settings {
        http_timeout: Duration::from_secs(timeout_secs),
        user_agent: cfg
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
        referer_exempt_hosts: cfg.referer_exempt_hosts.clone().unwrap_or_else(|| {
            DEFAULT_REFERER_EXEMPT_HOSTS
                .iter()
                .map(|s| s.to_string())
                .collect()
        }),
        extractor: cfg.extractor.unwrap_or_default(),
        seven_zip: PathBuf::from(seven_zip),
    }
}

impl Settings {
    /// Merge the standard config locations, then `explicit` if given, then the
    /// environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut merged = SettingsToml::default();
        for path in find_config_files() {
            if path.exists() {
                tracing::debug!(config = %path.display(), "loading settings");
                merged.merge(read_toml(&path)?);
            }
        }
        if let Some(path) = explicit {
            merged.merge(read_toml(path)?);
        }
        Ok(build_resolved(&merged, &EnvOverrides::from_env()))
    }

    /// Parse a single TOML document with explicit overrides. Used by tests and
    /// embedders that manage their own configuration files.
    pub fn from_toml_str(content: &str, env: &EnvOverrides) -> Result<Self> {
        let parsed: SettingsToml = toml::from_str(content).context("Invalid settings TOML")?;
        Ok(build_resolved(&parsed, env))
    }
}
