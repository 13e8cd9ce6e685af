// ABOUTME: Configuration file loading, validation, and hierarchical merging for termpix
// ABOUTME: Supports TOML config files in XDG locations plus environment overrides

use crate::constants::{env as env_keys, tools};
use crate::image_protocols::cache::default_cache_directory;
use crate::image_protocols::DetectionOptions;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct TermpixConfig {
    #[serde(default, deserialize_with = "validate_protocol")]
    pub protocol: Option<String>,
    #[serde(default, deserialize_with = "validate_duration")]
    pub tool_timeout: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub overlay_helper: Option<PathBuf>,
    #[serde(default)]
    pub max_cached_images: Option<usize>,
}

impl TermpixConfig {
    /// Load configuration from standard XDG-compliant locations, then the environment
    pub fn load() -> Result<Self> {
        let config = Self::load_from_paths(&Self::config_paths())?;
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Load configuration files in order; later files override earlier ones
    pub fn load_from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut config = TermpixConfig::default();

        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(path) {
                Ok(file_config) => config = config.merge(file_config),
                Err(e) => log::warn!("Ignoring config file {}: {:#}", path.display(), e),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: TermpixConfig = toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse TOML config file: {}",
                path.as_ref().display()
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Standard config file paths, lowest precedence first
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".config").join("termpix").join("config.toml"));
        }

        if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(config_home).join("termpix").join("config.toml"));
        }

        // Project-specific config wins
        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(current_dir.join("termpix.toml"));
        }

        paths
    }

    /// Merge this config with another, giving precedence to the other config
    pub fn merge(self, other: TermpixConfig) -> TermpixConfig {
        TermpixConfig {
            protocol: other.protocol.or(self.protocol),
            tool_timeout: other.tool_timeout.or(self.tool_timeout),
            cache_dir: other.cache_dir.or(self.cache_dir),
            overlay_helper: other.overlay_helper.or(self.overlay_helper),
            max_cached_images: other.max_cached_images.or(self.max_cached_images),
        }
    }

    /// Apply `TERMPIX_CACHE_DIR` and `TERMPIX_TOOL_TIMEOUT` from `lookup`.
    ///
    /// `TERMPIX_PROTOCOL` is read during detection, where it already beats
    /// the `protocol` key.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(env_keys::CACHE_DIR).filter(|dir| !dir.is_empty()) {
            self.cache_dir = Some(PathBuf::from(dir));
        }

        if let Some(timeout) = lookup(env_keys::TOOL_TIMEOUT) {
            if parse_duration(&timeout).is_some() {
                self.tool_timeout = Some(timeout);
            } else {
                log::warn!(
                    "Invalid {} '{}'. Expected format like '500ms', '10s', '2m'",
                    env_keys::TOOL_TIMEOUT,
                    timeout
                );
            }
        }

        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_cached_images == Some(0) {
            return Err(anyhow!("max_cached_images must be at least 1"));
        }

        if let Some(ref timeout) = self.tool_timeout {
            let parsed = parse_duration(timeout)
                .ok_or_else(|| anyhow!("Invalid tool_timeout '{}'", timeout))?;
            if parsed.is_zero() {
                return Err(anyhow!("tool_timeout must be greater than zero"));
            }
        }

        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
            .as_deref()
            .and_then(parse_duration)
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(tools::DEFAULT_TIMEOUT)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_directory)
    }

    pub fn detection_options(&self) -> DetectionOptions {
        DetectionOptions {
            forced_protocol: self.protocol.clone(),
            overlay_helper: self.overlay_helper.clone(),
        }
    }
}

/// Parse `500ms`, `10s`, `2m`, `1h`; a bare number means seconds
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    let (number_part, unit_millis) = if let Some(number) = value.strip_suffix("ms") {
        (number, 1)
    } else if let Some(number) = value.strip_suffix('s') {
        (number, 1000)
    } else if let Some(number) = value.strip_suffix('m') {
        (number, 60 * 1000)
    } else if let Some(number) = value.strip_suffix('h') {
        (number, 3600 * 1000)
    } else {
        (value.as_str(), 1000)
    };

    let number: u64 = number_part.trim().parse().ok()?;
    number.checked_mul(unit_millis).map(Duration::from_millis)
}

// Custom deserializer for protocol validation
fn validate_protocol<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Option<String> = Option::deserialize(deserializer)?;

    if let Some(ref protocol) = value {
        match protocol.trim().to_lowercase().as_str() {
            "kitty" | "sixel" | "w3m" | "w3mimgdisplay" | "none" | "disable" | "disabled" => {
                Ok(value)
            }
            _ => Err(D::Error::custom(format!(
                "Invalid protocol '{}'. Must be one of: kitty, sixel, w3m, none",
                protocol
            ))),
        }
    } else {
        Ok(None)
    }
}

// Custom deserializer for duration validation
fn validate_duration<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Option<String> = Option::deserialize(deserializer)?;

    match value {
        Some(ref duration) if parse_duration(duration).is_none() => Err(D::Error::custom(format!(
            "Invalid duration format '{}'. Expected format like '500ms', '10s', '2m'",
            duration
        ))),
        _ => Ok(value),
    }
}
