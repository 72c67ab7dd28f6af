use crate::engine::Variant;
use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".LevelUp";
const CONFIG_FILE: &str = "config.json";
pub const API_KEY_ENV: &str = "LEVELUP_AI_API_KEY";
const MIN_AI_TIMEOUT_SECONDS: u64 = 5;
const MAX_SESSION_TTL_HOURS: u32 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_port: u16,
    pub bind_address: String,
    pub db_path: PathBuf,
    pub variant: Variant,
    pub session_ttl_hours: u32,
    pub ai_enabled: bool,
    pub ai_api_key: Option<String>,
    pub ai_api_base_url: String,
    pub ai_model: String,
    pub ai_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_port: 5000,
            bind_address: "127.0.0.1".to_string(),
            db_path: default_root_dir().join("db").join("levelup.db"),
            variant: Variant::default(),
            session_ttl_hours: 24 * 7,
            ai_enabled: false,
            ai_api_key: None,
            ai_api_base_url: "https://api.openai.com/v1".to_string(),
            ai_model: "gpt-4o-mini".to_string(),
            ai_timeout_seconds: 20,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    /// Config file when present, defaults otherwise.
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    pub fn bind_ip(&self) -> Result<IpAddr> {
        self.bind_address
            .parse::<IpAddr>()
            .with_context(|| format!("Invalid bind_address: {}", self.bind_address))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "bind_address" => {
                value
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|_| anyhow!("bind_address must be an IP address"))?;
                self.bind_address = value.trim().to_string();
            }
            "db_path" => {
                self.db_path = expand_home(value.trim());
            }
            "variant" => {
                self.variant = Variant::parse(value)?;
            }
            "session_ttl_hours" => {
                let hours = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("session_ttl_hours must be a number"))?;
                if hours == 0 || hours > MAX_SESSION_TTL_HOURS {
                    bail!("session_ttl_hours must be between 1 and {MAX_SESSION_TTL_HOURS}");
                }
                self.session_ttl_hours = hours;
            }
            "ai_enabled" => {
                self.ai_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("ai_enabled must be true/false"))?;
            }
            "ai_api_key" => {
                self.ai_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "ai_api_base_url" => {
                self.ai_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "ai_model" => {
                self.ai_model = value.trim().to_string();
            }
            "ai_timeout_seconds" => {
                self.ai_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("ai_timeout_seconds must be a number"))?
                    .max(MIN_AI_TIMEOUT_SECONDS);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: api_port|api.port, bind_address|api.bind_address, db_path|db.path, variant|engine.variant, session_ttl_hours|auth.session_ttl_hours, ai_enabled|ai.enabled, ai_api_key|ai.api_key, ai_api_base_url|ai.base_url, ai_model|ai.model, ai_timeout_seconds|ai.timeout_seconds"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "api_port" => Some(self.api_port.to_string()),
            "bind_address" => Some(self.bind_address.clone()),
            "db_path" => Some(self.db_path.display().to_string()),
            "variant" => Some(self.variant.as_str().to_string()),
            "session_ttl_hours" => Some(self.session_ttl_hours.to_string()),
            "ai_enabled" => Some(self.ai_enabled.to_string()),
            "ai_api_key" => Some(
                self.ai_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "ai_api_base_url" => Some(self.ai_api_base_url.clone()),
            "ai_model" => Some(self.ai_model.clone()),
            "ai_timeout_seconds" => Some(self.ai_timeout_seconds.to_string()),
            _ => None,
        }
    }

    /// Environment variable first, then the stored key. Blank values count
    /// as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                self.ai_api_key
                    .clone()
                    .filter(|value| !value.trim().is_empty())
            })
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "api_port" | "api.port" => "api_port",
        "bind_address" | "api.bind_address" => "bind_address",
        "db_path" | "db.path" => "db_path",
        "variant" | "engine.variant" => "variant",
        "session_ttl_hours" | "auth.session_ttl_hours" => "session_ttl_hours",
        "ai_enabled" | "ai.enabled" => "ai_enabled",
        "ai_api_key" | "ai.api_key" => "ai_api_key",
        "ai_api_base_url" | "ai.base_url" => "ai_api_base_url",
        "ai_model" | "ai.model" => "ai_model",
        "ai_timeout_seconds" | "ai.timeout_seconds" => "ai_timeout_seconds",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::engine::Variant;
    use tempfile::TempDir;

    #[test]
    fn dotted_aliases_set_and_get_the_same_field() {
        let mut config = Config::default();

        config.set_value("engine.variant", "B").expect("set variant");
        config.set_value("api.port", "8088").expect("set port");
        config.set_value("ai.timeout_seconds", "1").expect("set timeout");

        assert_eq!(config.variant, Variant::Quadratic);
        assert_eq!(config.get_value("variant").as_deref(), Some("quadratic"));
        assert_eq!(config.get_value("api_port").as_deref(), Some("8088"));
        assert_eq!(config.ai_timeout_seconds, 5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();

        assert!(config.set_value("api_port", "seventy").is_err());
        assert!(config.set_value("bind_address", "localhost:80").is_err());
        assert!(config.set_value("session_ttl_hours", "0").is_err());
        assert!(config.set_value("variant", "linear").is_err());
        assert!(config.set_value("report_time", "23:30").is_err());
        assert_eq!(config.variant, Variant::Threshold);
    }

    #[test]
    fn api_key_is_masked() {
        let mut config = Config::default();
        assert_eq!(config.get_value("ai.api_key").as_deref(), Some("not_set"));

        config.set_value("ai_api_key", "sk-test").expect("set key");
        assert_eq!(config.get_value("ai_api_key").as_deref(), Some("***set***"));

        config.set_value("ai_api_key", "  ").expect("clear key");
        assert!(config.ai_api_key.is_none());
    }

    #[test]
    fn saved_config_round_trips_with_missing_keys_defaulted() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"variant":"quadratic","api_port":6000}"#)
            .expect("write partial config");
        let mut config = Config::load_from(&path).expect("load partial config");
        assert_eq!(config.variant, Variant::Quadratic);
        assert_eq!(config.api_port, 6000);
        assert_eq!(config.session_ttl_hours, 24 * 7);

        config.set_value("bind_address", "0.0.0.0").expect("set bind");
        config.save_to(&path).expect("save config");
        let reloaded = Config::load_from(&path).expect("reload config");
        assert_eq!(reloaded.bind_address, "0.0.0.0");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
