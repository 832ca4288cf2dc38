//! Configuration system for MeatMonsters
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (MEATMONSTERS_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Main process configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonstersConfig {
    /// Chat transport connection settings
    pub transport: TransportSettings,

    /// Trigger dispatch settings
    pub dispatch: DispatchSettings,

    /// Persona loading settings
    pub personas: PersonaSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Chat transport connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// API key stamped on every outbound reply
    pub api_key: String,

    /// WebSocket address of the chat server
    pub address: String,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Initial reconnect delay in milliseconds
    pub reconnect_interval_ms: u64,

    /// Upper bound for the reconnect backoff in milliseconds
    pub max_reconnect_delay_ms: u64,

    /// Maximum reconnection attempts (0 = infinite)
    pub max_reconnect_attempts: u32,

    /// Capacity of the inbound/outbound queues
    pub queue_size: usize,
}

/// Trigger dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Minimum seconds between two emitted replies, across all personas
    pub cooldown_secs: u64,

    /// Number of inbound events to observe before triggers are evaluated
    pub warmup_events: u64,

    /// Fixed RNG seed for reply selection (random if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Persona loading settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSettings {
    /// Directory holding one subdirectory per persona
    pub dir: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Log file rotation: hourly, daily, never
    pub rotation: String,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            address: "ws://127.0.0.1:3000".to_string(),
            connect_timeout_ms: 30000,
            reconnect_interval_ms: 1000,
            max_reconnect_delay_ms: 60000,
            max_reconnect_attempts: 0, // Infinite
            queue_size: 100,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 10,
            warmup_events: 10,
            seed: None,
        }
    }
}

impl Default for PersonaSettings {
    fn default() -> Self {
        Self {
            dir: "./monsters".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            rotation: "daily".to_string(),
            max_files: 5,
            json_format: false,
        }
    }
}

impl DispatchSettings {
    /// Cooldown as a duration
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl MonstersConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let config = Self::read(config_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration for `run`, with command-line overrides applied
    /// before anything is validated.
    pub fn load_for_run(
        config_path: Option<&str>,
        personas: Option<&str>,
        address: Option<&str>,
    ) -> Result<Self> {
        let mut config = Self::read(config_path)?;

        if let Some(dir) = personas {
            config.personas.dir = expand_path(dir);
        }
        if let Some(address) = address {
            config.transport.address = address.to_string();
        }

        config.validate()?;
        config.validate_for_run()?;
        Ok(config)
    }

    /// File, environment and path expansion; no validation
    fn read(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e.message()),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // An explicit path must exist
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("meatmonsters.toml"),
            dirs::config_dir()
                .map(|p| p.join("meatmonsters").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".meatmonsters").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/meatmonsters/config.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Transport settings
        if let Ok(val) = std::env::var("MEATMONSTERS_API_KEY") {
            self.transport.api_key = val;
        }
        if let Ok(val) = std::env::var("MEATMONSTERS_ADDRESS") {
            self.transport.address = val;
        }
        if let Ok(val) = std::env::var("MEATMONSTERS_MAX_RECONNECT_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                self.transport.max_reconnect_attempts = n;
            }
        }

        // Dispatch settings
        if let Ok(val) = std::env::var("MEATMONSTERS_COOLDOWN_SECS") {
            if let Ok(n) = val.parse() {
                self.dispatch.cooldown_secs = n;
            }
        }
        if let Ok(val) = std::env::var("MEATMONSTERS_WARMUP_EVENTS") {
            if let Ok(n) = val.parse() {
                self.dispatch.warmup_events = n;
            }
        }
        if let Ok(val) = std::env::var("MEATMONSTERS_SEED") {
            if let Ok(n) = val.parse() {
                self.dispatch.seed = Some(n);
            }
        }

        // Persona settings
        if let Ok(val) = std::env::var("MEATMONSTERS_PERSONAS_DIR") {
            self.personas.dir = val;
        }

        // Logging settings
        if let Ok(val) = std::env::var("MEATMONSTERS_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("MEATMONSTERS_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("MEATMONSTERS_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.personas.dir = expand_path(&self.personas.dir);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let address = &self.transport.address;
        if address.is_empty() {
            return Err(Error::config_field_invalid(
                "transport.address",
                "Transport address cannot be empty",
            ));
        }
        if !address.starts_with("ws://") && !address.starts_with("wss://") {
            return Err(Error::config_field_invalid(
                "transport.address",
                "Transport address must start with ws:// or wss://",
            ));
        }
        if url::Url::parse(address).is_err() {
            return Err(Error::config_field_invalid(
                "transport.address",
                format!("Transport address '{}' is not a valid URL", address),
            ));
        }

        if self.transport.queue_size == 0 {
            return Err(Error::config_field_invalid(
                "transport.queue_size",
                "queue_size must be at least 1",
            ));
        }

        if self.personas.dir.is_empty() {
            return Err(Error::config_field_invalid(
                "personas.dir",
                "Persona directory cannot be empty",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        let valid_rotations = ["hourly", "daily", "never"];
        if !valid_rotations.contains(&self.logging.rotation.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.rotation",
                format!(
                    "Invalid rotation '{}'. Must be one of: {}",
                    self.logging.rotation,
                    valid_rotations.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Checks that only matter when actually connecting to a chat server
    pub fn validate_for_run(&self) -> Result<()> {
        if self.transport.api_key.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "transport.api_key",
                "An API key is required to post replies",
            ));
        }
        Ok(())
    }

    /// Get the persona directory as a PathBuf
    pub fn personas_dir(&self) -> PathBuf {
        PathBuf::from(&self.personas.dir)
    }
}

/// Expand ~ and environment variables in paths
pub fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| PathBuf::from("meatmonsters.toml"));

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    println!("Configuration file created: {}", config_path.display());
    Ok(())
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# MeatMonsters Configuration

[transport]
# API key included in every reply
api_key = ""

# WebSocket address of the chat server
address = "ws://127.0.0.1:3000"

# Connection timeout in milliseconds
connect_timeout_ms = 30000

# Initial reconnect delay in milliseconds
reconnect_interval_ms = 1000

# Upper bound for the reconnect backoff in milliseconds
max_reconnect_delay_ms = 60000

# Maximum reconnection attempts (0 = infinite)
max_reconnect_attempts = 0

# Inbound/outbound queue capacity
queue_size = 100

[dispatch]
# Minimum seconds between two replies, across all personas
cooldown_secs = 10

# Inbound events to skip after connecting (backlog replay)
warmup_events = 10

# Fixed seed for reply selection
# seed = 42

[personas]
# One subdirectory per persona
dir = "./monsters"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.meatmonsters/logs/meatmonsters.log"

# Log file rotation: hourly, daily, never
rotation = "daily"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = MonstersConfig::default();
        assert_eq!(config.transport.address, "ws://127.0.0.1:3000");
        assert_eq!(config.dispatch.cooldown_secs, 10);
        assert_eq!(config.dispatch.warmup_events, 10);
        assert_eq!(config.personas.dir, "./monsters");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_override() {
        env::set_var("MEATMONSTERS_ADDRESS", "wss://chat.example.com");
        env::set_var("MEATMONSTERS_COOLDOWN_SECS", "3");
        env::set_var("MEATMONSTERS_SEED", "7");

        let mut config = MonstersConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.transport.address, "wss://chat.example.com");
        assert_eq!(config.dispatch.cooldown_secs, 3);
        assert_eq!(config.dispatch.seed, Some(7));

        env::remove_var("MEATMONSTERS_ADDRESS");
        env::remove_var("MEATMONSTERS_COOLDOWN_SECS");
        env::remove_var("MEATMONSTERS_SEED");
    }

    #[test]
    fn test_validation_invalid_address() {
        let mut config = MonstersConfig::default();
        config.transport.address = "http://chat.example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = MonstersConfig::default();
        config.logging.level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::ConfigValidation { field: Some(ref f), .. } if f == "logging.level"
        ));
    }

    #[test]
    fn test_validation_invalid_rotation() {
        let mut config = MonstersConfig::default();
        config.logging.rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(MonstersConfig::default().validate().is_ok());
    }

    #[test]
    fn test_run_requires_api_key() {
        let mut config = MonstersConfig::default();
        assert!(config.validate_for_run().is_err());

        config.transport.api_key = "secret".to_string();
        assert!(config.validate_for_run().is_ok());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = MonstersConfig::default();
        config.personas.dir = "~/monsters".to_string();
        config.expand_paths();

        assert!(!config.personas.dir.contains('~'));
    }

    #[test]
    fn test_cooldown_duration() {
        let settings = DispatchSettings {
            cooldown_secs: 4,
            ..Default::default()
        };
        assert_eq!(settings.cooldown(), Duration::from_secs(4));
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[transport]
api_key = "abc123"
address = "wss://chat.example.com/socket"

[dispatch]
cooldown_secs = 30
warmup_events = 0
seed = 99

[personas]
dir = "/srv/monsters"
"#;

        let config: MonstersConfig = toml::from_str(config_str).unwrap();

        assert_eq!(config.transport.api_key, "abc123");
        assert_eq!(config.transport.address, "wss://chat.example.com/socket");
        assert_eq!(config.transport.queue_size, 100);
        assert_eq!(config.dispatch.cooldown_secs, 30);
        assert_eq!(config.dispatch.warmup_events, 0);
        assert_eq!(config.dispatch.seed, Some(99));
        assert_eq!(config.personas.dir, "/srv/monsters");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = MonstersConfig::load(Some("/nonexistent/meatmonsters.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "[transport\naddress = ").unwrap();

        let err = MonstersConfig::load(path.to_str()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_run_overrides_apply_before_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("meatmonsters.toml");
        fs::write(
            &path,
            "[transport]\napi_key = \"k\"\naddress = \"http://stale.example.com\"\n",
        )
        .unwrap();

        let err = MonstersConfig::load(path.to_str()).unwrap_err();
        assert!(matches!(
            err,
            Error::ConfigValidation { field: Some(ref f), .. } if f == "transport.address"
        ));

        let config = MonstersConfig::load_for_run(
            path.to_str(),
            Some("/srv/monsters"),
            Some("ws://127.0.0.1:9000"),
        )
        .unwrap();
        assert_eq!(config.transport.address, "ws://127.0.0.1:9000");
        assert_eq!(config.personas.dir, "/srv/monsters");
    }

    #[test]
    fn test_load_for_run_requires_api_key() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("meatmonsters.toml");
        fs::write(&path, "[dispatch]\ncooldown_secs = 1\n").unwrap();

        let err = MonstersConfig::load_for_run(path.to_str(), None, None).unwrap_err();
        assert!(matches!(
            err,
            Error::ConfigValidation { field: Some(ref f), .. } if f == "transport.api_key"
        ));
    }

    #[test]
    fn test_generated_default_config_parses() {
        let config: MonstersConfig = toml::from_str(&generate_default_config()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatch.cooldown_secs, 10);
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conf").join("meatmonsters.toml");
        let path_str = path.to_str().unwrap();

        init_config(Some(path_str), false).unwrap();
        assert!(path.exists());
        assert!(init_config(Some(path_str), false).is_err());
        assert!(init_config(Some(path_str), true).is_ok());
    }
}
