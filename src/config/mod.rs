//! Application configuration loading and validation.
//!
//! The top-level `Config` aggregates the logger, broker, automation-server and
//! bridge sections. It is loaded once, before the tracing subscriber exists,
//! and is immutable afterwards.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::config::{bridge::BridgeConfig, logger::LoggerConfig, opcua::OpcUaConfig};

pub mod bridge;
pub mod logger;
pub mod opcua;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "OPCGATE_CONFIG";

/// Used when `OPCGATE_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/opcgate/config.toml";

/// Timestamp prefix for the pre-logger print macros.
#[doc(hidden)]
pub fn timestamp() -> String {
    let format = time::macros::format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    );
    time::OffsetDateTime::now_utc()
        .format(format)
        .unwrap_or_default()
}

/// Simple macros for printing timestamped messages before the tracing subscriber
/// is initialized. These are used during early configuration loading.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::timestamp()).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::timestamp()).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style($crate::config::timestamp()).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// Errors that can occur during configuration loading, parsing or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Generic configuration-related error with a descriptive message.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while accessing configuration files.
    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure to parse the TOML configuration file.
    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    /// Validation failure after successful parsing.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Broker connection (`[mqtt]`).
    #[validate(nested)]
    pub mqtt: opcgate_mqtt::Config,

    /// Automation server endpoint and node addresses (`[opcua]`).
    #[validate(nested)]
    pub opcua: OpcUaConfig,

    /// Topics and timing of the gateway itself (`[bridge]`).
    #[validate(nested)]
    pub bridge: BridgeConfig,
}

/// Where the configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named by the environment; must exist.
    Explicit(PathBuf),
    /// The well-known path, present on disk.
    Default(PathBuf),
    /// Nothing found; built-in defaults apply.
    BuiltIn,
}

impl ConfigSource {
    /// Resolves the source from the environment value and the fallback path.
    pub fn resolve(env_value: Option<String>, fallback: &Path) -> Self {
        match env_value {
            Some(path) if !path.trim().is_empty() => ConfigSource::Explicit(PathBuf::from(path)),
            _ if fallback.exists() => ConfigSource::Default(fallback.to_path_buf()),
            _ => ConfigSource::BuiltIn,
        }
    }
}

impl Config {
    /// Locates and loads the configuration.
    ///
    /// Priority:
    /// 1. `OPCGATE_CONFIG` environment variable
    /// 2. `/etc/opcgate/config.toml`
    /// 3. Built-in defaults (with a warning)
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if an explicitly named file is missing, or the
    /// file cannot be read, parsed or validated.
    pub fn new() -> Result<Self, ConfigError> {
        let source = ConfigSource::resolve(
            std::env::var(CONFIG_ENV).ok(),
            Path::new(DEFAULT_CONFIG_PATH),
        );
        Self::from_source(&source)
    }

    pub fn from_source(source: &ConfigSource) -> Result<Self, ConfigError> {
        match source {
            ConfigSource::Explicit(path) => {
                print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
                Self::load(path)
            }
            ConfigSource::Default(path) => {
                print_info!("Using default config path: {}", path.display());
                Self::load(path)
            }
            ConfigSource::BuiltIn => {
                print_warn!(
                    "No configuration file found (set {} or create {}); using built-in defaults",
                    CONFIG_ENV,
                    DEFAULT_CONFIG_PATH
                );
                let config = Config::default();
                config.check()?;
                Ok(config)
            }
        }
    }

    /// Loads and validates configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing, and validation errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let config_str = fs::read_to_string(path)?;
        let config = Self::parse(&config_str)?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn parse(text: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Field validation plus the broker's cross-field delay check.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        self.mqtt
            .check_delays()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.check().is_ok());
        assert_eq!(config.opcua.endpoint, "opc.tcp://localhost:4840");
        assert_eq!(config.bridge.poll_interval_ms, 1000);
    }

    #[test]
    fn test_resolve_prefers_environment() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("config.toml");
        fs::write(&fallback, "").unwrap();

        let source = ConfigSource::resolve(Some("/tmp/other.toml".into()), &fallback);
        assert_eq!(source, ConfigSource::Explicit(PathBuf::from("/tmp/other.toml")));
    }

    #[test]
    fn test_resolve_falls_back_to_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("config.toml");
        fs::write(&fallback, "").unwrap();

        assert_eq!(
            ConfigSource::resolve(None, &fallback),
            ConfigSource::Default(fallback.clone())
        );
    }

    #[test]
    fn test_resolve_uses_builtin_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("missing.toml");
        assert_eq!(ConfigSource::resolve(None, &fallback), ConfigSource::BuiltIn);
        assert!(Config::from_source(&ConfigSource::BuiltIn).is_ok());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = ConfigSource::Explicit(dir.path().join("nope.toml"));
        assert!(matches!(
            Config::from_source(&source),
            Err(ConfigError::Config(_))
        ));
    }

    #[test]
    fn test_load_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[logger]
level = "debug"

[mqtt]
host = "broker.local"
port = 1884
client_id = "plant-gw"

[opcua]
endpoint = "opc.tcp://plc.local:4840"
flag_node = "ns=2;s=Flag"
counter_node = "ns=2;i=7"

[bridge]
flag_topic = "plant/flag"
counter_topic = "plant/counter"
write_topic = "plant/counter/set"
read_topic = "plant/read"
snapshot_delay_ms = 500
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.opcua.flag_node.to_string(), "ns=2;s=Flag");
        assert_eq!(config.bridge.snapshot_delay_ms, 500);
        assert_eq!(config.bridge.poll_interval_ms, 1000);
    }

    #[test]
    fn test_reference_deployment_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("deploy/opcgate.toml");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.mqtt.client_id, "UEA-MPEE-sic-gw");
        assert_eq!(config.bridge.write_topic, "UEA/MPEE/sic/Contador");
    }

    #[test]
    fn test_malformed_node_address_is_parse_error() {
        let text = r#"
[opcua]
flag_node = "node-1000"
"#;
        assert!(matches!(Config::parse(text), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_section_is_validation_error() {
        let text = r#"
[bridge]
poll_interval_ms = 0
"#;
        assert!(matches!(
            Config::parse(text),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_inverted_reconnect_delays_rejected() {
        let text = r#"
[mqtt]
reconnect_delay = 10
reconnect_max_delay = 2
"#;
        assert!(matches!(
            Config::parse(text),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
