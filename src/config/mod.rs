//! # Configuration Management Module
//!
//! The beacon keeps two JSON files in its configuration directory (default `config/`):
//!
//! - `config.json` - free-form settings object. It is loaded at start and written back
//!   unmodified at shutdown, so operators (and future modules) may keep any keys they
//!   like in it. Key order is preserved.
//! - `commands.json` - the command table, see [`crate::beacon::table`].
//!
//! A few optional keys are read through typed views with defaults:
//!
//! ```json
//! {
//!     "meshtastic": {
//!         "port": "/dev/ttyUSB0",
//!         "baud_rate": 115200,
//!         "connect_timeout_secs": 10,
//!         "min_send_gap_ms": 1000
//!     }
//! }
//! ```
//!
//! Reading a view never changes the stored document.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use duvan_beacon::config::{Config, ConfigPaths};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let paths = ConfigPaths::new("config");
//!     let config = Config::load(paths.settings()).await?;
//!     println!("Serial port: {:?}", config.meshtastic().port);
//!     config.save(paths.settings()).await?;
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

pub const SETTINGS_FILE: &str = "config.json";
pub const COMMANDS_FILE: &str = "commands.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} must contain a JSON object at the top level")]
    NotAnObject { path: String },
}

/// Locations of the two configuration files.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    dir: PathBuf,
}

impl ConfigPaths {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    pub fn commands(&self) -> PathBuf {
        self.dir.join(COMMANDS_FILE)
    }
}

/// Device connection settings (the `meshtastic` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshtasticConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM3`
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Seconds to wait for the radio's config dump before giving up on connect
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Minimum gap between consecutive text sends (ms)
    #[serde(default = "default_min_send_gap_ms")]
    pub min_send_gap_ms: u64,
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_min_send_gap_ms() -> u64 {
    1000
}

impl Default for MeshtasticConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            connect_timeout_secs: default_connect_timeout_secs(),
            min_send_gap_ms: default_min_send_gap_ms(),
        }
    }
}

/// The settings document. Stored verbatim; typed sections are views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    document: Map<String, Value>,
}

impl Config {
    pub fn from_document(document: Map<String, Value>) -> Self {
        Self { document }
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Map<String, Value>>(content).map(Self::from_document)
    }

    /// Load configuration from a file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let value: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        match value {
            Value::Object(document) => Ok(Self::from_document(document)),
            _ => Err(ConfigError::NotAnObject {
                path: path.display().to_string(),
            }),
        }
    }

    /// Write the document back with 4-space indentation.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = to_pretty_json(&self.document).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        fs::write(path, json)
            .await
            .map_err(|source| ConfigError::Write {
                path: path.display().to_string(),
                source,
            })
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Typed view of the `meshtastic` section. Missing or malformed sections yield
    /// defaults; a malformed section is logged.
    pub fn meshtastic(&self) -> MeshtasticConfig {
        self.section("meshtastic")
    }

    fn section<T: for<'de> Deserialize<'de> + Default>(&self, key: &str) -> T {
        match self.document.get(key) {
            None | Some(Value::Null) => T::default(),
            Some(value) => match T::deserialize(value) {
                Ok(section) => section,
                Err(e) => {
                    log::warn!("Ignoring malformed '{}' settings section: {}", key, e);
                    T::default()
                }
            },
        }
    }

    /// Settings written by `init`.
    pub fn starter() -> Self {
        let mut meshtastic = Map::new();
        meshtastic.insert("port".into(), Value::String("/dev/ttyUSB0".into()));
        meshtastic.insert("baud_rate".into(), Value::from(default_baud_rate()));
        let mut document = Map::new();
        document.insert("meshtastic".into(), Value::Object(meshtastic));
        Self { document }
    }
}

/// Pretty JSON with 4-space indentation and a trailing newline.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meshtastic_defaults_when_missing() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.meshtastic(), MeshtasticConfig::default());
        assert_eq!(config.meshtastic().baud_rate, 115200);
    }

    #[test]
    fn meshtastic_partial_section() {
        let config = Config::from_json(r#"{"meshtastic":{"port":"/dev/ttyACM0"}}"#).unwrap();
        let m = config.meshtastic();
        assert_eq!(m.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(m.connect_timeout_secs, 10);
    }

    #[test]
    fn malformed_section_falls_back_to_defaults() {
        let config = Config::from_json(r#"{"meshtastic":"nope"}"#).unwrap();
        assert_eq!(config.meshtastic(), MeshtasticConfig::default());
    }

    #[test]
    fn reading_views_does_not_touch_document() {
        let json = r#"{"zeta":1,"meshtastic":{"extra":true},"alpha":[1,2]}"#;
        let config = Config::from_json(json).unwrap();
        let _ = config.meshtastic();
        let keys: Vec<&str> = config.document().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "meshtastic", "alpha"]);
        assert_eq!(config.get("meshtastic"), Some(&serde_json::json!({"extra": true})));
    }

    #[test]
    fn pretty_json_uses_four_spaces() {
        let out = to_pretty_json(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(out, "{\n    \"a\": 1\n}\n");
    }

    #[test]
    fn paths_join_file_names() {
        let paths = ConfigPaths::new("cfg");
        assert_eq!(paths.settings(), PathBuf::from("cfg").join("config.json"));
        assert_eq!(paths.commands(), PathBuf::from("cfg").join("commands.json"));
    }
}
