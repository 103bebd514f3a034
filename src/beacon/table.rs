//! The command table: ordered `(trigger, response)` pairs loaded from `commands.json`.
//!
//! ```json
//! { "commands": [ { "command": "ping", "response": "pong {rssi_msg} {snr_msg}" } ] }
//! ```
//!
//! Order is significant: when two entries share a trigger, the earlier one wins.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    /// Literal first word that selects this entry (case-sensitive)
    #[serde(rename = "command")]
    pub trigger: String,
    /// Reply text; may contain `{rssi_msg}` / `{snr_msg}`
    pub response: String,
}

impl CommandEntry {
    pub fn new(trigger: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            response: response.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTable {
    #[serde(default)]
    pub commands: Vec<CommandEntry>,
}

impl CommandTable {
    pub fn new(commands: Vec<CommandEntry>) -> Self {
        Self { commands }
    }

    /// Load the table from a JSON file.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Write the table as pretty JSON (used by `init`).
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = crate::config::to_pretty_json(self).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| ConfigError::Write {
                path: path.display().to_string(),
                source,
            })
    }

    /// First entry whose trigger equals `candidate` exactly.
    pub fn find(&self, candidate: &str) -> Option<&CommandEntry> {
        self.commands.iter().find(|entry| entry.trigger == candidate)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandEntry> {
        self.commands.iter()
    }

    /// Starter table written by `init`.
    pub fn starter() -> Self {
        Self::new(vec![
            CommandEntry::new("ping", "pong! RSSI {rssi_msg} SNR {snr_msg}"),
            CommandEntry::new("test", "Test received. Signal: {rssi_msg}, {snr_msg}"),
            CommandEntry::new("help", "Commands: ping, test, help"),
        ])
    }
}
