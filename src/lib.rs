//! # Duvan Beacon - Command Responder for Meshtastic Networks
//!
//! Duvan Beacon listens on a locally attached Meshtastic radio for text messages,
//! matches the first word of each message against a configurable command table and
//! replies with a formatted response that may include the link quality (RSSI, SNR)
//! the message arrived with.
//!
//! ## Features
//!
//! - **Table-driven commands**: `commands.json` maps trigger words to response templates.
//! - **Signal reports**: `{rssi_msg}` / `{snr_msg}` placeholders, rounded to two decimals.
//! - **Serial transport**: minimal Meshtastic stream-protocol client over USB/UART.
//! - **Fails soft**: bad config, a missing radio or a malformed packet is logged, never fatal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duvan_beacon::beacon::{BeaconContext, BeaconServer, CommandTable};
//! use duvan_beacon::config::{Config, ConfigPaths};
//! use duvan_beacon::meshtastic::{MeshtasticTransport, SerialSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let paths = ConfigPaths::new("config");
//!     let settings = Config::load(paths.settings()).await.ok();
//!     let commands = CommandTable::load(paths.commands()).await.unwrap_or_default();
//!
//!     let transport = MeshtasticTransport::new(SerialSettings::new("/dev/ttyUSB0", 115200));
//!     let mut server = BeaconServer::new(BeaconContext::new(settings, commands), transport);
//!     let _ = server.connect().await;
//!     server.run().await?;
//!     server.shutdown(Some(&paths.settings())).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`beacon`] - command table, dispatcher, classifier and the server loop
//! - [`meshtastic`] - transport trait, serial client and mock
//! - [`config`] - JSON settings and paths
//! - [`validation`] - command-table lint and payload sizing
//! - [`metrics`] - traffic counters
//! - [`protobuf`] - the Meshtastic protobuf subset
//! - [`logutil`] - log-safe rendering of untrusted text

pub mod beacon;
pub mod config;
pub mod logutil;
pub mod meshtastic;
pub mod metrics;
pub mod protobuf;
pub mod validation;
