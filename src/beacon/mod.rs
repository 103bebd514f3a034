//! # Beacon Core
//!
//! The command-matching and response-formatting engine plus the event loop that
//! drives it.
//!
//! - [`table`] - command table loaded from `commands.json`
//! - [`signal`] - RSSI/SNR display format
//! - [`template`] - `{rssi_msg}` / `{snr_msg}` substitution
//! - [`commands`] - message body → optional reply
//! - [`classify`] - which packets reach the dispatcher
//! - [`server`] - context, event loop and shutdown

pub mod classify;
pub mod commands;
pub mod server;
pub mod signal;
pub mod table;
pub mod template;

pub use classify::{classify, Action, OutboundReply};
pub use commands::{handle, CommandDispatcher, EMPTY_COMMAND_REPLY};
pub use server::{BeaconContext, BeaconServer, SettingsOutcome};
pub use signal::{format_metric, MetricKind, SignalMetrics};
pub use table::{CommandEntry, CommandTable};
