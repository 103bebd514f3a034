use anyhow::Result;
use log::{debug, error, info, warn};
use std::future::Future;
use std::path::Path;
use tokio::sync::mpsc;

use super::classify::{classify, Action, OutboundReply};
use super::table::CommandTable;
use crate::config::Config;
use crate::logutil::escape_log;
use crate::meshtastic::{
    InboundPacket, NodeIdentity, PortKind, Transport, TransportError, TransportEvent,
};
use crate::metrics::BeaconMetrics;
use crate::validation::lint_commands;

/// Everything the beacon loaded at startup.
///
/// `settings` is `None` when `config.json` could not be loaded; in that case it is
/// not written back at shutdown.
#[derive(Debug, Default)]
pub struct BeaconContext {
    pub settings: Option<Config>,
    pub commands: CommandTable,
    pub metrics: BeaconMetrics,
}

impl BeaconContext {
    /// Build the context, logging any command-table problems.
    pub fn new(settings: Option<Config>, commands: CommandTable) -> Self {
        if commands.is_empty() {
            warn!("No commands configured; only empty messages will be answered");
        }
        for lint in lint_commands(&commands) {
            warn!("commands.json: {}", lint);
        }
        Self {
            settings,
            commands,
            metrics: BeaconMetrics::new(),
        }
    }
}

/// What happened to the settings document at shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsOutcome {
    Saved,
    /// Settings never loaded, file left untouched
    Skipped,
    Failed(String),
}

/// # Beacon Server
///
/// Owns the [`BeaconContext`] and a [`Transport`], drains transport events one at a
/// time and answers text commands.
///
/// ```text
/// Transport ──events──▶ BeaconServer ──▶ classify ──▶ dispatcher
///     ▲                      │
///     └──────send_text───────┘
/// ```
///
/// ## Usage
///
/// ```rust,no_run
/// use duvan_beacon::beacon::{BeaconContext, BeaconServer, CommandTable};
/// use duvan_beacon::meshtastic::{MeshtasticTransport, SerialSettings};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let context = BeaconContext::new(None, CommandTable::starter());
///     let transport = MeshtasticTransport::new(SerialSettings::new("/dev/ttyUSB0", 115200));
///     let mut server = BeaconServer::new(context, transport);
///     if let Err(e) = server.connect().await {
///         eprintln!("radio unavailable: {e}");
///     }
///     server.run().await?;
///     server.shutdown(None).await;
///     Ok(())
/// }
/// ```
pub struct BeaconServer<T: Transport> {
    context: BeaconContext,
    transport: T,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    identity: Option<NodeIdentity>,
}

impl<T: Transport> BeaconServer<T> {
    pub fn new(context: BeaconContext, transport: T) -> Self {
        Self {
            context,
            transport,
            events: None,
            identity: None,
        }
    }

    pub fn context(&self) -> &BeaconContext {
        &self.context
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Identity announced by the radio, if the link came up.
    pub fn identity(&self) -> Option<&NodeIdentity> {
        self.identity.as_ref()
    }

    /// True while the transport's event channel is open.
    pub fn is_connected(&self) -> bool {
        self.events.is_some()
    }

    /// Connect the transport. The caller decides whether a failure matters.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        let rx = self.transport.connect().await?;
        self.events = Some(rx);
        if let Some(identity) = self.transport.identity() {
            debug!("Transport reports identity {}", identity.id);
        }
        Ok(())
    }

    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Packet(packet) => {
                self.handle_packet(&packet);
            }
            TransportEvent::ConnectionEstablished(identity) => {
                info!(
                    "Connected to radio: {} ({}) {} [{}]",
                    escape_log(&identity.long_name),
                    escape_log(&identity.short_name),
                    identity.id,
                    identity.hw_model
                );
                self.identity = Some(identity);
            }
            TransportEvent::ConnectionLost => {
                warn!("Connection to radio lost; no further packets will be received");
                self.events = None;
            }
        }
    }

    /// Classify one packet and send the reply, if any.
    pub fn handle_packet(&self, packet: &InboundPacket) -> Action {
        let metrics = &self.context.metrics;
        metrics.inc_packets_received();
        if packet.port == Some(PortKind::TextMessage) {
            metrics.inc_text_messages();
        }

        let action = classify(packet, &self.context.commands, metrics);

        match &action {
            Action::Reply(reply) => self.send_reply(reply),
            Action::Ignore => metrics.inc_ignored_packets(),
        }
        action
    }

    fn send_reply(&self, reply: &OutboundReply) {
        match self.transport.send_text(&reply.destination, &reply.text) {
            Ok(()) => {
                self.context.metrics.inc_replies_sent();
                info!("Reply to {}: {}", reply.destination, escape_log(&reply.text));
            }
            Err(e) => {
                self.context.metrics.inc_send_failures();
                warn!("Failed to send reply to {}: {}", reply.destination, e);
            }
        }
    }

    /// Process events until Ctrl-C.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Process events until `shutdown` completes. Without a transport the loop idles.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Beacon running with {} command(s)", self.context.commands.len());
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
                event = async {
                    if let Some(ref mut rx) = self.events {
                        rx.recv().await
                    } else {
                        std::future::pending().await
                    }
                } => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            warn!("Transport event channel closed");
                            self.events = None;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Persist settings (if they loaded), close the transport and log the counters.
    pub async fn shutdown(&mut self, settings_path: Option<&Path>) -> SettingsOutcome {
        info!("Shutting down beacon");
        let outcome = match (&self.context.settings, settings_path) {
            (Some(settings), Some(path)) => match settings.save(path).await {
                Ok(()) => {
                    info!("Settings saved to {}", path.display());
                    SettingsOutcome::Saved
                }
                Err(e) => {
                    error!("Could not save settings: {}", e);
                    SettingsOutcome::Failed(e.to_string())
                }
            },
            (None, Some(path)) => {
                warn!("Settings were not loaded; leaving {} untouched", path.display());
                SettingsOutcome::Skipped
            }
            (_, None) => SettingsOutcome::Skipped,
        };

        if let Err(e) = self.transport.close().await {
            warn!("Error closing transport: {}", e);
        }
        self.events = None;
        info!("Traffic: {}", self.context.metrics.snapshot());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::signal::SignalMetrics;
    use crate::beacon::table::CommandEntry;
    use crate::meshtastic::mock::MockTransport;

    fn context() -> BeaconContext {
        BeaconContext::new(
            None,
            CommandTable::new(vec![CommandEntry::new("ping", "pong {rssi_msg}")]),
        )
    }

    #[tokio::test]
    async fn reply_is_sent_to_sender() {
        let (transport, handle) = MockTransport::new(MockTransport::default_identity());
        let mut server = BeaconServer::new(context(), transport);
        server.connect().await.unwrap();

        let packet =
            InboundPacket::text_message(0x1f, "ping", SignalMetrics::new(Some(-90.0), None));
        let action = server.handle_packet(&packet);
        assert!(matches!(action, Action::Reply(_)));

        let sent = handle.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, "!1f");
        assert_eq!(sent[0].text, "pong -90.0 dBm");
        assert_eq!(server.context().metrics.snapshot().replies_sent, 1);
    }

    #[tokio::test]
    async fn send_failure_is_counted_not_fatal() {
        let (transport, _handle) = MockTransport::new(MockTransport::default_identity());
        let mut server = BeaconServer::new(context(), transport.failing_send());
        server.connect().await.unwrap();

        let packet = InboundPacket::text_message(2, "ping", SignalMetrics::default());
        server.handle_packet(&packet);
        let snap = server.context().metrics.snapshot();
        assert_eq!(snap.send_failures, 1);
        assert_eq!(snap.replies_sent, 0);
    }

    #[tokio::test]
    async fn connection_events_update_state() {
        let (transport, _handle) = MockTransport::new(MockTransport::default_identity());
        let mut server = BeaconServer::new(context(), transport);
        server.connect().await.unwrap();
        assert!(server.is_connected());

        server.handle_event(TransportEvent::ConnectionEstablished(
            MockTransport::default_identity(),
        ));
        assert_eq!(server.identity().unwrap().short_name, "MOCK");

        server.handle_event(TransportEvent::ConnectionLost);
        assert!(!server.is_connected());
    }

    #[tokio::test]
    async fn shutdown_skips_unloaded_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (transport, handle) = MockTransport::new(MockTransport::default_identity());
        let mut server = BeaconServer::new(context(), transport);

        assert_eq!(server.shutdown(Some(&path)).await, SettingsOutcome::Skipped);
        assert!(!path.exists());
        assert!(handle.is_closed());
    }
}
