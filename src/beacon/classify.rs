//! Packet classification: decides what, if anything, an inbound packet deserves.
//!
//! Only text messages reach the command dispatcher. Telemetry, position and node-info
//! packets are recognized and dropped; they are the natural hooks for future features.

use super::commands::handle;
use super::table::CommandTable;
use crate::logutil::escape_log;
use crate::meshtastic::{encode_identity, InboundPacket, PortKind};
use crate::metrics::BeaconMetrics;
use log::{debug, warn};
use thiserror::Error;

/// Reply to be sent back over the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    /// `!hex` node id of the recipient
    pub destination: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reply(OutboundReply),
    Ignore,
}

/// Why a packet could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("packet from {0} carries no decoded payload")]
    MissingPort(String),
    #[error("text packet from {0} has no UTF-8 body")]
    MissingText(String),
}

/// Classify `packet`, surfacing malformed packets as errors.
pub fn try_classify(packet: &InboundPacket, table: &CommandTable) -> Result<Action, PacketError> {
    let sender = encode_identity(packet.source);
    let port = packet.port.ok_or_else(|| PacketError::MissingPort(sender.clone()))?;

    match port {
        PortKind::TextMessage => {
            let text = packet
                .text
                .as_deref()
                .ok_or_else(|| PacketError::MissingText(sender.clone()))?;
            debug!("Text from {}: {}", sender, escape_log(text));
            Ok(match handle(text, &packet.metrics, table) {
                Some(reply) => Action::Reply(OutboundReply {
                    destination: sender,
                    text: reply,
                }),
                None => Action::Ignore,
            })
        }
        PortKind::Telemetry => {
            debug!("Telemetry from {} ignored", sender);
            Ok(Action::Ignore)
        }
        PortKind::Position => {
            debug!("Position from {} ignored", sender);
            Ok(Action::Ignore)
        }
        PortKind::NodeInfo => {
            debug!("Node info from {} ignored", sender);
            Ok(Action::Ignore)
        }
        PortKind::Other(n) => {
            debug!("Port {} packet from {} ignored", n, sender);
            Ok(Action::Ignore)
        }
    }
}

/// Classify `packet`; malformed packets are logged, counted and ignored.
pub fn classify(packet: &InboundPacket, table: &CommandTable, metrics: &BeaconMetrics) -> Action {
    match try_classify(packet, table) {
        Ok(action) => action,
        Err(e) => {
            warn!("Error parsing packet: {}", e);
            metrics.inc_malformed_packets();
            Action::Ignore
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::signal::SignalMetrics;
    use crate::beacon::table::CommandEntry;

    fn table() -> CommandTable {
        CommandTable::new(vec![CommandEntry::new("ping", "pong {snr_msg}")])
    }

    fn run(packet: &InboundPacket) -> Action {
        classify(packet, &table(), &BeaconMetrics::new())
    }

    fn packet(port: Option<PortKind>, text: Option<&str>) -> InboundPacket {
        InboundPacket {
            source: 0xabcd,
            port,
            text: text.map(str::to_string),
            metrics: SignalMetrics::new(None, Some(3.0)),
        }
    }

    #[test]
    fn text_command_is_answered_to_sender() {
        let action = run(&packet(Some(PortKind::TextMessage), Some("ping")));
        assert_eq!(
            action,
            Action::Reply(OutboundReply {
                destination: "!abcd".into(),
                text: "pong 3.0 dB".into(),
            })
        );
    }

    #[test]
    fn unknown_text_is_ignored() {
        let action = run(&packet(Some(PortKind::TextMessage), Some("hello")));
        assert_eq!(action, Action::Ignore);
    }

    #[test]
    fn empty_text_gets_empty_command_reply() {
        match run(&packet(Some(PortKind::TextMessage), Some(""))) {
            Action::Reply(r) => assert_eq!(r.text, "Empty command."),
            Action::Ignore => panic!("empty text should be answered"),
        }
    }

    #[test]
    fn non_text_ports_are_ignored() {
        for port in [
            PortKind::Telemetry,
            PortKind::Position,
            PortKind::NodeInfo,
            PortKind::Other(32),
        ] {
            assert_eq!(
                try_classify(&packet(Some(port), Some("ping")), &table()),
                Ok(Action::Ignore)
            );
        }
    }

    #[test]
    fn malformed_packets_are_errors_then_ignored() {
        assert_eq!(
            try_classify(&packet(None, None), &table()),
            Err(PacketError::MissingPort("!abcd".into()))
        );
        assert_eq!(
            try_classify(&packet(Some(PortKind::TextMessage), None), &table()),
            Err(PacketError::MissingText("!abcd".into()))
        );

        let metrics = BeaconMetrics::new();
        assert_eq!(classify(&packet(None, None), &table(), &metrics), Action::Ignore);
        assert_eq!(
            classify(&packet(Some(PortKind::TextMessage), None), &table(), &metrics),
            Action::Ignore
        );
        assert_eq!(metrics.snapshot().malformed_packets, 2);
    }

    #[test]
    fn well_formed_packets_are_not_counted_as_malformed() {
        let metrics = BeaconMetrics::new();
        classify(&packet(Some(PortKind::TextMessage), Some("ping")), &table(), &metrics);
        classify(&packet(Some(PortKind::Telemetry), None), &table(), &metrics);
        assert_eq!(metrics.snapshot().malformed_packets, 0);
    }
}
