//! In-memory [`Transport`] for tests and dry runs.
//!
//! [`MockTransport::new`] returns the transport together with a [`MockHandle`]; the
//! handle injects inbound events and records what the beacon sent.

use super::{decode_identity, NodeIdentity, Transport, TransportError, TransportEvent};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// One text handed to [`Transport::send_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub destination: String,
    pub text: String,
}

#[derive(Debug, Default)]
struct Shared {
    sent: Vec<SentText>,
    connected: bool,
    closed: bool,
    connect_attempts: u32,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct MockTransport {
    identity: NodeIdentity,
    fail_connect: bool,
    fail_send: bool,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    shared: Arc<Mutex<Shared>>,
}

/// Test-side handle to a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    shared: Arc<Mutex<Shared>>,
}

impl MockTransport {
    pub fn new(identity: NodeIdentity) -> (Self, MockHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(Shared::default()));
        let handle = MockHandle {
            event_tx: event_tx.clone(),
            shared: shared.clone(),
        };
        (
            Self {
                identity,
                fail_connect: false,
                fail_send: false,
                event_tx,
                event_rx: Some(event_rx),
                shared,
            },
            handle,
        )
    }

    /// Identity used when the caller does not care.
    pub fn default_identity() -> NodeIdentity {
        NodeIdentity {
            long_name: "Mock Beacon".into(),
            short_name: "MOCK".into(),
            id: "!0000beac".into(),
            hw_model: "PORTDUINO".into(),
        }
    }

    /// Make every `connect` fail.
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Make every `send_text` fail after validating the destination.
    pub fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }
}

impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError> {
        lock(&self.shared).connect_attempts += 1;
        if self.fail_connect {
            return Err(TransportError::Unavailable("mock radio offline".into()));
        }
        let rx = self
            .event_rx
            .take()
            .ok_or_else(|| TransportError::Unavailable("mock transport already used".into()))?;
        lock(&self.shared).connected = true;
        let _ = self
            .event_tx
            .send(TransportEvent::ConnectionEstablished(self.identity.clone()));
        Ok(rx)
    }

    fn identity(&self) -> Option<NodeIdentity> {
        lock(&self.shared).connected.then(|| self.identity.clone())
    }

    fn send_text(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        decode_identity(destination)?;
        let mut shared = lock(&self.shared);
        if !shared.connected {
            return Err(TransportError::NotConnected);
        }
        if self.fail_send {
            return Err(TransportError::QueueClosed);
        }
        shared.sent.push(SentText {
            destination: destination.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut shared = lock(&self.shared);
        shared.connected = false;
        shared.closed = true;
        Ok(())
    }
}

impl MockHandle {
    /// Deliver an event as if it came from the radio.
    pub fn inject(&self, event: TransportEvent) -> bool {
        self.event_tx.send(event).is_ok()
    }

    pub fn inject_packet(&self, packet: super::InboundPacket) -> bool {
        self.inject(TransportEvent::Packet(packet))
    }

    /// Simulate the radio dropping off the bus.
    pub fn lose_connection(&self) -> bool {
        lock(&self.shared).connected = false;
        self.inject(TransportEvent::ConnectionLost)
    }

    pub fn sent(&self) -> Vec<SentText> {
        lock(&self.shared).sent.clone()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.shared).closed
    }

    pub fn connect_attempts(&self) -> u32 {
        lock(&self.shared).connect_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::signal::SignalMetrics;
    use crate::meshtastic::InboundPacket;

    #[tokio::test]
    async fn connect_announces_identity_first() {
        let (mut transport, handle) = MockTransport::new(MockTransport::default_identity());
        assert!(transport.identity().is_none());
        let mut rx = transport.connect().await.unwrap();
        handle.inject_packet(InboundPacket::text_message(1, "ping", SignalMetrics::default()));
        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::ConnectionEstablished(_))
        ));
        assert!(matches!(rx.recv().await, Some(TransportEvent::Packet(_))));
        assert_eq!(transport.identity().unwrap().short_name, "MOCK");
    }

    #[tokio::test]
    async fn send_records_and_validates() {
        let (mut transport, handle) = MockTransport::new(MockTransport::default_identity());
        assert!(matches!(
            transport.send_text("!1", "early"),
            Err(TransportError::NotConnected)
        ));
        let _rx = transport.connect().await.unwrap();
        transport.send_text("!1", "hello").unwrap();
        assert!(transport.send_text("nobody", "x").is_err());
        assert_eq!(
            handle.sent(),
            vec![SentText {
                destination: "!1".into(),
                text: "hello".into()
            }]
        );
        transport.close().await.unwrap();
        assert!(handle.is_closed());
        assert!(transport.identity().is_none());
    }

    #[tokio::test]
    async fn failing_connect_reports_error() {
        let (transport, handle) = MockTransport::new(MockTransport::default_identity());
        let mut transport = transport.failing_connect();
        assert!(transport.connect().await.is_err());
        assert_eq!(handle.connect_attempts(), 1);
    }
}
