//! # Meshtastic Transport Module
//!
//! The beacon talks to its radio through the narrow [`Transport`] trait: connect, ask
//! for the node identity, send a text, close. Inbound traffic arrives as
//! [`TransportEvent`]s on the channel returned by [`Transport::connect`].
//!
//! Two implementations ship with the crate:
//!
//! - [`MeshtasticTransport`] - USB/UART serial link to a real device (feature `serial`).
//!   A reader task decodes `FromRadio` frames, a writer task encodes `ToRadio` frames;
//!   both share the port.
//! - [`mock::MockTransport`] - in-memory transport for tests and dry runs.
//!
//! ## Serial Protocol
//!
//! Frames are `0x94 0xC3 <len_hi> <len_lo> <protobuf>` (see [`framer`]). On connect the
//! writer sends a `want_config_id` request; the radio answers with its node info and
//! configuration, terminated by `config_complete_id`. Only then is the link considered
//! established and the identity known (see [`session`]).
//!
//! ```rust,no_run
//! # #[cfg(feature = "serial")]
//! # {
//! use duvan_beacon::meshtastic::{MeshtasticTransport, SerialSettings, Transport, TransportEvent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut radio = MeshtasticTransport::new(SerialSettings::new("/dev/ttyUSB0", 115200));
//!     let mut events = radio.connect().await?;
//!     while let Some(event) = events.recv().await {
//!         if let TransportEvent::Packet(p) = event {
//!             println!("packet from {:08x}", p.source);
//!         }
//!     }
//!     Ok(())
//! }
//! # }
//! ```

pub mod framer;
pub mod mock;
pub mod session;

use crate::beacon::signal::SignalMetrics;
use crate::config::MeshtasticConfig;
use crate::logutil::escape_log;
use crate::protobuf::meshtastic_generated as proto;
use log::{debug, info, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Destination address meaning "every node on the channel".
pub const BROADCAST_ADDR: u32 = 0xffff_ffff;
/// Largest text payload the firmware accepts in one packet (bytes).
pub const MAX_TEXT_PAYLOAD: usize = 233;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid node id '{0}'")]
    InvalidNodeId(String),
    #[error("transport is not connected")]
    NotConnected,
    #[error("failed to open serial port {port}: {reason}")]
    Open { port: String, reason: String },
    #[error("radio did not complete the config handshake within {0}s")]
    HandshakeTimeout(u64),
    #[error("radio link closed during the config handshake")]
    HandshakeAborted,
    #[error("serial support not compiled in (enable the `serial` feature)")]
    SerialUnavailable,
    #[error("outbound queue closed")]
    QueueClosed,
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application port of an inbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    TextMessage,
    Telemetry,
    Position,
    NodeInfo,
    /// Any other port, by raw `PortNum` value
    Other(i32),
}

impl PortKind {
    pub fn from_portnum(value: i32) -> Self {
        match proto::PortNum::try_from(value) {
            Ok(proto::PortNum::TextMessageApp) => PortKind::TextMessage,
            Ok(proto::PortNum::TelemetryApp) => PortKind::Telemetry,
            Ok(proto::PortNum::PositionApp) => PortKind::Position,
            Ok(proto::PortNum::NodeinfoApp) => PortKind::NodeInfo,
            _ => PortKind::Other(value),
        }
    }
}

/// A packet received from the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPacket {
    /// Sender node number
    pub source: u32,
    /// `None` when the payload could not be decoded (e.g. encrypted for another channel)
    pub port: Option<PortKind>,
    /// Body of a text message; `None` for other ports or non-UTF-8 payloads
    pub text: Option<String>,
    pub metrics: SignalMetrics,
}

impl InboundPacket {
    /// Convenience constructor for a decoded text message.
    pub fn text_message(source: u32, text: impl Into<String>, metrics: SignalMetrics) -> Self {
        Self {
            source,
            port: Some(PortKind::TextMessage),
            text: Some(text.into()),
            metrics,
        }
    }

    pub fn from_mesh_packet(pkt: &proto::MeshPacket) -> Self {
        use proto::mesh_packet::PayloadVariant;
        // Protobuf defaults mean "not measured"
        let metrics = SignalMetrics {
            rssi: (pkt.rx_rssi != 0).then_some(pkt.rx_rssi as f64),
            snr: (pkt.rx_snr != 0.0).then_some(pkt.rx_snr as f64),
        };
        match &pkt.payload_variant {
            Some(PayloadVariant::Decoded(data)) => {
                let port = PortKind::from_portnum(data.portnum);
                let text = match port {
                    PortKind::TextMessage => String::from_utf8(data.payload.clone()).ok(),
                    _ => None,
                };
                Self {
                    source: pkt.from,
                    port: Some(port),
                    text,
                    metrics,
                }
            }
            Some(PayloadVariant::Encrypted(_)) | None => Self {
                source: pkt.from,
                port: None,
                text: None,
                metrics,
            },
        }
    }
}

/// Identity the radio reports for itself during the config handshake.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NodeIdentity {
    pub long_name: String,
    pub short_name: String,
    /// `!hex` node id
    pub id: String,
    pub hw_model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Packet(InboundPacket),
    ConnectionEstablished(NodeIdentity),
    ConnectionLost,
}

/// `!` followed by the lowercase hex node number, no padding.
pub fn encode_identity(node_num: u32) -> String {
    format!("!{:x}", node_num)
}

/// Parse a destination back into a node number. Accepts `!hex`, `0xhex` and the
/// broadcast alias `^all`.
pub fn decode_identity(destination: &str) -> Result<u32, TransportError> {
    let trimmed = destination.trim();
    if trimmed == "^all" {
        return Ok(BROADCAST_ADDR);
    }
    let hex = trimmed
        .strip_prefix('!')
        .or_else(|| trimmed.strip_prefix("0x"))
        .ok_or_else(|| TransportError::InvalidNodeId(destination.to_string()))?;
    u32::from_str_radix(hex, 16).map_err(|_| TransportError::InvalidNodeId(destination.to_string()))
}

/// Boundary between the beacon and its radio.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Establish the link. Events (starting with `ConnectionEstablished`) arrive on the
    /// returned channel in delivery order.
    async fn connect(&mut self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError>;

    /// Identity of the attached node, once the link is established.
    fn identity(&self) -> Option<NodeIdentity>;

    /// Queue a text message for `destination` (`!hex` node id or `^all`).
    fn send_text(&self, destination: &str, text: &str) -> Result<(), TransportError>;

    /// Tear the link down. Safe to call when not connected.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Control messages for the reader and writer tasks
#[derive(Debug)]
pub enum ControlMessage {
    Shutdown,
    /// Our own node number, learned by the reader from `my_info`
    SetNodeId(u32),
}

/// Outgoing text for the writer task
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub to_node: u32,
    /// Channel index (0 = primary)
    pub channel: u32,
    pub content: String,
}

/// Serial link parameters.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub connect_timeout: Duration,
    /// Minimum gap between consecutive text sends
    pub min_send_gap: Duration,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        let defaults = MeshtasticConfig::default();
        Self {
            port: port.into(),
            baud_rate,
            connect_timeout: Duration::from_secs(defaults.connect_timeout_secs),
            min_send_gap: Duration::from_millis(defaults.min_send_gap_ms),
        }
    }

    pub fn from_config(port: impl Into<String>, config: &MeshtasticConfig) -> Self {
        Self {
            port: port.into(),
            baud_rate: config.baud_rate,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            min_send_gap: Duration::from_millis(config.min_send_gap_ms),
        }
    }
}

/// Serial transport to a locally attached Meshtastic device.
pub struct MeshtasticTransport {
    settings: SerialSettings,
    identity_rx: Option<watch::Receiver<Option<NodeIdentity>>>,
    outgoing_tx: Option<mpsc::UnboundedSender<OutgoingMessage>>,
    reader_control_tx: Option<mpsc::UnboundedSender<ControlMessage>>,
    writer_control_tx: Option<mpsc::UnboundedSender<ControlMessage>>,
    tasks: Vec<JoinHandle<()>>,
}

impl MeshtasticTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            identity_rx: None,
            outgoing_tx: None,
            reader_control_tx: None,
            writer_control_tx: None,
            tasks: Vec::new(),
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn stop_tasks(&mut self) {
        if let Some(tx) = self.reader_control_tx.take() {
            let _ = tx.send(ControlMessage::Shutdown);
        }
        if let Some(tx) = self.writer_control_tx.take() {
            let _ = tx.send(ControlMessage::Shutdown);
        }
        self.outgoing_tx = None;
        self.identity_rx = None;
    }

    #[cfg(feature = "serial")]
    async fn connect_serial(
        &mut self,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError> {
        info!(
            "Connecting to Meshtastic device on {} at {} baud",
            self.settings.port, self.settings.baud_rate
        );
        let port = serial::open_shared_port(&self.settings.port, self.settings.baud_rate).await?;

        let mut config_request_id: u32 = rand::random();
        if config_request_id == 0 {
            config_request_id = 1;
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();
        let (identity_tx, mut identity_rx) = watch::channel::<Option<NodeIdentity>>(None);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<OutgoingMessage>();
        let (reader_control_tx, reader_control_rx) = mpsc::unbounded_channel::<ControlMessage>();
        let (writer_control_tx, writer_control_rx) = mpsc::unbounded_channel::<ControlMessage>();

        let reader = serial::MeshtasticReader::new(
            port.clone(),
            session::RadioSession::new(config_request_id),
            event_tx,
            identity_tx,
            reader_control_rx,
            writer_control_tx.clone(),
        );
        let writer = serial::MeshtasticWriter::new(
            port,
            outgoing_rx,
            writer_control_rx,
            config_request_id,
            self.settings.min_send_gap,
        );

        self.tasks.push(tokio::spawn(async move {
            reader.run().await;
        }));
        self.tasks.push(tokio::spawn(async move {
            writer.run().await;
        }));
        self.outgoing_tx = Some(outgoing_tx);
        self.reader_control_tx = Some(reader_control_tx);
        self.writer_control_tx = Some(writer_control_tx);

        let timeout = self.settings.connect_timeout;
        let handshake = tokio::time::timeout(timeout, identity_rx.wait_for(|id| id.is_some()))
            .await
            .map(|res| res.is_ok());
        match handshake {
            Ok(true) => {
                self.identity_rx = Some(identity_rx);
                Ok(event_rx)
            }
            Ok(false) => {
                self.stop_tasks();
                Err(TransportError::HandshakeAborted)
            }
            Err(_) => {
                warn!(
                    "No config response from {}; is the device in PROTO serial mode? (meshtastic --set serial.mode PROTO)",
                    self.settings.port
                );
                self.stop_tasks();
                Err(TransportError::HandshakeTimeout(timeout.as_secs()))
            }
        }
    }
}

impl Transport for MeshtasticTransport {
    async fn connect(&mut self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError> {
        if self.outgoing_tx.is_some() {
            self.stop_tasks();
        }
        #[cfg(feature = "serial")]
        {
            self.connect_serial().await
        }
        #[cfg(not(feature = "serial"))]
        {
            warn!(
                "Serial support not compiled in; cannot open {}",
                self.settings.port
            );
            Err(TransportError::SerialUnavailable)
        }
    }

    fn identity(&self) -> Option<NodeIdentity> {
        self.identity_rx
            .as_ref()
            .and_then(|rx| rx.borrow().clone())
    }

    fn send_text(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        let to_node = decode_identity(destination)?;
        let tx = self.outgoing_tx.as_ref().ok_or(TransportError::NotConnected)?;
        let content = crate::validation::fit_payload(text, MAX_TEXT_PAYLOAD);
        if content.len() != text.len() {
            warn!(
                "Reply to {} truncated from {} to {} bytes",
                destination,
                text.len(),
                content.len()
            );
        }
        debug!("Queueing text to {}: {}", destination, escape_log(&content));
        tx.send(OutgoingMessage {
            to_node,
            channel: 0,
            content: content.into_owned(),
        })
        .map_err(|_| TransportError::QueueClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.outgoing_tx.is_none() && self.tasks.is_empty() {
            return Ok(());
        }
        info!("Closing Meshtastic interface on {}", self.settings.port);
        self.stop_tasks();
        for task in self.tasks.drain(..) {
            if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                warn!("Meshtastic task did not stop within 2s");
            }
        }
        info!("Meshtastic interface closed");
        Ok(())
    }
}

#[cfg(feature = "serial")]
mod serial {
    //! Reader and writer tasks sharing one serial port.

    use super::framer::{encode_frame, StreamFramer};
    use super::session::RadioSession;
    use super::{ControlMessage, NodeIdentity, OutgoingMessage, TransportError, TransportEvent};
    use super::BROADCAST_ADDR;
    use crate::logutil::{hex_snippet, truncate_for_log};
    use crate::protobuf::meshtastic_generated as proto;
    use log::{debug, error, info, trace, warn};
    use prost::Message;
    use serialport::SerialPort;
    use std::io::{Read, Write};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use tokio::sync::{mpsc, watch};
    use tokio::time::sleep;

    pub(super) type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

    /// Hard read failures in a row before the link is declared lost
    const MAX_CONSECUTIVE_READ_ERRORS: u32 = 5;

    /// Open the port 8N1, wake the device and drop any buffered boot text.
    pub(super) async fn open_shared_port(
        port_name: &str,
        baud_rate: u32,
    ) -> Result<SharedPort, TransportError> {
        let mut builder = serialport::new(port_name, baud_rate).timeout(Duration::from_millis(500));
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None);
        }
        let mut port = builder.open().map_err(|e| TransportError::Open {
            port: port_name.to_string(),
            reason: e.to_string(),
        })?;
        // Toggle DTR/RTS so ESP32 based boards wake up
        let _ = port.write_data_terminal_ready(true);
        let _ = port.write_request_to_send(true);
        sleep(Duration::from_millis(150)).await;

        let mut purge_buf = [0u8; 512];
        if let Ok(available) = port.bytes_to_read() {
            if available > 0 {
                let _ = port.read(&mut purge_buf);
            }
        }
        debug!("Serial port {} initialized", port_name);
        Ok(Arc::new(Mutex::new(port)))
    }

    pub(super) struct MeshtasticReader {
        port: SharedPort,
        framer: StreamFramer,
        session: RadioSession,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
        identity_tx: watch::Sender<Option<NodeIdentity>>,
        control_rx: mpsc::UnboundedReceiver<ControlMessage>,
        writer_control_tx: mpsc::UnboundedSender<ControlMessage>,
        consecutive_errors: u32,
    }

    impl MeshtasticReader {
        pub(super) fn new(
            port: SharedPort,
            session: RadioSession,
            event_tx: mpsc::UnboundedSender<TransportEvent>,
            identity_tx: watch::Sender<Option<NodeIdentity>>,
            control_rx: mpsc::UnboundedReceiver<ControlMessage>,
            writer_control_tx: mpsc::UnboundedSender<ControlMessage>,
        ) -> Self {
            Self {
                port,
                framer: StreamFramer::new(),
                session,
                event_tx,
                identity_tx,
                control_rx,
                writer_control_tx,
                consecutive_errors: 0,
            }
        }

        pub(super) async fn run(mut self) {
            info!("Starting Meshtastic reader task");
            let mut interval = tokio::time::interval(Duration::from_millis(10));
            loop {
                tokio::select! {
                    control_msg = self.control_rx.recv() => {
                        match control_msg {
                            Some(ControlMessage::Shutdown) | None => {
                                info!("Reader task received shutdown signal");
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = self.read_and_process() {
                            self.consecutive_errors += 1;
                            warn!(
                                "Serial read error ({}/{}): {}",
                                self.consecutive_errors, MAX_CONSECUTIVE_READ_ERRORS, e
                            );
                            if self.consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                                error!("Serial link lost");
                                let _ = self.event_tx.send(TransportEvent::ConnectionLost);
                                break;
                            }
                            sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
            info!("Meshtastic reader task shutting down");
        }

        fn read_and_process(&mut self) -> std::io::Result<()> {
            let mut buffer = [0u8; 1024];
            let read_result = {
                let mut port = self
                    .port
                    .lock()
                    .map_err(|_| {
                        std::io::Error::new(std::io::ErrorKind::Other, "port mutex poisoned")
                    })?;
                port.read(&mut buffer)
            };
            match read_result {
                Ok(0) => Ok(()),
                Ok(n) => {
                    self.consecutive_errors = 0;
                    trace!("RAW {} bytes: {}", n, hex_snippet(&buffer[..n], 64));
                    self.framer.push(&buffer[..n]);
                    while let Some(frame) = self.framer.next_frame() {
                        self.process_frame(&frame);
                    }
                    Ok(())
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(()),
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    debug!("Serial read interrupted (EINTR), likely shutdown in progress");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }

        fn process_frame(&mut self, frame: &[u8]) {
            let known_before = self.session.our_node_id();
            match self.session.handle_frame(frame) {
                Ok(Some(event)) => {
                    if let TransportEvent::ConnectionEstablished(identity) = &event {
                        self.identity_tx.send_replace(Some(identity.clone()));
                    }
                    let _ = self.event_tx.send(event);
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(
                        "Undecodable frame ({} bytes, {}): {}...",
                        frame.len(),
                        e,
                        hex_snippet(frame, 16)
                    );
                }
            }
            if known_before.is_none() {
                if let Some(id) = self.session.our_node_id() {
                    let _ = self.writer_control_tx.send(ControlMessage::SetNodeId(id));
                }
            }
        }
    }

    pub(super) struct MeshtasticWriter {
        port: SharedPort,
        outgoing_rx: mpsc::UnboundedReceiver<OutgoingMessage>,
        control_rx: mpsc::UnboundedReceiver<ControlMessage>,
        config_request_id: u32,
        our_node_id: Option<u32>,
        min_send_gap: Duration,
        last_text_send: Option<Instant>,
    }

    impl MeshtasticWriter {
        pub(super) fn new(
            port: SharedPort,
            outgoing_rx: mpsc::UnboundedReceiver<OutgoingMessage>,
            control_rx: mpsc::UnboundedReceiver<ControlMessage>,
            config_request_id: u32,
            min_send_gap: Duration,
        ) -> Self {
            Self {
                port,
                outgoing_rx,
                control_rx,
                config_request_id,
                our_node_id: None,
                min_send_gap,
                last_text_send: None,
            }
        }

        pub(super) async fn run(mut self) {
            info!("Starting Meshtastic writer task");
            info!(
                "Requesting config from radio (want_config_id=0x{:08x})",
                self.config_request_id
            );
            if let Err(e) = self.send_want_config() {
                warn!("Initial config request failed: {}", e);
            }

            let period = Duration::from_secs(30);
            let mut heartbeat =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);

            loop {
                tokio::select! {
                    msg = self.outgoing_rx.recv() => {
                        match msg {
                            Some(outgoing) => {
                                if let Err(e) = self.send_text_message(&outgoing).await {
                                    error!("Failed to send message: {}", e);
                                }
                            }
                            None => break,
                        }
                    }
                    control_msg = self.control_rx.recv() => {
                        match control_msg {
                            Some(ControlMessage::Shutdown) | None => {
                                info!("Writer task received shutdown signal");
                                break;
                            }
                            Some(ControlMessage::SetNodeId(id)) => {
                                self.our_node_id = Some(id);
                                debug!("Writer: our node id is 0x{:08x}", id);
                            }
                        }
                    }
                    _ = heartbeat.tick() => {
                        if let Err(e) = self.send_heartbeat() {
                            debug!("Heartbeat failed: {}", e);
                        }
                    }
                }
            }
            info!("Meshtastic writer task shutting down");
        }

        async fn send_text_message(&mut self, msg: &OutgoingMessage) -> Result<(), TransportError> {
            self.enforce_min_send_gap().await;

            let is_dm = msg.to_node != BROADCAST_ADDR;
            let mut packet_id: u32 = rand::random();
            if packet_id == 0 {
                packet_id = 1;
            }
            let pkt = proto::MeshPacket {
                // firmware fills in `from` when left at zero
                from: self.our_node_id.unwrap_or(0),
                to: msg.to_node,
                channel: msg.channel,
                id: packet_id,
                hop_limit: 3,
                want_ack: is_dm,
                payload_variant: Some(proto::mesh_packet::PayloadVariant::Decoded(proto::Data {
                    portnum: proto::PortNum::TextMessageApp as i32,
                    payload: msg.content.as_bytes().to_vec(),
                    ..Default::default()
                })),
                ..Default::default()
            };
            let toradio = proto::ToRadio {
                payload_variant: Some(proto::to_radio::PayloadVariant::Packet(pkt)),
            };
            let written = self.send_toradio(&toradio)?;
            self.last_text_send = Some(Instant::now());
            debug!(
                "Sent text ({}): to=0x{:08x} channel={} id=0x{:08x} ({} bytes frame) text='{}'",
                if is_dm { "DM" } else { "broadcast" },
                msg.to_node,
                msg.channel,
                packet_id,
                written,
                truncate_for_log(&msg.content, 80)
            );
            Ok(())
        }

        async fn enforce_min_send_gap(&self) {
            if let Some(last) = self.last_text_send {
                let elapsed = last.elapsed();
                if elapsed < self.min_send_gap {
                    let wait = self.min_send_gap - elapsed;
                    debug!("Gating: waiting {}ms before next text send", wait.as_millis());
                    sleep(wait).await;
                }
            }
        }

        fn send_want_config(&mut self) -> Result<usize, TransportError> {
            let msg = proto::ToRadio {
                payload_variant: Some(proto::to_radio::PayloadVariant::WantConfigId(
                    self.config_request_id,
                )),
            };
            self.send_toradio(&msg)
        }

        fn send_heartbeat(&mut self) -> Result<usize, TransportError> {
            let msg = proto::ToRadio {
                payload_variant: Some(proto::to_radio::PayloadVariant::Heartbeat(
                    proto::Heartbeat {
                        nonce: rand::random::<u32>() & 0xffff,
                    },
                )),
            };
            self.send_toradio(&msg)
        }

        fn send_toradio(&mut self, msg: &proto::ToRadio) -> Result<usize, TransportError> {
            let frame = encode_frame(&msg.encode_to_vec());
            let mut port = self
                .port
                .lock()
                .map_err(|_| TransportError::Unavailable("port mutex poisoned".into()))?;
            port.write_all(&frame)?;
            port.flush()?;
            trace!("Sent ToRadio frame ({} bytes)", frame.len());
            Ok(frame.len())
        }
    }
}
