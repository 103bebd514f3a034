//! Reader pipeline without hardware: raw serial bytes through the framer and the
//! session state machine.

use duvan_beacon::meshtastic::framer::{encode_frame, StreamFramer};
use duvan_beacon::meshtastic::session::RadioSession;
use duvan_beacon::meshtastic::{PortKind, TransportEvent};
use duvan_beacon::protobuf::meshtastic_generated as proto;
use prost::Message;

const CONFIG_ID: u32 = 0x5eed;

fn from_radio(variant: proto::from_radio::PayloadVariant) -> Vec<u8> {
    encode_frame(
        &proto::FromRadio {
            id: 0,
            payload_variant: Some(variant),
        }
        .encode_to_vec(),
    )
}

fn boot_stream() -> Vec<u8> {
    use proto::from_radio::PayloadVariant;
    let mut stream = Vec::new();
    stream.extend_from_slice(b"INFO  | ??:??:?? 3 Booting\r\n");
    stream.extend(from_radio(PayloadVariant::MyInfo(proto::MyNodeInfo {
        my_node_num: 0xdead_beef,
    })));
    stream.extend(from_radio(PayloadVariant::NodeInfo(proto::NodeInfo {
        num: 0xdead_beef,
        user: Some(proto::User {
            id: "!deadbeef".into(),
            long_name: "Hill Beacon".into(),
            short_name: "HILL".into(),
            hw_model: 4,
            ..Default::default()
        }),
        ..Default::default()
    })));
    stream.extend_from_slice(b"DEBUG | noise between frames\r\n");
    stream.extend(from_radio(PayloadVariant::ConfigCompleteId(CONFIG_ID)));
    stream.extend(from_radio(PayloadVariant::Packet(proto::MeshPacket {
        from: 0x42,
        to: 0xdead_beef,
        rx_rssi: -88,
        rx_snr: 9.75,
        payload_variant: Some(proto::mesh_packet::PayloadVariant::Decoded(proto::Data {
            portnum: proto::PortNum::TextMessageApp as i32,
            payload: b"ping".to_vec(),
            ..Default::default()
        })),
        ..Default::default()
    })));
    stream
}

fn drain(framer: &mut StreamFramer, session: &mut RadioSession) -> Vec<TransportEvent> {
    let mut events = Vec::new();
    while let Some(frame) = framer.next_frame() {
        if let Ok(Some(event)) = session.handle_frame(&frame) {
            events.push(event);
        }
    }
    events
}

fn assert_boot_events(events: &[TransportEvent]) {
    assert_eq!(events.len(), 2, "{events:?}");
    match &events[0] {
        TransportEvent::ConnectionEstablished(id) => {
            assert_eq!(id.long_name, "Hill Beacon");
            assert_eq!(id.short_name, "HILL");
            assert_eq!(id.id, "!deadbeef");
            assert_eq!(id.hw_model, "TBEAM");
        }
        other => panic!("expected ConnectionEstablished, got {other:?}"),
    }
    match &events[1] {
        TransportEvent::Packet(p) => {
            assert_eq!(p.source, 0x42);
            assert_eq!(p.port, Some(PortKind::TextMessage));
            assert_eq!(p.text.as_deref(), Some("ping"));
            assert_eq!(p.metrics.rssi_msg(), "-88.0 dBm");
            assert_eq!(p.metrics.snr_msg(), "9.75 dB");
        }
        other => panic!("expected Packet, got {other:?}"),
    }
}

#[test]
fn whole_stream_at_once() {
    let mut framer = StreamFramer::new();
    let mut session = RadioSession::new(CONFIG_ID);
    framer.push(&boot_stream());
    assert_boot_events(&drain(&mut framer, &mut session));
}

#[test]
fn byte_by_byte_delivery() {
    let mut framer = StreamFramer::new();
    let mut session = RadioSession::new(CONFIG_ID);
    let mut events = Vec::new();
    for byte in boot_stream() {
        framer.push(&[byte]);
        events.extend(drain(&mut framer, &mut session));
    }
    assert_boot_events(&events);
}

#[test]
fn wrong_config_id_never_establishes() {
    let mut framer = StreamFramer::new();
    let mut session = RadioSession::new(CONFIG_ID + 1);
    framer.push(&boot_stream());
    let events = drain(&mut framer, &mut session);
    assert!(events
        .iter()
        .all(|e| !matches!(e, TransportEvent::ConnectionEstablished(_))));
    assert!(!session.is_established());
}
