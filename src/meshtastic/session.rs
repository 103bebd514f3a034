//! Host-side state of the radio link: learns our own node number and user record from
//! the config dump and turns decoded `FromRadio` frames into [`TransportEvent`]s.
//!
//! Kept free of any I/O so the handshake can be exercised with hand-built frames.

use super::{encode_identity, InboundPacket, NodeIdentity, TransportEvent};
use crate::logutil::escape_log;
use crate::protobuf::meshtastic_generated as proto;
use log::{debug, info, warn};
use prost::Message;

#[derive(Debug)]
pub struct RadioSession {
    config_request_id: u32,
    our_node_id: Option<u32>,
    our_user: Option<proto::User>,
    established: bool,
}

impl RadioSession {
    pub fn new(config_request_id: u32) -> Self {
        Self {
            config_request_id,
            our_node_id: None,
            our_user: None,
            established: false,
        }
    }

    pub fn our_node_id(&self) -> Option<u32> {
        self.our_node_id
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Decode one frame payload and update the session.
    pub fn handle_frame(
        &mut self,
        frame: &[u8],
    ) -> Result<Option<TransportEvent>, prost::DecodeError> {
        let msg = proto::FromRadio::decode(frame)?;
        Ok(self.handle_from_radio(msg))
    }

    pub fn handle_from_radio(&mut self, msg: proto::FromRadio) -> Option<TransportEvent> {
        use proto::from_radio::PayloadVariant;
        match msg.payload_variant? {
            PayloadVariant::MyInfo(info) => {
                debug!("my_info: node 0x{:08x}", info.my_node_num);
                self.our_node_id = Some(info.my_node_num);
                None
            }
            PayloadVariant::NodeInfo(node) => {
                if Some(node.num) == self.our_node_id {
                    if let Some(user) = node.user {
                        debug!("Own user record: {}", escape_log(&user.long_name));
                        self.our_user = Some(user);
                    }
                } else {
                    debug!("node_info for 0x{:08x}", node.num);
                }
                None
            }
            PayloadVariant::ConfigCompleteId(id) => {
                if id != self.config_request_id {
                    debug!(
                        "Ignoring config_complete_id 0x{:08x} (expected 0x{:08x})",
                        id, self.config_request_id
                    );
                    return None;
                }
                if self.established {
                    return None;
                }
                self.established = true;
                let identity = self.identity();
                info!(
                    "Radio config complete: {} ({}) {} [{}]",
                    identity.long_name, identity.short_name, identity.id, identity.hw_model
                );
                Some(TransportEvent::ConnectionEstablished(identity))
            }
            PayloadVariant::Packet(pkt) => {
                Some(TransportEvent::Packet(InboundPacket::from_mesh_packet(&pkt)))
            }
            PayloadVariant::Rebooted(_) => {
                warn!("Radio reported a reboot");
                None
            }
        }
    }

    /// Identity assembled from what the radio has told us so far.
    pub fn identity(&self) -> NodeIdentity {
        let node_num = self.our_node_id.unwrap_or(0);
        match &self.our_user {
            Some(user) => NodeIdentity {
                long_name: user.long_name.clone(),
                short_name: user.short_name.clone(),
                id: if user.id.is_empty() {
                    encode_identity(node_num)
                } else {
                    user.id.clone()
                },
                hw_model: proto::hardware_model_name(user.hw_model),
            },
            None => NodeIdentity {
                long_name: String::new(),
                short_name: String::new(),
                id: encode_identity(node_num),
                hw_model: proto::hardware_model_name(0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::from_radio::PayloadVariant;

    fn frame(variant: PayloadVariant) -> Vec<u8> {
        proto::FromRadio {
            id: 0,
            payload_variant: Some(variant),
        }
        .encode_to_vec()
    }

    fn config_dump(session: &mut RadioSession) {
        assert!(session
            .handle_frame(&frame(PayloadVariant::MyInfo(proto::MyNodeInfo { my_node_num: 0xabcd })))
            .unwrap()
            .is_none());
        let user = proto::User {
            id: "!abcd".into(),
            long_name: "Duvan Beacon".into(),
            short_name: "DUV".into(),
            hw_model: 9,
            ..Default::default()
        };
        assert!(session
            .handle_frame(&frame(PayloadVariant::NodeInfo(proto::NodeInfo {
                num: 0xabcd,
                user: Some(user),
                ..Default::default()
            })))
            .unwrap()
            .is_none());
    }

    #[test]
    fn handshake_produces_identity() {
        let mut session = RadioSession::new(77);
        config_dump(&mut session);
        assert_eq!(session.our_node_id(), Some(0xabcd));
        let event = session
            .handle_frame(&frame(PayloadVariant::ConfigCompleteId(77)))
            .unwrap();
        match event {
            Some(TransportEvent::ConnectionEstablished(id)) => {
                assert_eq!(id.long_name, "Duvan Beacon");
                assert_eq!(id.short_name, "DUV");
                assert_eq!(id.id, "!abcd");
                assert_eq!(id.hw_model, "RAK4631");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(session.is_established());
        // A repeated completion is not reported twice
        assert!(session
            .handle_frame(&frame(PayloadVariant::ConfigCompleteId(77)))
            .unwrap()
            .is_none());
    }

    #[test]
    fn stale_config_complete_is_ignored() {
        let mut session = RadioSession::new(77);
        config_dump(&mut session);
        assert!(session
            .handle_frame(&frame(PayloadVariant::ConfigCompleteId(12)))
            .unwrap()
            .is_none());
        assert!(!session.is_established());
    }

    #[test]
    fn other_nodes_do_not_overwrite_identity() {
        let mut session = RadioSession::new(1);
        config_dump(&mut session);
        let _ = session.handle_frame(&frame(PayloadVariant::NodeInfo(proto::NodeInfo {
            num: 0x1111,
            user: Some(proto::User {
                long_name: "Someone Else".into(),
                ..Default::default()
            }),
            ..Default::default()
        })));
        assert_eq!(session.identity().long_name, "Duvan Beacon");
    }

    #[test]
    fn identity_without_user_record_uses_node_number() {
        let mut session = RadioSession::new(1);
        let _ = session.handle_frame(&frame(PayloadVariant::MyInfo(proto::MyNodeInfo {
            my_node_num: 0x42,
        })));
        let id = session.identity();
        assert_eq!(id.id, "!42");
        assert_eq!(id.long_name, "");
    }

    #[test]
    fn mesh_packets_become_events() {
        let mut session = RadioSession::new(1);
        let pkt = proto::MeshPacket {
            from: 0x99,
            rx_rssi: -70,
            payload_variant: Some(proto::mesh_packet::PayloadVariant::Decoded(proto::Data {
                portnum: proto::PortNum::TextMessageApp as i32,
                payload: b"ping".to_vec(),
                ..Default::default()
            })),
            ..Default::default()
        };
        match session.handle_frame(&frame(PayloadVariant::Packet(pkt))).unwrap() {
            Some(TransportEvent::Packet(p)) => {
                assert_eq!(p.source, 0x99);
                assert_eq!(p.text.as_deref(), Some("ping"));
                assert_eq!(p.metrics.rssi, Some(-70.0));
                assert_eq!(p.metrics.snr, None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn garbage_frame_is_a_decode_error() {
        let mut session = RadioSession::new(1);
        assert!(session.handle_frame(&[0xff, 0xff, 0xff]).is_err());
    }
}
