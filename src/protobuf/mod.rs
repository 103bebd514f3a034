//! Meshtastic protobuf messages used on the serial link.
//!
//! Only the subset the beacon exchanges with the radio is declared here, using the
//! field numbers of the upstream `meshtastic/mesh.proto`. Fields we never read are
//! left out; prost skips unknown fields when decoding, so newer firmware stays
//! compatible.

pub mod meshtastic_generated {
    #![allow(clippy::derive_partial_eq_without_eq)]

    /// Application port a decoded payload belongs to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum PortNum {
        UnknownApp = 0,
        TextMessageApp = 1,
        RemoteHardwareApp = 2,
        PositionApp = 3,
        NodeinfoApp = 4,
        RoutingApp = 5,
        AdminApp = 6,
        TextMessageCompressedApp = 7,
        WaypointApp = 8,
        AudioApp = 9,
        DetectionSensorApp = 10,
        ReplyApp = 32,
        IpTunnelApp = 33,
        PaxcounterApp = 34,
        SerialApp = 64,
        StoreForwardApp = 65,
        RangeTestApp = 66,
        TelemetryApp = 67,
        ZpsApp = 68,
        SimulatorApp = 69,
        TracerouteApp = 70,
        NeighborinfoApp = 71,
        AtakPlugin = 72,
        MapReportApp = 73,
        PrivateApp = 256,
        AtakForwarder = 257,
        Max = 511,
    }

    /// Decoded payload of a [`MeshPacket`].
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Data {
        #[prost(enumeration = "PortNum", tag = "1")]
        pub portnum: i32,
        #[prost(bytes = "vec", tag = "2")]
        pub payload: ::prost::alloc::vec::Vec<u8>,
        #[prost(bool, tag = "3")]
        pub want_response: bool,
        #[prost(fixed32, tag = "4")]
        pub dest: u32,
        #[prost(fixed32, tag = "5")]
        pub source: u32,
        #[prost(fixed32, tag = "6")]
        pub request_id: u32,
        #[prost(fixed32, tag = "7")]
        pub reply_id: u32,
        #[prost(fixed32, tag = "8")]
        pub emoji: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct MeshPacket {
        #[prost(fixed32, tag = "1")]
        pub from: u32,
        #[prost(fixed32, tag = "2")]
        pub to: u32,
        #[prost(uint32, tag = "3")]
        pub channel: u32,
        #[prost(fixed32, tag = "6")]
        pub id: u32,
        #[prost(fixed32, tag = "7")]
        pub rx_time: u32,
        #[prost(float, tag = "8")]
        pub rx_snr: f32,
        #[prost(uint32, tag = "9")]
        pub hop_limit: u32,
        #[prost(bool, tag = "10")]
        pub want_ack: bool,
        #[prost(int32, tag = "11")]
        pub priority: i32,
        #[prost(int32, tag = "12")]
        pub rx_rssi: i32,
        #[prost(oneof = "mesh_packet::PayloadVariant", tags = "4, 5")]
        pub payload_variant: ::core::option::Option<mesh_packet::PayloadVariant>,
    }

    pub mod mesh_packet {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum PayloadVariant {
            #[prost(message, tag = "4")]
            Decoded(super::Data),
            #[prost(bytes, tag = "5")]
            Encrypted(::prost::alloc::vec::Vec<u8>),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct User {
        #[prost(string, tag = "1")]
        pub id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub long_name: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub short_name: ::prost::alloc::string::String,
        #[prost(bytes = "vec", tag = "4")]
        pub macaddr: ::prost::alloc::vec::Vec<u8>,
        /// `HardwareModel` enum value; see [`hardware_model_name`].
        #[prost(int32, tag = "5")]
        pub hw_model: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct NodeInfo {
        #[prost(uint32, tag = "1")]
        pub num: u32,
        #[prost(message, optional, tag = "2")]
        pub user: ::core::option::Option<User>,
        #[prost(float, tag = "4")]
        pub snr: f32,
        #[prost(fixed32, tag = "5")]
        pub last_heard: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct MyNodeInfo {
        #[prost(uint32, tag = "1")]
        pub my_node_num: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Heartbeat {
        #[prost(uint32, tag = "1")]
        pub nonce: u32,
    }

    /// Frames sent by the radio to the host.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FromRadio {
        #[prost(uint32, tag = "1")]
        pub id: u32,
        #[prost(oneof = "from_radio::PayloadVariant", tags = "2, 3, 4, 7, 8")]
        pub payload_variant: ::core::option::Option<from_radio::PayloadVariant>,
    }

    pub mod from_radio {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum PayloadVariant {
            #[prost(message, tag = "2")]
            Packet(super::MeshPacket),
            #[prost(message, tag = "3")]
            MyInfo(super::MyNodeInfo),
            #[prost(message, tag = "4")]
            NodeInfo(super::NodeInfo),
            #[prost(uint32, tag = "7")]
            ConfigCompleteId(u32),
            #[prost(bool, tag = "8")]
            Rebooted(bool),
        }
    }

    /// Frames sent by the host to the radio.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ToRadio {
        #[prost(oneof = "to_radio::PayloadVariant", tags = "1, 3, 4, 7")]
        pub payload_variant: ::core::option::Option<to_radio::PayloadVariant>,
    }

    pub mod to_radio {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum PayloadVariant {
            #[prost(message, tag = "1")]
            Packet(super::MeshPacket),
            #[prost(uint32, tag = "3")]
            WantConfigId(u32),
            #[prost(bool, tag = "4")]
            Disconnect(bool),
            #[prost(message, tag = "7")]
            Heartbeat(super::Heartbeat),
        }
    }

    /// Display name for a `HardwareModel` enum value.
    pub fn hardware_model_name(value: i32) -> String {
        let name = match value {
            0 => "UNSET",
            1 => "TLORA_V2",
            2 => "TLORA_V1",
            3 => "TLORA_V2_1_1P6",
            4 => "TBEAM",
            5 => "HELTEC_V2_0",
            6 => "TBEAM_V0P7",
            7 => "T_ECHO",
            8 => "TLORA_V1_1P3",
            9 => "RAK4631",
            10 => "HELTEC_V2_1",
            11 => "HELTEC_V1",
            12 => "LILYGO_TBEAM_S3_CORE",
            13 => "RAK11200",
            14 => "NANO_G1",
            15 => "TLORA_V2_1_1P8",
            16 => "TLORA_T3_S3",
            17 => "NANO_G1_EXPLORER",
            18 => "NANO_G2_ULTRA",
            25 => "STATION_G1",
            26 => "RAK11310",
            31 => "STATION_G2",
            37 => "PORTDUINO",
            39 => "DIY_V1",
            43 => "HELTEC_V3",
            44 => "HELTEC_WSL_V3",
            47 => "RPI_PICO",
            48 => "HELTEC_WIRELESS_TRACKER",
            49 => "HELTEC_WIRELESS_PAPER",
            50 => "T_DECK",
            51 => "T_WATCH_S3",
            255 => "PRIVATE_HW",
            other => return format!("HW_MODEL_{}", other),
        };
        name.to_string()
    }
}
