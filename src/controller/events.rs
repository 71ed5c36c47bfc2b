//! Inbound controller events
//!
//! Every event the controller reacts to is one [`ControllerEvent`] variant.
//! Events serialize to one JSON object per line so a run can be recorded
//! and replayed, e.g.
//!
//! ```json
//! {"event":"packet_in","dpid":1,"in_port":1,"data":"ffffffffffff..."}
//! {"event":"topology_change","dpid":1}
//! {"event":"port_state_change","dpid":1,"port":2,"state":"forwarding"}
//! ```

use crate::openflow::Dpid;
use crate::topology::PortState;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// OFP_NO_BUFFER: the switch did not buffer the packet
pub const NO_BUFFER: u32 = 0xffff_ffff;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketIn {
    pub dpid: Dpid,
    pub in_port: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<u32>,
    /// Raw frame, hex encoded on the wire
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl PacketIn {
    /// Buffer id to reference in the packet-out, if the switch kept one
    pub fn buffered(&self) -> Option<u32> {
        self.buffer_id.filter(|id| *id != NO_BUFFER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    PacketIn(PacketIn),
    TopologyChange {
        dpid: Dpid,
    },
    PortStateChange {
        dpid: Dpid,
        port: u32,
        state: PortState,
    },
}

impl ControllerEvent {
    pub fn dpid(&self) -> Dpid {
        match self {
            ControllerEvent::PacketIn(p) => p.dpid,
            ControllerEvent::TopologyChange { dpid } => *dpid,
            ControllerEvent::PortStateChange { dpid, .. } => *dpid,
        }
    }

    /// Parse one line of a recorded event stream.
    pub fn from_json_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| Error::Parse(format!("event: {}", e)))
    }

    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Parse(format!("event: {}", e)))
    }
}

mod hex_bytes {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt::Write;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(s, "{:02x}", b);
        }
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if s.len() % 2 != 0 {
            return Err(D::Error::custom("odd number of hex digits"));
        }
        (0..s.len())
            .step_by(2)
            .map(|i| {
                s.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| D::Error::custom(format!("invalid hex at offset {}", i)))
            })
            .collect()
    }
}
