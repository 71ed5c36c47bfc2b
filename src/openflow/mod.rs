//! OpenFlow 1.3 switch commands
//!
//! The controller speaks to switches through [`SwitchChannel`]; wire encoding
//! belongs to whatever sits behind the channel. Commands are plain data so a
//! run can be recorded and replayed.

mod channel;
mod programmer;

pub use channel::{RecordingChannel, SimulatedFabric, SimulatedSwitch};
pub use programmer::FlowProgrammer;

use crate::protocol::MacAddr;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Datapath id of a switch
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dpid(pub u64);

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Dpid {
    type Err = Error;

    /// Parses the 16 hex digit form ("0000000000000001").
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.len() > 16 {
            return Err(Error::Parse(format!("invalid datapath id: {:?}", s)));
        }
        u64::from_str_radix(s, 16)
            .map(Dpid)
            .map_err(|_| Error::Parse(format!("invalid datapath id: {:?}", s)))
    }
}

/// Where an output action sends the packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPort {
    Port(u32),
    /// OFPP_FLOOD: every port in the forwarding state except the ingress
    Flood,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Output(OutputPort),
}

impl Action {
    pub fn is_flood(&self) -> bool {
        matches!(self, Action::Output(OutputPort::Flood))
    }
}

/// Match fields; `None` is a wildcard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_port: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_dst: Option<MacAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_dst: Option<Ipv4Addr>,
}

impl FlowMatch {
    pub fn ipv4_dst(in_port: u32, dst: Ipv4Addr) -> Self {
        Self {
            in_port: Some(in_port),
            ipv4_dst: Some(dst),
            ..Default::default()
        }
    }

    pub fn eth_dst(in_port: u32, dst: MacAddr) -> Self {
        Self {
            in_port: Some(in_port),
            eth_dst: Some(dst),
            ..Default::default()
        }
    }

    /// Non-strict delete semantics: every field set in `self` must be equal
    /// in `other`.
    pub fn covers(&self, other: &FlowMatch) -> bool {
        fn field<T: PartialEq>(filter: &Option<T>, value: &Option<T>) -> bool {
            filter.as_ref().map_or(true, |f| value.as_ref() == Some(f))
        }
        field(&self.in_port, &other.in_port)
            && field(&self.eth_dst, &other.eth_dst)
            && field(&self.ipv4_dst, &other.ipv4_dst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    ApplyActions(Vec<Action>),
    Meter(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowModCommand {
    Add,
    /// Non-strict delete with out_port and out_group set to ANY
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMod {
    pub command: FlowModCommand,
    #[serde(rename = "match")]
    pub flow_match: FlowMatch,
    pub priority: u16,
    pub idle_timeout: u16,
    pub instructions: Vec<Instruction>,
}

impl FlowMod {
    /// True when any applied action floods
    pub fn floods(&self) -> bool {
        self.instructions.iter().any(|inst| match inst {
            Instruction::ApplyActions(actions) => actions.iter().any(Action::is_flood),
            Instruction::Meter(_) => false,
        })
    }

    pub fn meter_id(&self) -> Option<u32> {
        self.instructions.iter().find_map(|inst| match inst {
            Instruction::Meter(id) => Some(*id),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeterBand {
    Drop { rate: u32, burst_size: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterMod {
    pub meter_id: u32,
    /// Rates are in kbit/s (OFPMF_KBPS)
    pub bands: Vec<MeterBand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketOut {
    /// Switch-side buffer holding the packet, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<u32>,
    pub in_port: u32,
    pub actions: Vec<Action>,
    /// Raw frame, only sent when the switch did not buffer it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwitchCommand {
    FlowMod(FlowMod),
    MeterMod(MeterMod),
    PacketOut(PacketOut),
}

/// Fire-and-forget command sink for one or more switches
pub trait SwitchChannel {
    fn send(&mut self, dpid: Dpid, command: SwitchCommand) -> Result<()>;
}

impl SwitchChannel for tokio::sync::mpsc::UnboundedSender<(Dpid, SwitchCommand)> {
    fn send(&mut self, dpid: Dpid, command: SwitchCommand) -> Result<()> {
        tokio::sync::mpsc::UnboundedSender::send(self, (dpid, command)).map_err(|_| {
            Error::SwitchCommand {
                dpid,
                reason: "command channel closed".into(),
            }
        })
    }
}
