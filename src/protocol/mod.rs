//! Packet classification
//!
//! Header views for the protocols the controller inspects in packet-ins:
//! Ethernet (with 802.1Q), ARP, IPv4 and TCP.

pub mod arp;
pub mod classifier;
pub mod ethernet;
pub mod ipv4;
pub mod tcp;
pub mod types;

pub use classifier::{classify, ClassifiedPacket, EthernetInfo, Ipv4Info, TcpInfo};
pub use types::*;
