//! Packet classifier
//!
//! Turns a raw packet-in frame into the header summary the decision engine
//! branches on. Only the Ethernet header is mandatory; an inner header that
//! fails to parse is reported as absent.

use super::arp::ArpPacket;
use super::ethernet::Frame;
use super::ipv4::{Ipv4Header, Protocol};
use super::tcp::TcpHeader;
use super::{EtherType, MacAddr};
use crate::Result;
use std::net::Ipv4Addr;
use tracing::trace;

/// Ethernet header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetInfo {
    pub src: MacAddr,
    pub dst: MacAddr,
    pub ethertype: u16,
    pub vlan: Option<u16>,
}

/// IPv4 header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Info {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
}

/// TCP header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpInfo {
    pub src_port: u16,
    pub dst_port: u16,
}

/// Structured view of a packet-in frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPacket {
    pub in_port: u32,
    pub ethernet: EthernetInfo,
    pub arp: Option<ArpPacket>,
    pub ipv4: Option<Ipv4Info>,
    /// Only present when `ipv4` is present
    pub tcp: Option<TcpInfo>,
}

/// Classify a frame received on `in_port`.
///
/// Fails with [`crate::Error::MalformedFrame`] only when the Ethernet header
/// itself is missing.
pub fn classify(data: &[u8], in_port: u32) -> Result<ClassifiedPacket> {
    let frame = Frame::parse(data)?;
    let ethernet = EthernetInfo {
        src: frame.src_mac(),
        dst: frame.dst_mac(),
        ethertype: frame.ethertype(),
        vlan: frame.vlan_tag().map(|tag| tag.vid),
    };

    let mut packet = ClassifiedPacket {
        in_port,
        ethernet,
        arp: None,
        ipv4: None,
        tcp: None,
    };

    match EtherType::from_u16(ethernet.ethertype) {
        Some(EtherType::Arp) => match ArpPacket::parse(frame.payload()) {
            Ok(arp) => packet.arp = Some(arp),
            Err(e) => trace!("port {}: ignoring ARP payload: {}", in_port, e),
        },
        Some(EtherType::Ipv4) => match Ipv4Header::parse(frame.payload()) {
            Ok(ip) => {
                packet.ipv4 = Some(Ipv4Info {
                    src: ip.src_addr(),
                    dst: ip.dst_addr(),
                    protocol: ip.protocol(),
                });
                if Protocol::from_u8(ip.protocol()) == Some(Protocol::Tcp) {
                    match TcpHeader::parse(ip.payload()) {
                        Ok(tcp) => {
                            packet.tcp = Some(TcpInfo {
                                src_port: tcp.src_port(),
                                dst_port: tcp.dst_port(),
                            })
                        }
                        Err(e) => trace!("port {}: ignoring TCP header: {}", in_port, e),
                    }
                }
            }
            Err(e) => trace!("port {}: ignoring IPv4 payload: {}", in_port, e),
        },
        _ => {}
    }

    Ok(packet)
}
