//! Ethernet II frame view

use super::{EtherType, MacAddr, VlanTag};
use crate::{Error, Result};

/// Ethernet header size without a VLAN tag
pub const HEADER_SIZE: usize = 14;
/// Header size with one 802.1Q tag
pub const VLAN_HEADER_SIZE: usize = 18;

/// Parsed Ethernet frame (zero-copy reference)
#[derive(Debug)]
pub struct Frame<'a> {
    buffer: &'a [u8],
    vlan_tag: Option<VlanTag>,
    payload_offset: usize,
}

impl<'a> Frame<'a> {
    /// Parse an Ethernet frame from a packet-in buffer.
    ///
    /// Fails with [`Error::MalformedFrame`] when the buffer cannot hold the
    /// (optionally tagged) header.
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(Error::MalformedFrame(format!(
                "{} bytes is shorter than an Ethernet header",
                buffer.len()
            )));
        }

        let outer = u16::from_be_bytes([buffer[12], buffer[13]]);
        let (vlan_tag, payload_offset) = if outer == EtherType::Vlan as u16 {
            if buffer.len() < VLAN_HEADER_SIZE {
                return Err(Error::MalformedFrame("truncated 802.1Q header".into()));
            }
            (
                Some(VlanTag::from_bytes([buffer[14], buffer[15]])),
                VLAN_HEADER_SIZE,
            )
        } else {
            (None, HEADER_SIZE)
        };

        Ok(Self {
            buffer,
            vlan_tag,
            payload_offset,
        })
    }

    pub fn dst_mac(&self) -> MacAddr {
        mac_at(self.buffer, 0)
    }

    pub fn src_mac(&self) -> MacAddr {
        mac_at(self.buffer, 6)
    }

    /// EtherType of the payload (the inner one for tagged frames)
    pub fn ethertype(&self) -> u16 {
        let offset = self.payload_offset - 2;
        u16::from_be_bytes([self.buffer[offset], self.buffer[offset + 1]])
    }

    pub fn vlan_tag(&self) -> Option<VlanTag> {
        self.vlan_tag
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.buffer[self.payload_offset..]
    }
}

fn mac_at(buffer: &[u8], offset: usize) -> MacAddr {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&buffer[offset..offset + 6]);
    MacAddr(mac)
}

/// Builder for constructing Ethernet frames
#[derive(Debug, Default)]
pub struct FrameBuilder {
    buffer: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dst_mac(mut self, mac: MacAddr) -> Self {
        self.buffer.extend_from_slice(&mac.0);
        self
    }

    pub fn src_mac(mut self, mac: MacAddr) -> Self {
        self.buffer.extend_from_slice(&mac.0);
        self
    }

    pub fn vlan_tag(mut self, tag: VlanTag) -> Self {
        self.buffer
            .extend_from_slice(&(EtherType::Vlan as u16).to_be_bytes());
        self.buffer.extend_from_slice(&tag.to_bytes());
        self
    }

    pub fn ethertype(mut self, ethertype: EtherType) -> Self {
        self.buffer
            .extend_from_slice(&(ethertype as u16).to_be_bytes());
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.buffer.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}
