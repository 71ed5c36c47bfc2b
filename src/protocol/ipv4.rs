//! IPv4 protocol - RFC 791

use crate::{Error, Result};
use std::net::Ipv4Addr;

/// Minimum IPv4 header size (without options)
pub const MIN_HEADER_SIZE: usize = 20;

/// IPv4 protocol numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Protocol {
    Icmp = 1,
    Tcp = 6,
    Udp = 17,
}

impl Protocol {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Protocol::Icmp),
            6 => Some(Protocol::Tcp),
            17 => Some(Protocol::Udp),
            _ => None,
        }
    }
}

/// Parsed IPv4 header (zero-copy reference)
#[derive(Debug)]
pub struct Ipv4Header<'a> {
    buffer: &'a [u8],
    header_len: usize,
}

impl<'a> Ipv4Header<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < MIN_HEADER_SIZE {
            return Err(Error::Parse("IPv4 header too short".into()));
        }

        if buffer[0] >> 4 != 4 {
            return Err(Error::Parse("not an IPv4 packet".into()));
        }

        let header_len = (buffer[0] & 0x0F) as usize * 4;
        if header_len < MIN_HEADER_SIZE || buffer.len() < header_len {
            return Err(Error::Parse("IPv4 header truncated".into()));
        }

        Ok(Self { buffer, header_len })
    }

    pub fn ttl(&self) -> u8 {
        self.buffer[8]
    }

    pub fn protocol(&self) -> u8 {
        self.buffer[9]
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buffer[12],
            self.buffer[13],
            self.buffer[14],
            self.buffer[15],
        )
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buffer[16],
            self.buffer[17],
            self.buffer[18],
            self.buffer[19],
        )
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Bytes after the header, clipped to the total length field when the
    /// frame carries Ethernet padding.
    pub fn payload(&self) -> &'a [u8] {
        let total = u16::from_be_bytes([self.buffer[2], self.buffer[3]]) as usize;
        let end = if total >= self.header_len && total <= self.buffer.len() {
            total
        } else {
            self.buffer.len()
        };
        &self.buffer[self.header_len..end]
    }
}

/// Calculate the IPv4 header checksum
pub fn checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    for chunk in header.chunks(2) {
        let word = match chunk {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [hi] => u16::from_be_bytes([*hi, 0]),
            _ => 0,
        };
        sum = sum.wrapping_add(word as u32);
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Build an option-less IPv4 packet around `payload`.
pub fn build_packet(src: Ipv4Addr, dst: Ipv4Addr, protocol: Protocol, payload: &[u8]) -> Vec<u8> {
    let total_len = (MIN_HEADER_SIZE + payload.len()) as u16;
    let mut packet = Vec::with_capacity(total_len as usize);

    packet.push(0x45);
    packet.push(0);
    packet.extend_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&[0, 0, 0x40, 0]);
    packet.push(64);
    packet.push(protocol as u8);
    packet.extend_from_slice(&[0, 0]);
    packet.extend_from_slice(&src.octets());
    packet.extend_from_slice(&dst.octets());

    let csum = checksum(&packet);
    packet[10..12].copy_from_slice(&csum.to_be_bytes());
    packet.extend_from_slice(payload);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_parse() {
        let src = Ipv4Addr::new(10, 0, 0, 1);
        let dst = Ipv4Addr::new(10, 0, 0, 5);
        let data = build_packet(src, dst, Protocol::Tcp, &[0xaa, 0xbb]);

        let header = Ipv4Header::parse(&data).unwrap();
        assert_eq!(header.src_addr(), src);
        assert_eq!(header.dst_addr(), dst);
        assert_eq!(header.protocol(), Protocol::Tcp as u8);
        assert_eq!(header.ttl(), 64);
        assert_eq!(header.header_len(), MIN_HEADER_SIZE);
        assert_eq!(header.payload(), &[0xaa, 0xbb]);
        assert_eq!(checksum(&data[..MIN_HEADER_SIZE]), 0);
    }

    #[test]
    fn test_payload_ignores_ethernet_padding() {
        let mut data = build_packet(
            Ipv4Addr::new(10, 0, 0, 5),
            Ipv4Addr::new(10, 0, 0, 6),
            Protocol::Udp,
            &[1, 2],
        );
        data.extend_from_slice(&[0; 24]);
        let header = Ipv4Header::parse(&data).unwrap();
        assert_eq!(header.payload(), &[1, 2]);
    }

    #[test]
    fn test_parse_rejects_ipv6_version() {
        let mut data = vec![0u8; 40];
        data[0] = 0x60;
        assert!(Ipv4Header::parse(&data).is_err());
    }

    #[test]
    fn test_parse_rejects_short_ihl() {
        let mut data = build_packet(
            Ipv4Addr::LOCALHOST,
            Ipv4Addr::LOCALHOST,
            Protocol::Icmp,
            &[],
        );
        data[0] = 0x44;
        assert!(Ipv4Header::parse(&data).is_err());
    }

    #[test]
    fn test_protocol_from_u8() {
        assert_eq!(Protocol::from_u8(6), Some(Protocol::Tcp));
        assert_eq!(Protocol::from_u8(47), None);
    }
}
