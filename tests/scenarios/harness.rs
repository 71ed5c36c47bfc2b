//! Test fabric: hosts, frame builders and a controller wired to a
//! recording channel.

use ofqos::auth::{MembershipProvider, StaticMembership};
use ofqos::controller::{Controller, ControllerEvent, PacketIn, Policy};
use ofqos::openflow::{Dpid, FlowMod, MeterMod, RecordingChannel, SimulatedFabric, SwitchChannel, SwitchCommand};
use ofqos::protocol::arp::ArpPacket;
use ofqos::protocol::ethernet::FrameBuilder;
use ofqos::protocol::ipv4::{self, Protocol};
use ofqos::protocol::tcp::{self, TcpFlags};
use ofqos::protocol::{EtherType, MacAddr};
use ofqos::telemetry::MetricsRegistry;
use std::net::Ipv4Addr;
use std::sync::Arc;

pub const S1: Dpid = Dpid(1);
pub const S2: Dpid = Dpid(2);

#[derive(Debug, Clone, Copy)]
pub struct Host {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
}

/// Host 10.0.0.<n> with MAC 00:00:00:00:00:<n>
pub fn host(n: u8) -> Host {
    Host {
        mac: MacAddr([0, 0, 0, 0, 0, n]),
        ip: Ipv4Addr::new(10, 0, 0, n),
    }
}

pub fn arp_request(from: Host, target: Ipv4Addr) -> Vec<u8> {
    let arp = ArpPacket::request(from.mac, from.ip, target);
    FrameBuilder::new()
        .dst_mac(MacAddr::BROADCAST)
        .src_mac(from.mac)
        .ethertype(EtherType::Arp)
        .payload(&arp.to_bytes())
        .build()
}

pub fn udp(from: Host, to: Host) -> Vec<u8> {
    let packet = ipv4::build_packet(from.ip, to.ip, Protocol::Udp, &[0u8; 8]);
    FrameBuilder::new()
        .dst_mac(to.mac)
        .src_mac(from.mac)
        .ethertype(EtherType::Ipv4)
        .payload(&packet)
        .build()
}

pub fn tcp(from: Host, src_port: u16, to: Host, dst_port: u16) -> Vec<u8> {
    let ack = TcpFlags {
        ack: true,
        ..Default::default()
    };
    let segment = tcp::build_header(src_port, dst_port, ack);
    let packet = ipv4::build_packet(from.ip, to.ip, Protocol::Tcp, &segment);
    FrameBuilder::new()
        .dst_mac(to.mac)
        .src_mac(from.mac)
        .ethertype(EtherType::Ipv4)
        .payload(&packet)
        .build()
}

pub struct Harness {
    pub ctl: Controller<RecordingChannel>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_membership(StaticMembership::new())
    }

    pub fn with_membership<M>(membership: M) -> Self
    where
        M: MembershipProvider + Send + 'static,
    {
        Self::with_policy(membership, Policy::default())
    }

    pub fn with_policy<M>(membership: M, policy: Policy) -> Self
    where
        M: MembershipProvider + Send + 'static,
    {
        Self {
            ctl: Controller::new(
                RecordingChannel::new(),
                Box::new(membership),
                policy,
                None,
                Arc::new(MetricsRegistry::new()),
            ),
        }
    }

    pub fn packet_in(&mut self, dpid: Dpid, in_port: u32, data: Vec<u8>) {
        self.ctl.handle_event(ControllerEvent::PacketIn(PacketIn {
            dpid,
            in_port,
            buffer_id: None,
            data,
        }));
    }

    /// Commands sent so far; clears the log.
    pub fn take(&mut self) -> Vec<(Dpid, SwitchCommand)> {
        let sent = self.ctl.channel().sent().to_vec();
        self.ctl.channel_mut().clear();
        sent
    }

    pub fn flow_mods(&self) -> Vec<FlowMod> {
        self.ctl.channel().flow_mods().into_iter().cloned().collect()
    }

    pub fn meter_mods(&self) -> Vec<MeterMod> {
        self.ctl.channel().meter_mods().into_iter().cloned().collect()
    }

    /// Apply every command sent so far to a simulated fabric, failing on
    /// the first one a switch would refuse.
    pub fn apply_to_fabric(&self) -> SimulatedFabric {
        let mut fabric = SimulatedFabric::new();
        for (dpid, cmd) in self.ctl.channel().sent() {
            fabric
                .send(*dpid, cmd.clone())
                .unwrap_or_else(|e| panic!("switch refused {:?}: {}", cmd, e));
        }
        fabric
    }
}
