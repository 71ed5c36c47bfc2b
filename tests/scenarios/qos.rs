//! Authentication sessions and meter installation

use super::harness::{arp_request, host, tcp, udp, Harness, S1, S2};
use ofqos::auth::{FileMembership, StaticMembership};
use ofqos::config::QosTrigger;
use ofqos::controller::{ForwardingStore, Policy};
use ofqos::openflow::{
    Action, FlowMatch, Instruction, MeterBand, OutputPort, SwitchCommand,
};
use pretty_assertions::assert_eq;
use std::io::Write;

fn members(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

/// Server → client segment on client port 5000 authorizes the session's peers.
#[test]
fn test_auth_server_traffic_authorizes_session() {
    let file = members(&["# written by the portal", "5000 10.0.0.9", "6000 10.0.0.8"]);
    let mut h = Harness::with_membership(FileMembership::new(file.path()));
    let (server, client) = (host(1), host(5));

    h.packet_in(S1, 1, tcp(server, 1234, client, 5000));

    let store = h.ctl.store();
    assert!(store.is_authorized_peer("5000", host(9).ip));
    assert!(!store.is_authorized_peer("5000", host(8).ip));
    assert!(!store.is_authorized_peer("1234", host(9).ip));
    assert_eq!(h.ctl.metrics().auth_lookups.get(), 1);
}

#[test]
fn test_client_to_server_uses_source_port() {
    let file = members(&["41000 10.0.0.7"]);
    let mut h = Harness::with_membership(FileMembership::new(file.path()));

    h.packet_in(S1, 1, tcp(host(5), 41000, host(1), 443));

    assert!(h.ctl.store().is_authorized_peer("41000", host(7).ip));
}

#[test]
fn test_missing_membership_file_authorizes_nobody() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::with_membership(FileMembership::new(dir.path().join("members")));

    h.packet_in(S1, 1, tcp(host(1), 1234, host(5), 5000));

    assert_eq!(h.ctl.store().authorized_peer_count(), 0);
    assert_eq!(h.ctl.metrics().auth_failures.get(), 1);
    // still forwarded
    assert_eq!(h.take().len(), 1);
}

/// Traffic to an authorized peer gets a meter, then a metered flow.
#[test]
fn test_traffic_to_authorized_peer_is_metered() {
    let mut membership = StaticMembership::new();
    membership.insert("5000", host(9).ip);
    let mut h = Harness::with_membership(membership);
    let (server, a, peer) = (host(1), host(5), host(9));

    h.packet_in(S1, 1, tcp(server, 1234, a, 5000));
    h.packet_in(S1, 3, arp_request(peer, a.ip));
    h.take();

    h.packet_in(S1, 2, udp(a, peer));

    let sent = h.take();
    let kinds: Vec<_> = sent
        .iter()
        .map(|(_, cmd)| match cmd {
            SwitchCommand::MeterMod(_) => "meter",
            SwitchCommand::FlowMod(_) => "flow",
            SwitchCommand::PacketOut(_) => "out",
        })
        .collect();
    assert_eq!(kinds, vec!["meter", "flow", "flow", "out"]);

    let SwitchCommand::MeterMod(meter) = &sent[0].1 else {
        unreachable!()
    };
    assert_eq!(
        meter.bands,
        vec![MeterBand::Drop {
            rate: 1000,
            burst_size: 10
        }]
    );

    let SwitchCommand::FlowMod(qos) = &sent[1].1 else {
        unreachable!()
    };
    assert_eq!(qos.flow_match, FlowMatch::ipv4_dst(2, peer.ip));
    assert_eq!(qos.priority, 1);
    assert_eq!(qos.idle_timeout, 3000);
    assert_eq!(
        qos.instructions,
        vec![
            Instruction::ApplyActions(vec![Action::Output(OutputPort::Port(3))]),
            Instruction::Meter(meter.meter_id),
        ]
    );

    let SwitchCommand::FlowMod(plain) = &sent[2].1 else {
        unreachable!()
    };
    assert_eq!(plain.flow_match, FlowMatch::eth_dst(2, peer.mac));
    assert!(qos.priority > plain.priority);

    let store = h.ctl.store();
    assert_eq!(store.lookup_mac_port(S1, a.mac), Some(2));
    assert_eq!(store.lookup_ip_port(S1, a.ip), Some(2));
    assert_eq!(h.ctl.metrics().qos_installs.get(), 1);
}

#[test]
fn test_metered_flows_are_accepted_by_switch() {
    let mut membership = StaticMembership::new();
    membership.insert("5000", host(9).ip);
    let mut h = Harness::with_membership(membership);
    let (server, a, peer) = (host(1), host(5), host(9));

    h.packet_in(S1, 1, tcp(server, 1234, a, 5000));
    h.packet_in(S1, 3, arp_request(peer, a.ip));
    h.packet_in(S1, 2, udp(a, peer));
    h.packet_in(S1, 2, udp(a, peer));

    let fabric = h.apply_to_fabric();
    let switch = fabric.switch(S1).unwrap();
    assert_eq!(switch.meter_count(), 1);
    let flow = switch.flow(&FlowMatch::ipv4_dst(2, peer.ip), 1).unwrap();
    assert_eq!(flow.meter_id(), Some(1));
}

#[test]
fn test_arp_refresh_keeps_metered_flow() {
    let mut membership = StaticMembership::new();
    membership.insert("5000", host(9).ip);
    let mut h = Harness::with_membership(membership);
    let (server, a, peer) = (host(1), host(5), host(9));

    h.packet_in(S1, 1, tcp(server, 1234, a, 5000));
    h.packet_in(S1, 3, arp_request(peer, a.ip));
    h.packet_in(S1, 2, udp(a, peer));
    let installed = h.flow_mods().len();

    // the client re-ARPs for its metered peer
    h.packet_in(S1, 2, arp_request(a, peer.ip));

    assert_eq!(h.flow_mods().len(), installed);
    let fabric = h.apply_to_fabric();
    let flow = fabric
        .switch(S1)
        .unwrap()
        .flow(&FlowMatch::ipv4_dst(2, peer.ip), 1)
        .unwrap();
    assert_eq!(flow.meter_id(), Some(1));
    assert_eq!(flow.idle_timeout, 3000);
}

#[test]
fn test_meter_ids_are_per_destination_and_switch() {
    let mut membership = StaticMembership::new();
    membership.insert("5000", host(9).ip);
    membership.insert("5000", host(10).ip);
    let mut h = Harness::with_membership(membership);
    let (server, a) = (host(1), host(5));

    h.packet_in(S1, 1, tcp(server, 1234, a, 5000));
    for (dpid, port) in [(S1, 3), (S2, 4)] {
        h.packet_in(dpid, port, arp_request(host(9), a.ip));
        h.packet_in(dpid, port + 1, arp_request(host(10), a.ip));
    }
    h.take();

    h.packet_in(S1, 2, udp(a, host(9)));
    h.packet_in(S1, 2, udp(a, host(10)));
    h.packet_in(S1, 2, udp(a, host(9)));
    h.packet_in(S2, 2, udp(a, host(10)));

    let ids: Vec<_> = h
        .ctl
        .channel()
        .sent()
        .iter()
        .filter_map(|(dpid, cmd)| match cmd {
            SwitchCommand::MeterMod(m) => Some((*dpid, m.meter_id)),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec![(S1, 1), (S1, 2), (S1, 1), (S2, 1)]);
}

#[test]
fn test_no_egress_port_skips_meter() {
    let mut membership = StaticMembership::new();
    membership.insert("5000", host(9).ip);
    let mut h = Harness::with_membership(membership);

    h.packet_in(S1, 1, tcp(host(1), 1234, host(5), 5000));
    h.take();
    h.packet_in(S1, 2, udp(host(5), host(9)));

    assert!(h.meter_mods().is_empty());
    assert!(h.flow_mods().is_empty());
    assert_eq!(h.ctl.metrics().qos_skipped.get(), 1);
}

#[test]
fn test_both_online_trigger_needs_online_source() {
    let mut membership = StaticMembership::new();
    membership.insert("5000", host(9).ip);
    let policy = Policy {
        trigger: QosTrigger::BothOnline,
        ..Policy::default()
    };
    let mut h = Harness::with_policy(membership, policy);
    let peer = host(9);

    h.packet_in(S1, 1, tcp(host(1), 1234, host(5), 5000));
    h.packet_in(S1, 3, arp_request(peer, host(5).ip));
    h.take();

    h.packet_in(S1, 2, udp(host(5), peer));
    assert!(h.meter_mods().is_empty());

    // the login host is always online
    h.packet_in(S1, 4, udp(host(2), peer));
    assert_eq!(h.meter_mods().len(), 1);
}
