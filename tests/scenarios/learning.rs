//! Learning switch behavior: ARP flood/unicast, MAC learning, no flood flows

use super::harness::{arp_request, host, tcp, udp, Harness, S1, S2};
use ofqos::auth::StaticMembership;
use ofqos::controller::ForwardingStore;
use ofqos::openflow::{Action, FlowMatch, FlowModCommand, Instruction, OutputPort, SwitchCommand};
use pretty_assertions::assert_eq;

/// ARP for a host this switch has never seen floods and installs nothing.
#[test]
fn test_arp_to_unseen_host_floods_without_flow() {
    let mut h = Harness::new();
    let (a, b) = (host(5), host(6));

    h.packet_in(S1, 1, arp_request(a, b.ip));

    let sent = h.take();
    assert_eq!(sent.len(), 1);
    let SwitchCommand::PacketOut(out) = &sent[0].1 else {
        panic!("expected packet-out, got {:?}", sent[0].1);
    };
    assert_eq!(out.actions, vec![Action::Output(OutputPort::Flood)]);
    assert_eq!(out.in_port, 1);
    assert!(h.ctl.store().lookup_ip_port(S1, b.ip).is_none());
}

/// Once B's port is known, ARP towards B is unicast and cached as a flow.
#[test]
fn test_arp_to_known_host_unicasts_and_installs_flow() {
    let mut h = Harness::new();
    let (a, b) = (host(5), host(6));

    h.packet_in(S1, 2, arp_request(b, a.ip));
    h.take();

    h.packet_in(S1, 1, arp_request(a, b.ip));

    let flows = h.flow_mods();
    assert_eq!(flows.len(), 1);
    let flow = &flows[0];
    assert_eq!(flow.command, FlowModCommand::Add);
    assert_eq!(flow.flow_match, FlowMatch::ipv4_dst(1, b.ip));
    assert_eq!(flow.priority, 1);
    assert_eq!(
        flow.instructions,
        vec![Instruction::ApplyActions(vec![Action::Output(
            OutputPort::Port(2)
        )])]
    );

    let sent = h.take();
    let SwitchCommand::PacketOut(out) = &sent[1].1 else {
        panic!("expected packet-out last");
    };
    assert_eq!(out.actions, vec![Action::Output(OutputPort::Port(2))]);
}

#[test]
fn test_ip_traffic_learns_and_converges_to_unicast() {
    let mut h = Harness::new();
    let (a, b) = (host(5), host(6));

    h.packet_in(S1, 1, udp(a, b));
    h.packet_in(S1, 2, udp(b, a));
    h.packet_in(S1, 1, udp(a, b));

    let store = h.ctl.store();
    assert_eq!(store.lookup_mac_port(S1, a.mac), Some(1));
    assert_eq!(store.lookup_mac_port(S1, b.mac), Some(2));
    assert_eq!(store.lookup_ip_port(S1, a.ip), Some(1));

    let flows = h.flow_mods();
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0].flow_match, FlowMatch::eth_dst(2, a.mac));
    assert_eq!(flows[1].flow_match, FlowMatch::eth_dst(1, b.mac));
    assert!(flows.iter().all(|f| f.priority == 0));
}

#[test]
fn test_host_move_overwrites_port() {
    let mut h = Harness::new();
    let (a, b) = (host(5), host(6));

    h.packet_in(S1, 1, udp(a, b));
    h.packet_in(S1, 4, udp(a, b));

    assert_eq!(h.ctl.store().lookup_mac_port(S1, a.mac), Some(4));
    assert_eq!(h.ctl.store().lookup_ip_port(S1, a.ip), Some(4));
}

#[test]
fn test_switches_learn_independently() {
    let mut h = Harness::new();
    let (a, b) = (host(5), host(6));

    h.packet_in(S1, 1, udp(a, b));
    h.packet_in(S2, 3, udp(a, b));

    assert_eq!(h.ctl.store().lookup_mac_port(S1, a.mac), Some(1));
    assert_eq!(h.ctl.store().lookup_mac_port(S2, a.mac), Some(3));
}

#[test]
fn test_no_flow_ever_floods() {
    let mut h = Harness::new();
    let hosts: Vec<_> = (3..9).map(host).collect();

    for (i, from) in hosts.iter().enumerate() {
        let port = i as u32 + 1;
        for to in &hosts {
            if from.ip == to.ip {
                continue;
            }
            h.packet_in(S1, port, arp_request(*from, to.ip));
            h.packet_in(S1, port, udp(*from, *to));
            h.packet_in(S1, port, tcp(*from, 40000, *to, 80));
        }
    }

    let flows = h.flow_mods();
    assert!(!flows.is_empty());
    assert!(flows.iter().all(|f| !f.floods()));
    h.apply_to_fabric();
}

/// A session with no membership record leaves plain forwarding intact.
#[test]
fn test_authorization_failure_is_fail_open() {
    let mut h = Harness::with_membership(StaticMembership::new());
    let (server, client) = (host(1), host(5));

    h.packet_in(S1, 2, udp(client, server));
    h.packet_in(S1, 1, tcp(server, 1234, client, 5000));

    assert_eq!(h.ctl.store().authorized_peer_count(), 0);
    assert!(h.meter_mods().is_empty());
    let last = h.take().pop().unwrap().1;
    let SwitchCommand::PacketOut(out) = last else {
        panic!("expected packet-out");
    };
    assert_eq!(out.actions, vec![Action::Output(OutputPort::Port(2))]);
    assert_eq!(h.ctl.metrics().auth_failures.get(), 1);
}

#[test]
fn test_truncated_ipv4_falls_back_to_learning() {
    let mut h = Harness::new();
    let (a, b) = (host(5), host(6));
    let mut frame = udp(a, b);
    frame.truncate(14 + 10);

    h.packet_in(S1, 1, frame);

    assert_eq!(h.ctl.store().lookup_mac_port(S1, a.mac), Some(1));
    assert_eq!(h.ctl.store().lookup_ip_port(S1, a.ip), None);
    assert_eq!(h.ctl.metrics().malformed_frames.get(), 0);
}
