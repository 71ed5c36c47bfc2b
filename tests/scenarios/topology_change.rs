//! Spanning-tree reconvergence: flow flush and port-state events

use super::harness::{arp_request, host, tcp, udp, Harness, S1, S2};
use ofqos::auth::StaticMembership;
use ofqos::controller::{ControllerEvent, ForwardingStore, Policy};
use ofqos::openflow::{FlowMatch, FlowModCommand};
use ofqos::topology::PortState;
use pretty_assertions::assert_eq;

fn learn_three(h: &mut Harness) {
    h.packet_in(S1, 1, udp(host(5), host(6)));
    h.packet_in(S1, 2, udp(host(6), host(5)));
    h.packet_in(S1, 3, arp_request(host(7), host(5).ip));
}

/// Three learned MACs produce exactly three deletes and empty tables.
#[test]
fn test_topology_change_deletes_one_flow_per_learned_mac() {
    let mut h = Harness::new();
    learn_three(&mut h);
    assert_eq!(h.ctl.store().learned_macs(S1).len(), 3);
    h.take();

    h.ctl.handle_event(ControllerEvent::TopologyChange { dpid: S1 });

    let flows = h.flow_mods();
    assert_eq!(flows.len(), 3);
    assert!(flows.iter().all(|f| f.command == FlowModCommand::Delete));
    let mut targets: Vec<_> = flows.iter().filter_map(|f| f.flow_match.eth_dst).collect();
    targets.sort();
    assert_eq!(targets, vec![host(5).mac, host(6).mac, host(7).mac]);

    let store = h.ctl.store();
    assert!(store.learned_macs(S1).is_empty());
    assert!(!store.has_learned_state(S1));
    assert_eq!(store.lookup_ip_port(S1, host(7).ip), None);
}

#[test]
fn test_flush_removes_learned_flows_switch_side() {
    let mut h = Harness::new();
    learn_three(&mut h);
    h.packet_in(S1, 1, udp(host(5), host(6)));
    h.ctl.handle_event(ControllerEvent::TopologyChange { dpid: S1 });

    let fabric = h.apply_to_fabric();
    let switch = fabric.switch(S1).unwrap();
    assert!(switch.flow(&FlowMatch::eth_dst(1, host(6).mac), 0).is_none());
    // the ARP flow on ipv4_dst is not matched by an eth_dst delete and
    // has to age out on its own
    assert_eq!(switch.flow_count(), 1);
    let arp_flow = switch.flow(&FlowMatch::ipv4_dst(3, host(5).ip), 1).unwrap();
    assert_eq!(arp_flow.idle_timeout, 300);
}

#[test]
fn test_arp_idle_timeout_is_configurable() {
    let policy = Policy {
        arp_idle_timeout: 45,
        ..Policy::default()
    };
    let mut h = Harness::with_policy(StaticMembership::new(), policy);
    h.packet_in(S1, 1, arp_request(host(5), host(6).ip));
    h.packet_in(S1, 2, arp_request(host(6), host(5).ip));

    let flows = h.flow_mods();
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].flow_match, FlowMatch::ipv4_dst(2, host(5).ip));
    assert_eq!(flows[0].idle_timeout, 45);
}

#[test]
fn test_topology_change_is_per_switch() {
    let mut h = Harness::new();
    learn_three(&mut h);
    h.packet_in(S2, 1, udp(host(5), host(6)));
    h.take();

    h.ctl.handle_event(ControllerEvent::TopologyChange { dpid: S2 });

    assert_eq!(h.flow_mods().len(), 1);
    assert!(h.ctl.channel().sent().iter().all(|(dpid, _)| *dpid == S2));
    assert_eq!(h.ctl.store().learned_macs(S1).len(), 3);
    assert!(h.ctl.store().learned_macs(S2).is_empty());
}

#[test]
fn test_topology_change_keeps_global_tables() {
    let mut membership = StaticMembership::new();
    membership.insert("5000", host(9).ip);
    let mut h = Harness::with_membership(membership);

    h.packet_in(S1, 1, tcp(host(1), 1234, host(5), 5000));
    h.packet_in(S1, 3, arp_request(host(9), host(5).ip));
    h.ctl.handle_event(ControllerEvent::TopologyChange { dpid: S1 });

    let store = h.ctl.store();
    assert!(store.is_authorized_peer("5000", host(9).ip));
    assert_eq!(store.lookup_ip_mac(host(9).ip), Some(host(9).mac));
}

#[test]
fn test_topology_change_on_unknown_switch_is_quiet() {
    let mut h = Harness::new();
    h.ctl.handle_event(ControllerEvent::TopologyChange { dpid: S2 });
    assert!(h.take().is_empty());
}

#[test]
fn test_relearn_after_flush() {
    let mut h = Harness::new();
    learn_three(&mut h);
    h.ctl.handle_event(ControllerEvent::TopologyChange { dpid: S1 });
    h.take();

    h.packet_in(S1, 4, udp(host(5), host(6)));

    assert_eq!(h.ctl.store().lookup_mac_port(S1, host(5).mac), Some(4));
    // host 6 is unknown again
    assert!(h.flow_mods().is_empty());
}

#[test]
fn test_port_state_changes_do_not_touch_state() {
    let mut h = Harness::new();
    learn_three(&mut h);
    h.take();

    for state in [
        PortState::Disabled,
        PortState::Blocking,
        PortState::Listening,
        PortState::Learning,
        PortState::Forwarding,
    ] {
        h.ctl.handle_event(ControllerEvent::PortStateChange {
            dpid: S1,
            port: 2,
            state,
        });
    }

    assert!(h.take().is_empty());
    assert_eq!(h.ctl.store().learned_macs(S1).len(), 3);
    assert_eq!(h.ctl.metrics().port_state_changes.get(), 5);
}
