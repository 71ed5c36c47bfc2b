//! Per packet-in decision engine
//!
//! Three branches, first match wins: ARP, IPv4, and the plain learning
//! switch for everything else. Each branch updates the store and returns a
//! [`Decision`] describing what to program; nothing here talks to a switch.

use super::state::{ForwardingStore, PortId};
use crate::auth::MembershipProvider;
use crate::config::{Config, QosTrigger};
use crate::openflow::{Action, Dpid, FlowMatch, OutputPort};
use crate::protocol::arp::ArpPacket;
use crate::protocol::{ClassifiedPacket, Ipv4Info, TcpInfo};
use std::net::Ipv4Addr;
use tracing::{debug, trace, warn};

/// Constants the decision engine runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub auth_server: Ipv4Addr,
    pub login_host: Ipv4Addr,
    pub trigger: QosTrigger,
    pub meter_rate_kbps: u32,
    pub meter_burst: u32,
    pub qos_idle_timeout: u16,
    pub qos_priority: u16,
    pub arp_priority: u16,
    pub arp_idle_timeout: u16,
    pub learning_priority: u16,
    pub learning_idle_timeout: u16,
}

impl From<&Config> for Policy {
    fn from(config: &Config) -> Self {
        Self {
            auth_server: config.auth.server,
            login_host: config.auth.login_host,
            trigger: config.qos.trigger,
            meter_rate_kbps: config.qos.meter_rate_kbps,
            meter_burst: config.qos.meter_burst,
            qos_idle_timeout: config.qos.idle_timeout,
            qos_priority: config.qos.priority,
            arp_priority: config.flows.arp_priority,
            arp_idle_timeout: config.flows.arp_idle_timeout,
            learning_priority: config.flows.learning_priority,
            learning_idle_timeout: config.flows.learning_idle_timeout,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl Policy {
    /// Hosts that count as online without any session
    pub fn is_static_online(&self, ip: Ipv4Addr) -> bool {
        ip == self.auth_server || ip == self.login_host
    }
}

/// Which branch handled the packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Arp,
    Ipv4,
    Learning,
}

/// A unicast flow to install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowPlan {
    pub flow_match: FlowMatch,
    pub priority: u16,
    pub idle_timeout: u16,
    pub port: PortId,
}

impl FlowPlan {
    pub fn actions(&self) -> Vec<Action> {
        vec![Action::Output(OutputPort::Port(self.port))]
    }
}

/// A meter plus the flow that references it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosPlan {
    pub meter_id: u32,
    pub rate_kbps: u32,
    pub burst: u32,
    pub flow: FlowPlan,
}

/// Result of the membership lookup triggered by authentication traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authorized { session: String, peers: usize },
    /// Lookup error or no record for the session
    NotAuthorized { session: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub branch: Branch,
    /// Action of the packet-out for the triggering packet
    pub output: OutputPort,
    /// Plain forwarding flow, only ever on the unicast path
    pub flow: Option<FlowPlan>,
    pub qos: Option<QosPlan>,
    /// QoS was triggered but no egress port for the destination is known
    pub qos_skipped: bool,
    pub auth: Option<AuthOutcome>,
}

impl Decision {
    fn new(branch: Branch, output: OutputPort) -> Self {
        Self {
            branch,
            output,
            flow: None,
            qos: None,
            qos_skipped: false,
            auth: None,
        }
    }

    pub fn actions(&self) -> Vec<Action> {
        vec![Action::Output(self.output)]
    }

    pub fn floods(&self) -> bool {
        self.output == OutputPort::Flood
    }
}

/// Decide what to do with one packet-in from `dpid`.
pub fn decide<S>(
    store: &mut S,
    membership: &dyn MembershipProvider,
    policy: &Policy,
    dpid: Dpid,
    packet: &ClassifiedPacket,
) -> Decision
where
    S: ForwardingStore + ?Sized,
{
    store.ensure_switch(dpid);

    if let Some(arp) = &packet.arp {
        return decide_arp(store, policy, dpid, packet, arp);
    }
    if let Some(ipv4) = &packet.ipv4 {
        return decide_ipv4(store, membership, policy, dpid, packet, ipv4);
    }
    decide_learning(store, policy, dpid, packet)
}

fn decide_arp<S>(
    store: &mut S,
    policy: &Policy,
    dpid: Dpid,
    packet: &ClassifiedPacket,
    arp: &ArpPacket,
) -> Decision
where
    S: ForwardingStore + ?Sized,
{
    let in_port = packet.in_port;

    store.learn_ip_mac(arp.sender_ip, arp.sender_mac);
    store.learn_ip_port_if_absent(dpid, arp.sender_ip, in_port);
    store.learn_mac(dpid, packet.ethernet.src, in_port);

    match store.lookup_ip_port(dpid, arp.target_ip) {
        Some(port) => {
            trace!(
                "[dpid={}] arp {} -> {} via port {}",
                dpid,
                arp.sender_ip,
                arp.target_ip,
                port
            );
            let mut decision = Decision::new(Branch::Arp, OutputPort::Port(port));
            // A plain flow on the same match would replace the metered one.
            if qos_triggered(store, policy, arp.sender_ip, arp.target_ip) {
                debug!(
                    "[dpid={}] {} is metered, no arp flow",
                    dpid, arp.target_ip
                );
                return decision;
            }
            decision.flow = Some(FlowPlan {
                flow_match: FlowMatch::ipv4_dst(in_port, arp.target_ip),
                priority: policy.arp_priority,
                idle_timeout: policy.arp_idle_timeout,
                port,
            });
            decision
        }
        None => {
            trace!(
                "[dpid={}] arp {} -> {} unknown, flooding",
                dpid,
                arp.sender_ip,
                arp.target_ip
            );
            Decision::new(Branch::Arp, OutputPort::Flood)
        }
    }
}

fn decide_ipv4<S>(
    store: &mut S,
    membership: &dyn MembershipProvider,
    policy: &Policy,
    dpid: Dpid,
    packet: &ClassifiedPacket,
    ipv4: &Ipv4Info,
) -> Decision
where
    S: ForwardingStore + ?Sized,
{
    let in_port = packet.in_port;
    let eth = packet.ethernet;

    let auth = packet
        .tcp
        .and_then(|tcp| session_for(policy, ipv4, &tcp))
        .map(|session| authorize(store, membership, session));

    let mut qos = None;
    let mut qos_skipped = false;
    if qos_triggered(store, policy, ipv4.src, ipv4.dst) {
        let egress = store
            .lookup_ip_port(dpid, ipv4.dst)
            .or_else(|| store.lookup_mac_port(dpid, eth.dst));
        match egress {
            Some(port) => {
                qos = Some(QosPlan {
                    meter_id: store.meter_for(dpid, ipv4.dst),
                    rate_kbps: policy.meter_rate_kbps,
                    burst: policy.meter_burst,
                    flow: FlowPlan {
                        flow_match: FlowMatch::ipv4_dst(in_port, ipv4.dst),
                        priority: policy.qos_priority,
                        idle_timeout: policy.qos_idle_timeout,
                        port,
                    },
                });
            }
            None => {
                debug!(
                    "[dpid={}] no egress port for {}, skipping meter",
                    dpid, ipv4.dst
                );
                qos_skipped = true;
            }
        }
    }

    store.learn_mac(dpid, eth.src, in_port);
    store.learn_ip_port(dpid, ipv4.src, in_port);

    let mut decision = resolve_by_mac(store, policy, dpid, packet, Branch::Ipv4);
    decision.qos = qos;
    decision.qos_skipped = qos_skipped;
    decision.auth = auth;
    decision
}

fn decide_learning<S>(
    store: &mut S,
    policy: &Policy,
    dpid: Dpid,
    packet: &ClassifiedPacket,
) -> Decision
where
    S: ForwardingStore + ?Sized,
{
    store.learn_mac(dpid, packet.ethernet.src, packet.in_port);
    resolve_by_mac(store, policy, dpid, packet, Branch::Learning)
}

fn resolve_by_mac<S>(
    store: &S,
    policy: &Policy,
    dpid: Dpid,
    packet: &ClassifiedPacket,
    branch: Branch,
) -> Decision
where
    S: ForwardingStore + ?Sized,
{
    let dst = packet.ethernet.dst;
    match store.lookup_mac_port(dpid, dst) {
        Some(port) => {
            let mut decision = Decision::new(branch, OutputPort::Port(port));
            decision.flow = Some(FlowPlan {
                flow_match: FlowMatch::eth_dst(packet.in_port, dst),
                priority: policy.learning_priority,
                idle_timeout: policy.learning_idle_timeout,
                port,
            });
            decision
        }
        None => Decision::new(branch, OutputPort::Flood),
    }
}

/// Session id carried by authentication traffic: the client-side TCP port.
pub fn session_for(policy: &Policy, ipv4: &Ipv4Info, tcp: &TcpInfo) -> Option<String> {
    if ipv4.dst == policy.auth_server {
        Some(tcp.src_port.to_string())
    } else if ipv4.src == policy.auth_server {
        Some(tcp.dst_port.to_string())
    } else {
        None
    }
}

fn authorize<S>(store: &mut S, membership: &dyn MembershipProvider, session: String) -> AuthOutcome
where
    S: ForwardingStore + ?Sized,
{
    match membership.lookup(&session) {
        Ok(peers) if !peers.is_empty() => {
            for ip in &peers {
                store.record_authorized_peer(&session, *ip);
            }
            debug!("session {} authorizes {:?}", session, peers);
            AuthOutcome::Authorized {
                session,
                peers: peers.len(),
            }
        }
        Ok(_) => {
            trace!("session {} has no membership record", session);
            AuthOutcome::NotAuthorized { session }
        }
        Err(e) => {
            warn!("{}", e);
            AuthOutcome::NotAuthorized { session }
        }
    }
}

fn is_online<S>(store: &S, policy: &Policy, ip: Ipv4Addr) -> bool
where
    S: ForwardingStore + ?Sized,
{
    policy.is_static_online(ip) || store.is_authorized_anywhere(ip)
}

fn qos_triggered<S>(store: &S, policy: &Policy, src: Ipv4Addr, dst: Ipv4Addr) -> bool
where
    S: ForwardingStore + ?Sized,
{
    match policy.trigger {
        QosTrigger::DestinationAuthorized => is_online(store, policy, dst),
        QosTrigger::BothOnline => is_online(store, policy, src) && is_online(store, policy, dst),
    }
}
