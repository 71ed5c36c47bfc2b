//! Forwarding state store
//!
//! One owned [`SwitchTables`] per datapath (MAC table, IP→port table, meter
//! allocations) plus the process-global IP→MAC table and session table.
//! A topology change discards a switch's MAC and IP→port tables only.

use super::session::AuthorizedSessions;
use crate::openflow::Dpid;
use crate::protocol::MacAddr;
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// Switch port number
pub type PortId = u32;

/// Reads and writes of the learned forwarding state
pub trait ForwardingStore {
    /// Create the tables of `dpid` if this is its first packet-in.
    fn ensure_switch(&mut self, dpid: Dpid);
    fn has_switch(&self, dpid: Dpid) -> bool;

    /// Last writer wins. Group addresses are never learned.
    fn learn_mac(&mut self, dpid: Dpid, mac: MacAddr, port: PortId);
    fn lookup_mac_port(&self, dpid: Dpid, mac: MacAddr) -> Option<PortId>;

    /// Last writer wins.
    fn learn_ip_port(&mut self, dpid: Dpid, ip: Ipv4Addr, port: PortId);
    /// First seen wins. Returns whether the entry was inserted.
    fn learn_ip_port_if_absent(&mut self, dpid: Dpid, ip: Ipv4Addr, port: PortId) -> bool;
    fn lookup_ip_port(&self, dpid: Dpid, ip: Ipv4Addr) -> Option<PortId>;

    /// No-op for the all-zero MAC.
    fn learn_ip_mac(&mut self, ip: Ipv4Addr, mac: MacAddr);
    fn lookup_ip_mac(&self, ip: Ipv4Addr) -> Option<MacAddr>;

    fn record_authorized_peer(&mut self, session: &str, ip: Ipv4Addr);
    fn is_authorized_peer(&self, session: &str, ip: Ipv4Addr) -> bool;
    fn is_authorized_anywhere(&self, ip: Ipv4Addr) -> bool;
    fn authorized_peer_count(&self) -> usize;
    /// Drop expired peers when a session TTL is configured.
    fn expire_sessions(&mut self) -> usize;

    /// Destination MACs learned on `dpid`, in address order
    fn learned_macs(&self, dpid: Dpid) -> Vec<MacAddr>;
    /// True when `dpid` has any MAC or IP→port entry
    fn has_learned_state(&self, dpid: Dpid) -> bool;
    /// Clear the MAC and IP→port tables of `dpid`.
    fn flush_switch(&mut self, dpid: Dpid);

    /// Meter id for traffic towards `ip` on `dpid`, allocated on first use.
    fn meter_for(&mut self, dpid: Dpid, ip: Ipv4Addr) -> u32;
}

/// Per-switch tables
#[derive(Debug, Default)]
pub struct SwitchTables {
    mac_to_port: BTreeMap<MacAddr, PortId>,
    ip_to_port: HashMap<Ipv4Addr, PortId>,
    meters: HashMap<Ipv4Addr, u32>,
    next_meter_id: u32,
}

impl SwitchTables {
    pub fn mac_count(&self) -> usize {
        self.mac_to_port.len()
    }

    pub fn ip_port_count(&self) -> usize {
        self.ip_to_port.len()
    }

    pub fn meter_count(&self) -> usize {
        self.meters.len()
    }

    fn is_empty(&self) -> bool {
        self.mac_to_port.is_empty() && self.ip_to_port.is_empty()
    }

    fn flush(&mut self) {
        self.mac_to_port.clear();
        self.ip_to_port.clear();
    }

    fn allocate_meter(&mut self, ip: Ipv4Addr) -> u32 {
        if let Some(id) = self.meters.get(&ip) {
            return *id;
        }
        self.next_meter_id += 1;
        self.meters.insert(ip, self.next_meter_id);
        self.next_meter_id
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    switches: BTreeMap<Dpid, SwitchTables>,
    ip_to_mac: HashMap<Ipv4Addr, MacAddr>,
    sessions: AuthorizedSessions,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_ttl(ttl: Option<Duration>) -> Self {
        Self {
            sessions: AuthorizedSessions::new(ttl),
            ..Default::default()
        }
    }

    pub fn switch(&self, dpid: Dpid) -> Option<&SwitchTables> {
        self.switches.get(&dpid)
    }

    pub fn switch_count(&self) -> usize {
        self.switches.len()
    }

    fn tables_mut(&mut self, dpid: Dpid) -> &mut SwitchTables {
        self.switches.entry(dpid).or_default()
    }
}

impl ForwardingStore for InMemoryStore {
    fn ensure_switch(&mut self, dpid: Dpid) {
        self.tables_mut(dpid);
    }

    fn has_switch(&self, dpid: Dpid) -> bool {
        self.switches.contains_key(&dpid)
    }

    fn learn_mac(&mut self, dpid: Dpid, mac: MacAddr, port: PortId) {
        if mac.is_multicast() || mac.is_zero() {
            return;
        }
        self.tables_mut(dpid).mac_to_port.insert(mac, port);
    }

    fn lookup_mac_port(&self, dpid: Dpid, mac: MacAddr) -> Option<PortId> {
        self.switches.get(&dpid)?.mac_to_port.get(&mac).copied()
    }

    fn learn_ip_port(&mut self, dpid: Dpid, ip: Ipv4Addr, port: PortId) {
        self.tables_mut(dpid).ip_to_port.insert(ip, port);
    }

    fn learn_ip_port_if_absent(&mut self, dpid: Dpid, ip: Ipv4Addr, port: PortId) -> bool {
        let table = &mut self.tables_mut(dpid).ip_to_port;
        if table.contains_key(&ip) {
            return false;
        }
        table.insert(ip, port);
        true
    }

    fn lookup_ip_port(&self, dpid: Dpid, ip: Ipv4Addr) -> Option<PortId> {
        self.switches.get(&dpid)?.ip_to_port.get(&ip).copied()
    }

    fn learn_ip_mac(&mut self, ip: Ipv4Addr, mac: MacAddr) {
        if mac.is_zero() {
            return;
        }
        self.ip_to_mac.insert(ip, mac);
    }

    fn lookup_ip_mac(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.ip_to_mac.get(&ip).copied()
    }

    fn record_authorized_peer(&mut self, session: &str, ip: Ipv4Addr) {
        self.sessions.record(session, ip, Instant::now());
    }

    fn is_authorized_peer(&self, session: &str, ip: Ipv4Addr) -> bool {
        self.sessions.contains(session, ip, Instant::now())
    }

    fn is_authorized_anywhere(&self, ip: Ipv4Addr) -> bool {
        self.sessions.contains_anywhere(ip, Instant::now())
    }

    fn authorized_peer_count(&self) -> usize {
        self.sessions.peer_count()
    }

    fn expire_sessions(&mut self) -> usize {
        self.sessions.expire(Instant::now())
    }

    fn learned_macs(&self, dpid: Dpid) -> Vec<MacAddr> {
        self.switches
            .get(&dpid)
            .map(|t| t.mac_to_port.keys().copied().collect())
            .unwrap_or_default()
    }

    fn has_learned_state(&self, dpid: Dpid) -> bool {
        self.switches.get(&dpid).is_some_and(|t| !t.is_empty())
    }

    fn flush_switch(&mut self, dpid: Dpid) {
        if let Some(tables) = self.switches.get_mut(&dpid) {
            tables.flush();
        }
    }

    fn meter_for(&mut self, dpid: Dpid, ip: Ipv4Addr) -> u32 {
        self.tables_mut(dpid).allocate_meter(ip)
    }
}
