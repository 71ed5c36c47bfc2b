//! Controller metrics.
//!
//! Atomic counters for the decision engine and the switch channel, global
//! and per datapath.

use crate::openflow::Dpid;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-switch command statistics.
#[derive(Debug, Default)]
pub struct SwitchStats {
    pub packet_ins: Counter,
    pub flow_adds: Counter,
    pub flow_deletes: Counter,
    pub meter_adds: Counter,
    pub packet_outs: Counter,
    /// Commands the channel failed to deliver (never retried)
    pub send_errors: Counter,
}

/// Global metrics registry for the controller.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    switches: RwLock<BTreeMap<Dpid, SwitchStats>>,

    /// Packet-ins dropped because the Ethernet header was missing.
    pub malformed_frames: Counter,
    /// Packet-outs that flooded (unknown destination).
    pub floods: Counter,
    /// Packet-outs sent to a single learned port.
    pub unicasts: Counter,
    /// Meter + flow pairs installed for authorized peers.
    pub qos_installs: Counter,
    /// QoS triggers skipped because the egress port was unknown.
    pub qos_skipped: Counter,
    pub topology_changes: Counter,
    pub port_state_changes: Counter,
    pub auth_lookups: Counter,
    /// Lookups that errored or returned nothing.
    pub auth_failures: Counter,

    /// Current number of authorized peers across sessions.
    pub authorized_peers: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the stats of `dpid`, creating them on first use.
    pub fn with_switch<F: FnOnce(&SwitchStats)>(&self, dpid: Dpid, f: F) {
        {
            let switches = self.switches.read().unwrap_or_else(|e| e.into_inner());
            if let Some(stats) = switches.get(&dpid) {
                f(stats);
                return;
            }
        }
        let mut switches = self.switches.write().unwrap_or_else(|e| e.into_inner());
        f(switches.entry(dpid).or_default());
    }

    pub fn set_authorized_peers(&self, count: usize) {
        self.authorized_peers.store(count as u64, Ordering::Relaxed);
    }

    /// Exports all metrics as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result = vec![
            ("malformed_frames".into(), self.malformed_frames.get()),
            ("floods".into(), self.floods.get()),
            ("unicasts".into(), self.unicasts.get()),
            ("qos_installs".into(), self.qos_installs.get()),
            ("qos_skipped".into(), self.qos_skipped.get()),
            ("topology_changes".into(), self.topology_changes.get()),
            ("port_state_changes".into(), self.port_state_changes.get()),
            ("auth_lookups".into(), self.auth_lookups.get()),
            ("auth_failures".into(), self.auth_failures.get()),
            (
                "authorized_peers".into(),
                self.authorized_peers.load(Ordering::Relaxed),
            ),
        ];

        let switches = self.switches.read().unwrap_or_else(|e| e.into_inner());
        for (dpid, stats) in switches.iter() {
            result.extend([
                (format!("{}_packet_ins", dpid), stats.packet_ins.get()),
                (format!("{}_flow_adds", dpid), stats.flow_adds.get()),
                (format!("{}_flow_deletes", dpid), stats.flow_deletes.get()),
                (format!("{}_meter_adds", dpid), stats.meter_adds.get()),
                (format!("{}_packet_outs", dpid), stats.packet_outs.get()),
                (format!("{}_send_errors", dpid), stats.send_errors.get()),
            ]);
        }

        result
    }
}
