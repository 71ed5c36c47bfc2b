//! Spanning-tree collaboration
//!
//! The loop-prevention protocol itself lives outside the controller. It
//! reports topology changes and port-state changes as controller events and
//! accepts a bridge priority per switch at startup.

use crate::openflow::Dpid;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Per-port role of the spanning tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    Disabled,
    Blocking,
    Listening,
    Learning,
    Forwarding,
}

impl PortState {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            PortState::Disabled => "DISABLE",
            PortState::Blocking => "BLOCK",
            PortState::Listening => "LISTEN",
            PortState::Learning => "LEARN",
            PortState::Forwarding => "FORWARD",
        }
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bridge configuration sink of the spanning-tree library
pub trait TopologyProvider {
    fn set_bridge_config(&mut self, dpid: Dpid, priority: u16) -> Result<()>;
}

/// Static switch → bridge priority table applied once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeTable {
    priorities: BTreeMap<Dpid, u16>,
}

impl Default for BridgeTable {
    fn default() -> Self {
        Self {
            priorities: BTreeMap::from([
                (Dpid(0x1), 0x8000),
                (Dpid(0x2), 0x9000),
                (Dpid(0x3), 0xa000),
            ]),
        }
    }
}

impl BridgeTable {
    pub fn new() -> Self {
        Self {
            priorities: BTreeMap::new(),
        }
    }

    /// Build from `[stp.bridges]` keys ("0000000000000001") and priorities.
    pub fn from_config<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a u16)>,
    {
        let mut table = Self::new();
        for (key, priority) in entries {
            let dpid: Dpid = key
                .parse()
                .map_err(|_| Error::Config(format!("stp.bridges: invalid datapath id {:?}", key)))?;
            table.insert(dpid, *priority);
        }
        Ok(table)
    }

    pub fn insert(&mut self, dpid: Dpid, priority: u16) {
        self.priorities.insert(dpid, priority);
    }

    pub fn priority(&self, dpid: Dpid) -> Option<u16> {
        self.priorities.get(&dpid).copied()
    }

    pub fn len(&self) -> usize {
        self.priorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dpid, u16)> + '_ {
        self.priorities.iter().map(|(d, p)| (*d, *p))
    }
}

/// Provider that only records and logs the configuration it receives
///
/// Stands in for the spanning-tree library in replay runs and tests.
#[derive(Debug, Default)]
pub struct LoggingTopology {
    applied: Vec<(Dpid, u16)>,
}

impl LoggingTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> &[(Dpid, u16)] {
        &self.applied
    }
}

impl TopologyProvider for LoggingTopology {
    fn set_bridge_config(&mut self, dpid: Dpid, priority: u16) -> Result<()> {
        info!("[dpid={}] bridge priority {:#06x}", dpid, priority);
        self.applied.push((dpid, priority));
        Ok(())
    }
}
