//! Configuration types

use crate::telemetry::LogConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Controller configuration (config.toml). Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub qos: QosConfig,
    pub flows: FlowConfig,
    pub stp: StpConfig,
    pub logging: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Authentication server; TCP traffic to or from it carries session ids
    pub server: Ipv4Addr,
    pub login_host: Ipv4Addr,
    /// `<session> <client-ip>` records written by the authentication server
    pub membership_file: Option<PathBuf>,
    /// Expire authorized peers this long after they were recorded
    pub session_ttl_secs: Option<u64>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            server: Ipv4Addr::new(10, 0, 0, 1),
            login_host: Ipv4Addr::new(10, 0, 0, 2),
            membership_file: None,
            session_ttl_secs: None,
        }
    }
}

/// When traffic gets a meter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QosTrigger {
    /// Destination is an authorized peer or a static online host
    #[default]
    DestinationAuthorized,
    /// Source and destination are both online
    BothOnline,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QosConfig {
    pub trigger: QosTrigger,
    pub meter_rate_kbps: u32,
    pub meter_burst: u32,
    pub idle_timeout: u16,
    pub priority: u16,
}

impl Default for QosConfig {
    fn default() -> Self {
        Self {
            trigger: QosTrigger::DestinationAuthorized,
            meter_rate_kbps: 1000,
            meter_burst: 10,
            idle_timeout: 3000,
            priority: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub arp_priority: u16,
    /// ARP flows are never deleted by a topology flush, so they must age out
    pub arp_idle_timeout: u16,
    pub learning_priority: u16,
    pub learning_idle_timeout: u16,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            arp_priority: 1,
            arp_idle_timeout: 300,
            learning_priority: 0,
            learning_idle_timeout: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StpConfig {
    /// Datapath id (16 hex digits) → bridge priority
    pub bridges: BTreeMap<String, u16>,
}

impl Default for StpConfig {
    fn default() -> Self {
        Self {
            bridges: BTreeMap::from([
                ("0000000000000001".to_string(), 0x8000),
                ("0000000000000002".to_string(), 0x9000),
                ("0000000000000003".to_string(), 0xa000),
            ]),
        }
    }
}
