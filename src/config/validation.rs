//! Configuration validation

use super::Config;
use crate::openflow::Dpid;
use crate::telemetry::is_valid_level;

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_auth(config, &mut result);
    validate_qos(config, &mut result);
    validate_stp(config, &mut result);
    validate_logging(config, &mut result);

    result
}

fn validate_auth(config: &Config, result: &mut ValidationResult) {
    let auth = &config.auth;
    if auth.server == auth.login_host {
        result.error(format!(
            "auth: server and login_host are both {}",
            auth.server
        ));
    }

    match &auth.membership_file {
        None => result.warn("auth.membership_file: not set, no session will ever be authorized"),
        Some(path) if !path.exists() => result.warn(format!(
            "auth.membership_file: {} does not exist yet",
            path.display()
        )),
        Some(_) => {}
    }

    if auth.session_ttl_secs == Some(0) {
        result.error("auth.session_ttl_secs: must be greater than 0 (omit to never expire)");
    }
}

fn validate_qos(config: &Config, result: &mut ValidationResult) {
    let qos = &config.qos;
    if qos.meter_rate_kbps == 0 {
        result.error("qos.meter_rate_kbps: must be greater than 0");
    }
    if qos.meter_burst == 0 {
        result.error("qos.meter_burst: must be greater than 0");
    }
    if qos.priority <= config.flows.learning_priority {
        result.error(format!(
            "qos.priority ({}) must be above flows.learning_priority ({})",
            qos.priority, config.flows.learning_priority
        ));
    }
    // equal is fine: the ARP branch leaves metered destinations to the QoS flow
    if qos.priority < config.flows.arp_priority {
        result.error(format!(
            "qos.priority ({}) must not be below flows.arp_priority ({})",
            qos.priority, config.flows.arp_priority
        ));
    }
    if qos.idle_timeout == 0 {
        result.warn("qos.idle_timeout: 0 keeps metered flows until the next topology change");
    }
    if config.flows.arp_idle_timeout == 0 {
        result.warn("flows.arp_idle_timeout: 0 keeps ARP flows across topology changes");
    }
}

fn validate_stp(config: &Config, result: &mut ValidationResult) {
    if config.stp.bridges.is_empty() {
        result.warn("stp.bridges: empty, no bridge priority will be configured");
    }
    for key in config.stp.bridges.keys() {
        if key.parse::<Dpid>().is_err() {
            result.error(format!(
                "stp.bridges.{}: not a datapath id (expected up to 16 hex digits)",
                key
            ));
        }
    }
}

fn validate_logging(config: &Config, result: &mut ValidationResult) {
    if !is_valid_level(&config.logging.level) {
        result.warn(format!(
            "logging.level: unknown level '{}', using info",
            config.logging.level
        ));
    }
}
