//! Telemetry module for logging and metrics.

mod logging;
mod metrics;

pub use logging::{init_logging, is_valid_level, LogConfig, LogFormat};
pub use metrics::{Counter, MetricsRegistry, SwitchStats};
