//! ofqos - OpenFlow QoS controller
//!
//! A learning-switch controller application for OpenFlow 1.3 fabrics.
//! Learns MAC/IP locations from packet-ins, flushes learned flows when the
//! spanning tree reconverges, and rate-limits traffic towards authorized
//! peers with OpenFlow meters.

pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod openflow;
pub mod protocol;
pub mod runtime;
pub mod telemetry;
pub mod topology;

pub use error::{Error, Result};
