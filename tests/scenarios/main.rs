//! Controller scenarios driven through `Controller::handle_event`
//!
//! Run with: cargo test --test scenarios

mod harness;
mod learning;
mod qos;
mod topology_change;
