//! Learning/QoS controller application
//!
//! - `state`: per-switch forwarding tables and the global tables
//! - `session`: authorized session table
//! - `decision`: per packet-in decision engine
//! - `events`: inbound event set
//! - `app`: event dispatch and switch programming

mod app;
pub mod decision;
pub mod events;
pub mod session;
pub mod state;

pub use app::Controller;
pub use decision::{decide, AuthOutcome, Branch, Decision, FlowPlan, Policy, QosPlan};
pub use events::{ControllerEvent, PacketIn, NO_BUFFER};
pub use session::AuthorizedSessions;
pub use state::{ForwardingStore, InMemoryStore, PortId, SwitchTables};
