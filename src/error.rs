use crate::openflow::Dpid;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("switch {dpid}: command failed: {reason}")]
    SwitchCommand { dpid: Dpid, reason: String },

    #[error("switch {dpid}: refusing to install a flow rule that floods")]
    FloodFlowRule { dpid: Dpid },

    #[error("membership lookup for session {session} failed: {reason}")]
    Membership { session: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
