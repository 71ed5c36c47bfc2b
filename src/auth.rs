//! Session membership lookup
//!
//! The authentication server records which client addresses a session
//! authorizes. The controller only reads those records.

use crate::{Error, Result};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Answers "which client IPs does this session authorize"
pub trait MembershipProvider {
    fn lookup(&self, session: &str) -> Result<Vec<Ipv4Addr>>;
}

/// Reads `<session> <client-ip>` lines from a text file on every lookup
///
/// The file is small and rewritten by the authentication server, so it is
/// not cached.
#[derive(Debug, Clone)]
pub struct FileMembership {
    path: PathBuf,
}

impl FileMembership {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MembershipProvider for FileMembership {
    fn lookup(&self, session: &str) -> Result<Vec<Ipv4Addr>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| Error::Membership {
            session: session.to_string(),
            reason: format!("{}: {}", self.path.display(), e),
        })?;
        Ok(parse_records(&content, session))
    }
}

/// Collect the addresses of every line whose session field is `session`.
pub fn parse_records(content: &str, session: &str) -> Vec<Ipv4Addr> {
    let prefix = format!("{} ", session);
    let mut peers = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(rest) = line.strip_prefix(&prefix) else {
            continue;
        };
        let field = rest.split_whitespace().next().unwrap_or_default();
        match field.parse::<Ipv4Addr>() {
            Ok(ip) => {
                trace!("session {} authorizes {}", session, ip);
                peers.push(ip);
            }
            Err(_) => warn!(
                "membership line {}: bad client address {:?} for session {}",
                lineno + 1,
                field,
                session
            ),
        }
    }
    peers
}

/// In-memory provider
#[derive(Debug, Clone, Default)]
pub struct StaticMembership {
    sessions: HashMap<String, Vec<Ipv4Addr>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: impl Into<String>, ip: Ipv4Addr) {
        self.sessions.entry(session.into()).or_default().push(ip);
    }
}

impl MembershipProvider for StaticMembership {
    fn lookup(&self, session: &str) -> Result<Vec<Ipv4Addr>> {
        Ok(self.sessions.get(session).cloned().unwrap_or_default())
    }
}
