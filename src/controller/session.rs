//! Authorized session table
//!
//! Maps a session id to the client addresses it authorizes. Entries live for
//! the lifetime of the process unless a TTL is configured, in which case a
//! peer expires `ttl` after it was last recorded.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct AuthorizedSessions {
    sessions: HashMap<String, HashMap<Ipv4Addr, Instant>>,
    ttl: Option<Duration>,
}

impl AuthorizedSessions {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Record (or refresh) `ip` under `session`.
    pub fn record(&mut self, session: &str, ip: Ipv4Addr, now: Instant) {
        self.sessions
            .entry(session.to_string())
            .or_default()
            .insert(ip, now);
    }

    pub fn contains(&self, session: &str, ip: Ipv4Addr, now: Instant) -> bool {
        self.sessions
            .get(session)
            .and_then(|peers| peers.get(&ip))
            .is_some_and(|seen| self.is_live(*seen, now))
    }

    /// True when any session authorizes `ip`.
    pub fn contains_anywhere(&self, ip: Ipv4Addr, now: Instant) -> bool {
        self.sessions
            .values()
            .filter_map(|peers| peers.get(&ip))
            .any(|seen| self.is_live(*seen, now))
    }

    /// Drop expired peers and empty sessions. Returns how many peers went.
    pub fn expire(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let mut removed = 0;
        for peers in self.sessions.values_mut() {
            let before = peers.len();
            peers.retain(|_, seen| now.saturating_duration_since(*seen) < ttl);
            removed += before - peers.len();
        }
        self.sessions.retain(|_, peers| !peers.is_empty());
        removed
    }

    /// Number of (session, peer) pairs currently held
    pub fn peer_count(&self) -> usize {
        self.sessions.values().map(HashMap::len).sum()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn is_live(&self, seen: Instant, now: Instant) -> bool {
        self.ttl
            .map_or(true, |ttl| now.saturating_duration_since(seen) < ttl)
    }
}
