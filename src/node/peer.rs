use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::Rng;

use std::net::SocketAddr;

/// A known remote node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub addr: SocketAddr,

    /// When we last sent this peer a message
    pub last_reachout: Option<DateTime<Utc>>,
}

/// Unwraps IPv4-mapped IPv6 addresses so a peer has one key regardless of socket family
pub fn normalize(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
            Some(v4) => SocketAddr::from((v4, v6.port())),
            None => addr,
        },
        SocketAddr::V4(_) => addr,
    }
}

/// Peers kept when no explicit limit is configured
pub const DEFAULT_PEER_LIMIT: usize = 1024;

/// Set of peers known to this node, shared between the listener and the keepalive sender
#[derive(Debug)]
pub struct PeerRegistry {
    peers: DashMap<SocketAddr, Peer>,
    limit: usize,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        PeerRegistry::with_limit(DEFAULT_PEER_LIMIT, [])
    }
}

impl PeerRegistry {
    pub fn new<I: IntoIterator<Item = SocketAddr>>(initial: I) -> Self {
        PeerRegistry::with_limit(DEFAULT_PEER_LIMIT, initial)
    }

    /// Creates a registry holding at most `limit` peers
    pub fn with_limit<I: IntoIterator<Item = SocketAddr>>(limit: usize, initial: I) -> Self {
        let registry = PeerRegistry {
            peers: DashMap::new(),
            limit,
        };
        for addr in initial {
            registry.insert(addr);
        }
        registry
    }

    /// Adds a peer; returns true if it was not known before
    ///
    /// Unspecified addresses, port 0 and peers beyond the limit are ignored.
    /// Concurrent inserts may overshoot the limit by the number of racing callers.
    pub fn insert(&self, addr: SocketAddr) -> bool {
        let addr = normalize(addr);
        if addr.ip().is_unspecified() || addr.port() == 0 || self.peers.contains_key(&addr) {
            return false;
        }
        if self.peers.len() >= self.limit {
            return false;
        }

        self.peers.insert(
            addr,
            Peer {
                addr,
                last_reachout: None,
            },
        );
        true
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.contains_key(&normalize(*addr))
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<Peer> {
        self.peers.get(&normalize(*addr)).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.peers.iter().map(|entry| *entry.key()).collect()
    }

    /// Records that a message was just sent to the peer
    pub fn mark_contacted(&self, addr: &SocketAddr, at: DateTime<Utc>) {
        if let Some(mut peer) = self.peers.get_mut(&normalize(*addr)) {
            peer.last_reachout = Some(at);
        }
    }

    /// Peers never contacted, or not contacted since `now - cutoff`
    pub fn due_for_keepalive(&self, now: DateTime<Utc>, cutoff: Duration) -> Vec<SocketAddr> {
        let threshold = now - cutoff;

        self.peers
            .iter()
            .filter(|entry| entry.last_reachout.map_or(true, |at| at < threshold))
            .map(|entry| *entry.key())
            .collect()
    }

    /// Up to `count` distinct peers chosen at random
    pub fn random_sample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<SocketAddr> {
        let mut addresses = self.addresses();
        addresses.shuffle(rng);
        addresses.truncate(count);
        addresses
    }
}
