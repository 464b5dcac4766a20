// Node module
//
// UDP gossip between nodes: packet codec, peer registry and the
// keepalive sender / packet listener pair

pub mod message;
pub mod peer;

use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::BlockStore;
use crate::config::NodeConfig;
use message::{KeepAlive, Message, KEEPALIVE_PEERS, PACKET_SIZE};
use peer::{normalize, PeerRegistry};

pub use message::MessageError;

const RECV_BACKOFF_MIN: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before the next read after `failures` consecutive socket errors
fn recv_backoff(failures: u32) -> Duration {
    RECV_BACKOFF_MIN
        .saturating_mul(2u32.saturating_pow(failures.saturating_sub(1)))
        .min(RECV_BACKOFF_MAX)
}

/// Errors that can occur in the networking layer
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::blockchain::LedgerError),
}

/// A running node: one UDP socket, the peers it knows and the ledger it serves
#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    store: Arc<BlockStore>,
    peers: Arc<PeerRegistry>,
    socket: UdpSocket,
}

impl Node {
    /// Binds the node's socket on the configured port
    ///
    /// Prefers a dual-stack IPv6 socket and falls back to IPv4.
    pub async fn bind(config: NodeConfig, store: Arc<BlockStore>) -> Result<Self, NodeError> {
        let socket = match UdpSocket::bind((Ipv6Addr::UNSPECIFIED, config.listen_port)).await {
            Ok(socket) => socket,
            Err(err) => {
                warn!("IPv6 bind failed ({}), falling back to IPv4", err);
                UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.listen_port)).await?
            }
        };

        let peers = Arc::new(PeerRegistry::with_limit(config.max_peers, config.peers.iter().copied()));

        Ok(Node {
            config,
            store,
            peers,
            socket,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peers(&self) -> &Arc<PeerRegistry> {
        &self.peers
    }

    pub fn store(&self) -> &Arc<BlockStore> {
        &self.store
    }

    /// Address to hand to the socket; IPv6 sockets need IPv4 targets mapped
    fn target(&self, addr: SocketAddr) -> SocketAddr {
        match (self.socket.local_addr(), addr) {
            (Ok(SocketAddr::V6(_)), SocketAddr::V4(v4)) => SocketAddr::from((v4.ip().to_ipv6_mapped(), v4.port())),
            _ => addr,
        }
    }

    async fn send_message(&self, peer: SocketAddr, message: &Message) -> Result<(), NodeError> {
        let packet = message.encode(self.config.network);
        self.socket.send_to(&packet, self.target(peer)).await?;
        self.peers.mark_contacted(&peer, Utc::now());
        Ok(())
    }

    /// Sends one keepalive advertising a random sample of known peers
    pub async fn send_keepalive(&self, peer: SocketAddr) -> Result<(), NodeError> {
        let sample = self.peers.random_sample(KEEPALIVE_PEERS, &mut rand::thread_rng());
        let message = Message::KeepAlive(KeepAlive::new(sample)?);

        debug!("Sending keepalive to {}", peer);
        self.send_message(peer, &message).await
    }

    /// Sends keepalives to every peer not contacted within the cutoff window
    ///
    /// Failures are logged per peer and do not stop the round.
    pub async fn send_keepalives(&self) {
        let cutoff = chrono::Duration::seconds(self.config.peer_cutoff_secs as i64);
        let due = self.peers.due_for_keepalive(Utc::now(), cutoff);

        for peer in due {
            if let Err(err) = self.send_keepalive(peer).await {
                warn!("Failed to send keepalive to {}: {}", peer, err);
            }
        }
    }

    /// Processes one inbound datagram
    pub fn handle_packet(&self, packet: &[u8], from: SocketAddr) -> Result<(), NodeError> {
        let from = normalize(from);

        match Message::decode(packet, self.config.network)? {
            Message::KeepAlive(keepalive) => {
                debug!("Received keepalive from {} with {} peers", from, keepalive.peers.len());

                if self.peers.insert(from) {
                    info!("Discovered peer {}", from);
                }
                for peer in keepalive.peers {
                    if self.peers.insert(peer) {
                        info!("Learned peer {} from {}", peer, from);
                    }
                }
            }
        }

        Ok(())
    }

    /// Receives datagrams until the task is cancelled
    ///
    /// Malformed packets are logged and skipped. Read errors are logged and
    /// followed by an exponentially growing pause, reset by the next good read.
    pub async fn listen(&self) -> Result<(), NodeError> {
        info!("Listening for udp packets on {}", self.local_addr()?);
        let mut buf = vec![0u8; PACKET_SIZE];
        let mut failures = 0u32;

        loop {
            let (n, from) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => {
                    failures = 0;
                    received
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    let delay = recv_backoff(failures);
                    warn!("UDP read error: {} (retrying in {:?})", err, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            if n == 0 {
                continue;
            }
            if let Err(err) = self.handle_packet(&buf[..n], from) {
                warn!("Dropping packet from {}: {}", from, err);
            }
        }
    }

    /// Starts the periodic keepalive sender
    pub fn spawn_keepalive_sender(self: &Arc<Self>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        let period = node.config.keepalive_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                node.send_keepalives().await;
            }
        })
    }

    /// Runs the node until the listener stops or the process receives Ctrl-C
    pub async fn run(self: Arc<Self>) -> Result<(), NodeError> {
        info!(
            "Starting {:?} node with {} known peers, ledger holds {} blocks",
            self.config.network,
            self.peers.len(),
            self.store.block_count()
        );

        let keepalive_sender = self.spawn_keepalive_sender();

        let result = tokio::select! {
            result = self.listen() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                Ok(())
            }
        };

        keepalive_sender.abort();
        self.store.flush()?;
        info!("Node stopped");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LedgerConfig, Network};
    use tempfile::TempDir;

    async fn test_node(peers: Vec<SocketAddr>) -> (Arc<Node>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BlockStore::open(LedgerConfig::test().with_path(dir.path())).unwrap());
        let config = NodeConfig {
            network: Network::Test,
            listen_port: 0,
            peers,
            ..NodeConfig::default()
        };

        (Arc::new(Node::bind(config, store).await.unwrap()), dir)
    }

    fn loopback(node: &Node) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, node.local_addr().unwrap().port()))
    }

    #[tokio::test]
    async fn test_keepalive_exchange() {
        let advertised: SocketAddr = "10.1.2.3:7075".parse().unwrap();
        let (receiver, _receiver_dir) = test_node(vec![]).await;
        let (sender, _sender_dir) = test_node(vec![advertised]).await;

        let listener = {
            let receiver = Arc::clone(&receiver);
            tokio::spawn(async move { receiver.listen().await })
        };

        let target = loopback(&receiver);
        sender.peers().insert(target);
        sender.send_keepalive(target).await.unwrap();
        assert!(sender.peers().get(&target).unwrap().last_reachout.is_some());

        let learned = tokio::time::timeout(Duration::from_secs(5), async {
            while !(receiver.peers().contains(&advertised) && receiver.peers().contains(&loopback(&sender))) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        listener.abort();

        assert!(learned.is_ok(), "receiver never learned the advertised peers");
    }

    #[tokio::test]
    async fn test_send_keepalives_skips_recent_peers() {
        let (node, _dir) = test_node(vec![]).await;
        let (peer, _peer_dir) = test_node(vec![]).await;
        let target = loopback(&peer);
        node.peers().insert(target);

        node.send_keepalives().await;
        let first = node.peers().get(&target).unwrap().last_reachout.unwrap();

        node.send_keepalives().await;
        assert_eq!(node.peers().get(&target).unwrap().last_reachout, Some(first));
    }

    #[test]
    fn test_recv_backoff_grows_and_caps() {
        assert_eq!(recv_backoff(1), Duration::from_millis(10));
        assert_eq!(recv_backoff(2), Duration::from_millis(20));
        assert_eq!(recv_backoff(4), Duration::from_millis(80));
        assert_eq!(recv_backoff(8), Duration::from_secs(1));
        assert_eq!(recv_backoff(u32::MAX), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_peer_limit_applies_to_keepalives() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BlockStore::open(LedgerConfig::test().with_path(dir.path())).unwrap());
        let config = NodeConfig {
            network: Network::Test,
            listen_port: 0,
            max_peers: 2,
            ..NodeConfig::default()
        };
        let node = Node::bind(config, store).await.unwrap();

        let advertised = (1..=8).map(|i| SocketAddr::from(([10, 0, 0, i], 7075))).collect();
        let packet = Message::KeepAlive(KeepAlive::new(advertised).unwrap()).encode(Network::Test);
        node.handle_packet(&packet, "127.0.0.1:9000".parse().unwrap()).unwrap();

        assert_eq!(node.peers().len(), 2);
    }

    #[tokio::test]
    async fn test_bad_packets_are_rejected() {
        let (node, _dir) = test_node(vec![]).await;
        let from: SocketAddr = "127.0.0.1:9000".parse().unwrap();

        let live = Message::KeepAlive(KeepAlive::default()).encode(Network::Live);
        assert!(matches!(
            node.handle_packet(&live, from),
            Err(NodeError::Message(MessageError::WrongNetwork { .. }))
        ));
        assert!(node.handle_packet(&[1, 2, 3], from).is_err());
        assert!(node.peers().is_empty());

        let test = Message::KeepAlive(KeepAlive::default()).encode(Network::Test);
        node.handle_packet(&test, from).unwrap();
        assert!(node.peers().contains(&from));
    }
}
