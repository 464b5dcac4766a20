use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};

use crate::config::Network;

/// Largest datagram nodes send or accept
pub const PACKET_SIZE: usize = 512;

/// Peers carried by one keepalive
pub const KEEPALIVE_PEERS: usize = 8;

const MAGIC: u8 = b'R';
const VERSION_MAX: u8 = 5;
const VERSION_USING: u8 = 5;
const VERSION_MIN: u8 = 1;

const HEADER_SIZE: usize = 8;
const PEER_SIZE: usize = 18;

/// Errors that can occur while decoding or encoding packets
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("Packet too short: {0} bytes")]
    TooShort(usize),

    #[error("Packet too long: {0} bytes")]
    TooLong(usize),

    #[error("Invalid magic bytes: {0:#04x} {1:#04x}")]
    InvalidMagic(u8, u8),

    #[error("Packet for {found:?} network, expected {expected:?}")]
    WrongNetwork { expected: Network, found: Network },

    #[error("Peer version {0} is no longer supported")]
    UnsupportedVersion(u8),

    #[error("Unsupported message type: {0}")]
    UnsupportedType(u8),

    #[error("Keepalive carries {0} peers, at most 8 allowed")]
    TooManyPeers(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    KeepAlive = 2,
}

impl TryFrom<u8> for MessageType {
    type Error = MessageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(MessageType::KeepAlive),
            other => Err(MessageError::UnsupportedType(other)),
        }
    }
}

/// Fixed header preceding every message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub network: Network,
    pub version_max: u8,
    pub version_using: u8,
    pub version_min: u8,
    pub message_type: u8,
    pub extensions: u16,
}

impl Header {
    pub fn new(network: Network, message_type: MessageType) -> Self {
        Header {
            network,
            version_max: VERSION_MAX,
            version_using: VERSION_USING,
            version_min: VERSION_MIN,
            message_type: message_type as u8,
            extensions: 0,
        }
    }

    fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(MAGIC);
        buf.put_u8(self.network.magic());
        buf.put_u8(self.version_max);
        buf.put_u8(self.version_using);
        buf.put_u8(self.version_min);
        buf.put_u8(self.message_type);
        buf.put_u16_le(self.extensions);
    }

    fn read(buf: &mut &[u8]) -> Result<Self, MessageError> {
        if buf.remaining() < HEADER_SIZE {
            return Err(MessageError::TooShort(buf.remaining()));
        }

        let magic = buf.get_u8();
        let network_byte = buf.get_u8();
        if magic != MAGIC {
            return Err(MessageError::InvalidMagic(magic, network_byte));
        }
        let network = Network::from_magic(network_byte).ok_or(MessageError::InvalidMagic(magic, network_byte))?;

        Ok(Header {
            network,
            version_max: buf.get_u8(),
            version_using: buf.get_u8(),
            version_min: buf.get_u8(),
            message_type: buf.get_u8(),
            extensions: buf.get_u16_le(),
        })
    }
}

/// Liveness message advertising a sample of known peers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeepAlive {
    pub peers: Vec<SocketAddr>,
}

impl KeepAlive {
    pub fn new(peers: Vec<SocketAddr>) -> Result<Self, MessageError> {
        if peers.len() > KEEPALIVE_PEERS {
            return Err(MessageError::TooManyPeers(peers.len()));
        }
        Ok(KeepAlive { peers })
    }

    /// Always writes all slots; unused ones are zero
    fn write(&self, buf: &mut BytesMut) {
        for slot in 0..KEEPALIVE_PEERS {
            let (ip, port) = match self.peers.get(slot) {
                Some(SocketAddr::V4(addr)) => (addr.ip().to_ipv6_mapped(), addr.port()),
                Some(SocketAddr::V6(addr)) => (*addr.ip(), addr.port()),
                None => (Ipv6Addr::UNSPECIFIED, 0),
            };
            buf.put_slice(&ip.octets());
            buf.put_u16_le(port);
        }
    }

    fn read(buf: &mut &[u8]) -> Result<Self, MessageError> {
        let mut peers = Vec::new();

        while buf.remaining() >= PEER_SIZE && peers.len() < KEEPALIVE_PEERS {
            let mut octets = [0u8; 16];
            buf.copy_to_slice(&mut octets);
            let port = buf.get_u16_le();

            let ip = Ipv6Addr::from(octets);
            if ip.is_unspecified() || port == 0 {
                continue;
            }

            let addr = match ip.to_ipv4_mapped() {
                Some(v4) => SocketAddr::from((v4, port)),
                None => SocketAddr::V6(SocketAddrV6::new(ip, port, 0, 0)),
            };
            peers.push(addr);
        }

        Ok(KeepAlive { peers })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive(KeepAlive),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::KeepAlive(_) => MessageType::KeepAlive,
        }
    }

    /// Serializes the message with a header for `network`
    pub fn encode(&self, network: Network) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(PACKET_SIZE);
        Header::new(network, self.message_type()).write(&mut buf);

        match self {
            Message::KeepAlive(keepalive) => keepalive.write(&mut buf),
        }

        buf.to_vec()
    }

    /// Parses a datagram, rejecting packets meant for another network
    pub fn decode(packet: &[u8], network: Network) -> Result<Message, MessageError> {
        if packet.len() > PACKET_SIZE {
            return Err(MessageError::TooLong(packet.len()));
        }

        let mut buf = packet;
        let header = Header::read(&mut buf)?;

        if header.network != network {
            return Err(MessageError::WrongNetwork {
                expected: network,
                found: header.network,
            });
        }
        if header.version_using < VERSION_MIN {
            return Err(MessageError::UnsupportedVersion(header.version_using));
        }

        match MessageType::try_from(header.message_type)? {
            MessageType::KeepAlive => Ok(Message::KeepAlive(KeepAlive::read(&mut buf)?)),
        }
    }
}
