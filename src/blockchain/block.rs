use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use std::fmt;

use super::amount::Uint128;
use super::crypto::{Account, BlockHash, KeyPair, Signature};
use super::work::{Work, WorkRoot};

/// Block kinds, with the discriminant mixed into every hash preimage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlockType {
    Send = 2,
    Receive = 3,
    Open = 4,
    Change = 5,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockType::Send => "send",
            BlockType::Receive => "receive",
            BlockType::Open => "open",
            BlockType::Change => "change",
        };
        write!(f, "{}", name)
    }
}

/// Fields shared by every block; neither is part of the hash preimage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonFields {
    /// Proof of work against the block's root
    pub work: Work,

    /// Signature over the block hash by the owning account
    pub signature: Signature,
}

impl CommonFields {
    /// Common fields carrying work but no signature yet
    pub fn unsigned(work: Work) -> Self {
        CommonFields {
            work,
            signature: Signature::from_bytes(&[0; 64]),
        }
    }
}

/// First block of an account chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenBlock {
    /// Send block this account is opened with
    pub source: BlockHash,
    pub representative: Account,
    pub account: Account,
    /// Resulting balance: the amount carried by `source`
    pub balance: Uint128,
    pub common: CommonFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBlock {
    pub previous: BlockHash,
    pub destination: Account,
    /// Resulting balance of the sending account, not the amount sent
    pub balance: Uint128,
    pub common: CommonFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBlock {
    pub previous: BlockHash,
    pub source: BlockHash,
    /// Resulting balance after the received amount is credited
    pub balance: Uint128,
    pub common: CommonFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBlock {
    pub previous: BlockHash,
    pub representative: Account,
    pub common: CommonFields,
}

/// A block on an account chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Open(OpenBlock),
    Send(SendBlock),
    Receive(ReceiveBlock),
    Change(ChangeBlock),
}

impl Block {
    pub fn block_type(&self) -> BlockType {
        match self {
            Block::Open(_) => BlockType::Open,
            Block::Send(_) => BlockType::Send,
            Block::Receive(_) => BlockType::Receive,
            Block::Change(_) => BlockType::Change,
        }
    }

    pub fn common(&self) -> &CommonFields {
        match self {
            Block::Open(b) => &b.common,
            Block::Send(b) => &b.common,
            Block::Receive(b) => &b.common,
            Block::Change(b) => &b.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonFields {
        match self {
            Block::Open(b) => &mut b.common,
            Block::Send(b) => &mut b.common,
            Block::Receive(b) => &mut b.common,
            Block::Change(b) => &mut b.common,
        }
    }

    /// The block this one extends; `None` for an open block
    pub fn previous(&self) -> Option<BlockHash> {
        match self {
            Block::Open(_) => None,
            Block::Send(b) => Some(b.previous),
            Block::Receive(b) => Some(b.previous),
            Block::Change(b) => Some(b.previous),
        }
    }

    /// The send block this one claims, for open and receive blocks
    pub fn source(&self) -> Option<BlockHash> {
        match self {
            Block::Open(b) => Some(b.source),
            Block::Receive(b) => Some(b.source),
            Block::Send(_) | Block::Change(_) => None,
        }
    }

    /// Balance recorded in the block itself; change blocks carry none
    pub fn stored_balance(&self) -> Option<Uint128> {
        match self {
            Block::Open(b) => Some(b.balance),
            Block::Send(b) => Some(b.balance),
            Block::Receive(b) => Some(b.balance),
            Block::Change(_) => None,
        }
    }

    /// Root the block's work must be computed against
    pub fn root(&self) -> WorkRoot {
        match self {
            Block::Open(b) => WorkRoot::from(&b.account),
            Block::Send(b) => WorkRoot::from(&b.previous),
            Block::Receive(b) => WorkRoot::from(&b.previous),
            Block::Change(b) => WorkRoot::from(&b.previous),
        }
    }

    /// Hash of the block's type and fields, excluding work and signature
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update([self.block_type() as u8]);

        match self {
            Block::Open(b) => {
                hasher.update(b.source.as_bytes());
                hasher.update(b.representative.as_bytes());
                hasher.update(b.account.as_bytes());
                hasher.update(b.balance.to_bytes());
            }
            Block::Send(b) => {
                hasher.update(b.previous.as_bytes());
                hasher.update(b.destination.as_bytes());
                hasher.update(b.balance.to_bytes());
            }
            Block::Receive(b) => {
                hasher.update(b.previous.as_bytes());
                hasher.update(b.source.as_bytes());
                hasher.update(b.balance.to_bytes());
            }
            Block::Change(b) => {
                hasher.update(b.previous.as_bytes());
                hasher.update(b.representative.as_bytes());
            }
        }

        BlockHash(hasher.finalize().into())
    }

    /// Signs the block hash and stores the signature
    pub fn sign(&mut self, keys: &KeyPair) {
        let signature = self.hash().sign(keys);
        self.common_mut().signature = signature;
    }
}
