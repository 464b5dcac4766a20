// Blockchain module
//
// This module contains the ledger core:
// - Amount type
// - Block variants and hashing
// - Cryptography utilities
// - Proof of work
// - Block store
// - Wallet

pub mod amount;
pub mod block;
pub mod crypto;
pub mod error;
pub mod genesis;
pub mod storage;
pub mod wallet;
pub mod work;

// Re-export main components for easier access
pub use amount::Uint128;
pub use block::{Block, BlockType};
pub use crypto::{Account, BlockHash, KeyPair};
pub use error::LedgerError;
pub use storage::BlockStore;
pub use wallet::Wallet;
pub use work::Work;
