use thiserror::Error;

use super::amount::{AmountError, Uint128};
use super::block::BlockType;
use super::crypto::{Account, BlockHash, CryptoError};
use super::storage::StorageError;

/// Errors returned by ledger and wallet operations
///
/// Every rejection leaves the ledger and the wallet head unchanged.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Chain state error: {0}")]
    ChainState(String),

    #[error("No proof of work available")]
    ProofOfWorkMissing,

    #[error("Proof of work does not meet the threshold for root of block {0}")]
    ProofOfWorkInvalid(BlockHash),

    #[error("Proof of work generation already in progress")]
    ProofOfWorkInProgress,

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Uint128, available: Uint128 },

    #[error("Referenced block not found: {0}")]
    ReferenceNotFound(BlockHash),

    #[error("Referenced block {hash} is a {found} block, not a send to {account}")]
    ReferenceTypeMismatch {
        hash: BlockHash,
        found: BlockType,
        account: Account,
    },

    #[error("Open block already exists for account {0}")]
    DuplicateOpen(Account),

    #[error("Send block {0} has already been received")]
    AlreadyReceived(BlockHash),

    #[error("Invalid signature on block {0}")]
    SignatureInvalid(BlockHash),

    #[error("Balance mismatch on block {hash}: expected {expected}, found {found}")]
    BalanceMismatch {
        hash: BlockHash,
        expected: Uint128,
        found: Uint128,
    },

    #[error("Store integrity error: {0}")]
    StoreIntegrity(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),
}
