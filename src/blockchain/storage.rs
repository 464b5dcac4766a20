use std::fs;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use log::{debug, info};
use sled::transaction::{abort, TransactionError, Transactional};
use sled::{Db, IVec, Tree};
use thiserror::Error;

use super::amount::Uint128;
use super::block::{Block, SendBlock};
use super::crypto::{verify_signature, Account, BlockHash};
use super::error::LedgerError;
use super::genesis::genesis_block;
use super::work::validate_block_work;
use crate::config::{LedgerConfig, Network};

/// Errors that can occur in the storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(StorageError::DatabaseError(err))
    }
}

/// Persistent, content-addressed store of every account chain
///
/// Blocks are keyed by hash. Secondary trees map each account to its open
/// block and its head, and each block to the account whose chain it extends.
/// A block and all index updates it implies are written in one transaction.
pub struct BlockStore {
    /// The database instance
    db: Db,

    config: LedgerConfig,

    /// hash -> block
    blocks: Tree,

    /// account -> hash of its open block
    open: Tree,

    /// account -> hash of its latest block
    head: Tree,

    /// hash -> owning account
    owner: Tree,

    /// send hash -> hash of the block that claimed it
    received: Tree,

    /// Serialises writes to each account's chain; entries live only while a write holds them
    account_locks: DashMap<Account, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("network", &self.config.network)
            .field("path", &self.config.path)
            .finish()
    }
}

impl BlockStore {
    /// Opens or creates the store described by `config` and seeds its genesis block
    ///
    /// # Arguments
    ///
    /// * `config` - Network, storage path and work threshold
    ///
    /// # Returns
    ///
    /// The opened store; reopening an existing path keeps its contents
    pub fn open(config: LedgerConfig) -> Result<Self, LedgerError> {
        let db = sled::open(&config.path)?;

        let blocks = db.open_tree("blocks")?;
        let open = db.open_tree("open")?;
        let head = db.open_tree("head")?;
        let owner = db.open_tree("owner")?;
        let received = db.open_tree("received")?;

        let store = Self {
            db,
            config,
            blocks,
            open,
            head,
            owner,
            received,
            account_locks: DashMap::new(),
        };

        store.seed_genesis()?;
        info!(
            "Opened {:?} ledger at {} ({} blocks)",
            store.config.network,
            store.config.path.display(),
            store.block_count()
        );

        Ok(store)
    }

    fn seed_genesis(&self) -> Result<(), LedgerError> {
        let genesis = genesis_block(self.config.network)?;
        let hash = genesis.hash();

        if self.blocks.contains_key(hash.as_bytes())? {
            return Ok(());
        }

        let Block::Open(open) = &genesis else {
            return Err(LedgerError::StoreIntegrity("genesis must be an open block".to_string()));
        };

        self.commit(&genesis, hash, open.account, None)?;
        self.flush()?;
        info!("Seeded genesis block {} for account {}", hash, open.account);
        Ok(())
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn work_threshold(&self) -> u64 {
        self.config.work_threshold
    }

    /// Gets a block by its hash
    pub fn fetch_block(&self, hash: &BlockHash) -> Result<Option<Block>, LedgerError> {
        match self.blocks.get(hash.as_bytes())? {
            Some(value) => Ok(Some(decode_block(&value)?)),
            None => Ok(None),
        }
    }

    /// Gets the open block of an account's chain
    pub fn fetch_open(&self, account: &Account) -> Result<Option<Block>, LedgerError> {
        self.fetch_indexed(&self.open, account)
    }

    /// Gets the latest block of an account's chain
    pub fn fetch_head(&self, account: &Account) -> Result<Option<Block>, LedgerError> {
        self.fetch_indexed(&self.head, account)
    }

    pub fn head_hash(&self, account: &Account) -> Result<Option<BlockHash>, LedgerError> {
        match self.head.get(account.as_bytes())? {
            Some(value) => Ok(Some(decode_hash(&value)?)),
            None => Ok(None),
        }
    }

    /// Account whose chain contains the given block
    pub fn owner(&self, hash: &BlockHash) -> Result<Option<Account>, LedgerError> {
        match self.owner.get(hash.as_bytes())? {
            Some(value) => Ok(Some(Account(decode_bytes(&value)?))),
            None => Ok(None),
        }
    }

    /// Whether a send block has already been claimed by an open or receive
    pub fn is_received(&self, source: &BlockHash) -> Result<bool, LedgerError> {
        Ok(self.received.contains_key(source.as_bytes())?)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn fetch_indexed(&self, index: &Tree, account: &Account) -> Result<Option<Block>, LedgerError> {
        let Some(value) = index.get(account.as_bytes())? else {
            return Ok(None);
        };

        let hash = decode_hash(&value)?;
        match self.fetch_block(&hash)? {
            Some(block) => Ok(Some(block)),
            None => Err(LedgerError::StoreIntegrity(format!(
                "index for account {} points at missing block {}",
                account, hash
            ))),
        }
    }

    /// Balance of the account after the given block
    ///
    /// Send, open and receive blocks record their resulting balance; change
    /// blocks inherit it from the nearest predecessor that records one.
    pub fn balance(&self, block: &Block) -> Result<Uint128, LedgerError> {
        if let Some(balance) = block.stored_balance() {
            return Ok(balance);
        }

        let mut cursor = block.previous();
        while let Some(hash) = cursor {
            let previous = self.fetch_block(&hash)?.ok_or(LedgerError::ReferenceNotFound(hash))?;
            if let Some(balance) = previous.stored_balance() {
                return Ok(balance);
            }
            cursor = previous.previous();
        }

        Err(LedgerError::StoreIntegrity("chain has no block recording a balance".to_string()))
    }

    /// Amount transferred by a send: the sender's balance before it minus the balance after
    pub fn sent_amount(&self, send: &SendBlock) -> Result<Uint128, LedgerError> {
        let previous = self
            .fetch_block(&send.previous)?
            .ok_or(LedgerError::ReferenceNotFound(send.previous))?;

        Ok(self.balance(&previous)?.checked_sub(send.balance)?)
    }

    /// Looks up `source` and checks it is a send addressed to `account`
    pub fn fetch_send_for(&self, source: &BlockHash, account: &Account) -> Result<SendBlock, LedgerError> {
        let block = self.fetch_block(source)?.ok_or(LedgerError::ReferenceNotFound(*source))?;

        match block {
            Block::Send(send) if send.destination == *account => Ok(send),
            other => Err(LedgerError::ReferenceTypeMismatch {
                hash: *source,
                found: other.block_type(),
                account: *account,
            }),
        }
    }

    /// Validates a block against the ledger and appends it to its account chain
    ///
    /// # Arguments
    ///
    /// * `block` - A signed block carrying work for its root
    ///
    /// # Returns
    ///
    /// The hash of the stored block, which is now the head of its chain
    pub fn store_block(&self, block: &Block) -> Result<BlockHash, LedgerError> {
        let hash = block.hash();

        let account = match (block, block.previous()) {
            (Block::Open(open), _) => open.account,
            (_, Some(previous)) => self.owner(&previous)?.ok_or_else(|| {
                LedgerError::StoreIntegrity(format!("previous block {} of {} is not stored", previous, hash))
            })?,
            (_, None) => {
                return Err(LedgerError::StoreIntegrity(format!("block {} has no previous", hash)));
            }
        };

        let lock = self.account_locks.entry(account).or_default().clone();
        let result = match lock.lock() {
            Ok(_guard) => self.validate_and_commit(block, hash, account),
            Err(_) => Err(LedgerError::StoreIntegrity(format!("write lock for {} poisoned", account))),
        };

        drop(lock);
        self.account_locks.remove_if(&account, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    /// Checks run under the account's write lock
    fn validate_and_commit(&self, block: &Block, hash: BlockHash, account: Account) -> Result<BlockHash, LedgerError> {
        if !verify_signature(&hash, &block.common().signature, &account)? {
            return Err(LedgerError::SignatureInvalid(hash));
        }

        if !validate_block_work(block, self.config.work_threshold) {
            return Err(LedgerError::ProofOfWorkInvalid(hash));
        }

        let previous_balance = match block.previous() {
            Some(previous) => {
                let previous_block = self
                    .fetch_block(&previous)?
                    .ok_or(LedgerError::ReferenceNotFound(previous))?;
                self.balance(&previous_block)?
            }
            None => {
                if self.fetch_open(&account)?.is_some() {
                    return Err(LedgerError::DuplicateOpen(account));
                }
                Uint128::ZERO
            }
        };

        match block {
            Block::Send(send) => {
                if send.balance > previous_balance {
                    return Err(LedgerError::InsufficientBalance {
                        required: send.balance,
                        available: previous_balance,
                    });
                }
            }
            Block::Open(_) | Block::Receive(_) => {
                let source = block
                    .source()
                    .ok_or_else(|| LedgerError::StoreIntegrity(format!("block {} has no source", hash)))?;
                let send = self.fetch_send_for(&source, &account)?;
                if self.is_received(&source)? {
                    return Err(LedgerError::AlreadyReceived(source));
                }
                let expected = previous_balance.checked_add(self.sent_amount(&send)?)?;

                let found = block.stored_balance().unwrap_or_default();
                if found != expected {
                    return Err(LedgerError::BalanceMismatch { hash, expected, found });
                }
            }
            Block::Change(_) => {}
        }

        self.commit(block, hash, account, block.source())?;
        debug!("Stored {} block {} for account {}", block.block_type(), hash, account);

        Ok(hash)
    }

    /// Writes the block and its index entries atomically, re-checking chain linkage
    fn commit(
        &self,
        block: &Block,
        hash: BlockHash,
        account: Account,
        claimed_source: Option<BlockHash>,
    ) -> Result<(), LedgerError> {
        let encoded = bincode::serialize(block).map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let previous = block.previous();

        let result = (&self.blocks, &self.open, &self.head, &self.owner, &self.received).transaction(
            |(blocks, open, head, owner, received)| {
                if blocks.get(hash.as_bytes())?.is_some() {
                    return abort(LedgerError::StoreIntegrity(format!("block {} already stored", hash)));
                }

                let current_head = head.get(account.as_bytes())?;
                match previous {
                    None => {
                        if open.get(account.as_bytes())?.is_some() {
                            return abort(LedgerError::DuplicateOpen(account));
                        }
                    }
                    Some(previous) => {
                        let linked = current_head
                            .as_ref()
                            .map_or(false, |current| current[..] == previous.0[..]);
                        if !linked {
                            return abort(LedgerError::StoreIntegrity(format!(
                                "block {} does not extend the head of {}",
                                hash, account
                            )));
                        }
                    }
                }

                if let Some(source) = claimed_source {
                    if received.get(source.as_bytes())?.is_some() {
                        return abort(LedgerError::AlreadyReceived(source));
                    }
                    received.insert(&source.0[..], &hash.0[..])?;
                }

                blocks.insert(&hash.0[..], encoded.as_slice())?;
                owner.insert(&hash.0[..], &account.0[..])?;
                head.insert(&account.0[..], &hash.0[..])?;
                if previous.is_none() {
                    open.insert(&account.0[..], &hash.0[..])?;
                }

                Ok(())
            },
        );

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    /// Flushes all pending writes to disk
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.db.flush()?;
        Ok(())
    }

    /// Closes the store and deletes its storage directory
    pub fn wipe(self) -> Result<(), LedgerError> {
        let path = self.config.path.clone();
        drop(self);

        if path.exists() {
            fs::remove_dir_all(&path).map_err(StorageError::from)?;
        }
        info!("Wiped ledger at {}", path.display());
        Ok(())
    }
}

fn decode_block(bytes: &[u8]) -> Result<Block, StorageError> {
    bincode::deserialize(bytes).map_err(|e| StorageError::DeserializationError(e.to_string()))
}

fn decode_bytes(value: &IVec) -> Result<[u8; 32], StorageError> {
    let bytes: &[u8] = value;
    bytes
        .try_into()
        .map_err(|_| StorageError::DeserializationError(format!("expected 32 bytes, found {}", value.len())))
}

fn decode_hash(value: &IVec) -> Result<BlockHash, StorageError> {
    Ok(BlockHash(decode_bytes(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::block::{ChangeBlock, CommonFields, OpenBlock, ReceiveBlock};
    use crate::blockchain::crypto::KeyPair;
    use crate::blockchain::genesis::{genesis_account, genesis_hash, test_genesis_keys, GENESIS_AMOUNT};
    use crate::blockchain::work::{generate_work, validate_work, Work};
    use tempfile::TempDir;

    const THRESHOLD: u64 = 0xf000_0000_0000_0000;

    fn test_store() -> (BlockStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = LedgerConfig::test().with_path(dir.path().join("ledger")).with_work_threshold(THRESHOLD);
        (BlockStore::open(config).unwrap(), dir)
    }

    /// Adds valid work and a signature
    fn finish(mut block: Block, keys: &KeyPair) -> Block {
        block.common_mut().work = generate_work(&block.root(), THRESHOLD);
        block.sign(keys);
        block
    }

    fn send(previous: BlockHash, destination: Account, balance: Uint128, keys: &KeyPair) -> Block {
        finish(
            Block::Send(SendBlock {
                previous,
                destination,
                balance,
                common: CommonFields::unsigned(Work(0)),
            }),
            keys,
        )
    }

    fn open(source: BlockHash, balance: Uint128, keys: &KeyPair) -> Block {
        finish(
            Block::Open(OpenBlock {
                source,
                representative: keys.account(),
                account: keys.account(),
                balance,
                common: CommonFields::unsigned(Work(0)),
            }),
            keys,
        )
    }

    #[test]
    fn test_genesis_balance() {
        let (store, _dir) = test_store();
        let hash = genesis_hash(Network::Test).unwrap();

        let block = store.fetch_block(&hash).unwrap().unwrap();
        assert_eq!(store.balance(&block).unwrap().to_string(), "ffffffffffffffffffffffffffffffff");

        let account = test_genesis_keys().unwrap().account();
        assert_eq!(store.fetch_open(&account).unwrap(), Some(block.clone()));
        assert_eq!(store.fetch_head(&account).unwrap(), Some(block));
    }

    #[test]
    fn test_live_genesis_balance() {
        let dir = TempDir::new().unwrap();
        let store = BlockStore::open(LedgerConfig::live().with_path(dir.path())).unwrap();

        let block = store.fetch_block(&genesis_hash(Network::Live).unwrap()).unwrap().unwrap();
        assert_eq!(store.balance(&block).unwrap(), GENESIS_AMOUNT);
    }

    #[test]
    fn test_missing_block() {
        let (store, _dir) = test_store();
        let live = genesis_hash(Network::Live).unwrap();

        assert!(store.fetch_block(&live).unwrap().is_none());
        assert!(store.fetch_open(&genesis_account(Network::Live).unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = LedgerConfig::test().with_path(dir.path());

        let store = BlockStore::open(config.clone()).unwrap();
        assert_eq!(store.block_count(), 1);
        drop(store);

        let store = BlockStore::open(config).unwrap();
        assert_eq!(store.block_count(), 1);
    }

    #[test]
    fn test_wipe_removes_storage() {
        let (store, dir) = test_store();
        let path = dir.path().join("ledger");
        assert!(path.exists());

        store.wipe().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_send_and_open() {
        let (store, _dir) = test_store();
        let genesis = test_genesis_keys().unwrap();
        let recipient = KeyPair::generate();
        let genesis_hash = genesis_hash(Network::Test).unwrap();

        let amount = Uint128::from_ints(0, 1);
        let send_block = send(genesis_hash, recipient.account(), GENESIS_AMOUNT.checked_sub(amount).unwrap(), &genesis);
        let send_hash = store.store_block(&send_block).unwrap();

        assert_eq!(store.head_hash(&genesis.account()).unwrap(), Some(send_hash));
        assert_eq!(store.owner(&send_hash).unwrap(), Some(genesis.account()));
        let Block::Send(fields) = &send_block else { unreachable!() };
        assert_eq!(store.sent_amount(fields).unwrap(), amount);

        let open_block = open(send_hash, amount, &recipient);
        let open_hash = store.store_block(&open_block).unwrap();

        assert_eq!(store.fetch_open(&recipient.account()).unwrap(), Some(open_block.clone()));
        assert_eq!(store.head_hash(&recipient.account()).unwrap(), Some(open_hash));
        assert_eq!(store.balance(&open_block).unwrap(), amount);
        assert!(store.is_received(&send_hash).unwrap());
    }

    #[test]
    fn test_rejects_duplicate_open() {
        let (store, _dir) = test_store();
        let genesis = test_genesis_keys().unwrap();
        let recipient = KeyPair::generate();

        let first = send(
            genesis_hash(Network::Test).unwrap(),
            recipient.account(),
            Uint128::from_ints(u64::MAX, 0),
            &genesis,
        );
        let first_hash = store.store_block(&first).unwrap();
        let second = send(first_hash, recipient.account(), Uint128::from_ints(u64::MAX - 1, 0), &genesis);
        let second_hash = store.store_block(&second).unwrap();

        store.store_block(&open(first_hash, Uint128::from_ints(0, u64::MAX), &recipient)).unwrap();

        let again = open(second_hash, Uint128::from_ints(1, 0), &recipient);
        assert!(matches!(store.store_block(&again), Err(LedgerError::DuplicateOpen(a)) if a == recipient.account()));
    }

    #[test]
    fn test_rejects_overspending_send() {
        let (store, _dir) = test_store();
        let genesis = test_genesis_keys().unwrap();
        let other = KeyPair::generate().account();

        let first = store
            .store_block(&send(genesis_hash(Network::Test).unwrap(), other, Uint128::from(10), &genesis))
            .unwrap();

        let overspend = send(first, other, Uint128::from(11), &genesis);
        let result = store.store_block(&overspend);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { required, available })
                if required == Uint128::from(11) && available == Uint128::from(10)
        ));
        assert_eq!(store.head_hash(&genesis.account()).unwrap(), Some(first));
    }

    #[test]
    fn test_rejects_duplicate_block() {
        let (store, _dir) = test_store();
        let genesis = test_genesis_keys().unwrap();
        let other = KeyPair::generate().account();

        let block = send(genesis_hash(Network::Test).unwrap(), other, Uint128::from(10), &genesis);
        store.store_block(&block).unwrap();

        assert!(matches!(store.store_block(&block), Err(LedgerError::StoreIntegrity(_))));
        assert_eq!(store.block_count(), 2);
    }

    #[test]
    fn test_concurrent_successors_of_one_head() {
        let (store, _dir) = test_store();
        let genesis = test_genesis_keys().unwrap();
        let genesis_hash = genesis_hash(Network::Test).unwrap();
        let other = KeyPair::generate().account();

        let candidates = [
            send(genesis_hash, other, Uint128::from(10), &genesis),
            send(genesis_hash, other, Uint128::from(5), &genesis),
        ];

        let store = &store;
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .iter()
                .map(|block| scope.spawn(move || store.store_block(block)))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        let stored: Vec<_> = results.iter().filter_map(|result| result.as_ref().ok()).collect();
        assert_eq!(stored.len(), 1);
        assert_eq!(store.head_hash(&genesis.account()).unwrap(), Some(*stored[0]));
        assert_eq!(store.block_count(), 2);
        assert!(store.account_locks.is_empty());
    }

    #[test]
    fn test_rejects_stale_previous() {
        let (store, _dir) = test_store();
        let genesis = test_genesis_keys().unwrap();
        let genesis_hash = genesis_hash(Network::Test).unwrap();
        let other = KeyPair::generate().account();

        store.store_block(&send(genesis_hash, other, Uint128::from(10), &genesis)).unwrap();

        // A second block extending genesis forks the chain
        let fork = send(genesis_hash, other, Uint128::from(5), &genesis);
        assert!(matches!(store.store_block(&fork), Err(LedgerError::StoreIntegrity(_))));
        assert_eq!(store.block_count(), 2);
    }

    #[test]
    fn test_rejects_missing_and_mismatched_source() {
        let (store, _dir) = test_store();
        let genesis = test_genesis_keys().unwrap();
        let recipient = KeyPair::generate();
        let stranger = KeyPair::generate();

        let unstored = BlockHash([5; 32]);
        let result = store.store_block(&open(unstored, Uint128::from(1), &recipient));
        assert!(matches!(result, Err(LedgerError::ReferenceNotFound(h)) if h == unstored));

        let send_hash = store
            .store_block(&send(
                genesis_hash(Network::Test).unwrap(),
                recipient.account(),
                Uint128::from(1),
                &genesis,
            ))
            .unwrap();

        let result = store.store_block(&open(send_hash, GENESIS_AMOUNT, &stranger));
        assert!(matches!(result, Err(LedgerError::ReferenceTypeMismatch { .. })));

        // The genesis open block is not a send
        let result = store.store_block(&open(genesis_hash(Network::Test).unwrap(), Uint128::ZERO, &recipient));
        assert!(matches!(result, Err(LedgerError::ReferenceTypeMismatch { .. })));
    }

    #[test]
    fn test_rejects_invalid_work_and_signature() {
        let (store, _dir) = test_store();
        let genesis = test_genesis_keys().unwrap();
        let genesis_hash = genesis_hash(Network::Test).unwrap();
        let other = KeyPair::generate();

        let mut block = send(genesis_hash, other.account(), Uint128::from(1), &genesis);
        let bad_work = (0..)
            .map(Work)
            .find(|w| !validate_work(&block.root(), *w, THRESHOLD))
            .unwrap();
        block.common_mut().work = bad_work;
        assert!(matches!(store.store_block(&block), Err(LedgerError::ProofOfWorkInvalid(_))));

        let forged = send(genesis_hash, other.account(), Uint128::from(1), &other);
        assert!(matches!(store.store_block(&forged), Err(LedgerError::SignatureInvalid(_))));

        assert_eq!(store.block_count(), 1);
    }

    #[test]
    fn test_receive_balance_and_double_receive() {
        let (store, _dir) = test_store();
        let genesis = test_genesis_keys().unwrap();
        let genesis_hash = genesis_hash(Network::Test).unwrap();

        let amount = Uint128::from(300);
        let remaining = GENESIS_AMOUNT.checked_sub(amount).unwrap();
        let send_hash = store
            .store_block(&send(genesis_hash, genesis.account(), remaining, &genesis))
            .unwrap();

        let receive = |balance: Uint128, previous: BlockHash| {
            finish(
                Block::Receive(ReceiveBlock {
                    previous,
                    source: send_hash,
                    balance,
                    common: CommonFields::unsigned(Work(0)),
                }),
                &genesis,
            )
        };

        let wrong = receive(remaining, send_hash);
        assert!(matches!(store.store_block(&wrong), Err(LedgerError::BalanceMismatch { .. })));

        let receive_hash = store.store_block(&receive(GENESIS_AMOUNT, send_hash)).unwrap();

        let twice = receive(Uint128::MAX, receive_hash);
        assert!(matches!(store.store_block(&twice), Err(LedgerError::AlreadyReceived(h)) if h == send_hash));
    }

    #[test]
    fn test_change_inherits_balance() {
        let (store, _dir) = test_store();
        let genesis = test_genesis_keys().unwrap();
        let representative = KeyPair::generate().account();

        let mut previous = genesis_hash(Network::Test).unwrap();
        for _ in 0..3 {
            let change = finish(
                Block::Change(ChangeBlock {
                    previous,
                    representative,
                    common: CommonFields::unsigned(Work(0)),
                }),
                &genesis,
            );
            previous = store.store_block(&change).unwrap();
        }

        let head = store.fetch_head(&genesis.account()).unwrap().unwrap();
        assert_eq!(head.block_type(), crate::blockchain::block::BlockType::Change);
        assert_eq!(store.balance(&head).unwrap(), GENESIS_AMOUNT);
    }
}
