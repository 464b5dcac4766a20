use log::{debug, info, warn};

use std::sync::Arc;

use super::amount::Uint128;
use super::block::{Block, ChangeBlock, CommonFields, OpenBlock, ReceiveBlock, SendBlock};
use super::crypto::{Account, BlockHash, KeyPair};
use super::error::LedgerError;
use super::storage::BlockStore;
use super::work::{validate_block_work, PendingWork, Work, WorkRoot, WorkStatus};

/// Builds signed blocks extending a single account chain
///
/// The wallet tracks the chain head in memory and advances it with every block
/// it produces. Blocks are returned to the caller unpersisted; the caller
/// submits them with [`BlockStore::store_block`]. Every chain mutation needs
/// work computed beforehand with [`Wallet::generate_work_async`] and collected
/// with [`Wallet::has_work`] or [`Wallet::wait_work`]; each mutation consumes it.
///
/// A wallet is meant to be owned by one thread at a time.
#[derive(Debug)]
pub struct Wallet {
    store: Arc<BlockStore>,
    keys: KeyPair,
    head: Option<Block>,
    /// Balance after `head`, tracked locally so unpersisted blocks can be chained
    balance: Uint128,
    pending: Option<PendingWork>,
    work: Option<(WorkRoot, Work)>,
}

impl Wallet {
    /// Creates a wallet for the given keys, starting from the stored head of its chain
    ///
    /// # Arguments
    ///
    /// * `store` - The ledger the wallet reads balances and references from
    /// * `keys` - The account's keypair
    pub fn new(store: Arc<BlockStore>, keys: KeyPair) -> Result<Self, LedgerError> {
        let (head, balance) = stored_head(&store, &keys.account())?;

        Ok(Wallet {
            store,
            keys,
            head,
            balance,
            pending: None,
            work: None,
        })
    }

    /// Creates a wallet from a hex encoded private key
    pub fn from_private_key(store: Arc<BlockStore>, private_key: &str) -> Result<Self, LedgerError> {
        let keys = KeyPair::from_hex(private_key)?;
        Self::new(store, keys)
    }

    pub fn account(&self) -> Account {
        self.keys.account()
    }

    pub fn head(&self) -> Option<&Block> {
        self.head.as_ref()
    }

    /// Reloads the head from the store, dropping any unpersisted blocks
    pub fn refresh_head(&mut self) -> Result<(), LedgerError> {
        let (head, balance) = stored_head(&self.store, &self.account())?;
        self.head = head;
        self.balance = balance;
        Ok(())
    }

    /// Root the next block's work has to be computed against
    fn current_root(&self) -> WorkRoot {
        match &self.head {
            Some(head) => WorkRoot::from(&head.hash()),
            None => WorkRoot::from(&self.account()),
        }
    }

    /// Starts computing work for the current head on a background thread
    ///
    /// Any previously collected work is discarded.
    pub fn generate_work_async(&mut self) -> Result<(), LedgerError> {
        if self.pending.is_some() {
            return Err(LedgerError::ProofOfWorkInProgress);
        }

        let root = self.current_root();
        self.work = None;
        self.pending = Some(PendingWork::spawn(root, self.store.work_threshold()));
        debug!("Started work generation for account {}", self.account());

        Ok(())
    }

    /// Whether a work computation is still outstanding
    pub fn is_computing_work(&self) -> bool {
        self.pending.is_some()
    }

    /// Non-blocking check for ready work; collects it if the computation finished
    pub fn has_work(&mut self) -> bool {
        if self.work.is_some() {
            return true;
        }

        let Some(pending) = self.pending.as_mut() else {
            return false;
        };

        match pending.poll() {
            WorkStatus::Ready(work) => {
                self.work = Some((pending.root(), work));
                self.pending = None;
                true
            }
            WorkStatus::Pending => false,
            WorkStatus::Abandoned => {
                warn!("Work generation for account {} ended without a result", self.account());
                self.pending = None;
                false
            }
        }
    }

    /// Blocks the calling thread until the outstanding computation delivers its work
    ///
    /// Safe to call from a runtime thread, but it stalls that thread; async
    /// callers should use [`Wallet::wait_work_async`].
    pub fn wait_work(&mut self) -> Result<(), LedgerError> {
        if self.work.is_some() {
            return Ok(());
        }

        let pending = self.pending.take().ok_or(LedgerError::ProofOfWorkMissing)?;
        let root = pending.root();
        let work = pending.wait().ok_or(LedgerError::ProofOfWorkMissing)?;
        self.work = Some((root, work));

        Ok(())
    }

    /// Waits for the outstanding computation without blocking the runtime
    pub async fn wait_work_async(&mut self) -> Result<(), LedgerError> {
        if self.work.is_some() {
            return Ok(());
        }

        let pending = self.pending.take().ok_or(LedgerError::ProofOfWorkMissing)?;
        let root = pending.root();
        let work = pending.wait_async().await.ok_or(LedgerError::ProofOfWorkMissing)?;
        self.work = Some((root, work));

        Ok(())
    }

    /// Computes work for the current head and blocks until it is ready
    pub fn generate_work_sync(&mut self) -> Result<(), LedgerError> {
        self.generate_work_async()?;
        self.wait_work()
    }

    /// Balance after the current head, zero for an empty chain
    pub fn balance(&self) -> Uint128 {
        self.balance
    }

    fn cached_work(&self) -> Result<(WorkRoot, Work), LedgerError> {
        self.work.ok_or(LedgerError::ProofOfWorkMissing)
    }

    fn head_hash(&self, operation: &str) -> Result<BlockHash, LedgerError> {
        self.head
            .as_ref()
            .map(Block::hash)
            .ok_or_else(|| LedgerError::ChainState(format!("cannot {} on an empty account", operation)))
    }

    /// Signs the block, checks the cached work against its root and makes it the new head
    fn finish(&mut self, mut block: Block, root: WorkRoot) -> Result<Block, LedgerError> {
        block.sign(&self.keys);

        if root != block.root() || !validate_block_work(&block, self.store.work_threshold()) {
            return Err(LedgerError::ProofOfWorkInvalid(block.hash()));
        }

        self.work = None;
        self.balance = block.stored_balance().unwrap_or(self.balance);
        self.head = Some(block.clone());
        info!("Created {} block {} for account {}", block.block_type(), block.hash(), self.account());

        Ok(block)
    }

    /// Fetches a send addressed to this account that has not been received yet
    fn claimable_send(&self, source: &BlockHash) -> Result<SendBlock, LedgerError> {
        let send = self.store.fetch_send_for(source, &self.account())?;
        if self.store.is_received(source)? {
            return Err(LedgerError::AlreadyReceived(*source));
        }
        Ok(send)
    }

    /// Opens the account's chain by claiming a stored send
    ///
    /// # Arguments
    ///
    /// * `source` - Hash of a stored send addressed to this account
    /// * `representative` - The account to delegate voting weight to
    pub fn open(&mut self, source: BlockHash, representative: Account) -> Result<Block, LedgerError> {
        let account = self.account();
        if self.store.fetch_open(&account)?.is_some() {
            return Err(LedgerError::DuplicateOpen(account));
        }
        if self.head.is_some() {
            return Err(LedgerError::ChainState("cannot open a non-empty account".to_string()));
        }

        let (root, work) = self.cached_work()?;

        let send = self.claimable_send(&source)?;
        let balance = self.store.sent_amount(&send)?;

        let block = Block::Open(OpenBlock {
            source,
            representative,
            account,
            balance,
            common: CommonFields::unsigned(work),
        });

        self.finish(block, root)
    }

    /// Sends `amount` to `destination`
    pub fn send(&mut self, destination: Account, amount: Uint128) -> Result<Block, LedgerError> {
        let previous = self.head_hash("send")?;
        let (root, work) = self.cached_work()?;

        let available = self.balance;
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        let block = Block::Send(SendBlock {
            previous,
            destination,
            balance: available.checked_sub(amount)?,
            common: CommonFields::unsigned(work),
        });

        self.finish(block, root)
    }

    /// Claims a stored send addressed to this account
    pub fn receive(&mut self, source: BlockHash) -> Result<Block, LedgerError> {
        let previous = self.head_hash("receive")?;
        let (root, work) = self.cached_work()?;

        let send = self.claimable_send(&source)?;
        let balance = self.balance.checked_add(self.store.sent_amount(&send)?)?;

        let block = Block::Receive(ReceiveBlock {
            previous,
            source,
            balance,
            common: CommonFields::unsigned(work),
        });

        self.finish(block, root)
    }

    /// Changes the account's representative
    pub fn change(&mut self, representative: Account) -> Result<Block, LedgerError> {
        let previous = self.head_hash("change")?;
        let (root, work) = self.cached_work()?;

        let block = Block::Change(ChangeBlock {
            previous,
            representative,
            common: CommonFields::unsigned(work),
        });

        self.finish(block, root)
    }
}

/// Stored head of an account chain and the balance after it
fn stored_head(store: &BlockStore, account: &Account) -> Result<(Option<Block>, Uint128), LedgerError> {
    match store.fetch_head(account)? {
        Some(head) => {
            let balance = store.balance(&head)?;
            Ok((Some(head), balance))
        }
        None => Ok((None, Uint128::ZERO)),
    }
}
