use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;

use std::fmt;
use std::thread;

use super::block::Block;
use super::crypto::{Account, BlockHash};

/// Proof-of-work nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Work(pub u64);

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The value work is computed against: the account key for the first block
/// on a chain, the previous block hash otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkRoot(pub [u8; 32]);

impl From<&Account> for WorkRoot {
    fn from(account: &Account) -> Self {
        WorkRoot(account.0)
    }
}

impl From<&BlockHash> for WorkRoot {
    fn from(hash: &BlockHash) -> Self {
        WorkRoot(hash.0)
    }
}

/// Difficulty value of a nonce: the first 8 bytes of SHA-256(nonce || root)
pub fn work_value(root: &WorkRoot, work: Work) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(work.0.to_le_bytes());
    hasher.update(root.0);
    let digest = hasher.finalize();

    let mut value = [0u8; 8];
    value.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(value)
}

/// Work is sufficient when its value is greater than or equal to the threshold
pub fn validate_work(root: &WorkRoot, work: Work, threshold: u64) -> bool {
    work_value(root, work) >= threshold
}

/// Checks a block's work against the root its position in the chain requires
pub fn validate_block_work(block: &Block, threshold: u64) -> bool {
    validate_work(&block.root(), block.common().work, threshold)
}

/// Brute-force search for a nonce satisfying the threshold
///
/// Starts at a random nonce so concurrent searches do not repeat each other.
/// Each attempt succeeds with probability `(u64::MAX - threshold + 1) / 2^64`,
/// so the expected number of attempts grows with the threshold.
pub fn generate_work(root: &WorkRoot, threshold: u64) -> Work {
    let mut nonce: u64 = rand::thread_rng().gen();

    loop {
        let work = Work(nonce);
        if validate_work(root, work, threshold) {
            return work;
        }
        nonce = nonce.wrapping_add(1);
    }
}

/// State of a background work computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// Still searching
    Pending,
    /// Finished; the result has been handed over
    Ready(Work),
    /// The worker went away without producing a result
    Abandoned,
}

/// Single-slot handle to work being computed on a background thread
///
/// One producer, one consumer: the result can be taken at most once, by
/// polling with [`PendingWork::poll`], blocking in [`PendingWork::wait`] or
/// awaiting [`PendingWork::wait_async`].
/// Dropping the handle abandons the result; the search thread runs to
/// completion and its send is discarded.
#[derive(Debug)]
pub struct PendingWork {
    root: WorkRoot,
    receiver: oneshot::Receiver<Work>,
}

impl PendingWork {
    /// Starts computing work for `root` on its own thread
    pub fn spawn(root: WorkRoot, threshold: u64) -> Self {
        let (sender, receiver) = oneshot::channel();

        thread::spawn(move || {
            let work = generate_work(&root, threshold);
            // The receiver may already be gone
            let _ = sender.send(work);
        });

        PendingWork { root, receiver }
    }

    /// The root this computation was requested for
    pub fn root(&self) -> WorkRoot {
        self.root
    }

    /// Non-blocking check for a result
    pub fn poll(&mut self) -> WorkStatus {
        match self.receiver.try_recv() {
            Ok(work) => WorkStatus::Ready(work),
            Err(oneshot::error::TryRecvError::Empty) => WorkStatus::Pending,
            Err(oneshot::error::TryRecvError::Closed) => WorkStatus::Abandoned,
        }
    }

    /// Blocks the current thread until the result arrives
    ///
    /// Usable from a runtime thread: there the blocking receive runs on a
    /// helper thread while the caller waits for it.
    pub fn wait(self) -> Option<Work> {
        let receiver = self.receiver;
        if tokio::runtime::Handle::try_current().is_err() {
            return receiver.blocking_recv().ok();
        }

        thread::spawn(move || receiver.blocking_recv().ok()).join().ok().flatten()
    }

    /// Waits for the result without blocking the runtime
    pub async fn wait_async(self) -> Option<Work> {
        self.receiver.await.ok()
    }
}
