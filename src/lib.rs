//! A minimal block-lattice cryptocurrency node
//!
//! Every account owns a hash-chained sequence of blocks. The [`blockchain`]
//! module holds the ledger core (blocks, proof of work, the block store and
//! wallets); [`node`] gossips liveness with other nodes over UDP.

pub mod blockchain;
pub mod config;
pub mod node;
