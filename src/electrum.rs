//! Narrow interface the core consumes from an Electrum-protocol adapter (C3).
//!
//! Implementations (JSON-line framing, subscriptions, reconnection) are an
//! external collaborator — out of scope for this crate, per SPEC_FULL.md §1.
//! Grounded in the teacher's `BlockchainClient` wrapper
//! (`crates/bitcoin/src/blockchain_client.rs`), narrowed to a trait so the
//! core can be driven by any transport, including a `mockall` mock in tests.

use async_trait::async_trait;

use crate::error::Error;

/// Balance of an address, split by confirmation status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddressBalance {
    pub confirmed_sats: u64,
    pub unconfirmed_sats: u64,
}

/// One unspent output as reported by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub value_sats: u64,
}

/// One history entry: a transaction that touches the address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub txid: String,
    /// 0 means still in the mempool.
    pub height: u32,
}

/// The six operations the transaction builder (C4) and transfer history
/// engine (C5) consume. Every call may fail with [`Error::NetworkFailure`];
/// no retries happen above this line (SPEC_FULL.md §4.3).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ElectrumClient: Send + Sync {
    async fn get_balance(&self, address: &str) -> Result<AddressBalance, Error>;
    async fn list_unspent(&self, address: &str) -> Result<Vec<Utxo>, Error>;
    async fn get_history(&self, address: &str) -> Result<Vec<HistoryEntry>, Error>;
    /// Full serialized transaction for `txid`.
    async fn get_transaction(&self, txid: &str) -> Result<Vec<u8>, Error>;
    /// sats/vbyte for a `target_blocks`-deep confirmation target.
    async fn estimate_fee(&self, target_blocks: u32) -> Result<f64, Error>;
    /// Returns the accepted transaction's txid.
    async fn broadcast(&self, raw_tx_hex: &str) -> Result<String, Error>;
}
