//! Non-custodial Bitcoin wallet engine.
//!
//! HD key derivation (BIP-32/39/84), native-segwit address encoding, UTXO
//! transaction construction and signing, and transfer history reconstruction
//! over a pluggable Electrum interface. The crate never opens a network
//! connection itself — callers supply an [`electrum::ElectrumClient`]
//! implementation.

pub mod account;
pub mod address;
pub mod config;
pub mod electrum;
pub mod error;
pub mod keys;
pub mod mnemonic;
pub mod secrets;
pub mod transaction_builder;
pub mod transfers;
pub mod wallet;

pub use account::{Account, AddressAccount, KeyPair, ReadOnlyAccount};
pub use config::{Bip, Network, Protocol, WalletConfig};
pub use electrum::{AddressBalance, ElectrumClient, HistoryEntry, Utxo};
pub use error::Error;
pub use transaction_builder::BuiltTransaction;
pub use transfers::{Direction, TransferDirection, TransferRecord};
pub use wallet::{FeeRates, WalletManager};

type Result<T> = std::result::Result<T, Error>;
