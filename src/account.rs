//! Single-derivation-path account facade (C6).
//!
//! `sign`/`verify` reuse the teacher's message-signing idiom
//! (`crates/crypto/src/message_signature.rs`, `crates/bitcoin/src/message_signer.rs`)
//! narrowed to plain DER+base64 ECDSA over `SHA-256(message)` — no BIP-137
//! recovery-id header. `ReadOnlyAccount` mirrors the teacher's split between
//! `Account` and `paper_account.rs`'s keyless `PaperAccount`.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::Address;

use crate::config::Network;
use crate::electrum::ElectrumClient;
use crate::error::Error;
use crate::keys::ChildKey;
use crate::transaction_builder::{self, BuiltTransaction};
use crate::transfers::{self, Direction, TransferRecord};

/// The public-key/private-key pair surfaced on the language-neutral
/// interface (spec §6.1's `key_pair`).
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public_key: [u8; 33],
    pub private_key: [u8; 32],
}

/// Capability every account-shaped object exposes, keyed or not: the spec's
/// read-only variant shares this surface with the fully keyed [`Account`]
/// (composition, not inheritance — SPEC_FULL.md §9).
#[async_trait]
pub trait AddressAccount {
    fn get_address(&self) -> Result<String, Error>;
    async fn get_balance(&self) -> Result<u64, Error>;
    async fn get_transfers(
        &self,
        direction: Direction,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<TransferRecord>, Error>;
    async fn quote_send_transaction(&self, to: &str, value_sats: u64) -> Result<u64, Error>;
}

/// A fully-keyed account at one derivation path.
pub struct Account {
    index: u32,
    path: String,
    network: Network,
    electrum: Arc<dyn ElectrumClient>,
    key: Option<ChildKey>,
    /// Computed once at construction — spec's memoized `get_address`.
    address: Address,
    disposed: bool,
}

impl Account {
    pub(crate) fn new(
        index: u32,
        path: String,
        network: Network,
        electrum: Arc<dyn ElectrumClient>,
        key: ChildKey,
    ) -> Result<Self, Error> {
        let address = crate::address::encode_p2wpkh(&key.public_key(), network)?;
        Ok(Self {
            index,
            path,
            network,
            electrum,
            key: Some(key),
            address,
            disposed: false,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn key(&self) -> Result<&ChildKey, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        Ok(self.key.as_ref().expect("key present while not disposed"))
    }

    pub fn key_pair(&self) -> Result<KeyPair, Error> {
        let key = self.key()?;
        Ok(KeyPair {
            public_key: key.public_key().to_bytes().try_into().expect("compressed pubkey is 33 bytes"),
            private_key: *key.private_key_bytes(),
        })
    }

    /// Signs `SHA-256(message)` with deterministic (RFC 6979), low-S ECDSA,
    /// serialized as base64 of the DER encoding.
    pub fn sign(&self, message: &str) -> Result<String, Error> {
        let key = self.key()?;
        let secp = Secp256k1::new();
        let digest = sha256::Hash::hash(message.as_bytes());
        let msg = Message::from_digest(digest.to_byte_array());
        let signature = secp.sign_ecdsa(&msg, &key.secret_key());
        Ok(BASE64.encode(signature.serialize_der()))
    }

    /// `true` on a valid matching signature, `false` on a well-formed but
    /// mismatching one, `Err(MalformedSignature)` when `signature` does not
    /// parse as base64-of-DER.
    pub fn verify(&self, message: &str, signature: &str) -> Result<bool, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        let der = BASE64
            .decode(signature)
            .map_err(|_| Error::MalformedSignature)?;
        let sig = Signature::from_der(&der).map_err(|_| Error::MalformedSignature)?;

        let secp = Secp256k1::new();
        let digest = sha256::Hash::hash(message.as_bytes());
        let msg = Message::from_digest(digest.to_byte_array());
        let public_key = self.key()?.public_key().inner;

        Ok(secp.verify_ecdsa(&msg, &sig, &public_key).is_ok())
    }

    pub fn get_token_balance(&self, _token: &str) -> Result<u64, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        Err(Error::UnsupportedOperation("getTokenBalance".into()))
    }

    pub fn transfer(&self, _to: &str, _value_sats: u64) -> Result<(), Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        Err(Error::UnsupportedOperation("transfer".into()))
    }

    fn own_address(&self) -> Result<Address, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        Ok(self.address.clone())
    }

    /// Builds, signs and broadcasts a transaction paying `value_sats` to
    /// `to`. Returns the broadcast txid and the fee actually paid.
    pub async fn send_transaction(&mut self, to: &str, value_sats: u64) -> Result<BuiltTransaction, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        let own_address = self.own_address()?;
        let key = self.key.as_ref().expect("key present while not disposed");

        let (tx, fee) = transaction_builder::build_transaction(
            self.electrum.as_ref(),
            key,
            &own_address,
            to,
            value_sats,
            self.network,
        )
        .await?;

        let built = transaction_builder::finalize(&tx, fee);
        let raw_hex = built.raw_hex.clone();
        self.electrum.broadcast(&raw_hex).await?;
        Ok(built)
    }

    /// Same as [`Account::send_transaction`] but stops short of broadcast,
    /// returning only the fee that would be paid.
    pub async fn quote_transaction(&self, to: &str, value_sats: u64) -> Result<u64, Error> {
        self.quote_send_transaction(to, value_sats).await
    }

    /// Zeroes key material and marks the account unusable. Idempotent.
    pub fn dispose(&mut self) {
        self.key = None;
        self.disposed = true;
    }
}

#[async_trait]
impl AddressAccount for Account {
    fn get_address(&self) -> Result<String, Error> {
        Ok(self.own_address()?.to_string())
    }

    async fn get_balance(&self) -> Result<u64, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        let address = self.own_address()?;
        let balance = self.electrum.get_balance(&address.to_string()).await?;
        Ok(balance.confirmed_sats)
    }

    async fn get_transfers(
        &self,
        direction: Direction,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<TransferRecord>, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        let address = self.own_address()?;
        transfers::get_transfers(
            self.electrum.as_ref(),
            &address.to_string(),
            self.network,
            direction,
            limit,
            skip,
        )
        .await
    }

    async fn quote_send_transaction(&self, to: &str, value_sats: u64) -> Result<u64, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        let own_address = self.own_address()?;
        let key = self.key()?;
        let (_, fee) = transaction_builder::build_transaction(
            self.electrum.as_ref(),
            key,
            &own_address,
            to,
            value_sats,
            self.network,
        )
        .await?;
        Ok(fee)
    }
}

/// Watch-only account: no key material, constructed from an address
/// directly. Rejects signing and sending; shares the read side with
/// [`Account`] via [`AddressAccount`].
pub struct ReadOnlyAccount {
    address: String,
    network: Network,
    electrum: Arc<dyn ElectrumClient>,
    disposed: bool,
}

impl ReadOnlyAccount {
    pub fn new(address: String, network: Network, electrum: Arc<dyn ElectrumClient>) -> Self {
        Self {
            address,
            network,
            electrum,
            disposed: false,
        }
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
    }
}

#[async_trait]
impl AddressAccount for ReadOnlyAccount {
    fn get_address(&self) -> Result<String, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        Ok(self.address.clone())
    }

    async fn get_balance(&self) -> Result<u64, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        let balance = self.electrum.get_balance(&self.address).await?;
        Ok(balance.confirmed_sats)
    }

    async fn get_transfers(
        &self,
        direction: Direction,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<TransferRecord>, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        transfers::get_transfers(
            self.electrum.as_ref(),
            &self.address,
            self.network,
            direction,
            limit,
            skip,
        )
        .await
    }

    async fn quote_send_transaction(&self, _to: &str, _value_sats: u64) -> Result<u64, Error> {
        if self.disposed {
            return Err(Error::DisposedAccount);
        }
        Err(Error::UnsupportedOperation("quote_send_transaction on a read-only account".into()))
    }
}
