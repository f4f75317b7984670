//! Seed-scoped account manager (C7).
//!
//! Path→account caching mirrors the way the teacher guards shared wallet
//! state in `account_syncer.rs` — a lock around a map, not a lock-free
//! structure, since accesses are infrequent and never on a hot path.
//! `get_fee_rates` substitutes `reqwest` for the teacher's private `muon`
//! HTTP client (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::instrument;
use zeroize::Zeroize;

use crate::account::Account;
use crate::config::{Bip, Network, WalletConfig};
use crate::electrum::ElectrumClient;
use crate::error::Error;
use crate::keys::{self, ChildKey};
use crate::mnemonic;
use crate::secrets::SecretBytes;

/// sats/vbyte fee estimates, mapped from mempool.space's public API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeRates {
    pub normal: u64,
    pub fast: u64,
}

#[derive(Deserialize)]
struct MempoolFeeEstimates {
    #[serde(rename = "hourFee")]
    hour_fee: u64,
    #[serde(rename = "fastestFee")]
    fastest_fee: u64,
}

/// Owns the wallet seed, derives accounts on demand, and caches them by
/// full derivation path so repeated calls return the same instance
/// (spec §4.7: path→account is injective across a manager's lifetime).
pub struct WalletManager {
    seed: SecretBytes<64>,
    seed_phrase: Option<String>,
    network: Network,
    bip: Bip,
    electrum: Arc<dyn ElectrumClient>,
    accounts: Mutex<HashMap<String, Arc<Mutex<Account>>>>,
    fee_endpoint: String,
    disposed: bool,
}

impl WalletManager {
    /// Constructs a manager from a BIP-39 mnemonic phrase and an optional
    /// passphrase. Fails with [`Error::InvalidMnemonic`] if `mnemonic` does
    /// not parse.
    pub fn from_mnemonic(
        mnemonic_phrase: &str,
        passphrase: &str,
        config: WalletConfig,
        electrum: Arc<dyn ElectrumClient>,
    ) -> Result<Self, Error> {
        let seed = mnemonic::mnemonic_to_seed(mnemonic_phrase, passphrase)
            .ok_or(Error::InvalidMnemonic)?;
        Ok(Self {
            seed: SecretBytes::new(seed),
            seed_phrase: Some(mnemonic_phrase.to_string()),
            network: config.network,
            bip: config.bip,
            electrum,
            accounts: Mutex::new(HashMap::new()),
            fee_endpoint: default_fee_endpoint(config.network),
            disposed: false,
        })
    }

    /// Constructs a manager from a raw 64-byte BIP-32 seed (no mnemonic
    /// recoverable; `seed_phrase()` returns `None`).
    pub fn from_seed(seed: [u8; 64], config: WalletConfig, electrum: Arc<dyn ElectrumClient>) -> Self {
        Self {
            seed: SecretBytes::new(seed),
            seed_phrase: None,
            network: config.network,
            bip: config.bip,
            electrum,
            accounts: Mutex::new(HashMap::new()),
            fee_endpoint: default_fee_endpoint(config.network),
            disposed: false,
        }
    }

    /// The mnemonic this manager was constructed from, if any.
    pub fn seed_phrase(&self) -> Option<&str> {
        self.seed_phrase.as_deref()
    }

    fn base_path(&self) -> String {
        keys::base_path(self.bip)
    }

    async fn account_at_path(&self, index: u32, path: String) -> Result<Arc<Mutex<Account>>, Error> {
        if self.disposed {
            return Err(Error::DisposedWallet);
        }
        let mut accounts = self.accounts.lock().await;
        if let Some(existing) = accounts.get(&path) {
            return Ok(Arc::clone(existing));
        }

        let key: ChildKey = keys::derive(self.seed.as_bytes(), &path, self.network)?;
        let account = Arc::new(Mutex::new(Account::new(
            index,
            path.clone(),
            self.network,
            Arc::clone(&self.electrum),
            key,
        )?));
        accounts.insert(path, Arc::clone(&account));
        Ok(account)
    }

    /// The account at `base_path + 0'/0/<index>`, shared behind a lock so
    /// repeated calls return the same underlying instance (spec §4.7).
    pub async fn get_account(&self, index: u32) -> Result<Arc<Mutex<Account>>, Error> {
        let tail = format!("0'/0/{index}");
        let path = keys::join_path(&self.base_path(), &tail);
        self.account_at_path(index, path).await
    }

    /// The account at `base_path + tail`. A leading `/` is stripped; an
    /// absolute `m/...` path is used verbatim.
    pub async fn get_account_by_path(&self, tail: &str) -> Result<Arc<Mutex<Account>>, Error> {
        let path = keys::join_path(&self.base_path(), tail);
        let index = path
            .rsplit('/')
            .next()
            .and_then(|last| last.parse::<u32>().ok())
            .unwrap_or(0);
        self.account_at_path(index, path).await
    }

    /// Queries a public fee-estimation endpoint and maps
    /// `{hourFee→normal, fastestFee→fast}`.
    #[instrument(skip(self))]
    pub async fn get_fee_rates(&self) -> Result<FeeRates, Error> {
        if self.disposed {
            return Err(Error::DisposedWallet);
        }
        let response = reqwest::get(self.fee_endpoint.as_str())
            .await
            .map_err(|e| Error::NetworkFailure(e.to_string()))?;
        let estimates: MempoolFeeEstimates = response
            .json()
            .await
            .map_err(|e| Error::NetworkFailure(e.to_string()))?;
        Ok(FeeRates {
            normal: estimates.hour_fee,
            fast: estimates.fastest_fee,
        })
    }

    /// Disposes every account handed out so far, zeroizes the seed, and
    /// marks the manager unusable. Idempotent.
    pub async fn dispose(&mut self) {
        self.disposed = true;
        self.seed.zeroize();
        let mut accounts = self.accounts.lock().await;
        for account in accounts.values() {
            account.lock().await.dispose();
        }
        accounts.clear();
    }
}

fn default_fee_endpoint(network: Network) -> String {
    match network {
        Network::Bitcoin => "https://mempool.space/api/v1/fees/recommended".to_string(),
        Network::Testnet => "https://mempool.space/testnet/api/v1/fees/recommended".to_string(),
        Network::Regtest => "http://localhost:3002/api/v1/fees/recommended".to_string(),
    }
}
