use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Network the wallet operates on. Only the networks the core actually
/// encodes addresses for; no signet (out of scope for this spec).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Bitcoin,
    Testnet,
    Regtest,
}

impl Network {
    /// bech32 human-readable part used by the address encoder (C2).
    pub fn hrp(&self) -> &'static str {
        match self {
            Network::Bitcoin => "bc",
            Network::Testnet => "tb",
            Network::Regtest => "bcrt",
        }
    }
}

impl From<Network> for bitcoin::Network {
    fn from(network: Network) -> Self {
        match network {
            Network::Bitcoin => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

impl From<Network> for bitcoin::NetworkKind {
    fn from(network: Network) -> Self {
        match network {
            Network::Bitcoin => bitcoin::NetworkKind::Main,
            Network::Testnet | Network::Regtest => bitcoin::NetworkKind::Test,
        }
    }
}

/// `config.bip` — the purpose field of the derivation path. The spec keeps
/// the source's (internally inconsistent) behavior of encoding a P2WPKH
/// address even for `Bip44`; see SPEC_FULL.md's open-question resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
#[serde(try_from = "u32", into = "u32")]
pub enum Bip {
    Bip44 = 44,
    Bip84 = 84,
}

impl Bip {
    pub fn purpose(&self) -> u32 {
        *self as u32
    }
}

impl TryFrom<u32> for Bip {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            44 => Ok(Bip::Bip44),
            84 => Ok(Bip::Bip84),
            other => Err(Error::UnsupportedBip(other)),
        }
    }
}

impl From<Bip> for u32 {
    fn from(bip: Bip) -> Self {
        bip.purpose()
    }
}

/// Transport hint for the Electrum connection. The core never opens a socket
/// itself (§4.3); this only documents what the caller's adapter should use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Ssl,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub network: Network,
    pub bip: Bip,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            host: "electrum.blockstream.info".to_string(),
            port: 50001,
            protocol: Protocol::Tcp,
            network: Network::Bitcoin,
            bip: Bip::Bip84,
        }
    }
}

impl WalletConfig {
    /// Parses a config from JSON, falling back to [`WalletConfig::default`]
    /// for any field the document omits (`#[serde(default)]` above).
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}
