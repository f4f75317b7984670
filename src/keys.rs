//! BIP-32/BIP-84 key derivation (C1).

use std::str::FromStr;

use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::PublicKey;

use crate::config::{Bip, Network};
use crate::error::Error;
use crate::secrets::SecretBytes;

/// Result of walking a BIP-32 path: a private/public key pair plus the chain
/// code, kept as zero-on-drop buffers (C8).
pub struct ChildKey {
    private_key: SecretBytes<32>,
    chain_code: SecretBytes<32>,
    public_key: PublicKey,
    network: Network,
}

impl ChildKey {
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn secret_key(&self) -> bitcoin::secp256k1::SecretKey {
        bitcoin::secp256k1::SecretKey::from_slice(self.private_key.as_bytes())
            .expect("derived private key is always a valid scalar")
    }

    pub fn private_key_bytes(&self) -> &[u8; 32] {
        self.private_key.as_bytes()
    }

    pub fn chain_code_bytes(&self) -> &[u8; 32] {
        self.chain_code.as_bytes()
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

/// `m/<purpose>'/0'` — the account-family base path, per SPEC_FULL.md §4.1.
pub fn base_path(bip: Bip) -> String {
    format!("m/{}'/0'", bip.purpose())
}

/// Joins `base` with a caller-supplied tail. A tail starting with `m/` is
/// absolute and used verbatim; a leading `/` (or no leading separator at all)
/// means "append to base".
pub fn join_path(base: &str, tail: &str) -> String {
    if tail.starts_with("m/") || tail == "m" {
        return tail.to_string();
    }
    let tail = tail.strip_prefix('/').unwrap_or(tail);
    format!("{base}/{tail}")
}

/// BIP-32 private-parent-to-private-child derivation from a 64-byte seed and
/// an absolute derivation path string (e.g. `"m/84'/0'/0'/0/0"`).
pub fn derive(seed: &[u8], path: &str, network: Network) -> Result<ChildKey, Error> {
    let secp = Secp256k1::new();

    let master = Xpriv::new_master(bitcoin::NetworkKind::from(network), seed)?;
    let derivation_path =
        DerivationPath::from_str(path).map_err(|_| Error::InvalidPath(path.to_string()))?;
    let child = master.derive_priv(&secp, &derivation_path)?;

    let public_key = PublicKey::new(bitcoin::secp256k1::PublicKey::from_secret_key(&secp, &child.private_key));

    Ok(ChildKey {
        private_key: SecretBytes::new(child.private_key.secret_bytes()),
        chain_code: SecretBytes::new(*child.chain_code.as_bytes()),
        public_key,
        network,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn seed() -> [u8; 64] {
        crate::mnemonic::mnemonic_to_seed(TEST_MNEMONIC, "").unwrap()
    }

    #[test]
    fn base_path_for_bip84_and_bip44() {
        assert_eq!(base_path(Bip::Bip84), "m/84'/0'");
        assert_eq!(base_path(Bip::Bip44), "m/44'/0'");
    }

    #[test]
    fn join_path_variants() {
        assert_eq!(join_path("m/84'/0'", "0'/0/0"), "m/84'/0'/0'/0/0");
        assert_eq!(join_path("m/84'/0'", "/0'/0/0"), "m/84'/0'/0'/0/0");
        assert_eq!(join_path("m/84'/0'", "m/44'/0'/5'/0/0"), "m/44'/0'/5'/0/0");
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive(&seed(), "m/84'/0'/0'/0/0", Network::Bitcoin).unwrap();
        let b = derive(&seed(), "m/84'/0'/0'/0/0", Network::Bitcoin).unwrap();
        assert_eq!(a.private_key_bytes(), b.private_key_bytes());
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn different_index_yields_different_key() {
        let a = derive(&seed(), "m/84'/0'/0'/0/0", Network::Bitcoin).unwrap();
        let b = derive(&seed(), "m/84'/0'/0'/0/1", Network::Bitcoin).unwrap();
        assert_ne!(a.private_key_bytes(), b.private_key_bytes());
    }

    #[test]
    fn rejects_invalid_path_syntax() {
        assert!(matches!(
            derive(&seed(), "m/not-a-path", Network::Bitcoin),
            Err(Error::InvalidPath(_))
        ));
    }
}
