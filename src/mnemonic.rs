//! BIP-39 mnemonic handling (C1).
//!
//! Validation and mnemonic→seed hashing are delegated to the `bip39` crate,
//! which is the "pure function" SPEC_FULL.md §4.1 treats this as: the core
//! does not reimplement word-list checksums or PBKDF2 itself.

use bip39::Mnemonic as Bip39Mnemonic;
use bitcoin::secp256k1::rand::{self, RngCore};

/// True when `phrase` is a well-formed BIP-39 mnemonic: correct word count,
/// every word in the English list, and a valid checksum.
pub fn valid_mnemonic(phrase: &str) -> bool {
    Bip39Mnemonic::parse_in(bip39::Language::English, phrase).is_ok()
}

/// A fresh 12-word English mnemonic sampled from a CSPRNG.
pub fn random_mnemonic() -> String {
    let mut entropy = [0u8; 16]; // 128 bits -> 12 words
    rand::thread_rng().fill_bytes(&mut entropy);
    Bip39Mnemonic::from_entropy(&entropy)
        .expect("16 bytes is a valid BIP-39 entropy length")
        .to_string()
}

/// PBKDF2-HMAC-SHA512 seed derivation, salt = `"mnemonic" || passphrase`.
///
/// Returns `None` if `phrase` does not parse as a valid mnemonic.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Option<[u8; 64]> {
    let mnemonic = Bip39Mnemonic::parse_in(bip39::Language::English, phrase).ok()?;
    Some(mnemonic.to_seed(passphrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn accepts_valid_mnemonic() {
        assert!(valid_mnemonic(TEST_MNEMONIC));
    }

    #[test]
    fn rejects_bad_checksum() {
        let mutated =
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon zoo";
        assert!(!valid_mnemonic(mutated));
    }

    #[test]
    fn rejects_wrong_word_count() {
        assert!(!valid_mnemonic("abandon abandon abandon"));
    }

    #[test]
    fn random_mnemonic_is_always_valid() {
        for _ in 0..20 {
            let phrase = random_mnemonic();
            assert_eq!(phrase.split_whitespace().count(), 12);
            assert!(valid_mnemonic(&phrase));
        }
    }

    #[test]
    fn seed_is_64_bytes_and_deterministic() {
        let a = mnemonic_to_seed(TEST_MNEMONIC, "").unwrap();
        let b = mnemonic_to_seed(TEST_MNEMONIC, "").unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }

    #[test]
    fn passphrase_changes_seed() {
        let a = mnemonic_to_seed(TEST_MNEMONIC, "").unwrap();
        let b = mnemonic_to_seed(TEST_MNEMONIC, "tr3z0r").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_mnemonic_yields_none_seed() {
        assert!(mnemonic_to_seed("not a mnemonic", "").is_none());
    }
}
