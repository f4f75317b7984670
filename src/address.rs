//! P2WPKH address encoding and output-script classification (C2).

use bitcoin::hashes::Hash;
use bitcoin::{Address, CompressedPublicKey, PublicKey, ScriptBuf};

use crate::config::Network;
use crate::error::Error;

/// Encodes a compressed public key as a native-segwit (P2WPKH) bech32
/// address for `network`. `program = RIPEMD160(SHA256(pubkey))`.
pub fn encode_p2wpkh(pubkey: &PublicKey, network: Network) -> Result<Address, Error> {
    let compressed = CompressedPublicKey::try_from(*pubkey).map_err(|_| Error::InvalidRecipient)?;
    Ok(Address::p2wpkh(&compressed, bitcoin::Network::from(network)))
}

/// Parses a bech32 address string for `network`, returning its 20-byte
/// witness program. Rejects non-v0 or wrong-length witness programs.
pub fn decode_p2wpkh(address: &str, network: Network) -> Result<[u8; 20], Error> {
    let parsed = address
        .parse::<Address<bitcoin::address::NetworkUnchecked>>()
        .map_err(|_| Error::InvalidRecipient)?
        .require_network(bitcoin::Network::from(network))
        .map_err(|_| Error::InvalidRecipient)?;

    let script = parsed.script_pubkey();
    if !is_p2wpkh_script(&script) {
        return Err(Error::InvalidRecipient);
    }

    let mut out = [0u8; 20];
    out.copy_from_slice(&script.as_bytes()[2..22]);
    Ok(out)
}

/// `OP_0 <push 20> <program>` (22 bytes).
pub fn p2wpkh_script(program: &[u8; 20]) -> ScriptBuf {
    let hash = bitcoin::WPubkeyHash::from_byte_array(*program);
    ScriptBuf::new_p2wpkh(&hash)
}

/// Best-effort address decoding for a previous/next-output script, used by
/// the transfer history engine (C5). Never errors: unknown script templates
/// yield `None` rather than classification failing outright.
pub fn address_from_script(script: &ScriptBuf, network: Network) -> Option<String> {
    Address::from_script(script, bitcoin::Network::from(network))
        .ok()
        .map(|addr| addr.to_string())
}

/// True when `script` is exactly the 22-byte `OP_0 <20>` P2WPKH template.
pub fn is_p2wpkh_script(script: &ScriptBuf) -> bool {
    let bytes = script.as_bytes();
    bytes.len() == 22 && bytes[0] == 0x00 && bytes[1] == 0x14
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{PublicKey as SecpPublicKey, Secp256k1, SecretKey};

    fn test_pubkey() -> PublicKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[0xAB; 32]).unwrap();
        let pk = SecpPublicKey::from_secret_key(&secp, &sk);
        PublicKey::new(pk)
    }

    #[test]
    fn literal_vector_account_zero_mainnet_address() {
        // Grounded in SPEC_FULL.md §8 literal scenario 1: mnemonic
        // "abandon ... about", m/84'/0'/0'/0/0.
        use crate::keys::derive;
        let seed = crate::mnemonic::mnemonic_to_seed(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            "",
        )
        .unwrap();
        let child = derive(&seed, "m/84'/0'/0'/0/0", Network::Bitcoin).unwrap();
        let address = encode_p2wpkh(&child.public_key(), Network::Bitcoin).unwrap();
        assert_eq!(address.to_string(), "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu");
    }

    #[test]
    fn roundtrip_encode_decode() {
        let pubkey = test_pubkey();
        let address = encode_p2wpkh(&pubkey, Network::Testnet).unwrap();
        let program = decode_p2wpkh(&address.to_string(), Network::Testnet).unwrap();

        let hash = bitcoin::hashes::hash160::Hash::hash(&pubkey.to_bytes());
        assert_eq!(program, *hash.as_byte_array());
    }

    #[test]
    fn rejects_wrong_network() {
        let pubkey = test_pubkey();
        let address = encode_p2wpkh(&pubkey, Network::Bitcoin).unwrap();
        assert!(decode_p2wpkh(&address.to_string(), Network::Testnet).is_err());
    }

    #[test]
    fn rejects_garbage_address() {
        assert!(decode_p2wpkh("not-an-address", Network::Bitcoin).is_err());
    }

    #[test]
    fn script_classification_for_p2wpkh() {
        let pubkey = test_pubkey();
        let address = encode_p2wpkh(&pubkey, Network::Bitcoin).unwrap();
        let script = address.script_pubkey();
        assert!(is_p2wpkh_script(&script));
        assert_eq!(
            address_from_script(&script, Network::Bitcoin),
            Some(address.to_string())
        );
    }
}
