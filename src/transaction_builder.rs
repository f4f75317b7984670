//! UTXO-driven P2WPKH transaction construction and signing (C4).
//!
//! Grounded in the same build→sign→serialize shape the corpus uses for
//! P2WPKH spends (see `other_examples/.../anvil-wallet/transaction.rs`), but
//! generalized to the spec's iterative fee/size loop (SPEC_FULL.md §4.4)
//! instead of a closed-form vsize estimate.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::{deserialize, serialize_hex};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use crate::config::Network;
use crate::electrum::{ElectrumClient, Utxo};
use crate::error::Error;
use crate::keys::ChildKey;

pub const DUST_LIMIT: u64 = 546;
const MIN_FEE_SATS: u64 = 141;

/// Result of a successful build (and, for `send_transaction`, broadcast).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltTransaction {
    pub txid: String,
    pub raw_hex: String,
    pub fee_sats: u64,
}

struct SelectedUtxo {
    outpoint: OutPoint,
    value_sats: u64,
    prevout_script: ScriptBuf,
}

/// Selected UTXOs in server order, accumulating until `target` is covered.
/// Empty `utxos` is rejected by the caller before this is ever invoked.
fn select_first_fit(utxos: &[Utxo], count: usize, own_script: &ScriptBuf) -> Vec<SelectedUtxo> {
    utxos
        .iter()
        .take(count)
        .map(|u| SelectedUtxo {
            outpoint: OutPoint {
                txid: Txid::from_str(&u.txid).expect("electrum returns well-formed txids"),
                vout: u.vout,
            },
            value_sats: u.value_sats,
            prevout_script: own_script.clone(),
        })
        .collect()
}

fn count_to_cover(utxos: &[Utxo], target: u64) -> usize {
    let mut sum = 0u64;
    let mut n = 0usize;
    for u in utxos {
        if sum >= target {
            break;
        }
        sum += u.value_sats;
        n += 1;
    }
    n
}

/// Builds (and signs) a transaction paying `value_sats` to `to`, spending
/// `selected` UTXOs, with `fee_sats` going to miners and the remainder (if
/// above [`DUST_LIMIT`]) returned to `own_address` as change.
fn assemble_and_sign(
    selected: &[SelectedUtxo],
    recipient_script: ScriptBuf,
    own_script: ScriptBuf,
    value_sats: u64,
    fee_sats: u64,
    child: &ChildKey,
) -> Transaction {
    let sum: u64 = selected.iter().map(|u| u.value_sats).sum();
    let change = sum.saturating_sub(value_sats).saturating_sub(fee_sats);

    let mut outputs = vec![TxOut {
        value: Amount::from_sat(value_sats),
        script_pubkey: recipient_script,
    }];
    if change > DUST_LIMIT {
        outputs.push(TxOut {
            value: Amount::from_sat(change),
            script_pubkey: own_script,
        });
    }

    let inputs: Vec<TxIn> = selected
        .iter()
        .map(|u| TxIn {
            previous_output: u.outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        })
        .collect();

    let mut tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs,
        output: outputs,
    };

    let secp = Secp256k1::new();
    let secret_key = child.secret_key();
    let pubkey_bytes = child.public_key().to_bytes();

    for index in 0..tx.input.len() {
        let sighash = SighashCache::new(&tx)
            .p2wpkh_signature_hash(
                index,
                &selected[index].prevout_script,
                Amount::from_sat(selected[index].value_sats),
                EcdsaSighashType::All,
            )
            .expect("p2wpkh inputs always produce a sighash");

        let message = Message::from_digest(sighash.to_byte_array());
        let signature = secp.sign_ecdsa(&message, &secret_key);

        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All as u8);

        let mut witness = Witness::new();
        witness.push(&sig_bytes);
        witness.push(&pubkey_bytes);
        tx.input[index].witness = witness;
    }

    tx
}

fn vsize_of(tx: &Transaction) -> u64 {
    tx.vsize() as u64
}

/// Fetches `selected`'s previous-output scripts by downloading each parent
/// transaction (spec step 3: "additionally fetch the full parent transaction
/// to obtain the output's script").
async fn attach_prevout_scripts(
    electrum: &dyn ElectrumClient,
    utxos: &[Utxo],
    count: usize,
) -> Result<Vec<SelectedUtxo>, Error> {
    let mut selected = Vec::with_capacity(count);
    for u in utxos.iter().take(count) {
        let raw = electrum.get_transaction(&u.txid).await?;
        let parent: Transaction = deserialize(&raw).map_err(|_| Error::NetworkFailure("malformed parent tx".into()))?;
        let prevout = parent
            .output
            .get(u.vout as usize)
            .ok_or_else(|| Error::NetworkFailure("vout out of range in parent tx".into()))?;
        selected.push(SelectedUtxo {
            outpoint: OutPoint {
                txid: Txid::from_str(&u.txid).map_err(|_| Error::NetworkFailure("malformed txid".into()))?,
                vout: u.vout,
            },
            value_sats: u.value_sats,
            prevout_script: prevout.script_pubkey.clone(),
        });
    }
    Ok(selected)
}

/// Implements steps 1-6 of `send_transaction`/`quote_transaction`
/// (SPEC_FULL.md §4.4): everything up to, but not including, broadcast.
pub async fn build_transaction(
    electrum: &dyn ElectrumClient,
    child: &ChildKey,
    own_address: &Address,
    to: &str,
    value_sats: u64,
    network: Network,
) -> Result<(Transaction, u64), Error> {
    if value_sats <= DUST_LIMIT {
        return Err(Error::BelowDustLimit(value_sats));
    }

    let recipient_script = to
        .parse::<Address<bitcoin::address::NetworkUnchecked>>()
        .map_err(|_| Error::InvalidRecipient)?
        .require_network(bitcoin::Network::from(network))
        .map_err(|_| Error::InvalidRecipient)?
        .script_pubkey();

    let rate = f64::max(1.0, electrum.estimate_fee(1).await?);
    let own_script = own_address.script_pubkey();

    let own_address_str = own_address.to_string();
    let utxos = electrum.list_unspent(&own_address_str).await?;
    if utxos.is_empty() {
        return Err(Error::NoUnspentOutputs);
    }

    let mut take = count_to_cover(&utxos, value_sats).max(1);
    loop {
        if take > utxos.len() {
            return Err(Error::InsufficientBalance);
        }

        let selected = attach_prevout_scripts(electrum, &utxos, take).await?;
        let sum: u64 = selected.iter().map(|u| u.value_sats).sum();

        let zero_fee_tx = assemble_and_sign(
            &selected,
            recipient_script.clone(),
            own_script.clone(),
            value_sats,
            0,
            child,
        );
        let vsize = vsize_of(&zero_fee_tx);
        let fee = u64::max(MIN_FEE_SATS, (vsize as f64 * rate).ceil() as u64);

        if sum < value_sats + fee {
            take += 1;
            continue;
        }

        let tx = assemble_and_sign(&selected, recipient_script, own_script, value_sats, fee, child);
        return Ok((tx, fee));
    }
}

/// Serializes a built transaction and reports its display txid
/// (double-SHA-256 of the non-witness serialization, byte-reversed).
pub fn finalize(tx: &Transaction, fee_sats: u64) -> BuiltTransaction {
    BuiltTransaction {
        txid: tx.compute_txid().to_string(),
        raw_hex: serialize_hex(tx),
        fee_sats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::electrum::MockElectrumClient;
    use crate::keys::derive;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn test_child() -> ChildKey {
        let seed = crate::mnemonic::mnemonic_to_seed(TEST_MNEMONIC, "").unwrap();
        derive(&seed, "m/84'/0'/0'/0/0", Network::Bitcoin).unwrap()
    }

    fn recipient_address() -> String {
        let seed = crate::mnemonic::mnemonic_to_seed(TEST_MNEMONIC, "").unwrap();
        let other = derive(&seed, "m/84'/0'/0'/0/1", Network::Bitcoin).unwrap();
        crate::address::encode_p2wpkh(&other.public_key(), Network::Bitcoin)
            .unwrap()
            .to_string()
    }

    fn parent_tx_bytes(value_sats: u64, script: ScriptBuf) -> Vec<u8> {
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: vec![TxOut {
                value: Amount::from_sat(value_sats),
                script_pubkey: script,
            }],
        };
        bitcoin::consensus::serialize(&tx)
    }

    #[tokio::test]
    async fn builds_and_signs_single_input_transaction() {
        let child = test_child();
        let own_address = crate::address::encode_p2wpkh(&child.public_key(), Network::Bitcoin).unwrap();
        let recipient = recipient_address();

        let mut mock = MockElectrumClient::new();
        let own_script = own_address.script_pubkey();
        let parent_bytes = parent_tx_bytes(100_000, own_script.clone());

        mock.expect_estimate_fee().returning(|_| Ok(1.0));
        mock.expect_list_unspent().returning(|_| {
            Ok(vec![Utxo {
                txid: "11".repeat(32),
                vout: 0,
                value_sats: 100_000,
            }])
        });
        mock.expect_get_transaction()
            .returning(move |_| Ok(parent_bytes.clone()));

        let (tx, fee) = build_transaction(&mock, &child, &own_address, &recipient, 10_000, Network::Bitcoin)
            .await
            .unwrap();

        assert!(fee >= MIN_FEE_SATS);
        assert_eq!(tx.output[0].value.to_sat(), 10_000);
        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.input[0].witness.len(), 2);

        let built = finalize(&tx, fee);
        let reparsed: Transaction = deserialize(&hex_decode(&built.raw_hex)).unwrap();
        assert_eq!(reparsed.compute_txid().to_string(), built.txid);
    }

    #[tokio::test]
    async fn below_dust_limit_is_rejected() {
        let child = test_child();
        let own_address = crate::address::encode_p2wpkh(&child.public_key(), Network::Bitcoin).unwrap();
        let mock = MockElectrumClient::new();

        let result = build_transaction(
            &mock,
            &child,
            &own_address,
            &recipient_address(),
            DUST_LIMIT,
            Network::Bitcoin,
        )
        .await;
        assert!(matches!(result, Err(Error::BelowDustLimit(_))));
    }

    #[tokio::test]
    async fn empty_utxo_set_is_rejected() {
        let child = test_child();
        let own_address = crate::address::encode_p2wpkh(&child.public_key(), Network::Bitcoin).unwrap();
        let mut mock = MockElectrumClient::new();
        mock.expect_estimate_fee().returning(|_| Ok(1.0));
        mock.expect_list_unspent().returning(|_| Ok(vec![]));

        let result = build_transaction(
            &mock,
            &child,
            &own_address,
            &recipient_address(),
            10_000,
            Network::Bitcoin,
        )
        .await;
        assert!(matches!(result, Err(Error::NoUnspentOutputs)));
    }

    #[tokio::test]
    async fn insufficient_balance_is_rejected() {
        let child = test_child();
        let own_address = crate::address::encode_p2wpkh(&child.public_key(), Network::Bitcoin).unwrap();
        let own_script = own_address.script_pubkey();
        let parent_bytes = parent_tx_bytes(1_000, own_script);

        let mut mock = MockElectrumClient::new();
        mock.expect_estimate_fee().returning(|_| Ok(1.0));
        mock.expect_list_unspent().returning(|_| {
            Ok(vec![Utxo {
                txid: "22".repeat(32),
                vout: 0,
                value_sats: 1_000,
            }])
        });
        mock.expect_get_transaction()
            .returning(move |_| Ok(parent_bytes.clone()));

        let result = build_transaction(
            &mock,
            &child,
            &own_address,
            &recipient_address(),
            1_000_000_000_000,
            Network::Bitcoin,
        )
        .await;
        assert!(matches!(result, Err(Error::InsufficientBalance)));
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected() {
        let child = test_child();
        let own_address = crate::address::encode_p2wpkh(&child.public_key(), Network::Bitcoin).unwrap();
        let mock = MockElectrumClient::new();

        let result = build_transaction(&mock, &child, &own_address, "not-an-address", 10_000, Network::Bitcoin).await;
        assert!(matches!(result, Err(Error::InvalidRecipient)));
    }

    fn hex_decode(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }
}
