use std::fmt::Debug;

/// Errors surfaced by the wallet engine.
///
/// Every public operation either returns `Ok` or one of these variants; the
/// core never swallows a transport error, it only adds context (see
/// [`Error::NetworkFailure`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("mnemonic is invalid")]
    InvalidMnemonic,

    #[error("derivation path is invalid: {0}")]
    InvalidPath(String),

    #[error("derived key is out of range, retry with a different index")]
    DerivationOutOfRange,

    #[error("config.bip must be 44 or 84, got {0}")]
    UnsupportedBip(u32),

    #[error("recipient address cannot be decoded for this network")]
    InvalidRecipient,

    #[error("value {0} sats is at or below the dust limit")]
    BelowDustLimit(u64),

    #[error("source address has no unspent outputs")]
    NoUnspentOutputs,

    #[error("unspent outputs cannot cover value + fee")]
    InsufficientBalance,

    #[error("signature is not valid DER/base64")]
    MalformedSignature,

    #[error("operation not supported: {0}")]
    UnsupportedOperation(String),

    #[error("account has been disposed")]
    DisposedAccount,

    #[error("wallet manager has been disposed")]
    DisposedWallet,

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("invalid wallet config: {0}")]
    InvalidConfig(String),
}

impl From<bitcoin::bip32::Error> for Error {
    fn from(e: bitcoin::bip32::Error) -> Self {
        match e {
            bitcoin::bip32::Error::InvalidTweak | bitcoin::bip32::Error::InvalidChildNumber(_) => {
                Error::DerivationOutOfRange
            }
            other => Error::InvalidPath(other.to_string()),
        }
    }
}

impl From<bip39::Error> for Error {
    fn from(_: bip39::Error) -> Self {
        Error::InvalidMnemonic
    }
}

impl From<bitcoin::address::ParseError> for Error {
    fn from(_: bitcoin::address::ParseError) -> Self {
        Error::InvalidRecipient
    }
}

impl From<bitcoin::secp256k1::Error> for Error {
    fn from(_: bitcoin::secp256k1::Error) -> Self {
        Error::MalformedSignature
    }
}
