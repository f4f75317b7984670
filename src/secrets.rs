use zeroize::{Zeroize, ZeroizeOnDrop};

/// A fixed-size secret buffer that is wiped on drop.
///
/// Wraps the private key, chain code, and master-key-plus-chain-code buffers
/// an [`crate::account::Account`] owns exclusively (SPEC_FULL.md §4.8): the
/// teacher's current `crates/bitcoin` never zeroizes key material, which this
/// type corrects.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes<const N: usize>([u8; N]);

impl<const N: usize> SecretBytes<N> {
    pub fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> std::fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes<{N}>(REDACTED)")
    }
}
