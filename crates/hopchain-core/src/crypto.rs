// crates/hopchain-core/src/crypto.rs
//
// Digest capability injected into every component that hashes: chain
// building, chain verification, packet signing, and export signing.

use sha2::{Digest, Sha256};

use crate::error::HopchainError;

/// `prev_hash` of the hop at index 0: 64 hex zeros.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A 32-byte digest primitive.
///
/// Implementations must be deterministic. Test code can inject fixed-vector
/// providers; production code uses [`Sha256Provider`].
pub trait CryptoProvider: Send + Sync {
    /// Compute the digest of `data`.
    fn digest(&self, data: &[u8]) -> Result<[u8; 32], HopchainError>;

    /// Compute the digest of `data` as a lowercase hex string.
    fn digest_hex(&self, data: &[u8]) -> Result<String, HopchainError> {
        Ok(hex::encode(self.digest(data)?))
    }
}

/// SHA-256 backed by the `sha2` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Provider;

impl Sha256Provider {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for Sha256Provider {
    fn digest(&self, data: &[u8]) -> Result<[u8; 32], HopchainError> {
        Ok(hash_bytes(data))
    }
}

/// Compute SHA-256 hash of the given bytes.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Link hash of a hop: `digest(utf8(prev_hash) || utf8(content))`, hex encoded.
pub fn link_hash(
    crypto: &dyn CryptoProvider,
    prev_hash: &str,
    content: &str,
) -> Result<String, HopchainError> {
    let mut message = Vec::with_capacity(prev_hash.len() + content.len());
    message.extend_from_slice(prev_hash.as_bytes());
    message.extend_from_slice(content.as_bytes());
    crypto.digest_hex(&message)
}
