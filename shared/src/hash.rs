use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 256-bit digest, identifying transactions, blocks, and PoW targets.
///
/// Bytes are stored and compared big-endian, so `Ord` on `Hash256` is
/// exactly the big-endian integer ordering proof-of-work threshold
/// checks (`hash < target`) rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// The all-zero digest, used for the genesis block's prior hash and
    /// the Merkle root of an empty leaf set.
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hashes `data` with SHA-256 and reads the digest big-endian.
    #[must_use]
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Self(out)
    }

    /// Parses a 64-character hex string into a digest.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not exactly 32 bytes of valid hex.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(array))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_displays_as_64_zero_digits() {
        assert_eq!(Hash256::zero().to_string().len(), 64);
        assert_eq!(
            Hash256::zero().to_string(),
            "0".repeat(64)
        );
    }

    #[test]
    fn sha256_is_deterministic_and_nonzero() {
        let a = Hash256::sha256(b"hello world");
        let b = Hash256::sha256(b"hello world");
        assert_eq!(a, b);
        assert_ne!(a, Hash256::zero());
    }

    #[test]
    fn ordering_is_big_endian() {
        let small = Hash256::from_bytes([0x00; 32]);
        let mut big_bytes = [0x00; 32];
        big_bytes[0] = 0x01;
        let big = Hash256::from_bytes(big_bytes);
        assert!(small < big);

        // A difference in the least-significant byte still orders correctly.
        let mut a = [0xAA; 32];
        let mut b = [0xAA; 32];
        a[31] = 0x01;
        b[31] = 0x02;
        assert!(Hash256::from_bytes(a) < Hash256::from_bytes(b));
    }

    #[test]
    fn from_hex_round_trips_through_display() {
        let h = Hash256::sha256(b"round trip");
        let parsed = Hash256::from_hex(&h.to_string()).unwrap();
        assert_eq!(h, parsed);
    }
}
