//! FNV-1a content hashing for replay artifacts
//!
//! Not cryptographic: the hash only detects accidental divergence between
//! an artifact and a regeneration of it.

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001B3;

#[inline]
fn fnv1a_byte(hash: u64, byte: u8) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

/// Hash a byte string
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| fnv1a_byte(hash, *b))
}

/// Fixed-width lowercase hex, as stored in artifact metadata
pub fn hash_hex(hash: u64) -> String {
    format!("{:016x}", hash)
}

/// Replay id derived from the content hash
pub fn replay_id(hash: u64) -> String {
    format!("rp-{}", hash_hex(hash))
}
