//! Digest collaborators: SHA-256, double SHA-256, hash160 and the
//! BIP-340/341 tagged hash. Thin wrappers over the RustCrypto digests;
//! nothing here knows about curve points.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA256(SHA256(data)), the Bitcoin checksum / txid hash.
#[inline]
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// RIPEMD160(SHA256(data)), the address hash.
#[inline]
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// BIP-340 style domain-separated hash:
/// SHA256(SHA256(tag) || SHA256(tag) || data...).
pub fn tagged_hash(tag: &str, parts: &[&[u8]]) -> [u8; 32] {
    let tag_hash = sha256(tag.as_bytes());
    let mut h = Sha256::new();
    h.update(tag_hash);
    h.update(tag_hash);
    for part in parts {
        h.update(part);
    }
    h.finalize().into()
}
