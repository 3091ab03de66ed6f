//! Bitcoin address text codec: Base58Check, Bech32 P2WPKH, WIF.
//!
//! The engine itself only compares 20-byte hashes; these helpers exist
//! for pattern compilation, final result rendering and verification.

use sha2::{Digest, Sha256};

use crate::hashing::hash160;

/// The three supported output shapes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddressKind {
    /// Legacy, "1..."
    P2pkh,
    /// SegWit-wrapped script hash, "3..."
    P2sh,
    /// Native SegWit v0, "bc1q..."
    Bech32,
}

impl AddressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P2pkh => "P2PKH",
            Self::P2sh => "P2SH",
            Self::Bech32 => "BECH32",
        }
    }

    /// Base58Check version byte (meaningless for Bech32).
    pub fn version(&self) -> u8 {
        match self {
            Self::P2pkh => 0x00,
            Self::P2sh => 0x05,
            Self::Bech32 => 0xFF,
        }
    }
}

/// Render a 20-byte hash as an address of the given kind.
pub fn hash160_to_address(kind: AddressKind, hash: &[u8; 20]) -> String {
    match kind {
        AddressKind::P2pkh => encode_base58_check(0x00, hash),
        AddressKind::P2sh => encode_base58_check(0x05, hash),
        AddressKind::Bech32 => encode_bech32(hash),
    }
}

pub fn encode_base58_check(version: u8, hash: &[u8; 20]) -> String {
    let mut data = Vec::with_capacity(25);
    data.push(version);
    data.extend_from_slice(hash);
    let checksum = Sha256::digest(Sha256::digest(&data));
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}

/// Decode a full Base58Check address, verifying length and checksum.
pub fn decode_base58_check(addr: &str) -> Option<(u8, [u8; 20])> {
    let decoded = bs58::decode(addr).into_vec().ok()?;
    if decoded.len() != 25 {
        return None;
    }
    let checksum = Sha256::digest(Sha256::digest(&decoded[..21]));
    if checksum[..4] != decoded[21..] {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&decoded[1..21]);
    Some((decoded[0], hash))
}

pub fn encode_bech32(hash: &[u8; 20]) -> String {
    use bech32::{u5, Variant};

    // 20 bytes always convert cleanly to 32 5-bit groups.
    let converted = bech32::convert_bits(hash, 8, 5, true)
        .expect("20-byte hash should always convert to 5-bit groups");

    let mut witness_data = Vec::with_capacity(33);
    witness_data.push(u5::try_from_u8(0).expect("0 is valid u5"));
    for b in converted {
        witness_data.push(u5::try_from_u8(b).expect("5-bit value should be valid u5"));
    }

    bech32::encode("bc", witness_data, Variant::Bech32)
        .expect("valid witness program should encode")
}

/// Decode a full P2WPKH address back to its witness program.
pub fn decode_bech32(addr: &str) -> Option<[u8; 20]> {
    let (hrp, data, _) = bech32::decode(addr).ok()?;
    if hrp != "bc" || data.is_empty() || data[0].to_u8() != 0 {
        return None;
    }
    let program: Vec<u8> = bech32::convert_bits(&data[1..], 5, 8, false).ok()?;
    if program.len() != 20 {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&program);
    Some(hash)
}

/// P2SH-P2WPKH witness script hash: hash160(OP_0 PUSH20 <pubkey_hash>).
#[inline]
pub fn p2sh_script_hash(pubkey_hash: &[u8; 20]) -> [u8; 20] {
    let mut script = [0u8; 22];
    script[0] = 0x00;
    script[1] = 0x14;
    script[2..22].copy_from_slice(pubkey_hash);
    hash160(&script)
}

/// Private key to WIF. The compression flag must match the public key
/// shape that was searched, or the user cannot spend the output.
pub fn to_wif(key: &[u8; 32], compressed: bool) -> String {
    let mut data = Vec::with_capacity(38);
    data.push(0x80);
    data.extend_from_slice(key);
    if compressed {
        data.push(0x01);
    }
    let checksum = Sha256::digest(Sha256::digest(&data));
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}
