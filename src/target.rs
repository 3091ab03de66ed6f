//! Search-target configuration: the four match modes, validated once at
//! setup and read-only for the lifetime of a run.

use crate::error::{EngineError, Result};
use crate::math::{public_key, Point, Scalar};
use crate::pattern::CompiledPatterns;

/// Which public-key serializations address mode hashes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyMode {
    Compressed,
    Uncompressed,
    Both,
}

impl KeyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compressed => "compressed",
            Self::Uncompressed => "uncompressed",
            Self::Both => "compressed or uncompressed",
        }
    }
}

/// A 256-bit value/mask pair, little-endian limbs matching the field
/// element layout so candidate X-coordinates compare limb-for-limb.
#[derive(Clone, Copy, Debug)]
pub struct Mask256 {
    pub value: [u64; 4],
    pub mask: [u64; 4],
}

impl Mask256 {
    /// Parse left-aligned hex: "DEADBEEF" targets the top four bytes.
    /// Without an explicit mask, every bit the value hex spells is
    /// matched (a prefix mask).
    pub fn from_hex(value_hex: &str, mask_hex: Option<&str>) -> Result<Self> {
        let value = parse_aligned_hex(value_hex)?;
        let mask = match mask_hex {
            Some(m) => parse_aligned_hex(m)?,
            None => prefix_mask(value_hex.trim_start_matches("0x").len() as u32 * 4),
        };
        let out = Self {
            value: bytes_to_limbs(&value),
            mask: bytes_to_limbs(&mask),
        };
        if out.bits() == 0 {
            return Err(EngineError::Config("mask selects no bits".into()));
        }
        Ok(out)
    }

    /// Mask covering the top `bits` bits.
    pub fn from_prefix_bits(value_hex: &str, bits: u32) -> Result<Self> {
        if bits == 0 || bits > 256 {
            return Err(EngineError::Config(format!(
                "mask width {} out of range 1..=256",
                bits
            )));
        }
        let value = parse_aligned_hex(value_hex)?;
        Ok(Self {
            value: bytes_to_limbs(&value),
            mask: bytes_to_limbs(&prefix_mask(bits)),
        })
    }

    /// Number of constrained bits (difficulty is 2^bits).
    pub fn bits(&self) -> u32 {
        self.mask.iter().map(|m| m.count_ones()).sum()
    }

    /// The core comparison: `(x & mask) == (value & mask)`.
    #[inline]
    pub fn matches(&self, limbs: &[u64; 4]) -> bool {
        for i in 0..4 {
            if (limbs[i] & self.mask[i]) != (self.value[i] & self.mask[i]) {
                return false;
            }
        }
        true
    }

    /// Same comparison over big-endian bytes (txid mode).
    #[inline]
    pub fn matches_bytes(&self, bytes: &[u8; 32]) -> bool {
        self.matches(&bytes_to_limbs(bytes))
    }
}

fn parse_aligned_hex(hex_str: &str) -> Result<[u8; 32]> {
    let s = hex_str.trim_start_matches("0x");
    if s.is_empty() || s.len() > 64 {
        return Err(EngineError::Config(format!(
            "hex value \"{}\" must be 1..=64 digits",
            hex_str
        )));
    }
    // Left-aligned: pad on the right so "DEAD" means the top bytes.
    let mut padded = s.to_string();
    while padded.len() < 64 {
        padded.push('0');
    }
    let bytes = hex::decode(&padded)
        .map_err(|_| EngineError::Config(format!("\"{}\" is not valid hex", hex_str)))?;
    Ok(bytes.try_into().unwrap())
}

fn prefix_mask(bits: u32) -> [u8; 32] {
    let bits = bits.min(256);
    let mut mask = [0u8; 32];
    for i in 0..(bits / 8) as usize {
        mask[i] = 0xFF;
    }
    if bits % 8 != 0 {
        mask[(bits / 8) as usize] = 0xFFu8 << (8 - bits % 8);
    }
    mask
}

/// Big-endian bytes into the little-endian limb layout.
#[inline]
fn bytes_to_limbs(bytes: &[u8; 32]) -> [u64; 4] {
    let mut d = [0u64; 4];
    for i in 0..4 {
        let o = (3 - i) * 8;
        d[i] = u64::from_be_bytes(bytes[o..o + 8].try_into().unwrap());
    }
    d
}

/// Address-mode target: compiled patterns plus the key shapes to hash.
pub struct AddressTarget {
    pub patterns: CompiledPatterns,
    pub key_mode: KeyMode,
}

impl AddressTarget {
    pub fn new(patterns: &[String], case_sensitive: bool, key_mode: KeyMode) -> Result<Self> {
        let patterns = CompiledPatterns::compile(patterns, case_sensitive)?;
        if patterns.kind == crate::address::AddressKind::Bech32 && key_mode != KeyMode::Compressed {
            return Err(EngineError::Config(
                "BECH32 outputs commit to compressed keys only".into(),
            ));
        }
        Ok(Self { patterns, key_mode })
    }
}

/// Signature R-grinding target.
pub struct SignatureTarget {
    /// Message hash z.
    pub msg_hash: Scalar,
    /// Signing key d. For Schnorr this is normalized so d*G has even Y.
    pub priv_key: Scalar,
    /// d*G, cached for challenge hashing and verification.
    pub pubkey: Point,
    pub schnorr: bool,
    pub rx: Mask256,
}

impl SignatureTarget {
    pub fn new(msg_hash: [u8; 32], priv_key: [u8; 32], schnorr: bool, rx: Mask256) -> Result<Self> {
        let d = Scalar::from_bytes(&priv_key);
        if d.is_zero() || d.to_bytes() != priv_key {
            return Err(EngineError::Config(
                "signing key must be a nonzero scalar below the curve order".into(),
            ));
        }
        let mut d = d;
        let mut pubkey = public_key(&d);
        if schnorr && pubkey.y.is_odd() {
            // BIP-340 keys are X-only; flip to the even-Y representative.
            d = d.neg();
            pubkey = pubkey.negate();
        }
        Ok(Self {
            msg_hash: Scalar::from_bytes(&msg_hash),
            priv_key: d,
            pubkey,
            schnorr,
            rx,
        })
    }
}

/// Transaction-id grinding target.
pub struct TxidTarget {
    pub raw_tx: Vec<u8>,
    pub nonce_offset: usize,
    pub nonce_len: usize,
    pub txid: Mask256,
}

impl TxidTarget {
    pub fn new(raw_tx: Vec<u8>, nonce_offset: usize, nonce_len: usize, txid: Mask256) -> Result<Self> {
        if raw_tx.is_empty() {
            return Err(EngineError::Config("raw transaction is empty".into()));
        }
        if nonce_len == 0 || nonce_len > 8 {
            return Err(EngineError::Config(format!(
                "nonce length {} out of range 1..=8",
                nonce_len
            )));
        }
        if nonce_offset + nonce_len > raw_tx.len() {
            return Err(EngineError::Config(format!(
                "nonce window {}..{} outside transaction of {} bytes",
                nonce_offset,
                nonce_offset + nonce_len,
                raw_tx.len()
            )));
        }
        Ok(Self {
            raw_tx,
            nonce_offset,
            nonce_len,
            txid,
        })
    }

    /// Size of the nonce space in bits.
    pub fn nonce_bits(&self) -> u32 {
        (self.nonce_len * 8) as u32
    }

    /// Splice a nonce into a copy-free scratch buffer, little-endian as
    /// transactions serialize integers.
    pub fn splice(&self, buf: &mut [u8], nonce: u64) {
        for j in 0..self.nonce_len {
            buf[self.nonce_offset + j] = (nonce >> (j * 8)) as u8;
        }
    }
}

/// The tagged union all predicates dispatch on, built once per run.
pub enum MatchTarget {
    Address(AddressTarget),
    Mask(Mask256),
    Signature(SignatureTarget),
    Txid(TxidTarget),
}

impl MatchTarget {
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Mask(_) => "mask",
            Self::Signature(t) => {
                if t.schnorr {
                    "signature (schnorr)"
                } else {
                    "signature (ecdsa)"
                }
            }
            Self::Txid(_) => "txid",
        }
    }

    /// Number of independent found flags this target needs.
    pub fn pattern_count(&self) -> usize {
        match self {
            Self::Address(a) => a.patterns.pattern_count(),
            _ => 1,
        }
    }

    /// Expected candidates per match.
    pub fn difficulty(&self) -> f64 {
        match self {
            Self::Address(a) => a.patterns.difficulty(),
            Self::Mask(m) => 2f64.powi(m.bits() as i32),
            Self::Signature(s) => 2f64.powi(s.rx.bits() as i32),
            Self::Txid(t) => 2f64.powi(t.txid.bits() as i32),
        }
    }

    /// Txid mode iterates nonces, everything else walks the curve.
    pub fn is_ec_mode(&self) -> bool {
        !matches!(self, Self::Txid(_))
    }
}
