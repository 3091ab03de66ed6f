//! Address pattern compilation: turns user-supplied prefixes, full
//! addresses and wildcard patterns into the lookup structures the hot
//! path consumes.
//!
//! The screen is a 65 536-entry table indexed by the first two bytes of
//! a candidate hash160. A bucket holds item indices; full-address items
//! are kept sorted by their 32-bit prefix so a bucket of thousands of
//! complete addresses still resolves with a binary search. Text-prefix
//! items fall back to encoding the address and comparing strings, which
//! only happens after a 16-bit screen hit (1/65536 of candidates).
//!
//! A Base58 text prefix does not pin an exact hash range, so the bucket
//! is derived the way the original tooling family does it: pad the
//! pattern with '1' digits until it decodes to a full 25-byte payload
//! and use the most probable bucket (plus the adjacent one when padding
//! one digit further still decodes). Bech32 prefixes pin hash bits
//! directly; all buckets consistent with the pinned bits are populated.

use fxhash::FxHashSet;
use once_cell::sync::Lazy;
use rayon::prelude::*;

use crate::address::{decode_base58_check, decode_bech32, AddressKind};
use crate::error::{EngineError, Result};

/// Cap on case-variant expansion; beyond this the pattern is rejected
/// rather than silently exploding setup memory.
const MAX_CASE_VARIANTS: usize = 4096;

/// Bech32 data charset, value = index.
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

static BECH32_REV: Lazy<[i8; 128]> = Lazy::new(|| {
    let mut rev = [-1i8; 128];
    for (i, c) in BECH32_CHARSET.chars().enumerate() {
        rev[c as usize] = i as i8;
    }
    rev
});

/// One compiled matcher entry. A user pattern expands to one item per
/// case variant; all variants share the pattern index and found flag.
#[derive(Clone, Debug)]
struct PrefixItem {
    pattern_index: usize,
    text: String,
    is_full: bool,
    hash160: [u8; 20],
    l_prefix: u32,
    difficulty: f64,
}

/// Compiled address patterns plus the lookup tables.
pub struct CompiledPatterns {
    pub kind: AddressKind,
    pub case_sensitive: bool,
    /// Original user pattern texts, index = found-flag index.
    pub texts: Vec<String>,
    wildcard: bool,
    items: Vec<PrefixItem>,
    /// 65536 buckets of item indices; empty in wildcard mode.
    table16: Vec<Vec<u32>>,
    only_full: bool,
    difficulty: f64,
}

impl CompiledPatterns {
    pub fn compile(patterns: &[String], case_sensitive: bool) -> Result<Self> {
        if patterns.is_empty() {
            return Err(EngineError::Config("no patterns to search".into()));
        }

        let kind = kind_of(&patterns[0])?;
        for p in patterns {
            if kind_of(p)? != kind {
                return Err(EngineError::Config(
                    "P2PKH, P2SH or BECH32 patterns allowed, not mixed".into(),
                ));
            }
        }
        if !case_sensitive && kind == AddressKind::Bech32 {
            return Err(EngineError::Config(
                "case-insensitive search is meaningless for BECH32 (single-case charset)".into(),
            ));
        }

        let wildcard = patterns
            .iter()
            .any(|p| p.contains('*') || p.contains('?'));

        let mut compiled = Self {
            kind,
            case_sensitive,
            texts: patterns.to_vec(),
            wildcard,
            items: Vec::new(),
            table16: Vec::new(),
            only_full: !wildcard,
            difficulty: 0.0,
        };

        if wildcard {
            // Wildcards bypass the tables entirely; validation of the
            // leading character already happened above.
            compiled.only_full = false;
            return Ok(compiled);
        }

        let mut table16: Vec<Vec<u32>> = vec![Vec::new(); 0x10000];

        for (pattern_index, pattern) in patterns.iter().enumerate() {
            let variants: Vec<String> = if case_sensitive {
                vec![pattern.clone()]
            } else {
                expand_case_variants(pattern)?
            };

            // Variants that decode to unreachable shapes are dropped;
            // the pattern itself is an error only if nothing survives.
            let mut derived: Vec<(DerivedPrefix, String)> = variants
                .par_iter()
                .filter_map(|v| derive_prefix(v, kind).ok().map(|d| (d, v.clone())))
                .collect();

            if derived.is_empty() {
                return Err(EngineError::Config(format!(
                    "pattern \"{}\" is unreachable for {}",
                    pattern,
                    kind.as_str()
                )));
            }

            if !case_sensitive {
                // Shared difficulty estimate across variants: the min
                // divided by how many variants sit at the min.
                let d_min = derived
                    .iter()
                    .map(|(d, _)| d.difficulty)
                    .fold(f64::INFINITY, f64::min);
                let nb_min = derived
                    .iter()
                    .filter(|(d, _)| d.difficulty == d_min)
                    .count();
                let shared = d_min / nb_min as f64;
                for (d, _) in derived.iter_mut() {
                    d.difficulty = shared;
                }
            }

            for (d, text) in derived {
                compiled.only_full &= d.is_full;
                let item_index = compiled.items.len() as u32;
                for bucket in &d.buckets {
                    table16[*bucket as usize].push(item_index);
                }
                compiled.items.push(PrefixItem {
                    pattern_index,
                    text,
                    is_full: d.is_full,
                    hash160: d.hash160,
                    l_prefix: d.l_prefix,
                    difficulty: d.difficulty,
                });
            }
        }

        // Keep full-address items binary-searchable per bucket.
        for bucket in table16.iter_mut() {
            bucket.sort_by_key(|&i| compiled.items[i as usize].l_prefix);
        }

        compiled.difficulty = compiled
            .texts
            .iter()
            .enumerate()
            .map(|(pi, _)| {
                compiled
                    .items
                    .iter()
                    .filter(|it| it.pattern_index == pi)
                    .map(|it| it.difficulty)
                    .fold(f64::INFINITY, f64::min)
            })
            .fold(f64::INFINITY, f64::min);
        compiled.table16 = table16;
        Ok(compiled)
    }

    #[inline]
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn pattern_count(&self) -> usize {
        self.texts.len()
    }

    /// Estimated candidates per match for the most probable pattern.
    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    /// Cheap 16-bit screen: does any item claim this hash's bucket?
    #[inline]
    pub fn screen(&self, hash: &[u8; 20]) -> bool {
        if self.wildcard {
            return true;
        }
        let bucket = u16::from_le_bytes([hash[0], hash[1]]) as usize;
        !self.table16[bucket].is_empty()
    }

    /// Resolve a screened hash to the index of the user pattern it
    /// satisfies. `encode` renders the address text and is only invoked
    /// when a text-prefix item needs it.
    pub fn match_hash<F>(&self, hash: &[u8; 20], encode: F) -> Option<usize>
    where
        F: FnOnce() -> String,
    {
        debug_assert!(!self.wildcard);
        let bucket = &self.table16[u16::from_le_bytes([hash[0], hash[1]]) as usize];
        if bucket.is_empty() {
            return None;
        }

        if self.only_full {
            let l = u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]);
            let start = bucket.partition_point(|&i| self.items[i as usize].l_prefix < l);
            for &i in &bucket[start..] {
                let item = &self.items[i as usize];
                if item.l_prefix != l {
                    break;
                }
                if item.hash160 == *hash {
                    return Some(item.pattern_index);
                }
            }
            return None;
        }

        let addr = encode();
        for &i in bucket.iter() {
            let item = &self.items[i as usize];
            let hit = if item.is_full {
                item.hash160 == *hash
            } else {
                addr.starts_with(&item.text)
            };
            if hit {
                return Some(item.pattern_index);
            }
        }
        None
    }

    /// Wildcard-mode match over the rendered address.
    pub fn match_address(&self, addr: &str) -> Option<usize> {
        for (i, pattern) in self.texts.iter().enumerate() {
            if wildcard_match(addr, pattern, self.case_sensitive) {
                return Some(i);
            }
        }
        None
    }
}

/// Leading-character dispatch, shared by compile and the CLI.
pub fn kind_of(pattern: &str) -> Result<AddressKind> {
    match pattern.chars().next() {
        Some('1') => Ok(AddressKind::P2pkh),
        Some('3') => Ok(AddressKind::P2sh),
        Some('b') | Some('B') => {
            if pattern.len() >= 4 && pattern[..4].eq_ignore_ascii_case("bc1q") {
                Ok(AddressKind::Bech32)
            } else {
                Err(EngineError::Config(format!(
                    "pattern \"{}\" must start with bc1q",
                    pattern
                )))
            }
        }
        _ => Err(EngineError::Config(format!(
            "pattern \"{}\" must start with 1, 3 or bc1q",
            pattern
        ))),
    }
}

struct DerivedPrefix {
    buckets: Vec<u16>,
    is_full: bool,
    hash160: [u8; 20],
    l_prefix: u32,
    difficulty: f64,
}

fn derive_prefix(pattern: &str, kind: AddressKind) -> Result<DerivedPrefix> {
    if pattern.len() < 2 {
        return Err(EngineError::Config(format!(
            "pattern \"{}\" too short",
            pattern
        )));
    }
    match kind {
        AddressKind::Bech32 => derive_bech32(pattern),
        _ => derive_base58(pattern, kind),
    }
}

fn derive_base58(pattern: &str, kind: AddressKind) -> Result<DerivedPrefix> {
    // Complete address? Anything decoding past the version byte plus
    // hash is treated as a full 20-byte target.
    if let Ok(decoded) = bs58::decode(pattern).into_vec() {
        if decoded.len() > 21 {
            if let Some((version, hash)) = decode_base58_check(pattern) {
                if version != kind.version() {
                    return Err(EngineError::Config(format!(
                        "address \"{}\" has version {} but {} was requested",
                        pattern,
                        version,
                        kind.as_str()
                    )));
                }
                return Ok(DerivedPrefix {
                    buckets: vec![u16::from_le_bytes([hash[0], hash[1]])],
                    is_full: true,
                    hash160: hash,
                    l_prefix: u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]),
                    difficulty: 2f64.powi(160),
                });
            }
            return Err(EngineError::Config(format!(
                "address \"{}\" has a bad checksum",
                pattern
            )));
        }
    } else {
        return Err(EngineError::Config(format!(
            "pattern \"{}\" contains characters outside the Base58 alphabet (0, I, O, l)",
            pattern
        )));
    }

    // A prefix of only '1' digits matches leading zero bytes; there is
    // no bucket to screen on, so it would scan every candidate.
    if pattern.chars().all(|c| c == '1') {
        if pattern.len() > 21 {
            return Err(EngineError::Config(format!(
                "pattern \"{}\" can never match (too many leading 1s)",
                pattern
            )));
        }
        return Ok(DerivedPrefix {
            buckets: vec![0],
            is_full: false,
            hash160: [0u8; 20],
            l_prefix: 0,
            difficulty: 256f64.powi(pattern.len() as i32 - 1),
        });
    }

    // Pad with '1' digits until the decoded payload reaches the full
    // 25 bytes, giving the most probable hash prefix for this text.
    let mut padded = pattern.to_string();
    let mut nb_digit = 0u32;
    let mut decoded = bs58::decode(&padded).into_vec().unwrap_or_default();
    while decoded.len() < 25 {
        padded.push('1');
        nb_digit += 1;
        decoded = bs58::decode(&padded).into_vec().unwrap_or_default();
    }
    if decoded.len() != 25 {
        return Err(EngineError::Config(format!(
            "pattern \"{}\" decodes past an address payload",
            pattern
        )));
    }
    if kind == AddressKind::P2sh && decoded[0] != 0x05 {
        return Err(EngineError::Config(format!(
            "pattern \"{}\" is unreachable (P2SH spans 31h1 to 3R2c)",
            pattern
        )));
    }

    let mut buckets = vec![u16::from_le_bytes([decoded[1], decoded[2]])];

    // One more pad digit lands in the adjacent bucket when it still
    // decodes to a full payload; cover both.
    padded.push('1');
    if let Ok(more) = bs58::decode(&padded).into_vec() {
        if more.len() == 25 {
            let b = u16::from_le_bytes([more[1], more[2]]);
            if !buckets.contains(&b) {
                buckets.push(b);
            }
            nb_digit += 1;
        }
    }

    Ok(DerivedPrefix {
        buckets,
        is_full: false,
        hash160: [0u8; 20],
        l_prefix: 0,
        difficulty: 2f64.powi(192) / 58f64.powi(nb_digit as i32),
    })
}

fn derive_bech32(pattern: &str) -> Result<DerivedPrefix> {
    // Complete address?
    if let Some(hash) = decode_bech32(&pattern.to_ascii_lowercase()) {
        return Ok(DerivedPrefix {
            buckets: vec![u16::from_le_bytes([hash[0], hash[1]])],
            is_full: true,
            hash160: hash,
            l_prefix: u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]),
            difficulty: 2f64.powi(160),
        });
    }

    if pattern.len() < 5 {
        return Err(EngineError::Config(format!(
            "pattern \"{}\" too short (need at least one data character)",
            pattern
        )));
    }
    if pattern.len() >= 36 {
        return Err(EngineError::Config(format!(
            "pattern \"{}\" too long for a P2WPKH address",
            pattern
        )));
    }

    // Data characters after "bc1q" pin 5 bits each from the top of the
    // hash.
    let data = &pattern[4..];
    let mut bits: u64 = 0;
    let mut nbits = 0u32;
    for c in data.chars() {
        let v = if (c as usize) < 128 {
            BECH32_REV[c.to_ascii_lowercase() as usize]
        } else {
            -1
        };
        if v < 0 {
            return Err(EngineError::Config(format!(
                "pattern \"{}\": only \"{}\" allowed after bc1q",
                pattern, BECH32_CHARSET
            )));
        }
        if nbits < 32 {
            bits = (bits << 5) | v as u64;
            nbits += 5;
        }
    }

    // Align the pinned bits to the top of a 32-bit window.
    let pinned = nbits.min(32);
    let window: u32 = if nbits >= 32 {
        (bits >> (nbits - 32)) as u32
    } else {
        (bits as u32) << (32 - nbits)
    };

    let pinned16 = pinned.min(16);
    let base16 = (window >> 16) as u16 & !mask_low_u16(16 - pinned16);
    let free = 16 - pinned16;
    let buckets: Vec<u16> = (0..(1u32 << free))
        .map(|fill| {
            let be = base16 | fill as u16;
            // Table is indexed on little-endian reads of the hash.
            u16::from_le_bytes(be.to_be_bytes())
        })
        .collect();

    Ok(DerivedPrefix {
        buckets,
        is_full: false,
        hash160: [0u8; 20],
        l_prefix: 0,
        difficulty: 2f64.powi(5 * (pattern.len() as i32 - 4)),
    })
}

#[inline]
fn mask_low_u16(bits: u32) -> u16 {
    if bits >= 16 {
        0xFFFF
    } else {
        (1u16 << bits) - 1
    }
}

/// Enumerate letter-case variants of a Base58 pattern, first character
/// fixed. Variants with characters outside the alphabet are filtered
/// later by prefix derivation.
fn expand_case_variants(pattern: &str) -> Result<Vec<String>> {
    let chars: Vec<char> = pattern.chars().collect();
    let letter_positions: Vec<usize> = chars
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, c)| c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .collect();

    if (1usize << letter_positions.len().min(63)) > MAX_CASE_VARIANTS {
        return Err(EngineError::Config(format!(
            "pattern \"{}\" has too many letters for case-insensitive search",
            pattern
        )));
    }

    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for combo in 0u64..(1u64 << letter_positions.len()) {
        let mut variant = chars.clone();
        for (bit, &pos) in letter_positions.iter().enumerate() {
            variant[pos] = if (combo >> bit) & 1 == 1 {
                variant[pos].to_ascii_uppercase()
            } else {
                variant[pos].to_ascii_lowercase()
            };
        }
        let s: String = variant.into_iter().collect();
        if seen.insert(s.clone()) {
            out.push(s);
        }
    }
    Ok(out)
}

/// Glob matching with `?` (one char) and `*` (any run), iterative with
/// star backtracking.
pub fn wildcard_match(text: &str, pattern: &str, case_sensitive: bool) -> bool {
    let t: Vec<char> = if case_sensitive {
        text.chars().collect()
    } else {
        text.chars().map(|c| c.to_ascii_lowercase()).collect()
    };
    let p: Vec<char> = if case_sensitive {
        pattern.chars().collect()
    } else {
        pattern.chars().map(|c| c.to_ascii_lowercase()).collect()
    };

    let (mut ti, mut pi) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
