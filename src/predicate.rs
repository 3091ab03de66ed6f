//! Per-mode candidate tests.
//!
//! Each target kind gets one stateless test consuming a candidate (a
//! curve point plus its offset, or a raw nonce) and producing typed
//! records. The endomorphism fan-out lives here: one computed point
//! yields three X-coordinates for two field multiplications, and the Y
//! negation doubles the address-mode candidates for free.

use crate::address::{hash160_to_address, p2sh_script_hash, AddressKind};
use crate::group::CandidateGroup;
use crate::hashing::{hash160, sha256d};
use crate::math::{FieldElement, BETA, BETA2};
use crate::record::{Endo, Evidence, FoundRecord, WorkerId};
use crate::target::{AddressTarget, KeyMode, Mask256, MatchTarget, TxidTarget};

pub struct Predicate<'a> {
    target: &'a MatchTarget,
}

impl<'a> Predicate<'a> {
    pub fn new(target: &'a MatchTarget) -> Self {
        Self { target }
    }

    /// Distinct candidates tested per curve point, for throughput
    /// accounting. Mask-style modes share X between (x,y) and (x,-y),
    /// so only the endomorphism images are distinct tests.
    pub fn candidates_per_point(&self) -> u64 {
        match self.target {
            MatchTarget::Address(a) => match a.key_mode {
                KeyMode::Both => 12,
                _ => 6,
            },
            MatchTarget::Mask(_) | MatchTarget::Signature(_) => 3,
            MatchTarget::Txid(_) => 1,
        }
    }

    /// Run the mode's test over a full candidate group.
    pub fn scan_group(&self, worker: WorkerId, group: &CandidateGroup, out: &mut Vec<FoundRecord>) {
        match self.target {
            MatchTarget::Address(a) => self.scan_addresses(worker, a, group, out),
            MatchTarget::Mask(m) => scan_masked(worker, m, group, out, false),
            MatchTarget::Signature(s) => scan_masked(worker, &s.rx, group, out, true),
            MatchTarget::Txid(_) => unreachable!("txid mode scans nonces, not groups"),
        }
    }

    /// Txid mode: test `count` consecutive nonces starting at `start`,
    /// wrapping inside the nonce window. `scratch` must hold a copy of
    /// the raw transaction and is re-spliced per candidate — this mode
    /// re-hashes the whole template every time, which is what makes it
    /// memory-bound rather than EC-bound.
    pub fn scan_nonces(
        &self,
        worker: WorkerId,
        start: u64,
        count: u64,
        scratch: &mut [u8],
        out: &mut Vec<FoundRecord>,
    ) {
        let t = match self.target {
            MatchTarget::Txid(t) => t,
            _ => unreachable!("scan_nonces is txid-mode only"),
        };
        let wrap_mask = nonce_wrap_mask(t);
        for i in 0..count {
            let nonce = start.wrapping_add(i) & wrap_mask;
            t.splice(scratch, nonce);
            let digest = sha256d(scratch);
            let txid = display_order(&digest);
            if t.txid.matches_bytes(&txid) {
                out.push(FoundRecord {
                    worker,
                    base_key: crate::math::Scalar::ZERO,
                    offset: 0,
                    endo: Endo::None,
                    negated: false,
                    compressed: false,
                    evidence: Evidence::Txid { nonce, txid },
                });
            }
        }
    }

    fn scan_addresses(
        &self,
        worker: WorkerId,
        target: &AddressTarget,
        group: &CandidateGroup,
        out: &mut Vec<FoundRecord>,
    ) {
        let compressed_pass = target.key_mode != KeyMode::Uncompressed;
        let uncompressed_pass = target.key_mode != KeyMode::Compressed;

        for i in 0..group.len() {
            let p = &group.points[i];
            let offset = group.offset(i);

            let x_bytes = p.x.to_bytes();
            let beta_x = p.x.mul(&BETA).to_bytes();
            let beta2_x = p.x.mul(&BETA2).to_bytes();
            let y_odd = p.y.is_odd();

            // (x bytes, endo, matched the negated point)
            let variants: [(&[u8; 32], Endo, bool); 6] = [
                (&x_bytes, Endo::None, false),
                (&beta_x, Endo::Lambda, false),
                (&beta2_x, Endo::Lambda2, false),
                (&x_bytes, Endo::None, true),
                (&beta_x, Endo::Lambda, true),
                (&beta2_x, Endo::Lambda2, true),
            ];

            for (xb, endo, negated) in variants {
                // Negating Y flips the compressed parity byte.
                let parity_odd = y_odd != negated;
                if compressed_pass {
                    let mut pubkey = [0u8; 33];
                    pubkey[0] = if parity_odd { 0x03 } else { 0x02 };
                    pubkey[1..].copy_from_slice(xb);
                    self.check_hash(worker, target, group, offset, endo, negated, true, hash160(&pubkey), out);
                }
                if uncompressed_pass {
                    // The uncompressed form needs the real Y bytes.
                    let y = if negated { p.y.neg() } else { p.y };
                    let mut pubkey = [0u8; 65];
                    pubkey[0] = 0x04;
                    pubkey[1..33].copy_from_slice(xb);
                    pubkey[33..].copy_from_slice(&y.to_bytes());
                    self.check_hash(worker, target, group, offset, endo, negated, false, hash160(&pubkey), out);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_hash(
        &self,
        worker: WorkerId,
        target: &AddressTarget,
        group: &CandidateGroup,
        offset: i64,
        endo: Endo,
        negated: bool,
        compressed: bool,
        pubkey_hash: [u8; 20],
        out: &mut Vec<FoundRecord>,
    ) {
        let kind = target.patterns.kind;
        let hash = if kind == AddressKind::P2sh {
            p2sh_script_hash(&pubkey_hash)
        } else {
            pubkey_hash
        };

        let pattern_index = if target.patterns.is_wildcard() {
            let addr = hash160_to_address(kind, &hash);
            target.patterns.match_address(&addr)
        } else {
            if !target.patterns.screen(&hash) {
                return;
            }
            target
                .patterns
                .match_hash(&hash, || hash160_to_address(kind, &hash))
        };

        if let Some(pattern_index) = pattern_index {
            out.push(FoundRecord {
                worker,
                base_key: group.base,
                offset,
                endo,
                negated,
                compressed,
                evidence: Evidence::Address {
                    hash160: hash,
                    pattern_index,
                },
            });
        }
    }
}

/// Mask and signature modes: compare the three endomorphism images of X
/// against the mask. Y never enters the comparison, so the negated arm
/// would duplicate every hit and is skipped.
fn scan_masked(
    worker: WorkerId,
    mask: &Mask256,
    group: &CandidateGroup,
    out: &mut Vec<FoundRecord>,
    nonce_evidence: bool,
) {
    for i in 0..group.len() {
        let p = &group.points[i];
        let offset = group.offset(i);

        let images: [(FieldElement, Endo); 3] = [
            (p.x, Endo::None),
            (p.x.mul(&BETA), Endo::Lambda),
            (p.x.mul(&BETA2), Endo::Lambda2),
        ];

        for (x, endo) in images {
            if mask.matches(&x.d) {
                let bytes = x.to_bytes();
                out.push(FoundRecord {
                    worker,
                    base_key: group.base,
                    offset,
                    endo,
                    negated: false,
                    compressed: true,
                    evidence: if nonce_evidence {
                        Evidence::NonceX(bytes)
                    } else {
                        Evidence::XCoordinate(bytes)
                    },
                });
            }
        }
    }
}

/// Bitcoin displays txids byte-reversed from the raw digest.
#[inline]
pub fn display_order(digest: &[u8; 32]) -> [u8; 32] {
    let mut out = *digest;
    out.reverse();
    out
}

#[inline]
fn nonce_wrap_mask(t: &TxidTarget) -> u64 {
    if t.nonce_bits() >= 64 {
        u64::MAX
    } else {
        (1u64 << t.nonce_bits()) - 1
    }
}
