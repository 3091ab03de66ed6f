//! Key reconstruction and verification.
//!
//! A record is only worth anything if the reconstructed key actually
//! reproduces the hit, so every record is re-derived from scratch here:
//! rebuild the key from the record's own launch-time base key, recompute
//! the point/hash/digest, and compare against the evidence the predicate
//! stored. A mismatch discards the record — a false negative is
//! acceptable, a corrupt delivered key is not. Signature hits continue
//! into full ECDSA / BIP-340 completion.

use crate::address::{hash160_to_address, p2sh_script_hash, to_wif, AddressKind};
use crate::error::{EngineError, Result};
use crate::hashing::{hash160, sha256d, tagged_hash};
use crate::math::{public_key, Point, Scalar, LAMBDA, LAMBDA2};
use crate::predicate::display_order;
use crate::record::{Endo, Evidence, FoundRecord};
use crate::target::{MatchTarget, SignatureTarget};

/// A verified result, delivered to the caller's sink.
#[derive(Clone, Debug)]
pub struct FoundKey {
    /// The private key (or signature nonce); absent for txid hits.
    pub private_key: Option<Scalar>,
    pub payload: FoundPayload,
}

#[derive(Clone, Debug)]
pub enum FoundPayload {
    Address {
        address: String,
        kind: AddressKind,
        compressed: bool,
        wif: String,
        pattern_index: usize,
    },
    MaskedKey {
        x: [u8; 32],
    },
    Signature {
        r: Scalar,
        s: Scalar,
        nonce: Scalar,
        rx: [u8; 32],
        schnorr: bool,
    },
    Transaction {
        nonce: u64,
        txid: [u8; 32],
        raw_tx: Vec<u8>,
    },
}

/// Rebuild the private key a record points at: offset from the batch's
/// base key, then the endomorphism multiplier, then the symmetry
/// negation. Order matters only for readability — negation commutes
/// with the lambda multiplication modulo n.
pub fn reconstruct_key(base_key: &Scalar, offset: i64, endo: Endo, negated: bool) -> Scalar {
    let mut k = base_key.add_offset(offset);
    match endo {
        Endo::None => {}
        Endo::Lambda => k = k.mul(&LAMBDA),
        Endo::Lambda2 => k = k.mul(&LAMBDA2),
    }
    if negated {
        k = k.neg();
    }
    k
}

pub struct Reconstructor<'a> {
    target: &'a MatchTarget,
}

impl<'a> Reconstructor<'a> {
    pub fn new(target: &'a MatchTarget) -> Self {
        Self { target }
    }

    /// Verify a record and turn it into a deliverable result.
    pub fn process(&self, record: &FoundRecord) -> Result<FoundKey> {
        match (&self.target, &record.evidence) {
            (MatchTarget::Txid(t), Evidence::Txid { nonce, txid }) => {
                let mut tx = t.raw_tx.clone();
                t.splice(&mut tx, *nonce);
                let check = display_order(&sha256d(&tx));
                if check != *txid || !t.txid.matches_bytes(&check) {
                    return Err(self.verification_error(record));
                }
                Ok(FoundKey {
                    private_key: None,
                    payload: FoundPayload::Transaction {
                        nonce: *nonce,
                        txid: *txid,
                        raw_tx: tx,
                    },
                })
            }

            (MatchTarget::Mask(mask), Evidence::XCoordinate(x)) => {
                let key = reconstruct_key(&record.base_key, record.offset, record.endo, record.negated);
                let point = public_key(&key);
                if point.is_infinity()
                    || point.x.to_bytes() != *x
                    || !mask.matches(&point.x.d)
                {
                    return Err(self.verification_error(record));
                }
                Ok(FoundKey {
                    private_key: Some(key),
                    payload: FoundPayload::MaskedKey { x: *x },
                })
            }

            (MatchTarget::Signature(sig), Evidence::NonceX(rx)) => {
                let nonce = reconstruct_key(&record.base_key, record.offset, record.endo, record.negated);
                let point = public_key(&nonce);
                if point.is_infinity()
                    || point.x.to_bytes() != *rx
                    || !sig.rx.matches(&point.x.d)
                {
                    return Err(self.verification_error(record));
                }
                let (nonce, r, s) = complete_signature(sig, nonce, point)?;
                Ok(FoundKey {
                    private_key: Some(nonce),
                    payload: FoundPayload::Signature {
                        r,
                        s,
                        nonce,
                        rx: *rx,
                        schnorr: sig.schnorr,
                    },
                })
            }

            (
                MatchTarget::Address(target),
                Evidence::Address {
                    hash160: evidence_hash,
                    pattern_index,
                },
            ) => {
                let key = reconstruct_key(&record.base_key, record.offset, record.endo, record.negated);
                let point = public_key(&key);
                if point.is_infinity() {
                    return Err(self.verification_error(record));
                }

                let pubkey_hash = if record.compressed {
                    hash160(&point.to_compressed())
                } else {
                    hash160(&point.to_uncompressed())
                };
                let kind = target.patterns.kind;
                let hash = if kind == AddressKind::P2sh {
                    p2sh_script_hash(&pubkey_hash)
                } else {
                    pubkey_hash
                };
                if hash != *evidence_hash {
                    return Err(self.verification_error(record));
                }

                // The hash matches the evidence; re-match the pattern so
                // a table defect can never deliver a stray key.
                let address = hash160_to_address(kind, &hash);
                let still_matches = if target.patterns.is_wildcard() {
                    target.patterns.match_address(&address).is_some()
                } else {
                    target.patterns.match_hash(&hash, || address.clone()).is_some()
                };
                if !still_matches {
                    return Err(self.verification_error(record));
                }

                Ok(FoundKey {
                    private_key: Some(key),
                    payload: FoundPayload::Address {
                        address,
                        kind,
                        compressed: record.compressed,
                        wif: to_wif(&key.to_bytes(), record.compressed),
                        pattern_index: *pattern_index,
                    },
                })
            }

            _ => Err(EngineError::Arithmetic(
                "record evidence does not match the configured target kind".into(),
            )),
        }
    }

    fn verification_error(&self, record: &FoundRecord) -> EngineError {
        EngineError::Verification {
            worker: record.worker,
            offset: record.offset,
            endo: record.endo.selector(),
            negated: record.negated,
        }
    }
}

/// Complete a signature from a ground nonce. Returns the (possibly
/// normalized) nonce, r and s.
fn complete_signature(sig: &SignatureTarget, nonce: Scalar, r_point: Point) -> Result<(Scalar, Scalar, Scalar)> {
    if sig.schnorr {
        // BIP-340: the nonce commits to an even R.y.
        let (k, r_point) = if r_point.y.is_odd() {
            (nonce.neg(), r_point.negate())
        } else {
            (nonce, r_point)
        };
        let e = Scalar::from_bytes(&tagged_hash(
            "BIP0340/challenge",
            &[
                &r_point.x.to_bytes(),
                &sig.pubkey.x.to_bytes(),
                &sig.msg_hash.to_bytes(),
            ],
        ));
        // s = k + e*d, no modular inverse anywhere.
        let s = k.add(&e.mul(&sig.priv_key));
        Ok((k, Scalar::from_bytes(&r_point.x.to_bytes()), s))
    } else {
        // ECDSA: s = k^-1 (z + r*d), then canonical low-S.
        let r = Scalar::from_bytes(&r_point.x.to_bytes());
        if r.is_zero() {
            return Err(EngineError::Arithmetic("ECDSA r reduced to zero".into()));
        }
        let k_inv = nonce.invert();
        if k_inv.is_zero() {
            return Err(EngineError::Arithmetic("ECDSA nonce has no inverse".into()));
        }
        let mut s = k_inv.mul(&sig.msg_hash.add(&r.mul(&sig.priv_key)));
        if s.is_zero() {
            return Err(EngineError::Arithmetic("ECDSA s is zero".into()));
        }
        if s.is_high() {
            s = s.neg();
        }
        Ok((nonce, r, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::WorkerId;
    use crate::target::{AddressTarget, KeyMode, Mask256};

    fn record(
        worker: WorkerId,
        base: Scalar,
        offset: i64,
        endo: Endo,
        negated: bool,
        evidence: Evidence,
    ) -> FoundRecord {
        FoundRecord {
            worker,
            base_key: base,
            offset,
            endo,
            negated,
            compressed: true,
            evidence,
        }
    }

    #[test]
    fn reconstruction_covers_all_variants() {
        let base = Scalar::new([0x1111, 0x2222, 0x3333, 0x4444]);
        for offset in [-512i64, -1, 0, 1, 511] {
            for endo in Endo::ALL {
                for negated in [false, true] {
                    let k = reconstruct_key(&base, offset, endo, negated);
                    // Recreate the matched point independently.
                    let plain = public_key(&base.add_offset(offset));
                    let mut expect = match endo {
                        Endo::None => plain,
                        Endo::Lambda => plain.endo1(),
                        Endo::Lambda2 => plain.endo2(),
                    };
                    if negated {
                        expect = expect.negate();
                    }
                    assert_eq!(public_key(&k), expect, "offset {} endo {:?} neg {}", offset, endo, negated);
                }
            }
        }
    }

    #[test]
    fn mask_record_verifies_and_rejects_tampering() {
        let key = Scalar::from_u64(55555);
        let x = public_key(&key).x.to_bytes();
        let target = MatchTarget::Mask(Mask256::from_hex(&hex::encode(&x[..2]), None).unwrap());
        let r = Reconstructor::new(&target);

        let good = record(
            1,
            Scalar::from_u64(55000),
            555,
            Endo::None,
            false,
            Evidence::XCoordinate(x),
        );
        let found = r.process(&good).unwrap();
        assert_eq!(found.private_key, Some(key));

        // Off-by-one offset: the recomputed X no longer matches.
        let bad = record(
            1,
            Scalar::from_u64(55000),
            556,
            Endo::None,
            false,
            Evidence::XCoordinate(x),
        );
        assert!(matches!(
            r.process(&bad),
            Err(EngineError::Verification { offset: 556, .. })
        ));
    }

    #[test]
    fn address_record_roundtrip() {
        let key = Scalar::from_u64(987654321);
        let hash = hash160(&public_key(&key).to_compressed());
        let addr = hash160_to_address(AddressKind::P2pkh, &hash);
        let target = MatchTarget::Address(
            AddressTarget::new(&[addr.clone()], true, KeyMode::Compressed).unwrap(),
        );
        let r = Reconstructor::new(&target);

        let rec = record(
            0,
            Scalar::from_u64(987654000),
            321,
            Endo::None,
            false,
            Evidence::Address {
                hash160: hash,
                pattern_index: 0,
            },
        );
        let found = r.process(&rec).unwrap();
        assert_eq!(found.private_key, Some(key));
        match found.payload {
            FoundPayload::Address { address, wif, .. } => {
                assert_eq!(address, addr);
                assert_eq!(wif, to_wif(&key.to_bytes(), true));
            }
            other => panic!("wrong payload: {:?}", other),
        }
    }

    #[test]
    fn stale_base_key_is_caught() {
        // A record built against the wrong (advanced) base key must be
        // rejected, not delivered: this is the pipelined-retrieval bug
        // the explicit base_key field exists to prevent.
        let key = Scalar::from_u64(77777);
        let x = public_key(&key).x.to_bytes();
        let target = MatchTarget::Mask(Mask256::from_hex(&hex::encode(&x[..4]), None).unwrap());
        let r = Reconstructor::new(&target);

        let advanced_base = Scalar::from_u64(77000 + 1024);
        let rec = record(2, advanced_base, 777, Endo::None, false, Evidence::XCoordinate(x));
        assert!(r.process(&rec).is_err());
    }
}
