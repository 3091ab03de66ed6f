//! The worker -> coordinator wire format.
//!
//! A hit is a typed record, not a packed integer: the endomorphism
//! selector, the symmetry flag and — critically — the base key that was
//! active when the batch producing this hit was generated all travel as
//! explicit fields. Accelerator workers retrieve results one batch after
//! submitting them, by which time their visible keys have advanced; the
//! record carrying its own base key makes that timing gap harmless.

use crate::math::Scalar;

/// Worker identifier; accelerator workers are offset so logs
/// distinguish them from CPU workers.
pub type WorkerId = u32;

/// Base of the accelerator worker id range.
pub const DEVICE_WORKER_BASE: WorkerId = 0x80;

/// Which endomorphism image produced the hit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Endo {
    /// The point itself.
    None,
    /// (beta*x, y): key multiplies by lambda.
    Lambda,
    /// (beta^2*x, y): key multiplies by lambda^2.
    Lambda2,
}

impl Endo {
    pub const ALL: [Endo; 3] = [Endo::None, Endo::Lambda, Endo::Lambda2];

    pub fn selector(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Lambda => 1,
            Self::Lambda2 => 2,
        }
    }
}

/// What the predicate actually observed, kept for independent
/// re-verification on the consumer side.
#[derive(Clone, Debug)]
pub enum Evidence {
    /// Address mode: the candidate hash160 and the index of the user
    /// pattern it satisfied.
    Address {
        hash160: [u8; 20],
        pattern_index: usize,
    },
    /// Mask mode: the matched X-coordinate.
    XCoordinate([u8; 32]),
    /// Signature mode: the matched R.x.
    NonceX([u8; 32]),
    /// Txid mode: the nonce and the display-order transaction id.
    Txid { nonce: u64, txid: [u8; 32] },
}

/// A single predicate hit, write-once by a worker, read-once by the
/// coordinator.
#[derive(Clone, Debug)]
pub struct FoundRecord {
    pub worker: WorkerId,
    /// Center key of the candidate group this hit came from, captured
    /// at generation time.
    pub base_key: Scalar,
    /// Signed slot offset within the group.
    pub offset: i64,
    pub endo: Endo,
    /// The symmetric point (x, -y) matched; the key negates.
    pub negated: bool,
    /// Which serialization was hashed (address mode only).
    pub compressed: bool,
    pub evidence: Evidence,
}

impl FoundRecord {
    /// Found-flag slot this record satisfies.
    pub fn pattern_index(&self) -> usize {
        match &self.evidence {
            Evidence::Address { pattern_index, .. } => *pattern_index,
            _ => 0,
        }
    }
}
