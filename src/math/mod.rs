//! Fixed-width secp256k1 arithmetic.
//!
//! Two 256-bit integer types share the same limb layout but never a
//! modulus: [`FieldElement`] reduces modulo the field prime p,
//! [`Scalar`] modulo the curve order n. Crossing the two without an
//! explicit byte round trip is a bug; every operation that combines two
//! full-width residues goes through the wide-product-then-reduce path of
//! its own type.

pub mod batch;
pub mod field;
pub mod point;
pub mod scalar;

pub use batch::{batch_invert, batch_invert_into};
pub use field::FieldElement;
pub use point::{public_key, Point, BETA, BETA2, G, LAMBDA, LAMBDA2};
pub use scalar::Scalar;

/// Schoolbook 256x256 -> 512-bit multiply, shared by both reductions.
#[inline]
pub(crate) fn mul_wide(a: &[u64; 4], b: &[u64; 4]) -> [u64; 8] {
    let mut t = [0u64; 8];
    for i in 0..4 {
        let mut carry = 0u128;
        for j in 0..4 {
            let prod = (a[i] as u128) * (b[j] as u128) + (t[i + j] as u128) + carry;
            t[i + j] = prod as u64;
            carry = prod >> 64;
        }
        t[i + 4] = carry as u64;
    }
    t
}
