//! Grouped modular inversion (Montgomery's trick).
//!
//! One field inversion costs on the order of a hundred multiplications,
//! and the group walker needs one inverse per candidate pair. Batching N
//! independent inversions into prefix products turns that into a single
//! inversion plus ~3N multiplications, which is the throughput lever the
//! whole engine is built around.

use super::field::FieldElement;

/// Invert every element of `vals` into `out`.
///
/// `out` is also the scratch space for the prefix products, so no
/// allocation happens per call. Inputs must be nonzero: the walker only
/// ever feeds x-coordinate deltas of distinct points, which cannot
/// collide on a prime-order curve.
pub fn batch_invert_into(vals: &[FieldElement], out: &mut [FieldElement]) {
    let n = vals.len();
    assert!(out.len() >= n);
    if n == 0 {
        return;
    }
    debug_assert!(vals.iter().all(|v| !v.is_zero()), "zero fed to batch inverter");
    if n == 1 {
        out[0] = vals[0].inv();
        return;
    }

    // Forward sweep: out[i] = vals[0] * ... * vals[i].
    out[0] = vals[0];
    for i in 1..n {
        out[i] = out[i - 1].mul(&vals[i]);
    }

    // One real inversion for the whole batch.
    let mut acc = out[n - 1].inv();

    // Backward sweep: peel one factor per step.
    for i in (1..n).rev() {
        let prefix = out[i - 1];
        out[i] = acc.mul(&prefix);
        acc = acc.mul(&vals[i]);
    }
    out[0] = acc;
}

/// Allocating convenience wrapper.
pub fn batch_invert(vals: &[FieldElement]) -> Vec<FieldElement> {
    let mut out = vec![FieldElement::ZERO; vals.len()];
    batch_invert_into(vals, &mut out);
    out
}
