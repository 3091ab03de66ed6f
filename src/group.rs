//! Batched candidate generation.
//!
//! A worker walks the key space in groups: around a center key k0 it
//! produces every point (k0 + i)*G for i in [-half, half-1] from a
//! single batch inversion, then advances the center by the group size
//! with one more addition. The trick is that +i*G and -i*G differ only
//! in the sign of Y, so one x-delta inverse serves both sides, and the
//! advancement step shares the same inversion batch.

use crate::math::{batch_invert_into, FieldElement, Point, Scalar, G};

/// Default group size; even, and every offset fits an i64.
pub const DEFAULT_GROUP_SIZE: usize = 1024;

/// Precomputed multiples of the generator, built once at engine setup
/// and shared read-only by every worker.
pub struct GeneratorTable {
    /// gx[i], gy[i] = coordinates of (i+1)*G for i in 0..half.
    gx: Vec<FieldElement>,
    gy: Vec<FieldElement>,
    /// group_size * G, the per-batch advancement step.
    step: Point,
    group_size: usize,
}

impl GeneratorTable {
    pub fn new(group_size: usize) -> Self {
        assert!(
            group_size >= 4 && group_size % 2 == 0,
            "group size must be even and at least 4"
        );
        let half = group_size / 2;
        let mut gx = Vec::with_capacity(half);
        let mut gy = Vec::with_capacity(half);

        let mut p = G;
        for _ in 0..half {
            gx.push(p.x);
            gy.push(p.y);
            p = p.add(&G);
        }

        // (half)*G doubled = group_size * G.
        let last = Point::new(gx[half - 1], gy[half - 1]);
        let step = last.double();

        Self {
            gx,
            gy,
            step,
            group_size,
        }
    }

    #[inline]
    pub fn group_size(&self) -> usize {
        self.group_size
    }

    #[inline]
    pub fn half(&self) -> usize {
        self.group_size / 2
    }
}

/// One batch of candidate points, reused between iterations.
pub struct CandidateGroup {
    pub points: Vec<Point>,
    /// Center key the batch was generated from.
    pub base: Scalar,
    half: usize,
}

impl CandidateGroup {
    pub fn new(group_size: usize) -> Self {
        Self {
            points: vec![Point::INFINITY; group_size],
            base: Scalar::ZERO,
            half: group_size / 2,
        }
    }

    /// Signed key offset of slot `index`: the candidate key is
    /// `base + offset(index)`.
    #[inline]
    pub fn offset(&self, index: usize) -> i64 {
        index as i64 - self.half as i64
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Walks the key space one group at a time around a moving center key.
pub struct GroupWalker<'a> {
    table: &'a GeneratorTable,
    base: Scalar,
    center: Point,
    dx: Vec<FieldElement>,
    dx_inv: Vec<FieldElement>,
}

impl<'a> GroupWalker<'a> {
    /// One full scalar multiplication here; everything after is batched
    /// additions.
    pub fn new(table: &'a GeneratorTable, base: Scalar) -> Self {
        let center = crate::math::public_key(&base);
        Self::with_center(table, base, center)
    }

    /// Start from an already-computed center point (rekey fast path for
    /// callers that track points themselves).
    pub fn with_center(table: &'a GeneratorTable, base: Scalar, center: Point) -> Self {
        let half = table.half();
        Self {
            table,
            base,
            center,
            dx: vec![FieldElement::ZERO; half + 1],
            dx_inv: vec![FieldElement::ZERO; half + 1],
        }
    }

    #[inline]
    pub fn base(&self) -> Scalar {
        self.base
    }

    #[inline]
    pub fn center(&self) -> Point {
        self.center
    }

    /// Reset to a new base key (rekey).
    pub fn rekey(&mut self, base: Scalar) {
        self.base = base;
        self.center = crate::math::public_key(&base);
    }

    /// Fill `out` with the points for offsets [-half, half-1] and
    /// advance this walker by one group.
    ///
    /// dx layout: entries 0..half-1 serve the paired additions
    /// center ± (i+1)*G, entry half-1 doubles as the low-edge point
    /// (offset -half), entry half serves the advancement step. One
    /// batch inversion covers all of them.
    pub fn fill(&mut self, out: &mut CandidateGroup) {
        let table = self.table;
        let half = table.half();
        debug_assert_eq!(out.points.len(), table.group_size());

        let (cx, cy) = (self.center.x, self.center.y);
        debug_assert!(!self.center.is_infinity(), "walker center at infinity");

        for i in 0..half {
            self.dx[i] = table.gx[i].sub(&cx);
        }
        self.dx[half] = table.step.x.sub(&cx);

        batch_invert_into(&self.dx, &mut self.dx_inv);

        out.base = self.base;
        out.points[half] = self.center;

        // Paired offsets +(i+1) and -(i+1) share dx_inv[i].
        for i in 0..half - 1 {
            let gx = &table.gx[i];
            let gy = &table.gy[i];
            let inv = &self.dx_inv[i];

            // P = center + (i+1)*G
            let s = gy.sub(&cy).mul(inv);
            let x3 = s.sqr().sub(&cx).sub(gx);
            let y3 = s.mul(&cx.sub(&x3)).sub(&cy);
            out.points[half + 1 + i] = Point::new(x3, y3);

            // P = center - (i+1)*G; -(i+1)*G is (gx, -gy).
            let s = gy.neg().sub(&cy).mul(inv);
            let x3 = s.sqr().sub(&cx).sub(gx);
            let y3 = s.mul(&cx.sub(&x3)).sub(&cy);
            out.points[half - 1 - i] = Point::new(x3, y3);
        }

        // Low edge: center - half*G.
        {
            let gx = &table.gx[half - 1];
            let gy = &table.gy[half - 1];
            let s = gy.neg().sub(&cy).mul(&self.dx_inv[half - 1]);
            let x3 = s.sqr().sub(&cx).sub(gx);
            let y3 = s.mul(&cx.sub(&x3)).sub(&cy);
            out.points[0] = Point::new(x3, y3);
        }

        // Next center: center + group_size*G, reusing dx_inv[half].
        {
            let sx = &table.step.x;
            let sy = &table.step.y;
            let s = sy.sub(&cy).mul(&self.dx_inv[half]);
            let x3 = s.sqr().sub(&cx).sub(sx);
            let y3 = s.mul(&cx.sub(&x3)).sub(&cy);
            self.center = Point::new(x3, y3);
        }
        self.base = self.base.add(&Scalar::from_u64(table.group_size() as u64));
    }
}
