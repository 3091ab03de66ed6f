//! Affine secp256k1 point operations.
//!
//! Everything stays in affine coordinates: the group walker amortizes the
//! per-addition field inversion across a whole batch, so projective
//! coordinates would buy nothing here. The endomorphism maps turn one
//! computed point into three usable X-coordinates for the price of a
//! field multiplication each.

use super::field::FieldElement;
use super::scalar::Scalar;

/// Generator X.
const GX: FieldElement = FieldElement::new([
    0x59F2815B16F81798,
    0x029BFCDB2DCE28D9,
    0x55A06295CE870B07,
    0x79BE667EF9DCBBAC,
]);

/// Generator Y.
const GY: FieldElement = FieldElement::new([
    0x9C47D08FFB10D4B8,
    0xFD17B448A6855419,
    0x5DA4FBFC0E1108A8,
    0x483ADA7726A3C465,
]);

/// The curve generator.
pub const G: Point = Point {
    x: GX,
    y: GY,
    infinity: false,
};

/// Endomorphism constant: beta^3 = 1 mod p. (beta*x, y) multiplies the
/// discrete log by lambda.
pub const BETA: FieldElement = FieldElement::new([
    0xC1396C28719501EE,
    0x9CF0497512F58995,
    0x6E64479EAC3434E9,
    0x7AE96A2B657C0710,
]);

/// beta^2 = beta^-1 mod p.
pub const BETA2: FieldElement = FieldElement::new([
    0x3EC693D68E6AFA40,
    0x630FB68AED0A766A,
    0x919BB86153CBCB16,
    0x851695D49A83F8EF,
]);

/// Endomorphism scalar: lambda^3 = 1 mod n.
pub const LAMBDA: Scalar = Scalar::new([
    0xDF02967C1B23BD72,
    0x122E22EA20816678,
    0xA5261C028812645A,
    0x5363AD4CC05C30E0,
]);

/// lambda^2 = lambda^-1 mod n.
pub const LAMBDA2: Scalar = Scalar::new([
    0xE0CFC810B51283CE,
    0xA880B9FC8EC739C2,
    0x5AD9E3FD77ED9BA4,
    0xAC9C52B33FA3CF1F,
]);

/// An affine curve point; `infinity` is the group identity sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Point {
    pub x: FieldElement,
    pub y: FieldElement,
    pub infinity: bool,
}

impl Point {
    pub const INFINITY: Self = Self {
        x: FieldElement::ZERO,
        y: FieldElement::ZERO,
        infinity: true,
    };

    #[inline]
    pub const fn new(x: FieldElement, y: FieldElement) -> Self {
        Self {
            x,
            y,
            infinity: false,
        }
    }

    #[inline]
    pub fn is_infinity(&self) -> bool {
        self.infinity
    }

    /// y^2 == x^3 + 7, or the identity.
    pub fn is_on_curve(&self) -> bool {
        if self.infinity {
            return true;
        }
        let seven = FieldElement::new([7, 0, 0, 0]);
        self.y.sqr() == self.x.sqr().mul(&self.x).add(&seven)
    }

    pub fn negate(&self) -> Self {
        if self.infinity {
            return *self;
        }
        Self::new(self.x, self.y.neg())
    }

    /// Tangent doubling; one field inversion.
    pub fn double(&self) -> Self {
        if self.infinity || self.y.is_zero() {
            return Self::INFINITY;
        }
        // s = 3x^2 / 2y
        let x_sq = self.x.sqr();
        let num = x_sq.add(&x_sq).add(&x_sq);
        let den = self.y.add(&self.y);
        let s = num.mul(&den.inv());
        let x3 = s.sqr().sub(&self.x).sub(&self.x);
        let y3 = s.mul(&self.x.sub(&x3)).sub(&self.y);
        Self::new(x3, y3)
    }

    /// Chord addition; one field inversion.
    pub fn add(&self, other: &Self) -> Self {
        if self.infinity {
            return *other;
        }
        if other.infinity {
            return *self;
        }
        if self.x == other.x {
            if self.y == other.y {
                return self.double();
            }
            return Self::INFINITY;
        }
        let s = other.y.sub(&self.y).mul(&other.x.sub(&self.x).inv());
        let x3 = s.sqr().sub(&self.x).sub(&other.x);
        let y3 = s.mul(&self.x.sub(&x3)).sub(&self.y);
        Self::new(x3, y3)
    }

    /// Double-and-add scalar multiplication. Not batch-friendly; used for
    /// table building, reconstruction and verification, never in the hot
    /// candidate loop.
    pub fn mul(&self, k: &Scalar) -> Self {
        let mut acc = Self::INFINITY;
        for i in (0..4).rev() {
            for bit in (0..64).rev() {
                acc = acc.double();
                if (k.d[i] >> bit) & 1 == 1 {
                    acc = acc.add(self);
                }
            }
        }
        acc
    }

    /// First endomorphism: (beta*x, y) = lambda * P.
    #[inline]
    pub fn endo1(&self) -> Self {
        if self.infinity {
            return *self;
        }
        Self::new(self.x.mul(&BETA), self.y)
    }

    /// Second endomorphism: (beta^2*x, y) = lambda^2 * P.
    #[inline]
    pub fn endo2(&self) -> Self {
        if self.infinity {
            return *self;
        }
        Self::new(self.x.mul(&BETA2), self.y)
    }

    /// Compressed SEC1 serialization (33 bytes).
    pub fn to_compressed(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out[0] = if self.y.is_odd() { 0x03 } else { 0x02 };
        out[1..33].copy_from_slice(&self.x.to_bytes());
        out
    }

    /// Uncompressed SEC1 serialization (65 bytes).
    pub fn to_uncompressed(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&self.x.to_bytes());
        out[33..65].copy_from_slice(&self.y.to_bytes());
        out
    }
}

/// Public key for a private scalar: k*G.
#[inline]
pub fn public_key(k: &Scalar) -> Point {
    G.mul(k)
}
