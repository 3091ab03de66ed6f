//! Scalar arithmetic modulo the secp256k1 group order
//! n = 0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141.
//!
//! Private keys, offsets and signature values live here. A scalar product
//! is a 512-bit number; truncating it instead of reducing it modulo n
//! yields a silently wrong residue, so every multiply goes through
//! `reduce_wide`.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use super::mul_wide;

/// The group order, little-endian limbs.
pub const N: [u64; 4] = [
    0xBFD25E8CD0364141,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0xFFFFFFFFFFFFFFFF,
];

/// n / 2, the low-S boundary.
const N_HALF: [u64; 4] = [
    0xDFE92F46681B20A0,
    0x5D576E7357A4501D,
    0xFFFFFFFFFFFFFFFF,
    0x7FFFFFFFFFFFFFFF,
];

/// 2^256 mod n = 0x14551231950B75FC4402DA1732FC9BEBF, the folding
/// constant for wide reduction.
const FOLD: [u64; 4] = [0x402DA1732FC9BEBF, 0x4551231950B75FC4, 0x1, 0];

/// n - 2, the Fermat inversion exponent.
const N_MINUS_2: [u64; 4] = [
    0xBFD25E8CD036413F,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0xFFFFFFFFFFFFFFFF,
];

/// An integer modulo n, four 64-bit little-endian limbs, always reduced.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scalar {
    pub d: [u64; 4],
}

impl Scalar {
    pub const ZERO: Self = Self { d: [0, 0, 0, 0] };
    pub const ONE: Self = Self { d: [1, 0, 0, 0] };

    #[inline]
    pub const fn new(d: [u64; 4]) -> Self {
        Self { d }
    }

    #[inline]
    pub const fn from_u64(v: u64) -> Self {
        Self { d: [v, 0, 0, 0] }
    }

    /// Interpret 32 big-endian bytes, reducing modulo n.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let mut d = [0u64; 4];
        for i in 0..4 {
            let o = (3 - i) * 8;
            d[i] = u64::from_be_bytes(bytes[o..o + 8].try_into().unwrap());
        }
        let mut s = Self { d };
        while s.gte_n() {
            s.sub_n();
        }
        s
    }

    #[inline]
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for i in 0..4 {
            let o = (3 - i) * 8;
            bytes[o..o + 8].copy_from_slice(&self.d[i].to_be_bytes());
        }
        bytes
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.d == [0, 0, 0, 0]
    }

    /// True when the value exceeds n/2 (a "high" signature s).
    pub fn is_high(&self) -> bool {
        for i in (0..4).rev() {
            if self.d[i] > N_HALF[i] {
                return true;
            }
            if self.d[i] < N_HALF[i] {
                return false;
            }
        }
        true
    }

    pub fn add(&self, other: &Self) -> Self {
        let mut r = [0u64; 4];
        let mut carry = 0u64;
        for i in 0..4 {
            let (s, c1) = self.d[i].overflowing_add(other.d[i]);
            let (s, c2) = s.overflowing_add(carry);
            r[i] = s;
            carry = (c1 as u64) + (c2 as u64);
        }
        let mut out = Self { d: r };
        if carry != 0 || out.gte_n() {
            out.sub_n();
        }
        out
    }

    pub fn sub(&self, other: &Self) -> Self {
        let mut r = [0u64; 4];
        let mut borrow = 0u64;
        for i in 0..4 {
            let (s, b1) = self.d[i].overflowing_sub(other.d[i]);
            let (s, b2) = s.overflowing_sub(borrow);
            r[i] = s;
            borrow = (b1 as u64) + (b2 as u64);
        }
        let mut out = Self { d: r };
        if borrow != 0 {
            out.add_n();
        }
        out
    }

    pub fn neg(&self) -> Self {
        if self.is_zero() {
            return *self;
        }
        let mut r = [0u64; 4];
        let mut borrow = 0u64;
        for i in 0..4 {
            let (s, b1) = N[i].overflowing_sub(self.d[i]);
            let (s, b2) = s.overflowing_sub(borrow);
            r[i] = s;
            borrow = (b1 as u64) + (b2 as u64);
        }
        Self { d: r }
    }

    /// Full 512-bit product reduced modulo n.
    pub fn mul(&self, other: &Self) -> Self {
        let t = mul_wide(&self.d, &other.d);
        Self::reduce_wide(t)
    }

    /// Reduce a 512-bit value modulo n by repeatedly folding the high
    /// half: hi*2^256 + lo == hi*FOLD + lo (mod n). FOLD is 129 bits, so
    /// the high half shrinks by ~127 bits per round and the loop
    /// terminates within four rounds.
    fn reduce_wide(t: [u64; 8]) -> Self {
        let mut lo = [t[0], t[1], t[2], t[3]];
        let mut hi = [t[4], t[5], t[6], t[7]];

        while hi != [0, 0, 0, 0] {
            let prod = mul_wide(&hi, &FOLD);
            let mut carry = 0u64;
            for i in 0..4 {
                let (s, c1) = prod[i].overflowing_add(lo[i]);
                let (s, c2) = s.overflowing_add(carry);
                lo[i] = s;
                carry = (c1 as u64) + (c2 as u64);
            }
            hi = [prod[4], prod[5], prod[6], prod[7]];
            let mut i = 0;
            while carry != 0 && i < 4 {
                let (s, c) = hi[i].overflowing_add(carry);
                hi[i] = s;
                carry = c as u64;
                i += 1;
            }
        }

        let mut out = Self { d: lo };
        while out.gte_n() {
            out.sub_n();
        }
        out
    }

    /// Modular exponentiation, square-and-multiply over a 256-bit
    /// exponent given as little-endian limbs.
    fn pow(&self, exp: &[u64; 4]) -> Self {
        let mut acc = Self::ONE;
        for i in (0..4).rev() {
            for bit in (0..64).rev() {
                acc = acc.mul(acc);
                if (exp[i] >> bit) & 1 == 1 {
                    acc = acc.mul(*self);
                }
            }
        }
        acc
    }

    /// Modular inverse via Fermat: a^(n-2). Zero maps to zero; callers
    /// must treat a zero result as "no inverse exists".
    pub fn invert(&self) -> Self {
        if self.is_zero() {
            return Self::ZERO;
        }
        self.pow(&N_MINUS_2)
    }

    /// Add a signed group offset, the reconstruction primitive.
    pub fn add_offset(&self, offset: i64) -> Self {
        if offset >= 0 {
            self.add(&Self::from_u64(offset as u64))
        } else {
            self.sub(&Self::from_u64(offset.unsigned_abs()))
        }
    }

    #[inline]
    fn gte_n(&self) -> bool {
        for i in (0..4).rev() {
            if self.d[i] > N[i] {
                return true;
            }
            if self.d[i] < N[i] {
                return false;
            }
        }
        true
    }

    #[inline]
    fn sub_n(&mut self) {
        let mut borrow = 0u64;
        for i in 0..4 {
            let (s, b1) = self.d[i].overflowing_sub(N[i]);
            let (s, b2) = s.overflowing_sub(borrow);
            self.d[i] = s;
            borrow = (b1 as u64) + (b2 as u64);
        }
    }

    #[inline]
    fn add_n(&mut self) {
        let mut carry = 0u64;
        for i in 0..4 {
            let (s, c1) = self.d[i].overflowing_add(N[i]);
            let (s, c2) = s.overflowing_add(carry);
            self.d[i] = s;
            carry = (c1 as u64) + (c2 as u64);
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..4).rev() {
            match self.d[i].cmp(&other.d[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar(0x{})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl Add for Scalar {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Scalar::add(&self, &other)
    }
}

impl Sub for Scalar {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Scalar::sub(&self, &other)
    }
}

impl Mul for Scalar {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        Scalar::mul(&self, &other)
    }
}

impl Neg for Scalar {
    type Output = Self;
    fn neg(self) -> Self {
        Scalar::neg(&self)
    }
}
