//! The 56-bit data arithmetic unit.
//!
//! Accumulator values are handled as sign-extended `i64`s holding 56 significant bits. The
//! register file stores them split into limbs (see [`Acc56`]).

use bitos::{BitUtils, bitos};
use util::{WORD_MASK, sign_extend};

/// Scaling mode, selected by SR bits 10 and 11.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scaling {
    #[default]
    None = 0b00,
    Down = 0b01,
    Up = 0b10,
    Reserved = 0b11,
}

/// Carry and overflow produced by an arithmetic operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Arith {
    pub carry: bool,
    pub overflow: bool,
}

impl std::ops::BitOr for Arith {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            carry: self.carry | rhs.carry,
            overflow: self.overflow | rhs.overflow,
        }
    }
}

const MASK: u64 = (1 << 56) - 1;

/// Wraps a value to 56 bits, sign extending bit 55.
#[inline(always)]
pub fn wrap(value: i64) -> i64 {
    sign_extend(56, value as u64)
}

/// An accumulator split into its `A2:A1:A0` limbs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Acc56 {
    pub low: u32,
    pub mid: u32,
    pub high: u8,
}

impl Acc56 {
    pub const MIN: i64 = -(1 << 55);

    pub fn from(value: i64) -> Self {
        Self {
            low: value.bits(0, 24) as u32,
            mid: value.bits(24, 48) as u32,
            high: value.bits(48, 56) as u8,
        }
    }

    /// A 24-bit word placed in the middle limb, sign extended into the high limb.
    pub fn from_word(word: u32) -> Self {
        let word = word & WORD_MASK;
        Self {
            low: 0,
            mid: word,
            high: if word.bit(23) { 0xFF } else { 0 },
        }
    }

    pub fn get(&self) -> i64 {
        let bits = 0u64
            .with_bits(0, 24, (self.low & WORD_MASK) as u64)
            .with_bits(24, 48, (self.mid & WORD_MASK) as u64)
            .with_bits(48, 56, self.high as u64);

        sign_extend(56, bits)
    }

    pub fn set(&mut self, value: i64) -> i64 {
        *self = Self::from(value);
        self.get()
    }

    /// Reads the accumulator as a 24-bit word through the data shifter and limiter.
    ///
    /// Returns the word and whether it saturated.
    pub fn limit(&self, scaling: Scaling) -> (u32, bool) {
        let high = self.high as u32;
        let mid = self.mid & WORD_MASK;

        let value = match scaling {
            Scaling::Down => ((high << 24) | mid) >> 1,
            Scaling::Up => ((high << 24) | mid) << 1 | (self.low >> 23) & 1,
            Scaling::None | Scaling::Reserved => (high << 24) | mid,
        } & WORD_MASK;

        let fits = match self.high {
            0x00 => value <= 0x7F_FFFF,
            0xFF => value >= 0x80_0000,
            _ => false,
        };

        if fits {
            (value, false)
        } else if self.high.bit(7) {
            (0x80_0000, true)
        } else {
            (0x7F_FFFF, true)
        }
    }
}

/// `dest + source`.
pub fn add(dest: i64, source: i64) -> (i64, Arith) {
    let sum = (dest as u64 & MASK) + (source as u64 & MASK);
    let result = wrap(sum as i64);

    let (d, s, r) = (dest < 0, source < 0, result < 0);
    let arith = Arith {
        carry: sum.bit(56),
        overflow: (s != r) && (d != r),
    };

    (result, arith)
}

/// `dest - source`. Carry is the borrow.
pub fn sub(dest: i64, source: i64) -> (i64, Arith) {
    let diff = (dest as u64 & MASK).wrapping_sub(source as u64 & MASK);
    let result = wrap(diff as i64);

    let (d, s, r) = (dest < 0, source < 0, result < 0);
    let arith = Arith {
        carry: diff.bit(56),
        overflow: (s != d) && (r != d),
    };

    (result, arith)
}

/// `|value|`. Also returns whether `value` was the most negative value.
pub fn abs(value: i64) -> (i64, bool) {
    let overflowed = value == Acc56::MIN;
    if value < 0 {
        (sub(0, value).0, overflowed)
    } else {
        (value, overflowed)
    }
}

/// `-value`. Also returns whether `value` was the most negative value.
pub fn neg(value: i64) -> (i64, bool) {
    (sub(0, value).0, value == Acc56::MIN)
}

/// Arithmetic shift left by `n` bits.
pub fn asl(value: i64, n: u32) -> (i64, Arith) {
    if n == 0 {
        return (value, Arith::default());
    }

    let wide = (value as i128) << n;
    let result = wrap(wide as i64);

    let arith = Arith {
        carry: (wide >> 56) & 1 != 0,
        overflow: wide != result as i128,
    };

    (result, arith)
}

/// Arithmetic shift right by `n` bits. Never overflows.
pub fn asr(value: i64, n: u32) -> (i64, Arith) {
    if n == 0 {
        return (value, Arith::default());
    }

    let n = n.min(63);
    let arith = Arith {
        carry: (value >> (n - 1)) & 1 != 0,
        overflow: false,
    };

    (value >> n, arith)
}

/// Signed fractional 24x24 multiply.
pub fn mul(lhs: u32, rhs: u32, negate: bool) -> i64 {
    let product = (util::sext24(lhs) as i64 * util::sext24(rhs) as i64) << 1;
    if negate {
        wrap(-product)
    } else {
        product
    }
}

/// Convergent rounding to the middle limb, according to the scaling mode.
pub fn round(value: i64, scaling: Scaling) -> i64 {
    match scaling {
        Scaling::Down | Scaling::Reserved => {
            let mut acc = Acc56::from(add(value, 1 << 24).0);
            if acc.low == 0 && !acc.mid.bit(0) {
                acc.mid &= 0xFF_FFFC;
            }

            acc.mid &= 0xFF_FFFE;
            acc.low = 0;
            acc.get()
        }
        Scaling::Up => {
            let mut acc = Acc56::from(add(value, 1 << 22).0);
            if acc.low & 0x7F_FFFF == 0 {
                acc.low = 0;
            }

            acc.low &= 0x80_0000;
            acc.get()
        }
        Scaling::None => {
            let mut acc = Acc56::from(add(value, 1 << 23).0);
            if acc.low == 0 {
                acc.mid &= 0xFF_FFFE;
            }

            acc.low = 0;
            acc.get()
        }
    }
}

/// Whether the value uses the extension limb, i.e. the E flag.
pub fn extension(value: i64, scaling: Scaling) -> bool {
    let top = match scaling {
        Scaling::None => value >> 47,
        Scaling::Down => value >> 48,
        Scaling::Up => value >> 46,
        Scaling::Reserved => return false,
    };

    top != 0 && top != -1
}

/// Whether the value is unnormalized, i.e. the U flag.
pub fn unnormalized(value: i64, scaling: Scaling) -> bool {
    let bits = match scaling {
        Scaling::None => (value >> 46) & 0b11,
        Scaling::Down => (value >> 47) & 0b11,
        Scaling::Up => (value >> 45) & 0b11,
        Scaling::Reserved => return false,
    };

    bits == 0b00 || bits == 0b11
}
