/// Mask of a 24-bit DSP word.
pub const WORD_MASK: u32 = 0xFF_FFFF;

/// Returns a `Box<[T; LEN]>` filled with `elem`.
#[inline(always)]
pub fn boxed_array<T: Clone, const LEN: usize>(elem: T) -> Box<[T; LEN]> {
    let Ok(array) = vec![elem; LEN].into_boxed_slice().try_into() else {
        unreachable!("boxed slice has exactly LEN elements")
    };

    array
}

/// Sign extends the low `bits` bits of `value`.
#[inline(always)]
pub const fn sign_extend(bits: u32, value: u64) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Sign extends a 24-bit word into 32 bits.
#[inline(always)]
pub const fn sext24(value: u32) -> i32 {
    sign_extend(24, value as u64) as i32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(9, 0x100), -256);
        assert_eq!(sign_extend(9, 0x0FF), 255);
        assert_eq!(sext24(0x80_0000), -0x80_0000);
        assert_eq!(sext24(0x7F_FFFF), 0x7F_FFFF);
    }

    #[test]
    fn boxed() {
        let array = boxed_array::<u32, 16>(7);
        assert!(array.iter().all(|v| *v == 7));
    }
}
