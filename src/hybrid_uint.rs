//! Hybrid integer representation.
//!
//! Large values are split into an entropy-coded token carrying the
//! magnitude class plus a few literal bits, and a run of raw bits stored
//! outside the entropy coder. Small values fit entirely in the token.

use crate::error::{Error, Result};

/// One entropy-coded symbol: a context index and the value to represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Context the token is coded in.
    pub context: u32,
    /// Unsigned value.
    pub value: u32,
}

impl Token {
    /// Convenience constructor.
    #[inline]
    #[must_use]
    pub fn new(context: usize, value: u32) -> Self {
        Self { context: context as u32, value }
    }
}

/// How values split between token and raw bits.
///
/// Values below `1 << split_exponent` are stored verbatim in the token.
/// Above that, the token holds the bit length class, the `msb_in_token`
/// bits after the leading one, and the `lsb_in_token` lowest bits; the
/// remaining middle bits go to the raw-bits stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HybridUintConfig {
    split_exponent: u32,
    msb_in_token: u32,
    lsb_in_token: u32,
}

impl Default for HybridUintConfig {
    fn default() -> Self {
        Self { split_exponent: 4, msb_in_token: 1, lsb_in_token: 0 }
    }
}

impl HybridUintConfig {
    /// Validated constructor.
    pub fn new(split_exponent: u32, msb_in_token: u32, lsb_in_token: u32) -> Result<Self> {
        if split_exponent > 31
            || msb_in_token > 3
            || lsb_in_token > 3
            || msb_in_token + lsb_in_token > split_exponent
        {
            return Err(Error::InvalidHistogram { reason: "hybrid uint config out of range" });
        }
        Ok(Self { split_exponent, msb_in_token, lsb_in_token })
    }

    /// Split exponent.
    #[inline]
    #[must_use]
    pub fn split_exponent(&self) -> u32 {
        self.split_exponent
    }

    /// Bits after the leading one kept in the token.
    #[inline]
    #[must_use]
    pub fn msb_in_token(&self) -> u32 {
        self.msb_in_token
    }

    /// Low bits kept in the token.
    #[inline]
    #[must_use]
    pub fn lsb_in_token(&self) -> u32 {
        self.lsb_in_token
    }

    /// Splits `value` into `(token, nbits, bits)` where `bits` holds the
    /// `nbits` raw bits to store outside the entropy coder.
    #[inline]
    #[must_use]
    pub fn encode(&self, value: u32) -> (u32, u32, u32) {
        let split = 1u32 << self.split_exponent;
        if value < split {
            return (value, 0, 0);
        }
        let n = 31 - value.leading_zeros();
        let m = value - (1 << n);
        let token = split
            + ((n - self.split_exponent) << (self.msb_in_token + self.lsb_in_token))
            + ((m >> (n - self.msb_in_token)) << self.lsb_in_token)
            + (m & ((1 << self.lsb_in_token) - 1));
        let nbits = n - self.msb_in_token - self.lsb_in_token;
        let bits = (value >> self.lsb_in_token) & ((1u32 << nbits) - 1);
        (token, nbits, bits)
    }

    /// Number of raw bits a decoded token calls for, or an error for a
    /// token implying a value past 32 bits.
    #[inline]
    pub fn nbits_for_token(&self, token: u32) -> Result<u32> {
        let split = 1u32 << self.split_exponent;
        if token < split {
            return Ok(0);
        }
        let in_token = self.msb_in_token + self.lsb_in_token;
        let nbits = self.split_exponent - in_token + ((token - split) >> in_token);
        // The leading one sits at bit `nbits + in_token`; past 31 the
        // value no longer fits 32 bits.
        if nbits + in_token > 31 {
            return Err(Error::StreamCorruption { reason: "hybrid uint token too large" });
        }
        Ok(nbits)
    }

    /// Reassembles the value from a token and its raw bits.
    #[inline]
    #[must_use]
    pub fn merge(&self, token: u32, bits: u32) -> u32 {
        let split = 1u32 << self.split_exponent;
        if token < split {
            return token;
        }
        let in_token = self.msb_in_token + self.lsb_in_token;
        let t = token - split;
        let nbits = self.split_exponent - in_token + (t >> in_token);
        let low = t & ((1 << self.lsb_in_token) - 1);
        let msbs = (t >> self.lsb_in_token) & ((1 << self.msb_in_token) - 1);
        let high = (1 << self.msb_in_token) | msbs;
        (((high << nbits) | bits) << self.lsb_in_token) | low
    }
}

/// Maps a signed value to unsigned: non-negatives to evens, negatives to
/// odds, preserving magnitude order.
#[inline]
#[must_use]
pub fn pack_signed(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`pack_signed`].
#[inline]
#[must_use]
pub fn unpack_signed(value: u32) -> i32 {
    (value >> 1) as i32 ^ -((value & 1) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_small_values_stay_in_token() {
        let cfg = HybridUintConfig::default();
        for v in 0..16 {
            assert_eq!(cfg.encode(v), (v, 0, 0));
        }
    }

    #[test]
    fn test_known_split() {
        let cfg = HybridUintConfig::default();
        // 300 = 0b100101100: class 8, msb-after-leading-one 0, 7 raw bits.
        assert_eq!(cfg.encode(300), (24, 7, 44));
        assert_eq!(cfg.merge(24, 44), 300);
        assert_eq!(cfg.nbits_for_token(24).unwrap(), 7);
    }

    #[test]
    fn test_oversized_token_rejected() {
        let cfg = HybridUintConfig::default();
        // Token class implying more than 29 raw bits.
        let bad = 16 + (31 << 1);
        assert!(cfg.nbits_for_token(bad).is_err());
    }

    #[test]
    fn test_pack_signed_mapping() {
        assert_eq!(pack_signed(0), 0);
        assert_eq!(pack_signed(-1), 1);
        assert_eq!(pack_signed(1), 2);
        assert_eq!(pack_signed(-2), 3);
        assert_eq!(pack_signed(2), 4);
        assert_eq!(pack_signed(i32::MIN), u32::MAX);
    }

    proptest! {
        #[test]
        fn prop_encode_merge_roundtrip(value: u32, split in 1u32..=20, msb in 0u32..=2, lsb in 0u32..=2) {
            prop_assume!(msb + lsb <= split);
            let cfg = HybridUintConfig::new(split, msb, lsb).unwrap();
            let (token, nbits, bits) = cfg.encode(value);
            prop_assert!(bits < (1u64 << nbits) as u32 || nbits == 0);
            prop_assert_eq!(cfg.nbits_for_token(token).unwrap(), nbits);
            prop_assert_eq!(cfg.merge(token, bits), value);
        }

        #[test]
        fn prop_pack_signed_roundtrip(value: i32) {
            prop_assert_eq!(unpack_signed(pack_signed(value)), value);
        }
    }
}
