//! LSB-first bit I/O.
//!
//! Within each byte the first bit written occupies the least significant
//! position, and multi-bit values are stored low bits first. There is no
//! byte stuffing; the payloads these streams live in are length-prefixed.

use crate::error::{Error, Result};

/// Accumulating bit writer.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    acc_bits: u32,
}

impl BitWriter {
    /// Empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the low `nbits` of `bits`.
    #[inline]
    pub fn write(&mut self, nbits: u32, bits: u32) {
        debug_assert!(nbits <= 32);
        debug_assert!(nbits == 32 || bits < (1u32 << nbits).max(1));
        self.acc |= u64::from(bits) << self.acc_bits;
        self.acc_bits += nbits;
        while self.acc_bits >= 8 {
            self.bytes.push(self.acc as u8);
            self.acc >>= 8;
            self.acc_bits -= 8;
        }
    }

    /// Number of bits written so far.
    #[inline]
    #[must_use]
    pub fn bits_written(&self) -> usize {
        self.bytes.len() * 8 + self.acc_bits as usize
    }

    /// Zero-pads to a byte boundary and returns the bytes.
    #[must_use]
    pub fn finalize(mut self) -> Vec<u8> {
        if self.acc_bits > 0 {
            self.bytes.push(self.acc as u8);
        }
        self.bytes
    }
}

/// Forward reader over a finished bit stream.
#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    acc: u64,
    acc_bits: u32,
}

impl<'a> BitReader<'a> {
    /// Reader positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, byte_pos: 0, acc: 0, acc_bits: 0 }
    }

    /// Reads the next `nbits` bits, failing if the stream is exhausted.
    #[inline]
    pub fn read(&mut self, nbits: u32) -> Result<u32> {
        debug_assert!(nbits <= 32);
        while self.acc_bits < nbits {
            let Some(&byte) = self.data.get(self.byte_pos) else {
                return Err(Error::UnexpectedEof { context: "bit stream" });
            };
            self.acc |= u64::from(byte) << self.acc_bits;
            self.acc_bits += 8;
            self.byte_pos += 1;
        }
        let mask = if nbits == 32 { u64::from(u32::MAX) } else { (1u64 << nbits) - 1 };
        let value = (self.acc & mask) as u32;
        self.acc >>= nbits;
        self.acc_bits -= nbits;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_byte_order() {
        let mut w = BitWriter::new();
        w.write(1, 1);
        w.write(2, 0b10);
        w.write(5, 0b10011);
        // First bit lands in bit 0: 1 | 10<<1 | 10011<<3.
        assert_eq!(w.finalize(), vec![0b1001_1101]);
    }

    #[test]
    fn test_cross_byte_values() {
        let mut w = BitWriter::new();
        w.write(12, 0xABC);
        w.write(20, 0x12345);
        assert_eq!(w.bits_written(), 32);
        let bytes = w.finalize();
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read(12).unwrap(), 0xABC);
        assert_eq!(r.read(20).unwrap(), 0x12345);
    }

    #[test]
    fn test_zero_width_reads() {
        let mut r = BitReader::new(&[]);
        assert_eq!(r.read(0).unwrap(), 0);
        assert!(r.read(1).is_err());
    }

    #[test]
    fn test_eof_mid_value() {
        let mut w = BitWriter::new();
        w.write(4, 0xF);
        let bytes = w.finalize();
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read(8).unwrap(), 0x0F);
        assert!(r.read(1).is_err());
    }

    proptest! {
        #[test]
        fn prop_roundtrip(values in prop::collection::vec((1u32..=32).prop_flat_map(|n| {
            let max = if n == 32 { u32::MAX } else { (1u32 << n) - 1 };
            (Just(n), 0..=max)
        }), 0..64)) {
            let mut w = BitWriter::new();
            for &(n, v) in &values {
                w.write(n, v);
            }
            let bytes = w.finalize();
            let mut r = BitReader::new(&bytes);
            for &(n, v) in &values {
                prop_assert_eq!(r.read(n).unwrap(), v);
            }
        }
    }
}
