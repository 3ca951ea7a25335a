//! Context modeling for AC coefficient tokens.
//!
//! Two families of contexts exist per block context: a small set of
//! nonzero-count contexts selected by a spatially-predicted count, and a
//! large set of zero-density contexts selected by the remaining nonzero
//! count, the scan position, and one history bit carried by the caller.
//! Both sides of the codec derive contexts from already-decoded state only,
//! so encoder and decoder always agree.

use crate::ac_strategy::NUM_ORDER_CLASSES;
use crate::types::ChromaSubsampling;

/// Scan-position bucket per coefficient index (in units of covered blocks).
pub const COEFF_FREQ_CONTEXT: [u32; 64] = [
    0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, //
    15, 15, 16, 16, 17, 17, 18, 18, 19, 19, 20, 20, 21, 21, 22, 22, //
    23, 23, 23, 23, 24, 24, 24, 24, 25, 25, 25, 25, 26, 26, 26, 26, //
    27, 27, 27, 27, 27, 27, 27, 27, 28, 28, 28, 28, 28, 28, 28, 28,
];

/// Remaining-nonzeros bucket (in units of covered blocks).
pub const COEFF_NUM_NONZERO_CONTEXT: [u32; 64] = [
    0, 0, 31, 62, 62, 93, 93, 93, 93, 123, 123, 123, 123, //
    152, 152, 152, 152, 152, 152, 152, 152, 180, 180, 180, 180, 180, //
    180, 180, 180, 180, 180, 180, 180, 206, 206, 206, 206, 206, 206, //
    206, 206, 206, 206, 206, 206, 206, 206, 206, 206, 206, 206, 206, //
    206, 206, 206, 206, 206, 206, 206, 206, 206, 206, 206, 206,
];

/// Zero-density contexts per block context: (206 + 28) * 2 + 2.
pub const ZERO_DENSITY_CONTEXT_COUNT: usize = 470;

/// Nonzero-count contexts per block context: counts below 8 get their own
/// context, larger counts share pairwise (4 + n/2, n <= 64).
pub const NON_ZERO_BUCKETS: usize = 37;

/// Context for the per-block nonzero-count token.
#[inline]
#[must_use]
pub fn non_zero_context(predicted: u32, block_ctx: usize) -> usize {
    let bucket = if predicted < 8 { predicted } else { 4 + predicted / 2 };
    block_ctx * NON_ZERO_BUCKETS + bucket as usize
}

/// Context for a coefficient token at scan position `k` with `nzeros`
/// nonzero coefficients still to be emitted. `log2_covered` scales both
/// down to the 8x8 table range; `prev` is a single history bit (the
/// tokenizer feeds it the previous coefficient's sign).
#[inline]
#[must_use]
pub fn zero_density_context(nzeros: u32, k: usize, log2_covered: usize, prev: usize) -> usize {
    let covered = 1u32 << log2_covered;
    debug_assert!(nzeros <= 64 << log2_covered);
    debug_assert!(k < 64 << log2_covered);
    // A fully-dense block rounds up past the table; share the last bucket.
    let nz_idx = (((nzeros + covered - 1) >> log2_covered) as usize).min(63);
    let nz_bucket = COEFF_NUM_NONZERO_CONTEXT[nz_idx];
    let freq_bucket = COEFF_FREQ_CONTEXT[k >> log2_covered];
    ((nz_bucket + freq_bucket) as usize) * 2 + prev
}

/// Maps (channel, coefficient-order class) to a block context.
///
/// With full-resolution chroma every channel keeps its own contexts; with
/// subsampled chroma the chroma channels each collapse to a single context
/// since only 8x8 blocks occur there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContextMap {
    ctx_map: [u8; 3 * NUM_ORDER_CLASSES],
    num_block_contexts: usize,
}

impl BlockContextMap {
    /// Builds the map for a chroma configuration.
    #[must_use]
    pub fn new(cs: ChromaSubsampling) -> Self {
        if cs.is_subsampled() {
            Self {
                ctx_map: [
                    0, 0, 0, 0, 0, 0, //
                    1, 2, 3, 3, 4, 4, //
                    5, 5, 5, 5, 5, 5,
                ],
                num_block_contexts: 6,
            }
        } else {
            Self {
                ctx_map: [
                    0, 1, 2, 2, 3, 3, //
                    4, 5, 6, 6, 7, 7, //
                    8, 9, 10, 10, 11, 11,
                ],
                num_block_contexts: 12,
            }
        }
    }

    /// Block context for a channel and order class.
    #[inline]
    #[must_use]
    pub fn block_context(&self, c: usize, order_class: usize) -> usize {
        self.ctx_map[c * NUM_ORDER_CLASSES + order_class] as usize
    }

    /// Number of distinct block contexts.
    #[inline]
    #[must_use]
    pub fn num_block_contexts(&self) -> usize {
        self.num_block_contexts
    }

    /// First zero-density context for a block context. Nonzero-count
    /// contexts occupy the low indices for all block contexts.
    #[inline]
    #[must_use]
    pub fn zero_density_offset(&self, block_ctx: usize) -> usize {
        self.num_block_contexts * NON_ZERO_BUCKETS + block_ctx * ZERO_DENSITY_CONTEXT_COUNT
    }

    /// Total number of AC contexts.
    #[inline]
    #[must_use]
    pub fn num_ac_contexts(&self) -> usize {
        self.num_block_contexts * (NON_ZERO_BUCKETS + ZERO_DENSITY_CONTEXT_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zero_context_buckets() {
        assert_eq!(non_zero_context(0, 0), 0);
        assert_eq!(non_zero_context(7, 0), 7);
        assert_eq!(non_zero_context(8, 0), 8);
        assert_eq!(non_zero_context(9, 0), 8);
        assert_eq!(non_zero_context(64, 0), 36);
        // Second block context starts one full bucket range later.
        assert_eq!(non_zero_context(0, 1), NON_ZERO_BUCKETS);
    }

    #[test]
    fn test_zero_density_context_range() {
        for log2 in 0..=4 {
            let covered = 1usize << log2;
            for nzeros in 1..=(64 * covered) as u32 {
                for k in 0..64 * covered {
                    for prev in 0..2 {
                        let ctx = zero_density_context(nzeros, k, log2, prev);
                        assert!(ctx < ZERO_DENSITY_CONTEXT_COUNT);
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_density_context_prev_bit() {
        let a = zero_density_context(5, 10, 0, 0);
        let b = zero_density_context(5, 10, 0, 1);
        assert_eq!(b, a + 1);
    }

    #[test]
    fn test_block_context_map_444() {
        let map = BlockContextMap::new(ChromaSubsampling::Cs444);
        assert_eq!(map.num_block_contexts(), 12);
        assert_eq!(map.block_context(0, 0), 0);
        assert_eq!(map.block_context(1, 0), 4);
        assert_eq!(map.block_context(2, 5), 11);
        // The large-DCT classes share a context, as do the rectangular ones.
        assert_eq!(map.block_context(1, 2), map.block_context(1, 3));
        assert_eq!(map.block_context(1, 4), map.block_context(1, 5));
    }

    #[test]
    fn test_block_context_map_subsampled() {
        for cs in [
            ChromaSubsampling::Cs420,
            ChromaSubsampling::Cs422,
            ChromaSubsampling::Cs440,
        ] {
            let map = BlockContextMap::new(cs);
            assert_eq!(map.num_block_contexts(), 6);
            // Chroma collapses to a single context per channel.
            for class in 0..NUM_ORDER_CLASSES {
                assert_eq!(map.block_context(0, class), 0);
                assert_eq!(map.block_context(2, class), 5);
            }
            assert_eq!(map.block_context(1, 1), 2);
        }
    }

    #[test]
    fn test_context_layout_is_disjoint() {
        let map = BlockContextMap::new(ChromaSubsampling::Cs444);
        let last_nonzero = non_zero_context(64, map.num_block_contexts() - 1);
        assert!(last_nonzero < map.zero_density_offset(0));
        let last_density = map.zero_density_offset(map.num_block_contexts() - 1)
            + ZERO_DENSITY_CONTEXT_COUNT
            - 1;
        assert_eq!(last_density, map.num_ac_contexts() - 1);
    }
}
