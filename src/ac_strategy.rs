//! Transform strategies and the per-block strategy map.
//!
//! A transform strategy is the block transform kind and size chosen for one
//! coefficient block. Strategies cover between 1x1 and 4x4 fundamental
//! (8x8) blocks; multi-block strategies are anchored at their top-left cell
//! and the remaining covered cells are skipped during tokenization.

use crate::consts::BLOCK_DIM;
use crate::error::{Error, Result};
use crate::types::Rect;

/// The supported transform strategies.
///
/// The discriminant doubles as the bit index in strategy masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AcStrategy {
    /// 8x8 DCT.
    Dct8 = 0,
    /// 8x8 identity (spatial) transform.
    Identity = 1,
    /// 8x8 block of 2x2 DCTs.
    Dct2x2 = 2,
    /// 8x8 block of 4x4 DCTs.
    Dct4x4 = 3,
    /// 16x16 DCT.
    Dct16x16 = 4,
    /// 32x32 DCT.
    Dct32x32 = 5,
    /// 16 wide by 8 high DCT.
    Dct16x8 = 6,
    /// 8 wide by 16 high DCT.
    Dct8x16 = 7,
    /// 4x8 DCT coded in an 8x8 block.
    Dct4x8 = 8,
    /// 8x4 DCT coded in an 8x8 block.
    Dct8x4 = 9,
}

/// Number of valid strategies.
pub const NUM_AC_STRATEGIES: usize = 10;

/// All strategies in discriminant order.
pub const AC_STRATEGY_VALUES: [AcStrategy; NUM_AC_STRATEGIES] = [
    AcStrategy::Dct8,
    AcStrategy::Identity,
    AcStrategy::Dct2x2,
    AcStrategy::Dct4x4,
    AcStrategy::Dct16x16,
    AcStrategy::Dct32x32,
    AcStrategy::Dct16x8,
    AcStrategy::Dct8x16,
    AcStrategy::Dct4x8,
    AcStrategy::Dct8x4,
];

impl AcStrategy {
    /// Strategy from its discriminant.
    pub fn from_index(idx: usize) -> Result<Self> {
        AC_STRATEGY_VALUES
            .get(idx)
            .copied()
            .ok_or(Error::StreamCorruption { reason: "strategy index out of range" })
    }

    /// Covered fundamental blocks in x.
    #[inline]
    #[must_use]
    pub fn covered_blocks_x(self) -> usize {
        match self {
            AcStrategy::Dct16x16 => 2,
            AcStrategy::Dct32x32 => 4,
            AcStrategy::Dct16x8 => 2,
            _ => 1,
        }
    }

    /// Covered fundamental blocks in y.
    #[inline]
    #[must_use]
    pub fn covered_blocks_y(self) -> usize {
        match self {
            AcStrategy::Dct16x16 => 2,
            AcStrategy::Dct32x32 => 4,
            AcStrategy::Dct8x16 => 2,
            _ => 1,
        }
    }

    /// Total covered fundamental blocks.
    #[inline]
    #[must_use]
    pub fn covered_blocks(self) -> usize {
        self.covered_blocks_x() * self.covered_blocks_y()
    }

    /// log2 of `covered_blocks`.
    #[inline]
    #[must_use]
    pub fn log2_covered_blocks(self) -> usize {
        self.covered_blocks().trailing_zeros() as usize
    }

    /// Coefficient grid width in samples.
    #[inline]
    #[must_use]
    pub fn coeff_width(self) -> usize {
        self.covered_blocks_x() * BLOCK_DIM
    }

    /// Coefficient grid height in samples.
    #[inline]
    #[must_use]
    pub fn coeff_height(self) -> usize {
        self.covered_blocks_y() * BLOCK_DIM
    }

    /// Number of coefficients produced by one transform instance.
    #[inline]
    #[must_use]
    pub fn coeff_area(self) -> usize {
        self.coeff_width() * self.coeff_height()
    }

    /// Context-model order class shared by strategies of similar statistics.
    #[inline]
    #[must_use]
    pub fn order_class(self) -> usize {
        match self {
            AcStrategy::Dct8 => 0,
            AcStrategy::Identity | AcStrategy::Dct2x2 | AcStrategy::Dct4x4 => 1,
            AcStrategy::Dct16x16 => 2,
            AcStrategy::Dct32x32 => 3,
            AcStrategy::Dct16x8 | AcStrategy::Dct8x16 => 4,
            AcStrategy::Dct4x8 | AcStrategy::Dct8x4 => 5,
        }
    }
}

/// Number of distinct order classes.
pub const NUM_ORDER_CLASSES: usize = 6;

const ANCHOR_BIT: u8 = 0x80;

/// Per-block transform strategy map for a rectangular region of blocks.
///
/// Each cell stores the strategy covering it plus a flag marking the
/// anchor (top-left) cell of a transform instance.
#[derive(Debug, Clone)]
pub struct AcStrategyImage {
    xsize_blocks: usize,
    ysize_blocks: usize,
    cells: Vec<u8>,
}

impl AcStrategyImage {
    /// Creates a map filled with 8x8 DCT anchors.
    #[must_use]
    pub fn new(xsize_blocks: usize, ysize_blocks: usize) -> Self {
        Self {
            xsize_blocks,
            ysize_blocks,
            cells: vec![AcStrategy::Dct8 as u8 | ANCHOR_BIT; xsize_blocks * ysize_blocks],
        }
    }

    /// Width in blocks.
    #[inline]
    #[must_use]
    pub fn xsize_blocks(&self) -> usize {
        self.xsize_blocks
    }

    /// Height in blocks.
    #[inline]
    #[must_use]
    pub fn ysize_blocks(&self) -> usize {
        self.ysize_blocks
    }

    /// Places a transform instance with its anchor at `(bx, by)`.
    ///
    /// The footprint must lie inside the image; all covered cells are
    /// overwritten.
    pub fn set(&mut self, bx: usize, by: usize, acs: AcStrategy) -> Result<()> {
        let cx = acs.covered_blocks_x();
        let cy = acs.covered_blocks_y();
        if bx + cx > self.xsize_blocks || by + cy > self.ysize_blocks {
            return Err(Error::InvalidStrategyPlacement { bx, by });
        }
        for dy in 0..cy {
            for dx in 0..cx {
                let cell = acs as u8 | if dx == 0 && dy == 0 { ANCHOR_BIT } else { 0 };
                self.cells[(by + dy) * self.xsize_blocks + bx + dx] = cell;
            }
        }
        Ok(())
    }

    /// Strategy covering the cell.
    #[inline]
    #[must_use]
    pub fn strategy(&self, bx: usize, by: usize) -> AcStrategy {
        let cell = self.cells[by * self.xsize_blocks + bx] & !ANCHOR_BIT;
        AC_STRATEGY_VALUES[cell as usize]
    }

    /// True if the cell is the anchor of its transform instance.
    #[inline]
    #[must_use]
    pub fn is_anchor(&self, bx: usize, by: usize) -> bool {
        self.cells[by * self.xsize_blocks + bx] & ANCHOR_BIT != 0
    }

    /// Extracts a copy of `rect`, verifying that no transform instance
    /// straddles the rect border and every cell belongs to exactly one
    /// in-rect anchor.
    pub fn window(&self, rect: &Rect) -> Result<Self> {
        if rect.x1() > self.xsize_blocks || rect.y1() > self.ysize_blocks {
            return Err(Error::InvalidStrategyPlacement { bx: rect.x0, by: rect.y0 });
        }
        let mut out = Self {
            xsize_blocks: rect.xsize,
            ysize_blocks: rect.ysize,
            cells: vec![0; rect.xsize * rect.ysize],
        };
        let mut covered = vec![false; rect.xsize * rect.ysize];
        for y in 0..rect.ysize {
            for x in 0..rect.xsize {
                let bx = rect.x0 + x;
                let by = rect.y0 + y;
                out.cells[y * rect.xsize + x] = self.cells[by * self.xsize_blocks + bx];
                if !self.is_anchor(bx, by) {
                    continue;
                }
                let acs = self.strategy(bx, by);
                if x + acs.covered_blocks_x() > rect.xsize
                    || y + acs.covered_blocks_y() > rect.ysize
                {
                    return Err(Error::InvalidStrategyPlacement { bx, by });
                }
                for dy in 0..acs.covered_blocks_y() {
                    for dx in 0..acs.covered_blocks_x() {
                        covered[(y + dy) * rect.xsize + x + dx] = true;
                    }
                }
            }
        }
        if let Some(i) = covered.iter().position(|&c| !c) {
            return Err(Error::InvalidStrategyPlacement {
                bx: rect.x0 + i % rect.xsize,
                by: rect.y0 + i / rect.xsize,
            });
        }
        Ok(out)
    }

    /// Bitmask of all strategies used in the map.
    #[must_use]
    pub fn used_strategies_mask(&self) -> u32 {
        let mut mask = 0u32;
        for &cell in &self.cells {
            mask |= 1 << (cell & !ANCHOR_BIT);
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footprints() {
        assert_eq!(AcStrategy::Dct8.coeff_area(), 64);
        assert_eq!(AcStrategy::Dct32x32.coeff_area(), 1024);
        assert_eq!(AcStrategy::Dct16x8.coeff_width(), 16);
        assert_eq!(AcStrategy::Dct16x8.coeff_height(), 8);
        assert_eq!(AcStrategy::Dct8x16.coeff_width(), 8);
        assert_eq!(AcStrategy::Dct8x16.coeff_height(), 16);
        assert_eq!(AcStrategy::Dct32x32.log2_covered_blocks(), 4);
    }

    #[test]
    fn test_anchor_marking() {
        let mut acs = AcStrategyImage::new(4, 4);
        acs.set(0, 0, AcStrategy::Dct16x16).unwrap();
        assert!(acs.is_anchor(0, 0));
        assert!(!acs.is_anchor(1, 0));
        assert!(!acs.is_anchor(0, 1));
        assert!(!acs.is_anchor(1, 1));
        assert_eq!(acs.strategy(1, 1), AcStrategy::Dct16x16);
        assert!(acs.is_anchor(2, 0));
        assert_eq!(acs.strategy(2, 0), AcStrategy::Dct8);
    }

    #[test]
    fn test_out_of_bounds_placement_fails() {
        let mut acs = AcStrategyImage::new(4, 4);
        assert!(acs.set(3, 3, AcStrategy::Dct16x16).is_err());
        assert!(acs.set(1, 0, AcStrategy::Dct32x32).is_err());
    }

    #[test]
    fn test_window_rejects_straddling_instances() {
        let mut acs = AcStrategyImage::new(8, 4);
        acs.set(2, 0, AcStrategy::Dct16x16).unwrap();
        // A cut through the 16x16 instance is rejected from both sides.
        assert!(acs.window(&Rect::new(0, 0, 3, 4)).is_err());
        assert!(acs.window(&Rect::new(3, 0, 5, 4)).is_err());
        let w = acs.window(&Rect::new(2, 0, 2, 2)).unwrap();
        assert!(w.is_anchor(0, 0));
        assert_eq!(w.strategy(1, 1), AcStrategy::Dct16x16);
        // A window past the image is rejected outright.
        assert!(acs.window(&Rect::new(6, 0, 4, 4)).is_err());
    }

    #[test]
    fn test_used_mask() {
        let mut acs = AcStrategyImage::new(4, 2);
        acs.set(0, 0, AcStrategy::Dct4x4).unwrap();
        acs.set(2, 0, AcStrategy::Dct16x16).unwrap();
        let mask = acs.used_strategies_mask();
        assert_ne!(mask & (1 << AcStrategy::Dct8 as u32), 0);
        assert_ne!(mask & (1 << AcStrategy::Dct4x4 as u32), 0);
        assert_ne!(mask & (1 << AcStrategy::Dct16x16 as u32), 0);
        assert_eq!(mask & (1 << AcStrategy::Dct32x32 as u32), 0);
    }
}
