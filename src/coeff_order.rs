//! Deterministic coefficient scan orders.
//!
//! Each transform strategy scans its coefficient grid in a fixed zig-zag
//! order, lowest frequency first. Encoder and decoder derive the orders
//! independently from the strategy geometry alone, so no order data is
//! carried in the bitstream.

use crate::ac_strategy::{AcStrategy, AC_STRATEGY_VALUES, NUM_AC_STRATEGIES};

/// Diagonal zig-zag order over a `width` x `height` coefficient grid.
///
/// Anti-diagonals are visited in increasing order of `x + y`; direction
/// alternates per diagonal so neighboring entries stay spatially adjacent.
#[must_use]
pub fn zigzag_order(width: usize, height: usize) -> Vec<u32> {
    let mut order = Vec::with_capacity(width * height);
    for d in 0..width + height - 1 {
        if d % 2 == 0 {
            // Walk up-right: start at the lowest row on this diagonal.
            let y_start = d.min(height - 1);
            let mut y = y_start as isize;
            while y >= 0 {
                let x = d - y as usize;
                if x < width {
                    order.push((y as usize * width + x) as u32);
                }
                y -= 1;
            }
        } else {
            // Walk down-left.
            let x_start = d.min(width - 1);
            let mut x = x_start as isize;
            while x >= 0 {
                let y = d - x as usize;
                if y < height {
                    order.push((y * width + x as usize) as u32);
                }
                x -= 1;
            }
        }
    }
    order
}

const _: () = assert!(NUM_AC_STRATEGIES == AC_STRATEGY_VALUES.len());

/// Precomputed scan orders, one per transform strategy.
#[derive(Debug, Clone)]
pub struct CoeffOrders {
    orders: Vec<Vec<u32>>,
}

impl CoeffOrders {
    /// Computes the order set. Cheap enough to do once per frame.
    #[must_use]
    pub fn new() -> Self {
        let orders = AC_STRATEGY_VALUES
            .iter()
            .map(|acs| zigzag_order(acs.coeff_width(), acs.coeff_height()))
            .collect();
        Self { orders }
    }

    /// Scan order for one strategy; length equals the coefficient area.
    #[inline]
    #[must_use]
    pub fn order(&self, acs: AcStrategy) -> &[u32] {
        &self.orders[acs as usize]
    }
}

impl Default for CoeffOrders {
    fn default() -> Self {
        Self::new()
    }
}
