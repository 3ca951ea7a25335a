//! Coefficient block tokenization and its inverse.
//!
//! Each coded block contributes one count token (number of nonzero
//! coefficients, in a context predicted from neighboring blocks) followed
//! by one token per nonzero coefficient in scan order. A coefficient
//! token's value folds the zero run since the previous nonzero into the
//! packed signed coefficient (`packed * area + run`), so zero coefficients
//! never produce tokens of their own. Contexts depend only on state the
//! decoder already has: the scan cursor, the remaining nonzero count, and
//! the sign of the previous coefficient. Decoding therefore replays the
//! exact token sequence.

use crate::ac_context::{non_zero_context, zero_density_context, BlockContextMap};
use crate::ac_strategy::{AcStrategy, AcStrategyImage};
use crate::ans::AnsDecoder;
use crate::coeff_order::CoeffOrders;
use crate::error::{Error, Result};
use crate::hybrid_uint::{pack_signed, unpack_signed, Token};
use crate::types::ChromaSubsampling;

/// Fallback nonzero-count prediction for the top-left block of a group.
const DEFAULT_NZEROS_PREDICTION: u32 = 32;

/// Quantized coefficients for one group: a flat per-channel stream in
/// block visit order, each coded block contributing its full coefficient
/// area in raster layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupCoeffs {
    /// Channel planes in X, Y, B order.
    pub planes: [Vec<i32>; 3],
}

impl GroupCoeffs {
    /// Empty streams.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// One coded block in visit order.
struct BlockVisit {
    channel: usize,
    acs: AcStrategy,
    cx: usize,
    cy: usize,
}

/// Blocks in coding order: raster over the block grid, channels Y, X, B
/// within each cell. Full-resolution channels follow the strategy image's
/// anchors; subsampled chroma is coded as plain 8x8 blocks on its own
/// grid, visited at the aligned luma cells.
fn plan_visits(strategies: &AcStrategyImage, cs: ChromaSubsampling) -> Vec<BlockVisit> {
    let mut visits = Vec::new();
    for by in 0..strategies.ysize_blocks() {
        for bx in 0..strategies.xsize_blocks() {
            for channel in [1usize, 0, 2] {
                let hs = cs.hshift(channel);
                let vs = cs.vshift(channel);
                if hs == 0 && vs == 0 {
                    if strategies.is_anchor(bx, by) {
                        visits.push(BlockVisit {
                            channel,
                            acs: strategies.strategy(bx, by),
                            cx: bx,
                            cy: by,
                        });
                    }
                } else if bx & ((1 << hs) - 1) == 0 && by & ((1 << vs) - 1) == 0 {
                    visits.push(BlockVisit {
                        channel,
                        acs: AcStrategy::Dct8,
                        cx: bx >> hs,
                        cy: by >> vs,
                    });
                }
            }
        }
    }
    visits
}

/// Per-channel image of recent nonzero counts, in 8x8 cell units, used
/// for spatial prediction. Both codec directions update it identically.
struct NzerosMap {
    planes: [NzerosPlane; 3],
}

struct NzerosPlane {
    width: usize,
    data: Vec<u32>,
}

impl NzerosMap {
    fn new(strategies: &AcStrategyImage, cs: ChromaSubsampling) -> Self {
        let planes = [0, 1, 2].map(|c| {
            let hs = cs.hshift(c);
            let vs = cs.vshift(c);
            let width = (strategies.xsize_blocks() + (1 << hs) - 1) >> hs;
            let height = (strategies.ysize_blocks() + (1 << vs) - 1) >> vs;
            NzerosPlane { width, data: vec![0; width * height] }
        });
        Self { planes }
    }

    fn predict(&self, channel: usize, cx: usize, cy: usize) -> u32 {
        let plane = &self.planes[channel];
        let top = (cy > 0).then(|| plane.data[(cy - 1) * plane.width + cx]);
        let left = (cx > 0).then(|| plane.data[cy * plane.width + cx - 1]);
        match (top, left) {
            (None, None) => DEFAULT_NZEROS_PREDICTION,
            (None, Some(l)) => l,
            (Some(t), None) => t,
            (Some(t), Some(l)) => (t + l + 1) / 2,
        }
    }

    fn fill(&mut self, channel: usize, cx: usize, cy: usize, cw: usize, ch: usize, value: u32) {
        let plane = &mut self.planes[channel];
        for y in cy..cy + ch {
            for x in cx..cx + cw {
                plane.data[y * plane.width + x] = value;
            }
        }
    }
}

/// Converts a group's coefficient streams into the token sequence.
///
/// Coefficient planes must hold exactly one `coeff_area`-sized run per
/// coded block, in visit order.
pub fn tokenize_coefficients(
    strategies: &AcStrategyImage,
    coeffs: &GroupCoeffs,
    cs: ChromaSubsampling,
    ctx_map: &BlockContextMap,
    orders: &CoeffOrders,
) -> Result<Vec<Token>> {
    let mut nzeros_map = NzerosMap::new(strategies, cs);
    let mut cursors = [0usize; 3];
    let mut tokens = Vec::new();

    for visit in plan_visits(strategies, cs) {
        let area = visit.acs.coeff_area();
        let plane = &coeffs.planes[visit.channel];
        let start = cursors[visit.channel];
        let Some(block) = plane.get(start..start + area) else {
            return Err(Error::StreamCorruption { reason: "coefficient plane too short" });
        };
        cursors[visit.channel] += area;
        tokenize_block(&visit, block, ctx_map, orders, &mut nzeros_map, &mut tokens)?;
    }

    for (c, cursor) in cursors.iter().enumerate() {
        if *cursor != coeffs.planes[c].len() {
            return Err(Error::StreamCorruption { reason: "coefficient plane too long" });
        }
    }
    Ok(tokens)
}

fn tokenize_block(
    visit: &BlockVisit,
    block: &[i32],
    ctx_map: &BlockContextMap,
    orders: &CoeffOrders,
    nzeros_map: &mut NzerosMap,
    tokens: &mut Vec<Token>,
) -> Result<()> {
    let acs = visit.acs;
    let area = acs.coeff_area();
    let log2 = acs.log2_covered_blocks();
    let covered = acs.covered_blocks();
    let block_ctx = ctx_map.block_context(visit.channel, acs.order_class());

    let nzeros = block.iter().filter(|&&v| v != 0).count();
    let predicted = nzeros_map.predict(visit.channel, visit.cx, visit.cy);
    tokens.push(Token::new(non_zero_context(predicted, block_ctx), nzeros as u32));
    nzeros_map.fill(
        visit.channel,
        visit.cx,
        visit.cy,
        acs.covered_blocks_x(),
        acs.covered_blocks_y(),
        ((nzeros + covered - 1) >> log2) as u32,
    );
    if nzeros == 0 {
        return Ok(());
    }

    let order = orders.order(acs);
    let offset = ctx_map.zero_density_offset(block_ctx);
    let mut remaining = nzeros as u32;
    let mut cursor = 0usize;
    let mut prev = usize::from(nzeros <= area / 16);
    for (k, &pos) in order.iter().enumerate() {
        let coeff = block[pos as usize];
        if coeff == 0 {
            continue;
        }
        let run = (k - cursor) as u64;
        let joint = u64::from(pack_signed(coeff)) * area as u64 + run;
        if joint > u64::from(u32::MAX) {
            return Err(Error::StreamCorruption { reason: "coefficient magnitude out of range" });
        }
        let ctx = offset + zero_density_context(remaining, cursor, log2, prev);
        tokens.push(Token::new(ctx, joint as u32));
        prev = usize::from(coeff < 0);
        remaining -= 1;
        cursor = k + 1;
        if remaining == 0 {
            break;
        }
    }
    Ok(())
}

/// Reconstructs a group's coefficient streams from the entropy decoder,
/// mirroring [`tokenize_coefficients`] token for token.
pub fn decode_coefficients(
    strategies: &AcStrategyImage,
    cs: ChromaSubsampling,
    ctx_map: &BlockContextMap,
    orders: &CoeffOrders,
    decoder: &mut AnsDecoder<'_>,
) -> Result<GroupCoeffs> {
    let mut nzeros_map = NzerosMap::new(strategies, cs);
    let mut coeffs = GroupCoeffs::new();

    for visit in plan_visits(strategies, cs) {
        let acs = visit.acs;
        let area = acs.coeff_area();
        let log2 = acs.log2_covered_blocks();
        let covered = acs.covered_blocks();
        let block_ctx = ctx_map.block_context(visit.channel, acs.order_class());

        let predicted = nzeros_map.predict(visit.channel, visit.cx, visit.cy);
        let nzeros = decoder.read_hybrid_uint(non_zero_context(predicted, block_ctx))?;
        if nzeros as usize > area {
            return Err(Error::StreamCorruption { reason: "nonzero count exceeds block area" });
        }
        nzeros_map.fill(
            visit.channel,
            visit.cx,
            visit.cy,
            acs.covered_blocks_x(),
            acs.covered_blocks_y(),
            (nzeros + covered as u32 - 1) >> log2,
        );

        let plane = &mut coeffs.planes[visit.channel];
        let start = plane.len();
        plane.resize(start + area, 0);
        if nzeros == 0 {
            continue;
        }

        let order = orders.order(acs);
        let offset = ctx_map.zero_density_offset(block_ctx);
        let mut remaining = nzeros;
        let mut cursor = 0usize;
        let mut prev = usize::from(nzeros as usize <= area / 16);
        while remaining > 0 {
            if cursor >= area {
                return Err(Error::StreamCorruption { reason: "scan cursor past block end" });
            }
            let ctx = offset + zero_density_context(remaining, cursor, log2, prev);
            let joint = decoder.read_hybrid_uint(ctx)?;
            let run = (joint % area as u32) as usize;
            let packed = joint / area as u32;
            if packed == 0 {
                return Err(Error::StreamCorruption { reason: "zero coefficient token" });
            }
            let k = cursor + run;
            if k >= area {
                return Err(Error::StreamCorruption { reason: "zero run past block end" });
            }
            let coeff = unpack_signed(packed);
            plane[start + order[k] as usize] = coeff;
            prev = usize::from(coeff < 0);
            remaining -= 1;
            cursor = k + 1;
        }
    }
    Ok(coeffs)
}
