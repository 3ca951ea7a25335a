//! Frame-level encode and decode orchestration.
//!
//! A frame is tiled into groups of 32x32 blocks. Tokenization and entropy
//! coding are group-local and run in parallel; histogram clustering needs
//! the whole token population and runs between the two parallel phases.
//! The dequant-matrix cache is populated once, single-threaded, before any
//! fan-out so the parallel phases only ever read shared state.
//!
//! Frame byte layout, lengths little endian:
//!
//! ```text
//! [u32 header_len][header][u32 n_groups][u32 len per group][payloads...]
//! ```

use rayon::prelude::*;

use crate::ac_context::BlockContextMap;
use crate::ac_strategy::AcStrategyImage;
use crate::ans::{write_tokens, AnsDecoder, EntropyDecodingData, EntropyEncodingData};
use crate::bitstream::{BitReader, BitWriter};
use crate::coeff_order::CoeffOrders;
use crate::consts::GROUP_DIM_BLOCKS;
use crate::error::{Error, Result};
use crate::histogram::Histogram;
use crate::hybrid_uint::{HybridUintConfig, Token};
use crate::quant::DequantMatrices;
use crate::tokenize::{decode_coefficients, tokenize_coefficients, GroupCoeffs};
use crate::types::{ChromaSubsampling, Rect};

/// Frame extent in blocks and the derived group tiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDimensions {
    /// Width in blocks.
    pub xsize_blocks: usize,
    /// Height in blocks.
    pub ysize_blocks: usize,
}

impl FrameDimensions {
    /// Dimensions for a frame of the given block extent.
    #[must_use]
    pub fn new(xsize_blocks: usize, ysize_blocks: usize) -> Self {
        Self { xsize_blocks, ysize_blocks }
    }

    /// Number of group columns.
    #[inline]
    #[must_use]
    pub fn groups_x(&self) -> usize {
        self.xsize_blocks.div_ceil(GROUP_DIM_BLOCKS)
    }

    /// Number of group rows.
    #[inline]
    #[must_use]
    pub fn groups_y(&self) -> usize {
        self.ysize_blocks.div_ceil(GROUP_DIM_BLOCKS)
    }

    /// Total group count.
    #[inline]
    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.groups_x() * self.groups_y()
    }

    /// Block rect of the group at `index` (raster order), clipped to the
    /// frame at the right and bottom edges.
    #[must_use]
    pub fn group_rect(&self, index: usize) -> Rect {
        let gx = index % self.groups_x();
        let gy = index / self.groups_x();
        let x0 = gx * GROUP_DIM_BLOCKS;
        let y0 = gy * GROUP_DIM_BLOCKS;
        Rect::new(
            x0,
            y0,
            GROUP_DIM_BLOCKS.min(self.xsize_blocks - x0),
            GROUP_DIM_BLOCKS.min(self.ysize_blocks - y0),
        )
    }
}

/// Products of one coding pass: per-group token buffers, the clustered
/// entropy codes, and the finished per-group payloads. Written atomically
/// by [`encode_frame`]; a failed pass leaves no partial data behind.
#[derive(Debug, Clone)]
pub struct PassData {
    /// Token buffers, one per group.
    pub ac_tokens: Vec<Vec<Token>>,
    /// Context map and clustered codes.
    pub codes: EntropyEncodingData,
    /// Entropy-coded payload per group.
    pub group_payloads: Vec<Vec<u8>>,
}

/// Encoder-wide state shared across passes: the dequant-matrix library
/// plus quantization-field multipliers carried for the quantization stage.
#[derive(Debug)]
pub struct PassesEncoderState {
    /// Shared dequantization matrices.
    pub matrices: DequantMatrices,
    /// Extra X-channel quantization multiplier.
    pub x_qm_multiplier: f32,
    /// Extra B-channel quantization multiplier.
    pub b_qm_multiplier: f32,
    /// Finished passes.
    pub passes: Vec<PassData>,
}

impl PassesEncoderState {
    /// State with the given matrix library and neutral multipliers.
    #[must_use]
    pub fn new(matrices: DequantMatrices) -> Self {
        Self { matrices, x_qm_multiplier: 1.0, b_qm_multiplier: 1.0, passes: Vec::new() }
    }
}

impl Default for PassesEncoderState {
    fn default() -> Self {
        Self::new(DequantMatrices::default_library())
    }
}

/// Encodes one pass over the frame.
///
/// `coeffs` holds one group's coefficient streams per group, in raster
/// group order. On success the pass products are appended to
/// `state.passes` and the frame bytes are returned; output is byte-exact
/// reproducible regardless of the rayon pool size.
pub fn encode_frame(
    state: &mut PassesEncoderState,
    dims: &FrameDimensions,
    strategies: &AcStrategyImage,
    coeffs: &[GroupCoeffs],
    cs: ChromaSubsampling,
) -> Result<Vec<u8>> {
    if strategies.xsize_blocks() != dims.xsize_blocks
        || strategies.ysize_blocks() != dims.ysize_blocks
    {
        return Err(Error::InvalidStrategyPlacement { bx: 0, by: 0 });
    }
    if coeffs.len() != dims.num_groups() {
        return Err(Error::StreamCorruption { reason: "group count mismatch" });
    }

    // Matrix cache fill happens before any parallel work touches it.
    state.matrices.ensure_computed(strategies.used_strategies_mask())?;

    let windows: Vec<AcStrategyImage> = (0..dims.num_groups())
        .map(|g| strategies.window(&dims.group_rect(g)))
        .collect::<Result<_>>()?;

    let ctx_map = BlockContextMap::new(cs);
    let orders = CoeffOrders::new();
    let config = HybridUintConfig::default();

    let ac_tokens: Vec<Vec<Token>> = windows
        .par_iter()
        .zip(coeffs.par_iter())
        .map(|(window, group)| tokenize_coefficients(window, group, cs, &ctx_map, &orders))
        .collect::<Result<_>>()?;

    // Histogram population is order-independent, so a serial fold over
    // the group buffers keeps it deterministic.
    let mut histograms = vec![Histogram::new(); ctx_map.num_ac_contexts()];
    for tokens in &ac_tokens {
        for token in tokens {
            let (symbol, _, _) = config.encode(token.value);
            histograms[token.context as usize].add(symbol as usize);
        }
    }
    let codes = EntropyEncodingData::build(&histograms, config)?;

    let mut header = BitWriter::new();
    codes.write_header(&mut header)?;
    let header_bytes = header.finalize();

    let group_payloads: Vec<Vec<u8>> = ac_tokens
        .par_iter()
        .map(|tokens| write_tokens(tokens, &codes))
        .collect::<Result<_>>()?;

    let payload_total: usize = group_payloads.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(8 + header_bytes.len() + 4 * coeffs.len() + payload_total);
    out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&(group_payloads.len() as u32).to_le_bytes());
    for payload in &group_payloads {
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    }
    for payload in &group_payloads {
        out.extend_from_slice(payload);
    }

    state.passes.push(PassData { ac_tokens, codes, group_payloads });
    Ok(out)
}

/// Decodes one pass, reconstructing every group's coefficient streams.
///
/// Any group failure aborts the whole frame; no partial results are
/// returned. The matrix cache is warmed here so downstream dequantization
/// reads only.
pub fn decode_frame(
    bytes: &[u8],
    dims: &FrameDimensions,
    strategies: &AcStrategyImage,
    cs: ChromaSubsampling,
    matrices: &mut DequantMatrices,
) -> Result<Vec<GroupCoeffs>> {
    if strategies.xsize_blocks() != dims.xsize_blocks
        || strategies.ysize_blocks() != dims.ysize_blocks
    {
        return Err(Error::InvalidStrategyPlacement { bx: 0, by: 0 });
    }
    matrices.ensure_computed(strategies.used_strategies_mask())?;

    let ctx_map = BlockContextMap::new(cs);
    let orders = CoeffOrders::new();

    let (header_bytes, mut pos) = read_chunk(bytes, 0, "frame header")?;
    let mut header_reader = BitReader::new(header_bytes);
    let codes = EntropyDecodingData::read_header(&mut header_reader, ctx_map.num_ac_contexts())?;

    let n_groups = read_u32(bytes, &mut pos, "group count")? as usize;
    if n_groups != dims.num_groups() {
        return Err(Error::StreamCorruption { reason: "group count mismatch" });
    }
    let mut lengths = Vec::with_capacity(n_groups);
    for _ in 0..n_groups {
        lengths.push(read_u32(bytes, &mut pos, "group length")? as usize);
    }
    let mut payloads = Vec::with_capacity(n_groups);
    for &len in &lengths {
        let Some(payload) = bytes.get(pos..pos + len) else {
            return Err(Error::UnexpectedEof { context: "group payload" });
        };
        payloads.push(payload);
        pos += len;
    }
    if pos != bytes.len() {
        return Err(Error::StreamCorruption { reason: "trailing bytes after frame" });
    }

    let windows: Vec<AcStrategyImage> = (0..n_groups)
        .map(|g| strategies.window(&dims.group_rect(g)))
        .collect::<Result<_>>()?;

    windows
        .par_iter()
        .zip(payloads.par_iter())
        .map(|(window, payload)| {
            let mut decoder = AnsDecoder::new(&codes, payload)?;
            let group = decode_coefficients(window, cs, &ctx_map, &orders, &mut decoder)?;
            decoder.finalize()?;
            Ok(group)
        })
        .collect()
}

fn read_u32(bytes: &[u8], pos: &mut usize, what: &'static str) -> Result<u32> {
    let Some(chunk) = bytes.get(*pos..*pos + 4) else {
        return Err(Error::UnexpectedEof { context: what });
    };
    *pos += 4;
    Ok(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

fn read_chunk<'a>(bytes: &'a [u8], start: usize, what: &'static str) -> Result<(&'a [u8], usize)> {
    let mut pos = start;
    let len = read_u32(bytes, &mut pos, what)? as usize;
    let Some(chunk) = bytes.get(pos..pos + len) else {
        return Err(Error::UnexpectedEof { context: what });
    };
    Ok((chunk, pos + len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ac_strategy::AcStrategy;

    fn group_coeffs_for(window: &AcStrategyImage, cs: ChromaSubsampling, seed: usize) -> GroupCoeffs {
        let mut planes: [Vec<i32>; 3] = Default::default();
        for by in 0..window.ysize_blocks() {
            for bx in 0..window.xsize_blocks() {
                for c in [1usize, 0, 2] {
                    let hs = cs.hshift(c);
                    let vs = cs.vshift(c);
                    let area = if hs == 0 && vs == 0 {
                        if !window.is_anchor(bx, by) {
                            continue;
                        }
                        window.strategy(bx, by).coeff_area()
                    } else {
                        if bx & ((1 << hs) - 1) != 0 || by & ((1 << vs) - 1) != 0 {
                            continue;
                        }
                        64
                    };
                    for i in 0..area {
                        let v = (i * 7 + bx * 3 + by * 5 + c + seed) % 11;
                        planes[c].push(if v < 7 { 0 } else { v as i32 - 9 });
                    }
                }
            }
        }
        GroupCoeffs { planes }
    }

    fn frame_coeffs(
        dims: &FrameDimensions,
        strategies: &AcStrategyImage,
        cs: ChromaSubsampling,
    ) -> Vec<GroupCoeffs> {
        (0..dims.num_groups())
            .map(|g| {
                let window = strategies.window(&dims.group_rect(g)).unwrap();
                group_coeffs_for(&window, cs, g)
            })
            .collect()
    }

    #[test]
    fn test_group_tiling() {
        let dims = FrameDimensions::new(70, 33);
        assert_eq!(dims.groups_x(), 3);
        assert_eq!(dims.groups_y(), 2);
        assert_eq!(dims.num_groups(), 6);
        assert_eq!(dims.group_rect(0), Rect::new(0, 0, 32, 32));
        assert_eq!(dims.group_rect(2), Rect::new(64, 0, 6, 32));
        assert_eq!(dims.group_rect(5), Rect::new(64, 32, 6, 1));
    }

    #[test]
    fn test_multi_group_roundtrip() {
        let dims = FrameDimensions::new(40, 34);
        let mut strategies = AcStrategyImage::new(40, 34);
        strategies.set(0, 0, AcStrategy::Dct32x32).unwrap();
        strategies.set(4, 0, AcStrategy::Dct16x16).unwrap();
        strategies.set(6, 0, AcStrategy::Dct16x8).unwrap();
        strategies.set(4, 2, AcStrategy::Dct8x16).unwrap();
        strategies.set(8, 8, AcStrategy::Identity).unwrap();
        strategies.set(32, 32, AcStrategy::Dct4x4).unwrap();
        let cs = ChromaSubsampling::Cs444;
        let coeffs = frame_coeffs(&dims, &strategies, cs);

        let mut state = PassesEncoderState::default();
        let bytes = encode_frame(&mut state, &dims, &strategies, &coeffs, cs).unwrap();
        assert_eq!(state.passes.len(), 1);
        assert_eq!(state.passes[0].group_payloads.len(), dims.num_groups());

        let mut matrices = DequantMatrices::default_library();
        let decoded = decode_frame(&bytes, &dims, &strategies, cs, &mut matrices).unwrap();
        assert_eq!(decoded, coeffs);
    }

    #[test]
    fn test_subsampled_frame_roundtrip() {
        let dims = FrameDimensions::new(36, 4);
        let mut strategies = AcStrategyImage::new(36, 4);
        strategies.set(0, 0, AcStrategy::Dct16x16).unwrap();
        let cs = ChromaSubsampling::Cs420;
        let coeffs = frame_coeffs(&dims, &strategies, cs);
        let mut state = PassesEncoderState::default();
        let bytes = encode_frame(&mut state, &dims, &strategies, &coeffs, cs).unwrap();
        let mut matrices = DequantMatrices::default_library();
        let decoded = decode_frame(&bytes, &dims, &strategies, cs, &mut matrices).unwrap();
        assert_eq!(decoded, coeffs);
    }

    #[test]
    fn test_encode_is_reproducible() {
        let dims = FrameDimensions::new(33, 16);
        let strategies = AcStrategyImage::new(33, 16);
        let cs = ChromaSubsampling::Cs422;
        let coeffs = frame_coeffs(&dims, &strategies, cs);
        let mut a = PassesEncoderState::default();
        let mut b = PassesEncoderState::default();
        let bytes_a = encode_frame(&mut a, &dims, &strategies, &coeffs, cs).unwrap();
        let bytes_b = encode_frame(&mut b, &dims, &strategies, &coeffs, cs).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn test_failed_pass_commits_nothing() {
        let dims = FrameDimensions::new(4, 4);
        let strategies = AcStrategyImage::new(4, 4);
        let cs = ChromaSubsampling::Cs444;
        // Wrong group count.
        let mut state = PassesEncoderState::default();
        let err = encode_frame(&mut state, &dims, &strategies, &[], cs).unwrap_err();
        assert!(matches!(err, Error::StreamCorruption { .. }));
        assert!(state.passes.is_empty());
    }

    #[test]
    fn test_corrupt_frame_is_rejected() {
        let dims = FrameDimensions::new(8, 8);
        let strategies = AcStrategyImage::new(8, 8);
        let cs = ChromaSubsampling::Cs444;
        let coeffs = frame_coeffs(&dims, &strategies, cs);
        let mut state = PassesEncoderState::default();
        let bytes = encode_frame(&mut state, &dims, &strategies, &coeffs, cs).unwrap();

        let mut matrices = DequantMatrices::default_library();
        // Truncations at several depths all fail cleanly.
        for cut in [0, 2, bytes.len() / 2, bytes.len() - 1] {
            assert!(
                decode_frame(&bytes[..cut], &dims, &strategies, cs, &mut matrices).is_err(),
                "truncation at {} went undetected",
                cut
            );
        }
        // Trailing garbage is also rejected.
        let mut extended = bytes.clone();
        extended.push(0);
        assert!(decode_frame(&extended, &dims, &strategies, cs, &mut matrices).is_err());
    }
}
