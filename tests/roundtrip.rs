//! End-to-end frame round trips through the public API.

use zenjxl::ac_strategy::{AC_STRATEGY_VALUES, NUM_AC_STRATEGIES};
use zenjxl::{
    decode_frame, encode_frame, AcStrategy, AcStrategyImage, ChromaSubsampling, DequantMatrices,
    FrameDimensions, GroupCoeffs, PassesEncoderState, QuantEncoding,
};

/// Builds coefficient streams for one group in visit order: raster over
/// the block grid, channels Y, X, B per cell, subsampled chroma as plain
/// 8x8 blocks at aligned cells.
fn group_coeffs(
    window: &AcStrategyImage,
    cs: ChromaSubsampling,
    mut value: impl FnMut(usize, usize) -> i32,
) -> GroupCoeffs {
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
                    planes[c].push(value(c, i));
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
    mut value: impl FnMut(usize, usize) -> i32,
) -> Vec<GroupCoeffs> {
    (0..dims.num_groups())
        .map(|g| {
            let window = strategies.window(&dims.group_rect(g)).unwrap();
            group_coeffs(&window, cs, &mut value)
        })
        .collect()
}

fn roundtrip(
    dims: &FrameDimensions,
    strategies: &AcStrategyImage,
    cs: ChromaSubsampling,
    coeffs: &[GroupCoeffs],
) -> Vec<u8> {
    let mut state = PassesEncoderState::default();
    let bytes = encode_frame(&mut state, dims, strategies, coeffs, cs).unwrap();
    let mut matrices = DequantMatrices::default_library();
    let decoded = decode_frame(&bytes, dims, strategies, cs, &mut matrices).unwrap();
    assert_eq!(decoded, coeffs);
    bytes
}

/// A strategy map exercising every transform strategy at least once.
fn all_strategies_map() -> (FrameDimensions, AcStrategyImage) {
    let dims = FrameDimensions::new(16, 8);
    let mut acs = AcStrategyImage::new(16, 8);
    acs.set(0, 0, AcStrategy::Dct32x32).unwrap();
    acs.set(4, 0, AcStrategy::Dct16x16).unwrap();
    acs.set(6, 0, AcStrategy::Dct16x8).unwrap();
    acs.set(6, 1, AcStrategy::Dct8x16).unwrap();
    acs.set(7, 1, AcStrategy::Identity).unwrap();
    acs.set(6, 3, AcStrategy::Dct2x2).unwrap();
    acs.set(7, 3, AcStrategy::Dct4x4).unwrap();
    acs.set(8, 0, AcStrategy::Dct4x8).unwrap();
    acs.set(8, 1, AcStrategy::Dct8x4).unwrap();
    // Remaining cells default to 8x8 DCT.
    let mask = acs.used_strategies_mask();
    assert_eq!(mask, (1 << NUM_AC_STRATEGIES as u32) - 1);
    (dims, acs)
}

#[test]
fn roundtrip_all_strategies_all_subsamplings() {
    let (dims, acs) = all_strategies_map();
    for cs in [
        ChromaSubsampling::Cs444,
        ChromaSubsampling::Cs420,
        ChromaSubsampling::Cs422,
        ChromaSubsampling::Cs440,
    ] {
        let mut n = 0i32;
        let coeffs = frame_coeffs(&dims, &acs, cs, |c, i| {
            n += 1;
            match (n as usize + i + c) % 6 {
                0 => n % 23 - 11,
                1 => -1,
                _ => 0,
            }
        });
        roundtrip(&dims, &acs, cs, &coeffs);
    }
}

#[test]
fn roundtrip_all_zero_frame() {
    let (dims, acs) = all_strategies_map();
    let cs = ChromaSubsampling::Cs444;
    let coeffs = frame_coeffs(&dims, &acs, cs, |_, _| 0);
    roundtrip(&dims, &acs, cs, &coeffs);
}

#[test]
fn roundtrip_single_nonzero_per_block() {
    let (dims, acs) = all_strategies_map();
    let cs = ChromaSubsampling::Cs440;
    let coeffs = frame_coeffs(&dims, &acs, cs, |_, i| if i == 5 { -77 } else { 0 });
    roundtrip(&dims, &acs, cs, &coeffs);
}

#[test]
fn roundtrip_extreme_magnitudes() {
    let (dims, acs) = all_strategies_map();
    let cs = ChromaSubsampling::Cs444;
    // Dense blocks at the 16-bit coefficient extremes.
    let coeffs = frame_coeffs(&dims, &acs, cs, |_, i| match i % 3 {
        0 => i32::from(i16::MAX),
        1 => i32::from(i16::MIN),
        _ => 0,
    });
    roundtrip(&dims, &acs, cs, &coeffs);
}

#[test]
fn encoding_is_thread_count_independent() {
    let (dims, acs) = all_strategies_map();
    let cs = ChromaSubsampling::Cs420;
    let coeffs = frame_coeffs(&dims, &acs, cs, |c, i| ((i * 13 + c) % 17) as i32 - 8);

    let single = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(|| {
            let mut state = PassesEncoderState::default();
            encode_frame(&mut state, &dims, &acs, &coeffs, cs).unwrap()
        });
    let many = rayon::ThreadPoolBuilder::new()
        .num_threads(8)
        .build()
        .unwrap()
        .install(|| {
            let mut state = PassesEncoderState::default();
            encode_frame(&mut state, &dims, &acs, &coeffs, cs).unwrap()
        });
    assert_eq!(single, many);
}

#[test]
fn out_of_range_library_descriptor_fails_construction() {
    assert!(QuantEncoding::library(0).is_ok());
    assert!(QuantEncoding::library(5).is_err());
}

#[test]
fn matrix_cache_warms_once_per_kind() {
    let (_, acs) = all_strategies_map();
    let mut matrices = DequantMatrices::default_library();
    matrices.ensure_computed(acs.used_strategies_mask()).unwrap();
    let computed = matrices.computations();
    // Every kind is needed; transposed strategies share kinds.
    assert_eq!(computed, 8);
    matrices.ensure_computed(acs.used_strategies_mask()).unwrap();
    assert_eq!(matrices.computations(), computed);

    for s in 0..NUM_AC_STRATEGIES {
        for c in 0..3 {
            for &w in matrices.matrix(AC_STRATEGY_VALUES[s], c) {
                assert!(w > 0.0);
            }
        }
    }
}

#[test]
fn single_block_scenario_through_frame_api() {
    // One 8x8 DCT block with three nonzeros at the first scan positions;
    // the frame must decode to the identical coefficient array.
    let dims = FrameDimensions::new(1, 1);
    let acs = AcStrategyImage::new(1, 1);
    let cs = ChromaSubsampling::Cs444;
    let mut luma = vec![0i32; 64];
    luma[0] = 16;
    luma[1] = -3;
    luma[8] = 1;
    let coeffs = vec![GroupCoeffs {
        planes: [vec![0; 64], luma, vec![0; 64]],
    }];
    roundtrip(&dims, &acs, cs, &coeffs);
}

#[test]
fn sibling_groups_discarded_on_corruption() {
    let dims = FrameDimensions::new(64, 32);
    let acs = AcStrategyImage::new(64, 32);
    let cs = ChromaSubsampling::Cs444;
    let coeffs = frame_coeffs(&dims, &acs, cs, |_, i| if i % 9 == 0 { 3 } else { 0 });
    let mut state = PassesEncoderState::default();
    let mut bytes = encode_frame(&mut state, &dims, &acs, &coeffs, cs).unwrap();

    // Zero the first group's coder seed state: that group fails, and the
    // whole frame decode fails rather than returning intact siblings.
    let header_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let first_payload = 4 + header_len + 4 + 4 * dims.num_groups();
    let state_offset = first_payload + 4;
    for b in &mut bytes[state_offset..state_offset + 4] {
        *b = 0;
    }
    let mut matrices = DequantMatrices::default_library();
    assert!(decode_frame(&bytes, &dims, &acs, cs, &mut matrices).is_err());
}
