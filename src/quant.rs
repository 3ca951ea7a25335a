//! Parametric dequantization matrices.
//!
//! A quantization table is described compactly by a [`QuantEncoding`]: a
//! mode plus the numeric parameters needed to synthesize the full table.
//! [`DequantMatrices`] owns one descriptor per quant-table kind and lazily
//! synthesizes forward and inverse tables into a single contiguous buffer.
//! Synthesis is deterministic, straight-line float code, so encoder and
//! decoder reproduce bit-identical tables from the same descriptors.

use std::f32::consts::SQRT_2;
use std::sync::OnceLock;

use crate::ac_strategy::{AcStrategy, NUM_AC_STRATEGIES};
use crate::consts::{BLOCK_DIM, BLOCK_SIZE, DC_QUANT, INV_DC_QUANT};
use crate::error::{Error, Result};

/// Weights at or below this value are rejected; inverse tables divide by them.
pub const ALMOST_ZERO: f32 = 1e-8;

/// Number of predefined library table sets.
pub const NUM_PREDEFINED_TABLES: usize = 1;

/// Maximum number of 1-D distance bands in a parametric curve.
pub const MAX_DISTANCE_BANDS: usize = 17;

/// A radial frequency-response curve: per channel, an absolute weight at DC
/// followed by up to 16 relative band factors. Interpolated onto the 2-D
/// coefficient grid by [`DequantMatrices`].
#[derive(Debug, Clone, PartialEq)]
pub struct DctQuantWeightParams {
    params: [[f32; MAX_DISTANCE_BANDS]; 3],
    num_bands: usize,
}

impl DctQuantWeightParams {
    /// Builds params from per-channel band arrays of equal, fixed length.
    #[must_use]
    pub fn from_array<const N: usize>(values: &[[f32; N]; 3]) -> Self {
        const { assert!(N <= MAX_DISTANCE_BANDS) };
        let mut params = [[0.0; MAX_DISTANCE_BANDS]; 3];
        for (row, src) in params.iter_mut().zip(values) {
            row[..N].copy_from_slice(src);
        }
        Self { params, num_bands: N }
    }

    /// Builds params from slices, validating the band count.
    pub fn new(values: &[&[f32]; 3]) -> Result<Self> {
        let num_bands = values[0].len();
        if num_bands > MAX_DISTANCE_BANDS || values.iter().any(|v| v.len() != num_bands) {
            return Err(Error::InvalidDistanceBandCount { count: num_bands });
        }
        let mut params = [[0.0; MAX_DISTANCE_BANDS]; 3];
        for (row, src) in params.iter_mut().zip(values) {
            row[..num_bands].copy_from_slice(src);
        }
        Ok(Self { params, num_bands })
    }

    /// Number of declared bands.
    #[inline]
    #[must_use]
    pub fn num_bands(&self) -> usize {
        self.num_bands
    }
}

/// Compact parametric description of one quantization table.
///
/// Built via the named constructors only; the weight arrays are immutable
/// once constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum QuantEncoding {
    /// Use a predefined library table.
    Library {
        /// Index into the predefined table sets.
        predefined: u8,
    },
    /// Identity (spatial) transform weights.
    Identity {
        /// Per channel: base weight, edge weight, corner weight.
        xyb_weights: [[f32; 3]; 3],
    },
    /// 2x2 DCT weights per dyadic frequency ring.
    Dct2 {
        /// Per channel, six ring weights.
        xyb_weights: [[f32; 6]; 3],
    },
    /// 4x4 DCT: distance-band curve plus low-frequency multipliers.
    Dct4 {
        /// Radial curve evaluated on a 4x4 grid.
        params: DctQuantWeightParams,
        /// Per channel: divisors for coefficients (0,1)/(1,0) and (1,1).
        xyb_mul: [[f32; 2]; 3],
    },
    /// 4x8 DCT: distance-band curve plus one low-frequency multiplier.
    Dct4x8 {
        /// Radial curve evaluated on an 8x4 grid.
        params: DctQuantWeightParams,
        /// Per channel divisor for coefficient (1,0).
        xyb_mul: [f32; 3],
    },
    /// Plain DCT of the kind's full size.
    Dct {
        /// Radial curve evaluated on the full grid.
        params: DctQuantWeightParams,
    },
}

impl QuantEncoding {
    /// References a predefined library table. Fails fast on an index past
    /// the available library.
    pub fn library(predefined: u8) -> Result<Self> {
        if (predefined as usize) >= NUM_PREDEFINED_TABLES {
            return Err(Error::PredefinedTableOutOfRange {
                index: predefined,
                available: NUM_PREDEFINED_TABLES,
            });
        }
        Ok(Self::Library { predefined })
    }

    /// Identity-mode descriptor.
    #[must_use]
    pub fn identity(xyb_weights: [[f32; 3]; 3]) -> Self {
        Self::Identity { xyb_weights }
    }

    /// DCT2-mode descriptor.
    #[must_use]
    pub fn dct2(xyb_weights: [[f32; 6]; 3]) -> Self {
        Self::Dct2 { xyb_weights }
    }

    /// DCT4-mode descriptor.
    #[must_use]
    pub fn dct4(params: DctQuantWeightParams, xyb_mul: [[f32; 2]; 3]) -> Self {
        Self::Dct4 { params, xyb_mul }
    }

    /// DCT4x8-mode descriptor.
    #[must_use]
    pub fn dct4x8(params: DctQuantWeightParams, xyb_mul: [f32; 3]) -> Self {
        Self::Dct4x8 { params, xyb_mul }
    }

    /// Plain-DCT-mode descriptor.
    #[must_use]
    pub fn dct(params: DctQuantWeightParams) -> Self {
        Self::Dct { params }
    }
}

/// The distinct quant-table kinds. Several transform strategies share one
/// kind (transposed variants reuse the same table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum QuantTableKind {
    /// 8x8 DCT table.
    Dct = 0,
    /// Identity table.
    Identity = 1,
    /// 2x2-DCT table.
    Dct2x2 = 2,
    /// 4x4-DCT table.
    Dct4x4 = 3,
    /// 16x16 table.
    Dct16x16 = 4,
    /// 32x32 table.
    Dct32x32 = 5,
    /// 8x16 table (also serves 16x8).
    Dct8x16 = 6,
    /// 4x8 table (also serves 8x4).
    Dct4x8 = 7,
}

/// Number of quant-table kinds.
pub const NUM_QUANT_TABLES: usize = 8;

/// Table footprint in blocks, x.
pub const REQUIRED_SIZE_X: [usize; NUM_QUANT_TABLES] = [1, 1, 1, 1, 2, 4, 1, 1];

/// Table footprint in blocks, y.
pub const REQUIRED_SIZE_Y: [usize; NUM_QUANT_TABLES] = [1, 1, 1, 1, 2, 4, 2, 1];

/// Total size of the shared table buffer (one direction), in floats.
pub const TOTAL_TABLE_SIZE: usize = 27 * BLOCK_SIZE * 3;

impl QuantTableKind {
    /// The kind serving a transform strategy.
    #[inline]
    #[must_use]
    pub fn for_strategy(acs: AcStrategy) -> Self {
        match acs {
            AcStrategy::Dct8 => QuantTableKind::Dct,
            AcStrategy::Identity => QuantTableKind::Identity,
            AcStrategy::Dct2x2 => QuantTableKind::Dct2x2,
            AcStrategy::Dct4x4 => QuantTableKind::Dct4x4,
            AcStrategy::Dct16x16 => QuantTableKind::Dct16x16,
            AcStrategy::Dct32x32 => QuantTableKind::Dct32x32,
            AcStrategy::Dct16x8 | AcStrategy::Dct8x16 => QuantTableKind::Dct8x16,
            AcStrategy::Dct4x8 | AcStrategy::Dct8x4 => QuantTableKind::Dct4x8,
        }
    }
}

/// The dequantization matrix library: descriptors plus a lazily-populated
/// cache of synthesized forward and inverse tables.
///
/// Constructed once per encoder or decoder session. The cache is populated
/// by [`DequantMatrices::ensure_computed`] in a single serial phase before
/// any parallel work reads the tables.
#[derive(Debug)]
pub struct DequantMatrices {
    computed_mask: u32,
    table: Vec<f32>,
    inv_table: Vec<f32>,
    table_offsets: [usize; NUM_AC_STRATEGIES * 3],
    encodings: Vec<QuantEncoding>,
    computations: u32,
}

impl DequantMatrices {
    /// Creates a library from one descriptor per quant-table kind.
    pub fn new(encodings: Vec<QuantEncoding>) -> Result<Self> {
        if encodings.len() != NUM_QUANT_TABLES {
            return Err(Error::InvalidQuantEncoding { reason: "descriptor set size mismatch" });
        }
        Ok(Self {
            computed_mask: 0,
            table: vec![0.0; TOTAL_TABLE_SIZE],
            inv_table: vec![0.0; TOTAL_TABLE_SIZE],
            table_offsets: [0; NUM_AC_STRATEGIES * 3],
            encodings,
            computations: 0,
        })
    }

    /// Creates a library where every kind uses the predefined tables.
    #[must_use]
    pub fn default_library() -> Self {
        let encodings = (0..NUM_QUANT_TABLES)
            .map(|_| QuantEncoding::Library { predefined: 0 })
            .collect();
        // Infallible: the descriptor count matches by construction.
        Self::new(encodings).unwrap_or_else(|_| unreachable!())
    }

    /// The predefined descriptor library, synthesized on first use.
    #[must_use]
    pub fn library() -> &'static [QuantEncoding; NUM_QUANT_TABLES] {
        static LIBRARY: OnceLock<[QuantEncoding; NUM_QUANT_TABLES]> = OnceLock::new();
        LIBRARY.get_or_init(|| {
            [
                predefined_dct(),
                predefined_identity(),
                predefined_dct2x2(),
                predefined_dct4x4(),
                predefined_dct16x16(),
                predefined_dct32x32(),
                predefined_dct8x16(),
                predefined_dct4x8(),
            ]
        })
    }

    /// Guarantees that tables for every strategy in `acs_mask` (bit index =
    /// strategy discriminant) are synthesized. Idempotent; recomputation of
    /// an already-cached kind is skipped.
    pub fn ensure_computed(&mut self, acs_mask: u32) -> Result<()> {
        let mut kind_offsets = [0usize; NUM_QUANT_TABLES];
        let mut pos = 0usize;
        for kind in 0..NUM_QUANT_TABLES {
            kind_offsets[kind] = pos;
            pos += 3 * REQUIRED_SIZE_X[kind] * REQUIRED_SIZE_Y[kind] * BLOCK_SIZE;
        }
        debug_assert_eq!(pos, TOTAL_TABLE_SIZE);

        for s in 0..NUM_AC_STRATEGIES {
            let acs = AcStrategy::from_index(s)?;
            let kind = QuantTableKind::for_strategy(acs) as usize;
            let num = REQUIRED_SIZE_X[kind] * REQUIRED_SIZE_Y[kind] * BLOCK_SIZE;
            for c in 0..3 {
                self.table_offsets[s * 3 + c] = kind_offsets[kind] + c * num;
            }
        }

        let mut kind_mask = 0u32;
        for s in 0..NUM_AC_STRATEGIES {
            if acs_mask & (1 << s) != 0 {
                let acs = AcStrategy::from_index(s)?;
                kind_mask |= 1 << QuantTableKind::for_strategy(acs) as u32;
            }
        }

        for kind in 0..NUM_QUANT_TABLES {
            let bit = 1u32 << kind;
            if kind_mask & bit == 0 || self.computed_mask & bit != 0 {
                continue;
            }
            self.compute_quant_table(kind, kind_offsets[kind])?;
            self.computed_mask |= bit;
        }
        Ok(())
    }

    /// Dequantization table (multipliers) for a strategy and channel.
    ///
    /// Legal only after `ensure_computed` covered the strategy.
    #[inline]
    #[must_use]
    pub fn matrix(&self, acs: AcStrategy, c: usize) -> &[f32] {
        debug_assert_ne!(self.computed_mask & (1 << QuantTableKind::for_strategy(acs) as u32), 0);
        let off = self.table_offsets[acs as usize * 3 + c];
        &self.table[off..off + acs.coeff_area()]
    }

    /// Inverse (quantization) table for a strategy and channel.
    #[inline]
    #[must_use]
    pub fn inv_matrix(&self, acs: AcStrategy, c: usize) -> &[f32] {
        debug_assert_ne!(self.computed_mask & (1 << QuantTableKind::for_strategy(acs) as u32), 0);
        let off = self.table_offsets[acs as usize * 3 + c];
        &self.inv_table[off..off + acs.coeff_area()]
    }

    /// DC quantization step for a channel.
    #[inline]
    #[must_use]
    pub fn dc_quant(&self, c: usize) -> f32 {
        DC_QUANT[c]
    }

    /// Inverse DC quantization step for a channel.
    #[inline]
    #[must_use]
    pub fn inv_dc_quant(&self, c: usize) -> f32 {
        INV_DC_QUANT[c]
    }

    /// Number of table syntheses performed so far (cache instrumentation).
    #[inline]
    #[must_use]
    pub fn computations(&self) -> u32 {
        self.computations
    }

    fn compute_quant_table(&mut self, kind: usize, offset: usize) -> Result<()> {
        self.computations += 1;
        let encoding = match &self.encodings[kind] {
            QuantEncoding::Library { predefined } => {
                let idx = *predefined as usize;
                if idx >= NUM_PREDEFINED_TABLES {
                    return Err(Error::PredefinedTableOutOfRange {
                        index: *predefined,
                        available: NUM_PREDEFINED_TABLES,
                    });
                }
                &Self::library()[kind]
            }
            other => other,
        };

        let width = BLOCK_DIM * REQUIRED_SIZE_X[kind];
        let height = BLOCK_DIM * REQUIRED_SIZE_Y[kind];
        let num = width * height;
        let mut weights = vec![0f32; 3 * num];

        match encoding {
            QuantEncoding::Library { .. } => {
                // The library itself never contains Library entries.
                return Err(Error::InvalidQuantEncoding { reason: "recursive library descriptor" });
            }
            QuantEncoding::Identity { xyb_weights } => {
                for c in 0..3 {
                    let start = c * num;
                    for w in &mut weights[start..start + BLOCK_SIZE] {
                        *w = xyb_weights[c][0];
                    }
                    weights[start + 1] = xyb_weights[c][1];
                    weights[start + BLOCK_DIM] = xyb_weights[c][1];
                    weights[start + BLOCK_DIM + 1] = xyb_weights[c][2];
                }
            }
            QuantEncoding::Dct2 { xyb_weights } => {
                for (c, ring) in xyb_weights.iter().enumerate() {
                    let start = c * num;
                    weights[start] = ring[0];
                    weights[start + 1] = ring[0];
                    weights[start + BLOCK_DIM] = ring[0];
                    weights[start + BLOCK_DIM + 1] = ring[1];
                    for y in 0..2 {
                        for x in 0..2 {
                            weights[start + y * BLOCK_DIM + x + 2] = ring[2];
                            weights[start + (y + 2) * BLOCK_DIM + x] = ring[2];
                        }
                    }
                    for y in 0..2 {
                        for x in 0..2 {
                            weights[start + (y + 2) * BLOCK_DIM + x + 2] = ring[3];
                        }
                    }
                    for y in 0..4 {
                        for x in 0..4 {
                            weights[start + y * BLOCK_DIM + x + 4] = ring[4];
                            weights[start + (y + 4) * BLOCK_DIM + x] = ring[4];
                        }
                    }
                    for y in 0..4 {
                        for x in 0..4 {
                            weights[start + (y + 4) * BLOCK_DIM + x + 4] = ring[5];
                        }
                    }
                }
            }
            QuantEncoding::Dct4 { params, xyb_mul } => {
                let mut w4x4 = [0f32; 3 * 4 * 4];
                get_quant_weights(4, 4, params, &mut w4x4)?;
                for c in 0..3 {
                    let start = c * num;
                    for y in 0..BLOCK_DIM {
                        for x in 0..BLOCK_DIM {
                            weights[start + y * BLOCK_DIM + x] =
                                w4x4[c * 16 + (y / 2) * 4 + (x / 2)];
                        }
                    }
                    weights[start + 1] /= xyb_mul[c][0];
                    weights[start + BLOCK_DIM] /= xyb_mul[c][0];
                    weights[start + BLOCK_DIM + 1] /= xyb_mul[c][1];
                }
            }
            QuantEncoding::Dct4x8 { params, xyb_mul } => {
                let mut w8x4 = [0f32; 3 * 8 * 4];
                get_quant_weights(8, 4, params, &mut w8x4)?;
                for c in 0..3 {
                    let start = c * num;
                    for y in 0..BLOCK_DIM {
                        for x in 0..BLOCK_DIM {
                            weights[start + y * BLOCK_DIM + x] =
                                w8x4[c * 32 + (y / 2) * BLOCK_DIM + x];
                        }
                    }
                    weights[start + BLOCK_DIM] /= xyb_mul[c];
                }
            }
            QuantEncoding::Dct { params } => {
                get_quant_weights(width, height, params, &mut weights)?;
            }
        }

        for (i, &w) in weights.iter().enumerate() {
            if !(ALMOST_ZERO..=1.0 / ALMOST_ZERO).contains(&w) {
                return Err(Error::InvalidQuantTableWeight { weight: w });
            }
            self.table[offset + i] = 1.0 / w;
            self.inv_table[offset + i] = w;
        }
        Ok(())
    }
}

/// Evaluates the distance-band curve onto a `width` x `height` grid.
fn get_quant_weights(
    width: usize,
    height: usize,
    params: &DctQuantWeightParams,
    out: &mut [f32],
) -> Result<()> {
    for c in 0..3 {
        let mut bands = [0f32; MAX_DISTANCE_BANDS];
        bands[0] = params.params[c][0];
        if bands[0] < ALMOST_ZERO {
            return Err(Error::InvalidDistanceBand { band: 0, value: bands[0] });
        }
        for i in 1..params.num_bands {
            bands[i] = bands[i - 1] * mult(params.params[c][i]);
            if bands[i] < ALMOST_ZERO {
                return Err(Error::InvalidDistanceBand { band: i, value: bands[i] });
            }
        }
        let scale = (params.num_bands - 1) as f32 / (SQRT_2 + 1e-6);
        let rcp_x = scale / (width - 1) as f32;
        let rcp_y = scale / (height - 1) as f32;
        for y in 0..height {
            let dy = y as f32 * rcp_y;
            let dy2 = dy * dy;
            for x in 0..width {
                let dx = x as f32 * rcp_x;
                let distance = (dx * dx + dy2).sqrt();
                let weight = if params.num_bands == 1 {
                    bands[0]
                } else {
                    interpolate(distance, &bands[..params.num_bands])
                };
                out[c * width * height + y * width + x] = weight;
            }
        }
    }
    Ok(())
}

/// Geometric interpolation between adjacent band values.
fn interpolate(scaled_pos: f32, bands: &[f32]) -> f32 {
    let idx_f = scaled_pos.floor();
    let frac = scaled_pos - idx_f;
    let idx = idx_f as usize;
    let a = bands[idx];
    let b = bands[idx + 1];
    a * (b / a).powf(frac)
}

/// Maps a relative band factor to a multiplier: positive values expand,
/// negative values contract.
#[inline]
fn mult(v: f32) -> f32 {
    if v > 0.0 {
        1.0 + v
    } else {
        1.0 / (1.0 - v)
    }
}

fn predefined_dct() -> QuantEncoding {
    QuantEncoding::dct(DctQuantWeightParams::from_array(&[
        [3150.0, 0.0, -0.4, -0.4, -0.4, -2.0],
        [560.0, 0.0, -0.3, -0.3, -0.3, -0.3],
        [512.0, -2.0, -1.0, 0.0, -1.0, -2.0],
    ]))
}

fn predefined_identity() -> QuantEncoding {
    QuantEncoding::identity([
        [280.0, 3160.0, 3160.0],
        [60.0, 864.0, 864.0],
        [18.0, 200.0, 200.0],
    ])
}

fn predefined_dct2x2() -> QuantEncoding {
    QuantEncoding::dct2([
        [3840.0, 2560.0, 1280.0, 640.0, 480.0, 300.0],
        [960.0, 640.0, 320.0, 180.0, 140.0, 120.0],
        [640.0, 320.0, 128.0, 64.0, 32.0, 16.0],
    ])
}

fn predefined_dct4x4() -> QuantEncoding {
    QuantEncoding::dct4(
        DctQuantWeightParams::from_array(&[
            [2200.0, 0.0, 0.0, 0.0],
            [392.0, 0.0, 0.0, 0.0],
            [112.0, -0.25, -0.25, -0.5],
        ]),
        [[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]],
    )
}

#[allow(clippy::excessive_precision)]
fn predefined_dct16x16() -> QuantEncoding {
    QuantEncoding::dct(DctQuantWeightParams::from_array(&[
        [
            8996.8725711814115328,
            -1.3000777393353804,
            -0.49424529824571225,
            -0.439093774457103443,
            -0.6350101832695744,
            -0.90177264050827612,
            -1.6162099239887414,
        ],
        [
            3191.48366296844234752,
            -0.67424582104194355,
            -0.80745813428471001,
            -0.44925837484843441,
            -0.35865440981033403,
            -0.31322389111877305,
            -0.37615025315725483,
        ],
        [
            1157.50408145487200256,
            -2.0531423165804414,
            -1.4,
            -0.50687130033378396,
            -0.42708730624733904,
            -1.4856834539296244,
            -4.9209142884401604,
        ],
    ]))
}

#[allow(clippy::excessive_precision)]
fn predefined_dct32x32() -> QuantEncoding {
    QuantEncoding::dct(DctQuantWeightParams::from_array(&[
        [
            15718.40830982518931456,
            -1.025,
            -0.98,
            -0.9012,
            -0.4,
            -0.48819395464,
            -0.421064,
            -0.27,
        ],
        [
            7305.7636810695983104,
            -0.8041958212306401,
            -0.7633036457487539,
            -0.55660379990111464,
            -0.49785304658857626,
            -0.43699592683512467,
            -0.40180866526242109,
            -0.27321683125358037,
        ],
        [
            3803.53173721215041536,
            -3.060733579805728,
            -2.0413270132490346,
            -2.0235650159727417,
            -0.5495389509954993,
            -0.4,
            -0.4,
            -0.3,
        ],
    ]))
}

#[allow(clippy::excessive_precision)]
fn predefined_dct8x16() -> QuantEncoding {
    QuantEncoding::dct(DctQuantWeightParams::from_array(&[
        [7240.7734393502, -0.7, -0.7, -0.2, -0.2, -0.2, -0.5],
        [1448.15468787004, -0.5, -0.5, -0.5, -0.2, -0.2, -0.2],
        [506.854140754517, -1.4, -0.2, -0.5, -0.5, -1.5, -3.6],
    ]))
}

#[allow(clippy::excessive_precision)]
fn predefined_dct4x8() -> QuantEncoding {
    QuantEncoding::dct4x8(
        DctQuantWeightParams::from_array(&[
            [
                2198.050556016380522,
                -0.96269623020744692,
                -0.76194253026666783,
                -0.6551140670773547,
            ],
            [
                764.3655248643528689,
                -0.92630200888366945,
                -0.9675229603596517,
                -0.27845290869168118,
            ],
            [
                527.107573587542228,
                -1.4594385811273854,
                -1.450082094097871593,
                -1.5843722511996204,
            ],
        ]),
        [1.0, 1.0, 1.0],
    )
}
