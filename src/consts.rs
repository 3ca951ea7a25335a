//! Shared constants for block geometry and DC quantization.

/// Linear dimension of the fundamental coefficient block.
pub const BLOCK_DIM: usize = 8;

/// Number of coefficients in a fundamental block.
pub const BLOCK_SIZE: usize = BLOCK_DIM * BLOCK_DIM;

/// Group (tile) dimension in block units. Groups are the unit of parallel
/// tokenization and entropy coding; transforms never cross group borders.
pub const GROUP_DIM_BLOCKS: usize = 32;

/// Inverse DC quantization step per channel. Kept as powers of two.
pub const INV_DC_QUANT: [f32; 3] = [4096.0, 512.0, 256.0];

/// DC quantization step per channel.
pub const DC_QUANT: [f32; 3] = [
    1.0 / INV_DC_QUANT[0],
    1.0 / INV_DC_QUANT[1],
    1.0 / INV_DC_QUANT[2],
];
