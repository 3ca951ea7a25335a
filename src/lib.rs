//! Coefficient entropy-coding core for a JPEG XL-style image codec.
//!
//! The crate covers the lossless middle of the codec pipeline: it takes
//! quantized integer coefficient blocks plus their transform-strategy map
//! and turns them into compact entropy-coded bytes, and back, bit-exactly.
//!
//! The pieces, in pipeline order:
//!
//! - [`quant::DequantMatrices`]: parametric quantization-matrix library
//!   with a lazily-populated shared table cache;
//! - [`tokenize::tokenize_coefficients`]: context-modeled tokenization of
//!   coefficient blocks (nonzero counts with spatial prediction, one
//!   token per nonzero coefficient);
//! - [`hybrid_uint::HybridUintConfig`]: token/raw-bits split for large
//!   values;
//! - [`histogram`] and [`ans`]: deterministic histogram clustering and
//!   rANS coding of the token stream;
//! - [`enc_cache::encode_frame`] / [`enc_cache::decode_frame`]: group
//!   tiling, parallel fan-out, and the frame byte layout.
//!
//! Encoding the same input always yields byte-identical output, no matter
//! the thread count; decoding rejects corrupt data with a descriptive
//! [`Error`] instead of panicking.

pub mod ac_context;
pub mod ac_strategy;
pub mod ans;
pub mod bitstream;
pub mod coeff_order;
pub mod consts;
pub mod enc_cache;
pub mod error;
pub mod histogram;
pub mod hybrid_uint;
pub mod quant;
pub mod tokenize;
pub mod types;

pub use ac_context::BlockContextMap;
pub use ac_strategy::{AcStrategy, AcStrategyImage};
pub use ans::{AnsDecoder, EntropyDecodingData, EntropyEncodingData};
pub use coeff_order::CoeffOrders;
pub use enc_cache::{decode_frame, encode_frame, FrameDimensions, PassData, PassesEncoderState};
pub use error::{Error, Result};
pub use hybrid_uint::{HybridUintConfig, Token};
pub use quant::{DequantMatrices, QuantEncoding};
pub use tokenize::{decode_coefficients, tokenize_coefficients, GroupCoeffs};
pub use types::{ChromaSubsampling, Rect};
