//! Error types for zenjxl.

use std::fmt;

/// Result type for zenjxl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building quantization tables or while
/// entropy encoding/decoding coefficient data.
///
/// Configuration errors (`PredefinedTableOutOfRange`, `InvalidDistanceBand`,
/// `InvalidQuantTableWeight`, `InvalidStrategyPlacement`) are fatal and
/// surface before any image data is processed. Encoder invariants
/// (`ZeroFrequencySymbol`, `TooManySymbols`) indicate a defect in the
/// encoder itself. Stream errors are recoverable at the frame boundary.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A `Library` descriptor referenced a predefined table that does not exist.
    PredefinedTableOutOfRange {
        /// Index requested
        index: u8,
        /// Number of predefined tables available
        available: usize,
    },
    /// A distance-band curve evaluated to a non-positive or degenerate band.
    InvalidDistanceBand {
        /// Band index
        band: usize,
        /// Offending value
        value: f32,
    },
    /// A synthesized quantization weight fell outside the strictly positive
    /// legal range. Inverse tables divide by these weights, so this is fatal.
    InvalidQuantTableWeight {
        /// Offending weight
        weight: f32,
    },
    /// The number of distance bands is outside `[0, 17]`.
    InvalidDistanceBandCount {
        /// Count requested
        count: usize,
    },
    /// A transform strategy footprint overlaps another or leaves the image
    /// or its coding group.
    InvalidStrategyPlacement {
        /// Block x of the offending anchor
        bx: usize,
        /// Block y of the offending anchor
        by: usize,
    },
    /// A symbol occurred in a token substream whose cluster table assigns it
    /// zero frequency. Clustering must guarantee nonzero support.
    ZeroFrequencySymbol {
        /// Context id of the token
        context: u32,
        /// The symbol
        symbol: u32,
    },
    /// A histogram alphabet is too large to normalize to the ANS precision.
    TooManySymbols {
        /// Alphabet size encountered
        alphabet_size: usize,
    },
    /// The payload ended before all requested symbols or bits were read.
    UnexpectedEof {
        /// Context where the stream ran out
        context: &'static str,
    },
    /// A matrix descriptor set cannot be used as given.
    InvalidQuantEncoding {
        /// Description of the problem
        reason: &'static str,
    },
    /// A serialized histogram is internally inconsistent.
    InvalidHistogram {
        /// Description of the inconsistency
        reason: &'static str,
    },
    /// A context id resolved outside the declared context map.
    ContextMapOutOfRange {
        /// Context requested
        context: u32,
        /// Number of declared contexts
        declared: usize,
    },
    /// The decoded symbol stream is inconsistent with the block metadata.
    StreamCorruption {
        /// Description of the inconsistency
        reason: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PredefinedTableOutOfRange { index, available } => {
                write!(f, "predefined table {} out of range ({} available)", index, available)
            }
            Error::InvalidDistanceBand { band, value } => {
                write!(f, "distance band {} evaluated to invalid value {}", band, value)
            }
            Error::InvalidQuantTableWeight { weight } => {
                write!(f, "quantization weight {} outside legal positive range", weight)
            }
            Error::InvalidDistanceBandCount { count } => {
                write!(f, "distance band count {} outside [0, 17]", count)
            }
            Error::InvalidStrategyPlacement { bx, by } => {
                write!(f, "transform strategy at block ({}, {}) overlaps or escapes", bx, by)
            }
            Error::ZeroFrequencySymbol { context, symbol } => {
                write!(f, "symbol {} in context {} has zero assigned frequency", symbol, context)
            }
            Error::TooManySymbols { alphabet_size } => {
                write!(f, "alphabet of {} symbols exceeds ANS precision", alphabet_size)
            }
            Error::UnexpectedEof { context } => {
                write!(f, "unexpected end of stream while reading {}", context)
            }
            Error::InvalidQuantEncoding { reason } => {
                write!(f, "invalid quant encoding: {}", reason)
            }
            Error::InvalidHistogram { reason } => {
                write!(f, "invalid serialized histogram: {}", reason)
            }
            Error::ContextMapOutOfRange { context, declared } => {
                write!(f, "context {} outside declared map of {} contexts", context, declared)
            }
            Error::StreamCorruption { reason } => {
                write!(f, "corrupt coefficient stream: {}", reason)
            }
        }
    }
}

impl std::error::Error for Error {}
