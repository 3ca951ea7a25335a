//! Common types shared across the coefficient coding pipeline.

/// Chroma subsampling layout of the coefficient planes.
///
/// Channel 1 is luma and is always full resolution; channels 0 and 2 are
/// chroma and may be subsampled. Subsampled chroma is always coded with
/// 8x8 blocks regardless of the luma transform strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaSubsampling {
    /// No subsampling.
    Cs444,
    /// Chroma halved both horizontally and vertically.
    Cs420,
    /// Chroma halved horizontally.
    Cs422,
    /// Chroma halved vertically.
    Cs440,
}

impl ChromaSubsampling {
    /// Horizontal downsampling shift for a channel.
    #[inline]
    #[must_use]
    pub fn hshift(self, channel: usize) -> usize {
        if channel == 1 {
            return 0;
        }
        match self {
            ChromaSubsampling::Cs444 | ChromaSubsampling::Cs440 => 0,
            ChromaSubsampling::Cs420 | ChromaSubsampling::Cs422 => 1,
        }
    }

    /// Vertical downsampling shift for a channel.
    #[inline]
    #[must_use]
    pub fn vshift(self, channel: usize) -> usize {
        if channel == 1 {
            return 0;
        }
        match self {
            ChromaSubsampling::Cs444 | ChromaSubsampling::Cs422 => 0,
            ChromaSubsampling::Cs420 | ChromaSubsampling::Cs440 => 1,
        }
    }

    /// True if any channel is subsampled.
    #[inline]
    #[must_use]
    pub fn is_subsampled(self) -> bool {
        !matches!(self, ChromaSubsampling::Cs444)
    }
}

/// A rectangular region in block units (luma resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge in blocks.
    pub x0: usize,
    /// Top edge in blocks.
    pub y0: usize,
    /// Width in blocks.
    pub xsize: usize,
    /// Height in blocks.
    pub ysize: usize,
}

impl Rect {
    /// Creates a rect from origin and extent.
    #[must_use]
    pub fn new(x0: usize, y0: usize, xsize: usize, ysize: usize) -> Self {
        Self { x0, y0, xsize, ysize }
    }

    /// Exclusive right edge.
    #[inline]
    #[must_use]
    pub fn x1(&self) -> usize {
        self.x0 + self.xsize
    }

    /// Exclusive bottom edge.
    #[inline]
    #[must_use]
    pub fn y1(&self) -> usize {
        self.y0 + self.ysize
    }
}
