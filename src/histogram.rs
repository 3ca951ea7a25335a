//! Symbol statistics, histogram clustering, and frequency normalization.
//!
//! Contexts with similar statistics are merged into a small set of
//! clustered histograms so that each carries enough mass to be worth a
//! code. Clustering is greedy and fully deterministic: identical inputs
//! yield identical cluster sets and context maps on every run.

use crate::error::{Error, Result};

/// log2 of the ANS frequency precision.
pub const ANS_LOG_TAB_SIZE: u32 = 12;

/// All normalized histograms sum to this.
pub const ANS_TAB_SIZE: u32 = 1 << ANS_LOG_TAB_SIZE;

/// Upper bound on clustered histograms per stream.
pub const MAX_CLUSTERS: usize = 64;

/// Largest token alphabet a single histogram may carry.
pub const MAX_ALPHABET_SIZE: usize = 1 << 12;

/// Merging two histograms is allowed to cost up to this many bits before
/// a new cluster is opened instead.
const MERGE_COST_THRESHOLD: f64 = 64.0;

/// Raw symbol counts for one context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Histogram {
    counts: Vec<u32>,
    total: u64,
}

impl Histogram {
    /// Empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `symbol`.
    #[inline]
    pub fn add(&mut self, symbol: usize) {
        if symbol >= self.counts.len() {
            self.counts.resize(symbol + 1, 0);
        }
        self.counts[symbol] += 1;
        self.total += 1;
    }

    /// Folds `other` into `self`.
    pub fn merge(&mut self, other: &Histogram) {
        if other.counts.len() > self.counts.len() {
            self.counts.resize(other.counts.len(), 0);
        }
        for (dst, &src) in self.counts.iter_mut().zip(&other.counts) {
            *dst += src;
        }
        self.total += other.total;
    }

    /// Counts, trimmed of trailing zeros.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        let len = self.alphabet_size();
        &self.counts[..len]
    }

    /// One past the largest occurring symbol.
    #[must_use]
    pub fn alphabet_size(&self) -> usize {
        self.counts.iter().rposition(|&c| c > 0).map_or(0, |p| p + 1)
    }

    /// Total number of recorded symbols.
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Shannon cost of coding the histogram's own symbols, in bits.
    #[must_use]
    pub fn shannon_cost(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let total = self.total as f64;
        let mut sum = total * total.log2();
        for &c in &self.counts {
            if c > 0 {
                sum -= f64::from(c) * f64::from(c).log2();
            }
        }
        sum
    }

    /// Extra bits incurred by coding both histograms with one merged code.
    #[must_use]
    pub fn merge_cost(&self, other: &Histogram) -> f64 {
        let mut merged = self.clone();
        merged.merge(other);
        merged.shannon_cost() - self.shannon_cost() - other.shannon_cost()
    }
}

/// Greedily clusters per-context histograms.
///
/// Contexts are visited in order of decreasing population (ties by context
/// index), joining the cheapest existing cluster unless opening a new one
/// is affordable. Returns the clustered histograms and the context map.
#[must_use]
pub fn cluster_histograms(histograms: &[Histogram]) -> (Vec<Histogram>, Vec<u8>) {
    let mut order: Vec<usize> = (0..histograms.len()).collect();
    order.sort_by_key(|&i| (std::cmp::Reverse(histograms[i].total()), i));

    let mut clusters: Vec<Histogram> = Vec::new();
    let mut map = vec![0u8; histograms.len()];
    for &i in &order {
        let h = &histograms[i];
        let mut best: Option<(usize, f64)> = None;
        for (c, cluster) in clusters.iter().enumerate() {
            let cost = cluster.merge_cost(h);
            if best.is_none_or(|(_, b)| cost < b) {
                best = Some((c, cost));
            }
        }
        match best {
            Some((c, cost)) if cost <= MERGE_COST_THRESHOLD || clusters.len() >= MAX_CLUSTERS => {
                clusters[c].merge(h);
                map[i] = c as u8;
            }
            _ => {
                map[i] = clusters.len() as u8;
                clusters.push(h.clone());
            }
        }
    }
    (clusters, map)
}

/// Normalizes counts to sum exactly to [`ANS_TAB_SIZE`], giving every
/// occurring symbol a frequency of at least one. An all-zero histogram
/// normalizes to a degenerate code for symbol zero.
pub fn normalize_counts(counts: &[u32]) -> Result<Vec<u32>> {
    if counts.len() > MAX_ALPHABET_SIZE {
        return Err(Error::TooManySymbols { alphabet_size: counts.len() });
    }
    let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    if total == 0 {
        return Ok(vec![ANS_TAB_SIZE]);
    }
    let num_nonzero = counts.iter().filter(|&&c| c > 0).count() as u64;
    // Alphabet size is bounded by the table size, so one slot per symbol fits.
    let spare = u64::from(ANS_TAB_SIZE) - num_nonzero;

    let mut freqs = vec![0u32; counts.len()];
    let mut remainders: Vec<(u64, usize)> = Vec::new();
    let mut assigned = 0u64;
    for (i, &c) in counts.iter().enumerate() {
        if c == 0 {
            continue;
        }
        let scaled = u64::from(c) * spare;
        freqs[i] = 1 + (scaled / total) as u32;
        assigned += scaled / total;
        remainders.push((scaled % total, i));
    }
    // Hand out the leftover slots by largest remainder, lowest index first.
    // The leftover is strictly below the number of occurring symbols.
    let leftover = (spare - assigned) as usize;
    remainders.sort_by_key(|&(rem, i)| (std::cmp::Reverse(rem), i));
    for &(_, i) in remainders.iter().take(leftover) {
        freqs[i] += 1;
    }
    debug_assert_eq!(freqs.iter().map(|&f| u64::from(f)).sum::<u64>(), u64::from(ANS_TAB_SIZE));
    Ok(freqs)
}
