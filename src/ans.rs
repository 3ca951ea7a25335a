//! Range asymmetric numeral system coding of token streams.
//!
//! Symbols are coded with 12-bit frequency precision against clustered
//! histograms. The encoder runs over the tokens in reverse and renormalizes
//! in 16-bit words, so the decoder consumes the stream strictly forward.
//! Raw hybrid-uint bits live in a separate forward section of the payload;
//! encoder and decoder visit tokens in the same order, so the two sections
//! stay in lock step.
//!
//! Payload layout, all lengths little endian:
//!
//! ```text
//! [u32 ans_len][u32 final_state][u16 words...][u32 raw_len][raw bits]
//! ```

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::histogram::{
    cluster_histograms, normalize_counts, Histogram, ANS_LOG_TAB_SIZE, ANS_TAB_SIZE,
    MAX_ALPHABET_SIZE,
};
use crate::hybrid_uint::{HybridUintConfig, Token};

/// Lower bound of the coder state; states live in `[1 << 16, 1 << 32)`.
const RANS_STATE_LOW: u32 = 1 << 16;

/// One clustered, normalized code: frequencies summing to the ANS
/// precision plus the hybrid-uint split used by its tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct AnsCode {
    freqs: Vec<u32>,
    cumulative: Vec<u32>,
    config: HybridUintConfig,
}

impl AnsCode {
    /// Builds a code from normalized frequencies.
    pub fn from_freqs(freqs: Vec<u32>, config: HybridUintConfig) -> Result<Self> {
        if freqs.len() > MAX_ALPHABET_SIZE {
            return Err(Error::TooManySymbols { alphabet_size: freqs.len() });
        }
        let mut cumulative = Vec::with_capacity(freqs.len() + 1);
        let mut acc = 0u32;
        for &f in &freqs {
            cumulative.push(acc);
            acc += f;
        }
        cumulative.push(acc);
        if acc != ANS_TAB_SIZE {
            return Err(Error::InvalidHistogram { reason: "frequencies do not sum to precision" });
        }
        Ok(Self { freqs, cumulative, config })
    }

    /// Normalized frequencies.
    #[must_use]
    pub fn freqs(&self) -> &[u32] {
        &self.freqs
    }

    /// Hybrid-uint configuration for this cluster.
    #[must_use]
    pub fn config(&self) -> HybridUintConfig {
        self.config
    }

    /// True if one symbol owns the whole precision; coding it touches no
    /// state and emits no words.
    #[must_use]
    pub fn is_single_symbol(&self) -> bool {
        self.freqs.iter().filter(|&&f| f > 0).count() == 1
    }
}

/// Everything the encoder needs to emit token streams: the context map
/// from clustering plus one code per cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct EntropyEncodingData {
    context_map: Vec<u8>,
    codes: Vec<AnsCode>,
}

impl EntropyEncodingData {
    /// Clusters per-context histograms and builds normalized codes, all
    /// sharing one hybrid-uint configuration.
    pub fn build(histograms: &[Histogram], config: HybridUintConfig) -> Result<Self> {
        let (clusters, context_map) = cluster_histograms(histograms);
        let mut codes = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            let freqs = normalize_counts(cluster.counts())?;
            codes.push(AnsCode::from_freqs(freqs, config)?);
        }
        Ok(Self { context_map, codes })
    }

    /// Context-to-cluster map.
    #[must_use]
    pub fn context_map(&self) -> &[u8] {
        &self.context_map
    }

    /// Clustered codes.
    #[must_use]
    pub fn codes(&self) -> &[AnsCode] {
        &self.codes
    }

    /// Serializes the context map and cluster codes.
    ///
    /// Layout: 8-bit cluster count; run-length coded context map as a
    /// 16-bit pair count followed by (8-bit cluster, 16-bit run) pairs;
    /// then per cluster a 9-bit hybrid-uint config, a single-symbol flag,
    /// and either the 16-bit symbol or the 16-bit alphabet size followed
    /// by 16-bit frequencies.
    pub fn write_header(&self, w: &mut BitWriter) -> Result<()> {
        if self.codes.is_empty() || self.codes.len() > u8::MAX as usize + 1 {
            return Err(Error::InvalidHistogram { reason: "cluster count out of range" });
        }
        w.write(8, self.codes.len() as u32 - 1);

        let mut runs: Vec<(u8, u32)> = Vec::new();
        for &c in &self.context_map {
            match runs.last_mut() {
                Some((id, len)) if *id == c && *len < u32::from(u16::MAX) => *len += 1,
                _ => runs.push((c, 1)),
            }
        }
        if runs.len() > u16::MAX as usize {
            return Err(Error::InvalidHistogram { reason: "context map too long" });
        }
        w.write(16, runs.len() as u32);
        for &(id, len) in &runs {
            w.write(8, u32::from(id));
            w.write(16, len);
        }

        for code in &self.codes {
            let cfg = code.config;
            w.write(5, cfg.split_exponent());
            w.write(2, cfg.msb_in_token());
            w.write(2, cfg.lsb_in_token());
            if code.is_single_symbol() {
                let symbol = code.freqs.iter().position(|&f| f > 0).unwrap_or(0);
                w.write(1, 1);
                w.write(16, symbol as u32);
            } else {
                w.write(1, 0);
                w.write(16, code.freqs.len() as u32);
                for &f in &code.freqs {
                    w.write(16, f);
                }
            }
        }
        Ok(())
    }
}

/// Entropy codes one token stream against clustered codes.
///
/// Tokens are walked twice: forward to lay down the raw hybrid-uint bits,
/// then backward to drive the ANS state.
pub fn write_tokens(tokens: &[Token], data: &EntropyEncodingData) -> Result<Vec<u8>> {
    let mut raw = BitWriter::new();
    let mut symbols: Vec<(u8, u32)> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let context = token.context as usize;
        let Some(&cluster) = data.context_map.get(context) else {
            return Err(Error::ContextMapOutOfRange {
                context: token.context,
                declared: data.context_map.len(),
            });
        };
        let (symbol, nbits, bits) = data.codes[cluster as usize].config.encode(token.value);
        raw.write(nbits, bits);
        symbols.push((cluster, symbol));
    }

    let mut state = RANS_STATE_LOW;
    let mut words: Vec<u16> = Vec::new();
    for &(cluster, symbol) in symbols.iter().rev() {
        let code = &data.codes[cluster as usize];
        let (freq, cum) = match code.freqs.get(symbol as usize) {
            Some(&f) if f > 0 => (f, code.cumulative[symbol as usize]),
            _ => {
                return Err(Error::ZeroFrequencySymbol {
                    context: u32::from(cluster),
                    symbol,
                })
            }
        };
        let state_max = u64::from(freq) << 20;
        while u64::from(state) >= state_max {
            words.push(state as u16);
            state >>= 16;
        }
        state = ((state / freq) << ANS_LOG_TAB_SIZE) + (state % freq) + cum;
    }

    // The decoder pulls words in the reverse order of emission.
    words.reverse();

    let raw_bytes = raw.finalize();
    let ans_len = 4 + words.len() * 2;
    let mut out = Vec::with_capacity(8 + ans_len + raw_bytes.len());
    out.extend_from_slice(&(ans_len as u32).to_le_bytes());
    out.extend_from_slice(&state.to_le_bytes());
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(&(raw_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&raw_bytes);
    Ok(out)
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    symbol: u16,
    freq: u16,
    cum: u16,
}

/// A cluster code prepared for decoding: a direct slot-to-symbol table
/// over the full precision range.
#[derive(Debug, Clone)]
struct AnsDecoderCode {
    slots: Vec<Slot>,
    config: HybridUintConfig,
}

impl AnsDecoderCode {
    fn from_code(code: &AnsCode) -> Self {
        let mut slots = vec![Slot::default(); ANS_TAB_SIZE as usize];
        for (symbol, &freq) in code.freqs.iter().enumerate() {
            let cum = code.cumulative[symbol];
            for slot in &mut slots[cum as usize..(cum + freq) as usize] {
                *slot = Slot { symbol: symbol as u16, freq: freq as u16, cum: cum as u16 };
            }
        }
        Self { slots, config: code.config }
    }
}

/// Parsed header: context map plus per-cluster decode tables. Built once
/// per frame and shared read-only by all group decoders.
#[derive(Debug, Clone)]
pub struct EntropyDecodingData {
    context_map: Vec<u8>,
    codes: Vec<AnsDecoderCode>,
}

impl EntropyDecodingData {
    /// Reads the header written by [`EntropyEncodingData::write_header`],
    /// validating it against the expected context count.
    pub fn read_header(r: &mut BitReader<'_>, num_contexts: usize) -> Result<Self> {
        let num_clusters = r.read(8)? as usize + 1;

        let num_runs = r.read(16)? as usize;
        let mut context_map = Vec::with_capacity(num_contexts);
        for _ in 0..num_runs {
            let id = r.read(8)? as u8;
            let len = r.read(16)? as usize;
            if (id as usize) >= num_clusters {
                return Err(Error::ContextMapOutOfRange {
                    context: context_map.len() as u32,
                    declared: num_clusters,
                });
            }
            // Reject before materializing: run lengths are attacker
            // controlled and may overshoot the context count by orders of
            // magnitude.
            if context_map.len() + len > num_contexts {
                return Err(Error::InvalidHistogram {
                    reason: "context map longer than declared contexts",
                });
            }
            context_map.extend(std::iter::repeat(id).take(len));
        }
        if context_map.len() != num_contexts {
            return Err(Error::InvalidHistogram { reason: "context map length mismatch" });
        }

        let mut codes = Vec::with_capacity(num_clusters);
        for _ in 0..num_clusters {
            let split = r.read(5)?;
            let msb = r.read(2)?;
            let lsb = r.read(2)?;
            let config = HybridUintConfig::new(split, msb, lsb)?;
            let freqs = if r.read(1)? == 1 {
                let symbol = r.read(16)? as usize;
                if symbol >= MAX_ALPHABET_SIZE {
                    return Err(Error::TooManySymbols { alphabet_size: symbol + 1 });
                }
                let mut freqs = vec![0u32; symbol + 1];
                freqs[symbol] = ANS_TAB_SIZE;
                freqs
            } else {
                let alphabet_size = r.read(16)? as usize;
                if alphabet_size > MAX_ALPHABET_SIZE {
                    return Err(Error::TooManySymbols { alphabet_size });
                }
                let mut freqs = Vec::with_capacity(alphabet_size);
                for _ in 0..alphabet_size {
                    freqs.push(r.read(16)?);
                }
                freqs
            };
            let code = AnsCode::from_freqs(freqs, config)?;
            codes.push(AnsDecoderCode::from_code(&code));
        }
        Ok(Self { context_map, codes })
    }

    /// Context-to-cluster map.
    #[must_use]
    pub fn context_map(&self) -> &[u8] {
        &self.context_map
    }
}

/// Stateful forward decoder over one payload.
pub struct AnsDecoder<'a> {
    data: &'a EntropyDecodingData,
    state: u32,
    words: &'a [u8],
    word_pos: usize,
    raw: BitReader<'a>,
}

impl<'a> AnsDecoder<'a> {
    /// Parses the payload framing and seeds the coder state.
    pub fn new(data: &'a EntropyDecodingData, payload: &'a [u8]) -> Result<Self> {
        let (ans, rest) = split_section(payload, "ans section")?;
        let (raw, tail) = split_section(rest, "raw bits section")?;
        if !tail.is_empty() {
            return Err(Error::StreamCorruption { reason: "trailing bytes after payload" });
        }
        if ans.len() < 4 || ans.len() % 2 != 0 {
            return Err(Error::StreamCorruption { reason: "ans section framing" });
        }
        let state = u32::from_le_bytes([ans[0], ans[1], ans[2], ans[3]]);
        if state < RANS_STATE_LOW {
            return Err(Error::StreamCorruption { reason: "initial state out of range" });
        }
        Ok(Self {
            data,
            state,
            words: &ans[4..],
            word_pos: 0,
            raw: BitReader::new(raw),
        })
    }

    /// Decodes one symbol in `context`'s cluster.
    pub fn read_symbol(&mut self, context: usize) -> Result<u32> {
        let Some(&cluster) = self.data.context_map.get(context) else {
            return Err(Error::ContextMapOutOfRange {
                context: context as u32,
                declared: self.data.context_map.len(),
            });
        };
        let code = &self.data.codes[cluster as usize];
        let slot = self.state & (ANS_TAB_SIZE - 1);
        let entry = code.slots[slot as usize];
        if entry.freq == 0 {
            return Err(Error::StreamCorruption { reason: "state hit a zero-frequency slot" });
        }
        self.state = u32::from(entry.freq) * (self.state >> ANS_LOG_TAB_SIZE) + slot
            - u32::from(entry.cum);
        while self.state < RANS_STATE_LOW {
            let Some(bytes) = self.words.get(self.word_pos..self.word_pos + 2) else {
                return Err(Error::UnexpectedEof { context: "ans words" });
            };
            self.state = (self.state << 16) | u32::from(u16::from_le_bytes([bytes[0], bytes[1]]));
            self.word_pos += 2;
        }
        Ok(u32::from(entry.symbol))
    }

    /// Decodes one hybrid uint: the symbol plus its raw bits.
    pub fn read_hybrid_uint(&mut self, context: usize) -> Result<u32> {
        let Some(&cluster) = self.data.context_map.get(context) else {
            return Err(Error::ContextMapOutOfRange {
                context: context as u32,
                declared: self.data.context_map.len(),
            });
        };
        let config = self.data.codes[cluster as usize].config;
        let symbol = self.read_symbol(context)?;
        let nbits = config.nbits_for_token(symbol)?;
        let bits = self.raw.read(nbits)?;
        Ok(config.merge(symbol, bits))
    }

    /// Verifies the coder drained exactly: final state back at the seed
    /// and every renorm word consumed.
    pub fn finalize(self) -> Result<()> {
        if self.state != RANS_STATE_LOW {
            return Err(Error::StreamCorruption { reason: "final state mismatch" });
        }
        if self.word_pos != self.words.len() {
            return Err(Error::StreamCorruption { reason: "unconsumed ans words" });
        }
        Ok(())
    }
}

fn split_section<'a>(data: &'a [u8], what: &'static str) -> Result<(&'a [u8], &'a [u8])> {
    if data.len() < 4 {
        return Err(Error::UnexpectedEof { context: what });
    }
    let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() - 4 < len {
        return Err(Error::UnexpectedEof { context: what });
    }
    Ok((&data[4..4 + len], &data[4 + len..]))
}
