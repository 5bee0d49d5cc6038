//! K-mer ⇄ dense-index bijection.
//!
//! A k-mer over the effective alphabet (unknown symbol excluded for plain
//! residue types) packs into `index = sum residues[j] * base^j`. The
//! contiguous scan keeps a rolling index: advancing one position divides
//! the previous digit out and mixes the incoming residue in at the top.
//! Spaced k-mers select their digits through a fixed binary pattern and
//! are recomputed per window.

use crate::error::{KseedError, Result};

pub const MIN_KMER_SIZE: usize = 2;
pub const MAX_KMER_SIZE: usize = 7;

/// Built-in spaced patterns, one per k. Exactly k set bits; the pattern
/// span is the window width scanned over the sequence. Pattern identity is
/// fixed, so `(k, spaced)` in the index metadata pins it for query time.
pub fn spaced_pattern(kmer_size: usize) -> Result<&'static [u8]> {
    match kmer_size {
        2 => Ok(&[1, 0, 1]),
        3 => Ok(&[1, 1, 0, 1]),
        4 => Ok(&[1, 1, 0, 1, 0, 1]),
        5 => Ok(&[1, 1, 0, 1, 0, 1, 1]),
        6 => Ok(&[1, 1, 0, 1, 1, 0, 1, 1]),
        7 => Ok(&[1, 1, 0, 1, 1, 0, 1, 1, 0, 1]),
        other => Err(KseedError::Parameter(format!(
            "k-mer size {other} outside [{MIN_KMER_SIZE}, {MAX_KMER_SIZE}]"
        ))),
    }
}

pub struct Indexer {
    base: u64,
    kmer_size: usize,
    pattern: Option<&'static [u8]>,
    span: usize,
    highest_power: u64,
    last_index: Option<u64>,
}

impl Indexer {
    /// Contiguous k-mer indexer over an effective alphabet.
    pub fn new(alphabet_size: usize, kmer_size: usize) -> Result<Self> {
        Self::with_pattern(alphabet_size, kmer_size, false)
    }

    /// Indexer for the given `(k, spaced)` combination.
    pub fn with_pattern(alphabet_size: usize, kmer_size: usize, spaced: bool) -> Result<Self> {
        if !(MIN_KMER_SIZE..=MAX_KMER_SIZE).contains(&kmer_size) {
            return Err(KseedError::Parameter(format!(
                "k-mer size {kmer_size} outside [{MIN_KMER_SIZE}, {MAX_KMER_SIZE}]"
            )));
        }
        if alphabet_size < 2 {
            return Err(KseedError::Parameter(format!(
                "alphabet size {alphabet_size} too small for k-mer indexing"
            )));
        }
        let pattern = if spaced {
            Some(spaced_pattern(kmer_size)?)
        } else {
            None
        };
        let span = pattern.map_or(kmer_size, <[u8]>::len);
        let base = alphabet_size as u64;
        Ok(Indexer {
            base,
            kmer_size,
            pattern,
            span,
            highest_power: base.pow(kmer_size as u32 - 1),
            last_index: None,
        })
    }

    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Window width consumed per position: k for contiguous, the pattern
    /// length for spaced.
    pub fn span(&self) -> usize {
        self.span
    }

    /// Number of distinct k-mer indices, `base^k`.
    pub fn table_size(&self) -> usize {
        self.base.pow(self.kmer_size as u32) as usize
    }

    /// Forget the rolling state; the next call recomputes from scratch.
    pub fn reset(&mut self) {
        self.last_index = None;
    }

    /// The k digits forming the index of `window`: the window itself for
    /// contiguous k-mers, the pattern-selected residues (copied into
    /// `scratch`) for spaced ones.
    #[inline]
    pub fn select_digits<'a>(
        &self,
        window: &'a [u8],
        scratch: &'a mut [u8; MAX_KMER_SIZE],
    ) -> &'a [u8] {
        match self.pattern {
            None => &window[..self.kmer_size],
            Some(pattern) => {
                let mut n = 0;
                for (i, &bit) in pattern.iter().enumerate() {
                    if bit != 0 {
                        scratch[n] = window[i];
                        n += 1;
                    }
                }
                &scratch[..n]
            }
        }
    }

    /// Packed index of the k-mer starting at `window`, advancing the
    /// rolling cursor. Successive calls must move forward one position at
    /// a time; `reset` starts a new sequence. The rolling update is exact
    /// only over residues below the base: the reserved unknown code equals
    /// the base, so dividing it back out leaves a carry in the cursor.
    /// Callers that skip a window containing the unknown code must `reset`
    /// before the next call.
    #[inline]
    pub fn next_index(&mut self, window: &[u8]) -> u32 {
        let index = match (self.pattern, self.last_index) {
            (None, Some(last)) => {
                last / self.base + window[self.kmer_size - 1] as u64 * self.highest_power
            }
            _ => {
                let mut scratch = [0u8; MAX_KMER_SIZE];
                let digits = self.select_digits(window, &mut scratch);
                let mut index = 0u64;
                let mut power = 1u64;
                for &r in digits {
                    index += r as u64 * power;
                    power *= self.base;
                }
                index
            }
        };
        if self.pattern.is_none() {
            self.last_index = Some(index);
        }
        index as u32
    }

    /// Inverse mapping: decode `index` back into k residue codes.
    pub fn index_to_residues(&self, index: u32, out: &mut [u8]) {
        let mut rest = index as u64;
        for slot in out.iter_mut().take(self.kmer_size) {
            *slot = (rest % self.base) as u8;
            rest /= self.base;
        }
    }
}
