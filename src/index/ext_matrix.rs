//! Extended substitution matrices over k-mer space.
//!
//! For every k-mer, the score against every other k-mer is the sum of the
//! per-position residue scores. Rows are kept in descending score order
//! (stable by k-mer index) so a consumer can enumerate the best-scoring
//! neighbors of a query k-mer without sorting. The 2-mer and 3-mer
//! snapshots are bundled into the index file for plain residue types.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{KseedError, Result};
use crate::utils::matrix::SubstitutionMatrix;

pub struct ScoreMatrix {
    pub kmer_size: usize,
    /// Number of k-mers per dimension, `alphabet^k`.
    pub row_size: usize,
    /// Row-major scores, each row sorted descending.
    pub scores: Vec<i16>,
    /// K-mer indices parallel to `scores`.
    pub indexes: Vec<u32>,
}

impl ScoreMatrix {
    /// Compute the full k-mer pair matrix over the effective alphabet.
    /// Rows are ordered by a counting sort over the bounded score range,
    /// ties resolved by ascending k-mer index.
    pub fn calc(matrix: &SubstitutionMatrix, alphabet_size: usize, kmer_size: usize) -> Self {
        let base = alphabet_size;
        let row_size = base.pow(kmer_size as u32);

        // digit expansion of every k-mer index, reused across rows
        let mut digits = vec![0u8; row_size * kmer_size];
        for index in 0..row_size {
            let mut rest = index;
            for p in 0..kmer_size {
                digits[index * kmer_size + p] = (rest % base) as u8;
                rest /= base;
            }
        }

        let (mut min_score, mut max_score) = (i32::MAX, i32::MIN);
        for a in 0..base as u8 {
            for b in 0..base as u8 {
                let s = matrix.score(a, b) as i32;
                min_score = min_score.min(s);
                max_score = max_score.max(s);
            }
        }
        let low = min_score * kmer_size as i32;
        let range = ((max_score - min_score) * kmer_size as i32 + 1) as usize;

        let elements = row_size * row_size;
        let mut scores = vec![0i16; elements];
        let mut indexes = vec![0u32; elements];
        let mut row_scores = vec![0i16; row_size];
        let mut histogram = vec![0usize; range];

        for row in 0..row_size {
            let row_digits = &digits[row * kmer_size..(row + 1) * kmer_size];
            histogram.iter_mut().for_each(|h| *h = 0);
            for (col, score_slot) in row_scores.iter_mut().enumerate() {
                let col_digits = &digits[col * kmer_size..(col + 1) * kmer_size];
                let mut score = 0i32;
                for p in 0..kmer_size {
                    score += matrix.score(row_digits[p], col_digits[p]) as i32;
                }
                *score_slot = score as i16;
                histogram[(score - low) as usize] += 1;
            }
            // descending placement: best scores first
            let mut cursor = 0usize;
            let mut starts = vec![0usize; range];
            for bucket in (0..range).rev() {
                starts[bucket] = cursor;
                cursor += histogram[bucket];
            }
            let out = row * row_size;
            for (col, &score) in row_scores.iter().enumerate() {
                let bucket = (score as i32 - low) as usize;
                let slot = out + starts[bucket];
                starts[bucket] += 1;
                scores[slot] = score;
                indexes[slot] = col as u32;
            }
        }

        ScoreMatrix {
            kmer_size,
            row_size,
            scores,
            indexes,
        }
    }

    /// The sorted `(scores, indexes)` run for one k-mer.
    pub fn lookup_row(&self, kmer_index: u32) -> (&[i16], &[u32]) {
        let start = kmer_index as usize * self.row_size;
        let end = start + self.row_size;
        (&self.scores[start..end], &self.indexes[start..end])
    }

    /// Blob layout: `[row_size u64][elements u64][scores i16..][indexes u32..]`,
    /// all little-endian.
    pub fn serialize(&self) -> Vec<u8> {
        let elements = self.scores.len();
        let mut blob = vec![0u8; 16 + elements * 2 + elements * 4];
        LittleEndian::write_u64(&mut blob[0..8], self.row_size as u64);
        LittleEndian::write_u64(&mut blob[8..16], elements as u64);
        LittleEndian::write_i16_into(&self.scores, &mut blob[16..16 + elements * 2]);
        LittleEndian::write_u32_into(&self.indexes, &mut blob[16 + elements * 2..]);
        blob
    }

    /// Inverse of [`serialize`], validated against the expected geometry.
    ///
    /// [`serialize`]: ScoreMatrix::serialize
    pub fn deserialize(blob: &[u8], alphabet_size: usize, kmer_size: usize) -> Result<Self> {
        if blob.len() < 16 {
            return Err(KseedError::Parse(
                "extended matrix blob too short".to_string(),
            ));
        }
        let row_size = LittleEndian::read_u64(&blob[0..8]) as usize;
        let elements = LittleEndian::read_u64(&blob[8..16]) as usize;
        let expected_rows = alphabet_size.pow(kmer_size as u32);
        if row_size != expected_rows || elements != row_size * row_size {
            return Err(KseedError::Parse(format!(
                "extended matrix geometry mismatch: {row_size} rows, {elements} elements \
                 (expected {expected_rows} rows)"
            )));
        }
        if blob.len() < 16 + elements * 6 {
            return Err(KseedError::Parse(
                "extended matrix blob truncated".to_string(),
            ));
        }
        let mut scores = vec![0i16; elements];
        let mut indexes = vec![0u32; elements];
        LittleEndian::read_i16_into(&blob[16..16 + elements * 2], &mut scores);
        LittleEndian::read_u32_into(
            &blob[16 + elements * 2..16 + elements * 6],
            &mut indexes,
        );
        Ok(ScoreMatrix {
            kmer_size,
            row_size,
            scores,
            indexes,
        })
    }
}
