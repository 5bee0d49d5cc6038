//! Substitution matrices and residue encoding.
//!
//! Two concrete matrices are provided: BLOSUM62 over the 21-letter amino
//! acid alphabet `ACDEFGHIKLMNPQRSTVWYX` and a match/mismatch matrix over
//! the 5-letter nucleotide alphabet `ACGTN`. The last symbol of each
//! alphabet is the reserved "unknown" residue: it absorbs ambiguity codes,
//! is written by the masker, and is excluded from k-mer indexing.

use crate::sequence::SeqType;

/// Sentinel returned by the encoding LUT for bytes that map to no residue.
pub const INVALID_CODE: u8 = 0xff;

/// Residue substitution matrix plus the alphabet bijection around it.
pub struct SubstitutionMatrix {
    name: String,
    /// Full alphabet size, unknown residue included.
    pub alphabet_size: usize,
    /// Residue code to ASCII letter.
    pub int2aa: Vec<u8>,
    /// ASCII byte to residue code; `INVALID_CODE` for unmapped bytes.
    pub aa2int: [u8; 256],
    scores: Vec<i16>,
}

/// BLOSUM62 in `ACDEFGHIKLMNPQRSTVWYX` order, row-major. The X row/column
/// carries -1 everywhere; X never enters a scored k-mer.
#[rustfmt::skip]
const BLOSUM62: [i16; 21 * 21] = [
//    A   C   D   E   F   G   H   I   K   L   M   N   P   Q   R   S   T   V   W   Y   X
      4,  0, -2, -1, -2,  0, -2, -1, -1, -1, -1, -2, -1, -1, -1,  1,  0,  0, -3, -2, -1, // A
      0,  9, -3, -4, -2, -3, -3, -1, -3, -1, -1, -3, -3, -3, -3, -1, -1, -1, -2, -2, -1, // C
     -2, -3,  6,  2, -3, -1, -1, -3, -1, -4, -3,  1, -1,  0, -2,  0, -1, -3, -4, -3, -1, // D
     -1, -4,  2,  5, -3, -2,  0, -3,  1, -3, -2,  0, -1,  2,  0,  0, -1, -2, -3, -2, -1, // E
     -2, -2, -3, -3,  6, -3, -1,  0, -3,  0,  0, -3, -4, -3, -3, -2, -2, -1,  1,  3, -1, // F
      0, -3, -1, -2, -3,  6, -2, -4, -2, -4, -3,  0, -2, -2, -2,  0, -2, -3, -2, -3, -1, // G
     -2, -3, -1,  0, -1, -2,  8, -3, -1, -3, -2,  1, -2,  0,  0, -1, -2, -3, -2,  2, -1, // H
     -1, -1, -3, -3,  0, -4, -3,  4, -3,  2,  1, -3, -3, -3, -3, -2, -1,  3, -3, -1, -1, // I
     -1, -3, -1,  1, -3, -2, -1, -3,  5, -2, -1,  0, -1,  1,  2,  0, -1, -2, -3, -2, -1, // K
     -1, -1, -4, -3,  0, -4, -3,  2, -2,  4,  2, -3, -3, -2, -2, -2, -1,  1, -2, -1, -1, // L
     -1, -1, -3, -2,  0, -3, -2,  1, -1,  2,  5, -2, -2,  0, -1, -1, -1,  1, -1, -1, -1, // M
     -2, -3,  1,  0, -3,  0,  1, -3,  0, -3, -2,  6, -2,  0,  0,  1,  0, -3, -4, -2, -1, // N
     -1, -3, -1, -1, -4, -2, -2, -3, -1, -3, -2, -2,  7, -1, -2, -1, -1, -2, -4, -3, -1, // P
     -1, -3,  0,  2, -3, -2,  0, -3,  1, -2,  0,  0, -1,  5,  1,  0, -1, -2, -2, -1, -1, // Q
     -1, -3, -2,  0, -3, -2,  0, -3,  2, -2, -1,  0, -2,  1,  5, -1, -1, -3, -3, -2, -1, // R
      1, -1,  0,  0, -2,  0, -1, -2,  0, -2, -1,  1, -1,  0, -1,  4,  1, -2, -3, -2, -1, // S
      0, -1, -1, -1, -2, -2, -2, -1, -1, -1, -1,  0, -1, -1, -1,  1,  5,  0, -2, -2, -1, // T
      0, -1, -3, -2, -1, -3, -3,  3, -2,  1,  1, -3, -2, -2, -3, -2,  0,  4, -3, -1, -1, // V
     -3, -2, -4, -3,  1, -2, -2, -3, -3, -2, -1, -4, -4, -2, -3, -3, -2, -3, 11,  2, -1, // W
     -2, -2, -3, -2,  3, -3,  2, -1, -2, -1, -1, -2, -3, -1, -2, -2, -2, -1,  2,  7, -1, // Y
     -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // X
];

/// Nucleotide matrix in `ACGTN` order: +2 match, -3 mismatch, -1 against N.
#[rustfmt::skip]
const NUCLEOTIDE: [i16; 5 * 5] = [
//    A   C   G   T   N
      2, -3, -3, -3, -1, // A
     -3,  2, -3, -3, -1, // C
     -3, -3,  2, -3, -1, // G
     -3, -3, -3,  2, -1, // T
     -1, -1, -1, -1, -1, // N
];

impl SubstitutionMatrix {
    fn new(name: &str, int2aa: &[u8], scores: &[i16], aliases: &[(u8, u8)]) -> Self {
        debug_assert_eq!(int2aa.len() * int2aa.len(), scores.len());
        let mut aa2int = [INVALID_CODE; 256];
        for (code, &letter) in int2aa.iter().enumerate() {
            aa2int[letter as usize] = code as u8;
            aa2int[letter.to_ascii_lowercase() as usize] = code as u8;
        }
        for &(from, to) in aliases {
            let code = aa2int[to as usize];
            aa2int[from as usize] = code;
            aa2int[from.to_ascii_lowercase() as usize] = code;
        }
        SubstitutionMatrix {
            name: name.to_string(),
            alphabet_size: int2aa.len(),
            int2aa: int2aa.to_vec(),
            aa2int,
            scores: scores.to_vec(),
        }
    }

    /// BLOSUM62 over the 21-letter amino acid alphabet. The ambiguity
    /// letters B/J/Z and the rare U/O, along with `*`, collapse onto X.
    pub fn blosum62() -> Self {
        let mut m = Self::new(
            "blosum62",
            b"ACDEFGHIKLMNPQRSTVWYX",
            &BLOSUM62,
            &[
                (b'B', b'X'),
                (b'J', b'X'),
                (b'Z', b'X'),
                (b'U', b'X'),
                (b'O', b'X'),
            ],
        );
        m.aa2int[b'*' as usize] = m.unknown_residue();
        m
    }

    /// Match/mismatch matrix over `ACGTN`. IUPAC ambiguity codes collapse
    /// onto N; U maps to T.
    pub fn nucleotide() -> Self {
        Self::new(
            "nucleotide",
            b"ACGTN",
            &NUCLEOTIDE,
            &[
                (b'U', b'T'),
                (b'R', b'N'),
                (b'Y', b'N'),
                (b'S', b'N'),
                (b'W', b'N'),
                (b'K', b'N'),
                (b'M', b'N'),
                (b'B', b'N'),
                (b'D', b'N'),
                (b'H', b'N'),
                (b'V', b'N'),
            ],
        )
    }

    /// The matrix matching a sequence type tag.
    pub fn for_seq_type(seq_type: SeqType) -> Self {
        match seq_type {
            SeqType::Nucleotides => Self::nucleotide(),
            _ => Self::blosum62(),
        }
    }

    pub fn matrix_name(&self) -> &str {
        &self.name
    }

    /// Code of the reserved unknown residue (last alphabet symbol).
    #[inline]
    pub fn unknown_residue(&self) -> u8 {
        (self.alphabet_size - 1) as u8
    }

    /// Substitution score of two residue codes.
    #[inline(always)]
    pub fn score(&self, a: u8, b: u8) -> i16 {
        self.scores[a as usize * self.alphabet_size + b as usize]
    }

    /// Raw score table, row-major over the full alphabet.
    pub fn scores(&self) -> &[i16] {
        &self.scores
    }
}
