//! Sequence representation: type tags, residue decoding, and the compact
//! per-sequence lookup used by the prefilter.

pub mod lookup;

pub use lookup::SequenceLookup;

use std::path::{Path, PathBuf};

use crate::error::{KseedError, Result};
use crate::utils::matrix::{SubstitutionMatrix, INVALID_CODE};

/// Sequence database type tag. The numeric values are persisted in the
/// index metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqType {
    AminoAcids = 0,
    Nucleotides = 1,
    HmmProfile = 2,
    ProfileStateSeq = 3,
}

impl SeqType {
    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(SeqType::AminoAcids),
            1 => Ok(SeqType::Nucleotides),
            2 => Ok(SeqType::HmmProfile),
            3 => Ok(SeqType::ProfileStateSeq),
            other => Err(KseedError::Parameter(format!(
                "unknown sequence type tag {other}"
            ))),
        }
    }

    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Profile types keep the full alphabet; plain residue types drop the
    /// unknown symbol from the k-mer digit space.
    pub fn is_profile(self) -> bool {
        matches!(self, SeqType::HmmProfile | SeqType::ProfileStateSeq)
    }
}

/// Path of the sidecar file recording a database's sequence type.
pub fn dbtype_path(db_path: &Path) -> PathBuf {
    let mut os = db_path.as_os_str().to_os_string();
    os.push(".dbtype");
    PathBuf::from(os)
}

/// Write the `.dbtype` sidecar next to a database.
pub fn write_dbtype(db_path: &Path, seq_type: SeqType) -> Result<()> {
    std::fs::write(dbtype_path(db_path), (seq_type.to_i32()).to_le_bytes())?;
    Ok(())
}

/// Read the `.dbtype` sidecar of a database.
pub fn read_dbtype(db_path: &Path) -> Result<SeqType> {
    let bytes = std::fs::read(dbtype_path(db_path))?;
    if bytes.len() < 4 {
        return Err(KseedError::Parse(format!(
            "truncated dbtype file for {}",
            db_path.display()
        )));
    }
    SeqType::from_i32(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// A decoded sequence: residue codes plus identity.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub id: u32,
    pub header: Option<String>,
    pub seq_type: SeqType,
    pub residues: Vec<u8>,
}

impl Sequence {
    /// Decode an ASCII record into residue codes through the matrix
    /// alphabet. Trailing whitespace/newlines are ignored; any other
    /// unmapped byte fails the decode (strict mode).
    pub fn map_sequence(
        id: u32,
        header: Option<String>,
        ascii: &[u8],
        matrix: &SubstitutionMatrix,
        seq_type: SeqType,
    ) -> Result<Self> {
        let trimmed = trim_record(ascii);
        let mut residues = Vec::with_capacity(trimmed.len());
        for (position, &byte) in trimmed.iter().enumerate() {
            if byte == b'\n' || byte == b'\r' {
                continue;
            }
            let code = matrix.aa2int[byte as usize];
            if code == INVALID_CODE {
                return Err(KseedError::InvalidResidue {
                    seq_id: id,
                    position,
                    byte,
                });
            }
            residues.push(code);
        }
        Ok(Sequence {
            id,
            header,
            seq_type,
            residues,
        })
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

/// Strip the trailing NUL/newline bytes a store record carries.
fn trim_record(record: &[u8]) -> &[u8] {
    let mut end = record.len();
    while end > 0 && (record[end - 1] == 0 || record[end - 1] == b'\n' || record[end - 1] == b'\r')
    {
        end -= 1;
    }
    &record[..end]
}
