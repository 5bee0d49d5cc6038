//! Inverted k-mer file: a flat entry array segmented by an offsets array.
//!
//! Bucket `i` occupies `entries[offsets[i]..offsets[i+1]]`, sorted by
//! `(seq_id, position)`. A built table owns both arrays; an attached table
//! borrows them from a mapped index file and must never free them. The
//! storage sum makes the mode unambiguous.

use bytemuck::{Pod, Zeroable};

use crate::error::{KseedError, Result};

/// One k-mer occurrence: sequence id plus position inside the sequence.
/// Packed to six bytes; this exact layout is what the index file persists.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IndexEntry {
    pub seq_id: u32,
    pub position: u16,
}

enum TableStorage<'a> {
    Owned {
        offsets: Vec<u64>,
        entries: Vec<IndexEntry>,
    },
    Borrowed {
        offsets: &'a [u64],
        entries: &'a [IndexEntry],
    },
}

pub struct IndexTable<'a> {
    alphabet_size: usize,
    kmer_size: usize,
    table_size: usize,
    seq_count: usize,
    storage: TableStorage<'a>,
}

/// Bucket occupancy summary, logged after a build.
pub struct TableStatistics {
    pub entries: u64,
    pub used_buckets: usize,
    pub max_bucket: usize,
}

impl IndexTable<'static> {
    /// Wrap freshly built arrays. `offsets` must have `alphabet^k + 1`
    /// entries and close over `entries`.
    pub fn from_parts(
        alphabet_size: usize,
        kmer_size: usize,
        seq_count: usize,
        offsets: Vec<u64>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        validate_arrays(alphabet_size, kmer_size, &offsets, entries.len())?;
        Ok(IndexTable {
            alphabet_size,
            kmer_size,
            table_size: offsets.len() - 1,
            seq_count,
            storage: TableStorage::Owned { offsets, entries },
        })
    }
}

impl<'a> IndexTable<'a> {
    /// Attach to arrays owned by a mapped index file. The table never
    /// frees these; it must not outlive the mapping.
    pub fn attach(
        alphabet_size: usize,
        kmer_size: usize,
        seq_count: usize,
        entries: &'a [IndexEntry],
        offsets: &'a [u64],
    ) -> Result<Self> {
        validate_arrays(alphabet_size, kmer_size, offsets, entries.len())?;
        Ok(IndexTable {
            alphabet_size,
            kmer_size,
            table_size: offsets.len() - 1,
            seq_count,
            storage: TableStorage::Borrowed { offsets, entries },
        })
    }

    /// Occurrence run of a k-mer index, O(1) bucket access.
    #[inline]
    pub fn lookup(&self, kmer_index: u32) -> &[IndexEntry] {
        let offsets = self.offsets();
        let start = offsets[kmer_index as usize] as usize;
        let end = offsets[kmer_index as usize + 1] as usize;
        &self.entries()[start..end]
    }

    pub fn offsets(&self) -> &[u64] {
        match &self.storage {
            TableStorage::Owned { offsets, .. } => offsets,
            TableStorage::Borrowed { offsets, .. } => offsets,
        }
    }

    pub fn entries(&self) -> &[IndexEntry] {
        match &self.storage {
            TableStorage::Owned { entries, .. } => entries,
            TableStorage::Borrowed { entries, .. } => entries,
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.storage, TableStorage::Borrowed { .. })
    }

    /// Number of k-mer buckets, `alphabet^k`.
    pub fn table_size(&self) -> usize {
        self.table_size
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Number of sequences the table was built over.
    pub fn sequence_count(&self) -> usize {
        self.seq_count
    }

    pub fn entry_count(&self) -> u64 {
        self.entries().len() as u64
    }

    pub fn statistics(&self) -> TableStatistics {
        let offsets = self.offsets();
        let mut used_buckets = 0;
        let mut max_bucket = 0;
        for window in offsets.windows(2) {
            let len = (window[1] - window[0]) as usize;
            if len > 0 {
                used_buckets += 1;
                max_bucket = max_bucket.max(len);
            }
        }
        TableStatistics {
            entries: self.entry_count(),
            used_buckets,
            max_bucket,
        }
    }
}

fn validate_arrays(
    alphabet_size: usize,
    kmer_size: usize,
    offsets: &[u64],
    entry_count: usize,
) -> Result<()> {
    let table_size = (alphabet_size as u64).pow(kmer_size as u32) as usize;
    if offsets.len() != table_size + 1 {
        return Err(KseedError::Parse(format!(
            "offsets array has {} entries, expected {}",
            offsets.len(),
            table_size + 1
        )));
    }
    if offsets[0] != 0 || offsets[table_size] != entry_count as u64 {
        return Err(KseedError::Parse(
            "offsets array does not close over the entry array".to_string(),
        ));
    }
    Ok(())
}
