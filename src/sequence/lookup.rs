//! Compact random-access store of encoded sequences.
//!
//! All residues live in one concatenated `data` array bounded by an
//! `offsets` array of length N+1. A built lookup owns its buffers; an
//! attached lookup borrows views into a mapped index file and must never
//! free them; the distinction is carried by the storage sum, not by a
//! flag.

use crate::error::{KseedError, Result};

enum Storage<'a> {
    Owned {
        data: Vec<u8>,
        offsets: Vec<u64>,
    },
    Borrowed {
        data: &'a [u8],
        offsets: &'a [u64],
    },
}

pub struct SequenceLookup<'a> {
    storage: Storage<'a>,
    /// Payload bytes, excluding the trailing zero terminator.
    data_size: usize,
}

impl SequenceLookup<'static> {
    /// Start an owned lookup that sequences are appended to in id order.
    pub fn new(sequence_count_hint: usize, data_size_hint: usize) -> Self {
        let mut offsets = Vec::with_capacity(sequence_count_hint + 1);
        offsets.push(0);
        SequenceLookup {
            storage: Storage::Owned {
                data: Vec::with_capacity(data_size_hint + 1),
                offsets,
            },
            data_size: 0,
        }
    }

    /// Append the residues of the next sequence. Ids are implicit and
    /// sequential: the n-th call stores sequence n.
    pub fn add_sequence(&mut self, residues: &[u8]) {
        match &mut self.storage {
            Storage::Owned { data, offsets } => {
                data.extend_from_slice(residues);
                offsets.push(data.len() as u64);
                self.data_size = data.len();
            }
            Storage::Borrowed { .. } => unreachable!("attached lookup is immutable"),
        }
    }

    /// Terminate the data array so `data[data_size]` is addressable.
    pub fn finish(&mut self) {
        if let Storage::Owned { data, .. } = &mut self.storage {
            data.push(0);
        }
    }
}

impl<'a> SequenceLookup<'a> {
    /// Attach to externally owned buffers (mapped index file blobs). The
    /// data blob must hold `data_size + 1` bytes and `offsets` must have
    /// one entry more than there are sequences.
    pub fn attach(data: &'a [u8], data_size: usize, offsets: &'a [u64]) -> Result<Self> {
        if offsets.is_empty() {
            return Err(KseedError::Parse(
                "sequence lookup offsets array is empty".to_string(),
            ));
        }
        if data.len() <= data_size {
            return Err(KseedError::Parse(format!(
                "sequence lookup data blob too short: {} <= {}",
                data.len(),
                data_size
            )));
        }
        if offsets[offsets.len() - 1] as usize != data_size {
            return Err(KseedError::Parse(
                "sequence lookup offsets do not close over the data".to_string(),
            ));
        }
        Ok(SequenceLookup {
            storage: Storage::Borrowed { data, offsets },
            data_size,
        })
    }

    pub fn sequence_count(&self) -> usize {
        self.offsets().len() - 1
    }

    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Whether this lookup borrows externally owned memory.
    pub fn is_attached(&self) -> bool {
        matches!(self.storage, Storage::Borrowed { .. })
    }

    /// Residues of sequence `seq_id`, O(1).
    #[inline]
    pub fn get(&self, seq_id: u32) -> &[u8] {
        let offsets = self.offsets();
        let start = offsets[seq_id as usize] as usize;
        let end = offsets[seq_id as usize + 1] as usize;
        &self.data()[start..end]
    }

    /// The concatenated residue array, trailing terminator excluded.
    pub fn data(&self) -> &[u8] {
        &self.raw_data()[..self.data_size]
    }

    /// The residue array including the trailing zero byte; this is the form
    /// persisted to the index file (`data_size + 1` bytes).
    pub fn raw_data(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned { data, .. } => data,
            Storage::Borrowed { data, .. } => data,
        }
    }

    pub fn offsets(&self) -> &[u64] {
        match &self.storage {
            Storage::Owned { offsets, .. } => offsets,
            Storage::Borrowed { offsets, .. } => offsets,
        }
    }
}
