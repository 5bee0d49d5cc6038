//! Two-pass inverted-index construction.
//!
//! The count pass is data-parallel: every worker increments a shared array
//! of per-bucket atomic counters. A prefix sum turns the counters into the
//! offsets array, the fill pass appends `(seq_id, position)` entries behind
//! per-bucket cursors, and a final parallel pass sorts each bucket by
//! `(seq_id, position)`, the only ordering the table guarantees.
//!
//! Masking decides eligibility only: k-mers are scanned over the masked
//! residues when a masked lookup is requested, but the recorded positions
//! always refer to the original sequence.

use bytemuck::Zeroable;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::error::{KseedError, Result};
use crate::index::indexer::{Indexer, MAX_KMER_SIZE};
use crate::index::table::{IndexEntry, IndexTable};
use crate::sequence::{Sequence, SequenceLookup, SeqType};
use crate::utils::mask::Masker;
use crate::utils::matrix::SubstitutionMatrix;

/// Which sequence lookups the build produces. Masked lookups have
/// low-complexity spans overwritten with the unknown residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskMode {
    /// Unmasked lookup only; k-mers are taken from the raw residues.
    Unmasked = 0,
    /// Masked lookup only; masked spans never seed k-mers.
    Masked = 1,
    /// Both lookups side by side, eligibility decided by the masked copy.
    Both = 2,
}

impl MaskMode {
    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(MaskMode::Unmasked),
            1 => Ok(MaskMode::Masked),
            2 => Ok(MaskMode::Both),
            other => Err(KseedError::Parameter(format!(
                "mask mode {other} outside {{0, 1, 2}}"
            ))),
        }
    }

    pub fn wants_masked(self) -> bool {
        matches!(self, MaskMode::Masked | MaskMode::Both)
    }

    pub fn wants_unmasked(self) -> bool {
        matches!(self, MaskMode::Unmasked | MaskMode::Both)
    }
}

pub struct BuildOptions {
    pub kmer_size: usize,
    pub spaced: bool,
    pub kmer_threshold: i32,
    pub mask_mode: MaskMode,
    pub max_seq_len: usize,
    pub seq_type: SeqType,
}

pub struct BuildResult {
    pub table: IndexTable<'static>,
    pub masked_lookup: Option<SequenceLookup<'static>>,
    pub unmasked_lookup: Option<SequenceLookup<'static>>,
}

/// Plain residue types drop the reserved unknown symbol from the digit
/// space; profile types keep the full alphabet.
pub fn effective_alphabet_size(alphabet_size: usize, seq_type: SeqType) -> usize {
    if seq_type.is_profile() {
        alphabet_size
    } else {
        alphabet_size - 1
    }
}

/// Positions must fit the packed entry, so scanning stops there.
const MAX_ENTRY_POSITION: usize = u16::MAX as usize;

/// Build the inverted table plus the requested sequence lookups over a
/// decoded sequence collection. `cancel` is checked between sequences.
pub fn fill_database(
    sequences: &[Sequence],
    matrix: &SubstitutionMatrix,
    opts: &BuildOptions,
    cancel: &AtomicBool,
) -> Result<BuildResult> {
    if !opts.mask_mode.wants_masked() && !opts.mask_mode.wants_unmasked() {
        return Err(KseedError::Parameter(
            "no sequence lookup requested: at least one of masked/unmasked must be built"
                .to_string(),
        ));
    }
    let alphabet_size = matrix.alphabet_size;
    let base = effective_alphabet_size(alphabet_size, opts.seq_type);
    let unknown = matrix.unknown_residue();
    let skip_unknown = !opts.seq_type.is_profile();

    // Masked copies are produced once and drive eligibility for the rest
    // of the build.
    let masked: Option<Vec<Vec<u8>>> = if opts.mask_mode.wants_masked() {
        let masker = Masker::with_defaults();
        Some(
            sequences
                .par_iter()
                .map(|seq| {
                    let mut residues = seq.residues.clone();
                    masker.mask(&mut residues, alphabet_size, unknown);
                    residues
                })
                .collect(),
        )
    } else {
        None
    };
    fn scan_residues<'s>(
        masked: &'s Option<Vec<Vec<u8>>>,
        sequences: &'s [Sequence],
        i: usize,
    ) -> &'s [u8] {
        match masked {
            Some(copies) => &copies[i],
            None => &sequences[i].residues,
        }
    }

    let probe = Indexer::with_pattern(base, opts.kmer_size, opts.spaced)?;
    let table_size = probe.table_size();
    let span = probe.span();

    // Count pass: shared atomic counters, one worker per sequence.
    let counts: Vec<AtomicU32> = (0..table_size).map(|_| AtomicU32::new(0)).collect();
    let total = AtomicU64::new(0);
    sequences
        .par_iter()
        .enumerate()
        .try_for_each(|(i, seq)| -> Result<()> {
            if cancel.load(Ordering::Relaxed) {
                return Err(canceled());
            }
            if let Some((position, &bad)) = seq
                .residues
                .iter()
                .enumerate()
                .find(|&(_, &r)| r as usize >= alphabet_size)
            {
                return Err(KseedError::InvalidResidue {
                    seq_id: seq.id,
                    position,
                    byte: bad,
                });
            }
            let mut local = 0u64;
            scan_sequence(
                scan_residues(&masked, sequences, i),
                base,
                matrix,
                opts,
                span,
                unknown,
                skip_unknown,
                |index, _| {
                    counts[index as usize].fetch_add(1, Ordering::Relaxed);
                    local += 1;
                },
            )?;
            total.fetch_add(local, Ordering::Relaxed);
            Ok(())
        })?;

    let total = total.load(Ordering::Relaxed);
    if total >= 1u64 << 63 {
        return Err(KseedError::Parameter(format!(
            "index would hold {total} entries, beyond the 2^63 limit"
        )));
    }

    // Prefix sum into the offsets array.
    let mut offsets = Vec::with_capacity(table_size + 1);
    let mut running = 0u64;
    offsets.push(0);
    for count in &counts {
        running += count.load(Ordering::Relaxed) as u64;
        offsets.push(running);
    }
    drop(counts);

    // Fill pass: sequential over sequences, per-bucket cursors.
    let mut entries = vec![IndexEntry::zeroed(); total as usize];
    let mut cursors = vec![0u32; table_size];
    for (i, seq) in sequences.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(canceled());
        }
        let seq_id = seq.id;
        scan_sequence(
            scan_residues(&masked, sequences, i),
            base,
            matrix,
            opts,
            span,
            unknown,
            skip_unknown,
            |index, position| {
                let slot = offsets[index as usize] + cursors[index as usize] as u64;
                cursors[index as usize] += 1;
                entries[slot as usize] = IndexEntry {
                    seq_id,
                    position: position as u16,
                };
            },
        )?;
    }
    drop(cursors);

    // Sort pass: per-bucket (seq_id, position) order.
    let mut buckets: Vec<&mut [IndexEntry]> = Vec::new();
    let mut rest: &mut [IndexEntry] = &mut entries;
    for window in offsets.windows(2) {
        let len = (window[1] - window[0]) as usize;
        let (bucket, tail) = rest.split_at_mut(len);
        if len > 1 {
            buckets.push(bucket);
        }
        rest = tail;
    }
    buckets.par_iter_mut().for_each(|bucket| {
        bucket.sort_unstable_by_key(|e| {
            let seq_id = e.seq_id;
            let position = e.position;
            (seq_id, position)
        });
    });
    drop(buckets);

    // Lookups are appended in input order; both variants describe the same
    // sequences, so their offsets arrays coincide.
    let data_size: usize = sequences.iter().map(Sequence::len).sum();
    let masked_lookup = masked.as_ref().map(|copies| {
        let mut lookup = SequenceLookup::new(sequences.len(), data_size);
        for residues in copies {
            lookup.add_sequence(residues);
        }
        lookup.finish();
        lookup
    });
    let unmasked_lookup = if opts.mask_mode.wants_unmasked() {
        let mut lookup = SequenceLookup::new(sequences.len(), data_size);
        for seq in sequences {
            lookup.add_sequence(&seq.residues);
        }
        lookup.finish();
        Some(lookup)
    } else {
        None
    };

    let table = IndexTable::from_parts(base, opts.kmer_size, sequences.len(), offsets, entries)?;
    Ok(BuildResult {
        table,
        masked_lookup,
        unmasked_lookup,
    })
}

/// Drive `emit(kmer_index, position)` over every eligible k-mer of one
/// sequence: unknown-free (for plain residue types) and self-scoring at or
/// above the threshold.
#[allow(clippy::too_many_arguments)]
fn scan_sequence<F: FnMut(u32, usize)>(
    residues: &[u8],
    base: usize,
    matrix: &SubstitutionMatrix,
    opts: &BuildOptions,
    span: usize,
    unknown: u8,
    skip_unknown: bool,
    mut emit: F,
) -> Result<()> {
    let scan_len = residues.len().min(opts.max_seq_len);
    if scan_len < span {
        return Ok(());
    }
    let mut indexer = Indexer::with_pattern(base, opts.kmer_size, opts.spaced)?;
    let last = (scan_len - span).min(MAX_ENTRY_POSITION);
    let mut scratch = [0u8; MAX_KMER_SIZE];
    for position in 0..=last {
        let window = &residues[position..position + span];
        let index = indexer.next_index(window);
        let digits = indexer.select_digits(window, &mut scratch);
        if skip_unknown && digits.iter().any(|&r| r == unknown) {
            // the unknown code equals the base; a rolled cursor cannot
            // divide it back out, so the scan restarts past this window
            indexer.reset();
            continue;
        }
        let self_score: i32 = digits.iter().map(|&r| matrix.score(r, r) as i32).sum();
        if self_score < opts.kmer_threshold {
            continue;
        }
        emit(index, position);
    }
    Ok(())
}

fn canceled() -> KseedError {
    KseedError::Io(std::io::Error::new(
        std::io::ErrorKind::Interrupted,
        "index build canceled",
    ))
}
