//! Inverted-list construction over the two-sequence test collection.

use std::sync::atomic::AtomicBool;

use kseed::index::builder::{fill_database, BuildOptions, MaskMode};
use kseed::index::{IndexEntry, Indexer};
use kseed::sequence::{SeqType, Sequence};
use kseed::utils::matrix::SubstitutionMatrix;

const SEQ0: &[u8] = b"MIPAEAGRPSLADS";
const SEQ1: &[u8] = b"MSSAEAGRPSLADS";

fn build(kmer_size: usize) -> kseed::index::BuildResult {
    let matrix = SubstitutionMatrix::blosum62();
    let sequences = vec![
        Sequence::map_sequence(0, None, SEQ0, &matrix, SeqType::AminoAcids).unwrap(),
        Sequence::map_sequence(1, None, SEQ1, &matrix, SeqType::AminoAcids).unwrap(),
    ];
    let opts = BuildOptions {
        kmer_size,
        spaced: false,
        kmer_threshold: 0,
        mask_mode: MaskMode::Unmasked,
        max_seq_len: 65535,
        seq_type: SeqType::AminoAcids,
    };
    fill_database(&sequences, &matrix, &opts, &AtomicBool::new(false)).unwrap()
}

fn pair_index(a: u8, b: u8) -> u32 {
    let matrix = SubstitutionMatrix::blosum62();
    matrix.aa2int[a as usize] as u32 + matrix.aa2int[b as usize] as u32 * 20
}

fn entries(table: &kseed::index::IndexTable, index: u32) -> Vec<(u32, u16)> {
    table
        .lookup(index)
        .iter()
        .map(|e| {
            let seq_id = e.seq_id;
            let position = e.position;
            (seq_id, position)
        })
        .collect()
}

#[test]
fn test_shared_kmers_land_in_shared_buckets() {
    let result = build(2);
    let table = &result.table;

    // AE sits at position 3 of both sequences, EA right after it
    assert_eq!(entries(table, pair_index(b'A', b'E')), vec![(0, 3), (1, 3)]);
    assert_eq!(entries(table, pair_index(b'E', b'A')), vec![(0, 4), (1, 4)]);
    assert_eq!(entries(table, pair_index(b'R', b'P')), vec![(0, 7), (1, 7)]);
    // MI opens only the first sequence
    assert_eq!(entries(table, pair_index(b'M', b'I')), vec![(0, 0)]);
    // MS opens only the second
    assert_eq!(entries(table, pair_index(b'M', b'S')), vec![(1, 0)]);
}

#[test]
fn test_offsets_invariants() {
    let result = build(2);
    let offsets = result.table.offsets();
    assert_eq!(offsets.len(), 400 + 1);
    assert_eq!(offsets[0], 0);
    assert_eq!(offsets[400], result.table.entry_count());
    assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
    // 13 k-mers per sequence, nothing filtered at threshold 0
    assert_eq!(result.table.entry_count(), 26);
}

#[test]
fn test_every_entry_reencodes_to_its_bucket() {
    let result = build(2);
    let table = &result.table;
    let lookup = result.unmasked_lookup.as_ref().unwrap();

    let mut seen = 0u64;
    for index in 0..table.table_size() as u32 {
        let mut indexer = Indexer::new(20, 2).unwrap();
        for entry in table.lookup(index) {
            let seq_id = entry.seq_id;
            let position = entry.position as usize;
            let residues = lookup.get(seq_id);
            let reencoded = indexer.next_index(&residues[position..position + 2]);
            indexer.reset();
            assert_eq!(reencoded, index);
            seen += 1;
        }
    }
    assert_eq!(seen, table.entry_count());
}

#[test]
fn test_unknown_residues_reencode_to_their_buckets() {
    // X carries the reserved code: clean windows flanking it must land in
    // their own buckets even though the scan skips the X windows
    let matrix = SubstitutionMatrix::blosum62();
    let sequences = vec![
        Sequence::map_sequence(0, None, b"XYYAEXMI", &matrix, SeqType::AminoAcids).unwrap(),
        Sequence::map_sequence(1, None, b"MIXWWX", &matrix, SeqType::AminoAcids).unwrap(),
    ];
    let opts = BuildOptions {
        kmer_size: 2,
        spaced: false,
        kmer_threshold: 0,
        mask_mode: MaskMode::Unmasked,
        max_seq_len: 65535,
        seq_type: SeqType::AminoAcids,
    };
    let result =
        fill_database(&sequences, &matrix, &opts, &AtomicBool::new(false)).unwrap();
    let table = &result.table;
    let lookup = result.unmasked_lookup.as_ref().unwrap();

    // XYYAEXMI contributes YY/YA/AE/MI, MIXWWX contributes MI/WW
    assert_eq!(table.entry_count(), 6);
    assert_eq!(entries(table, pair_index(b'Y', b'Y')), vec![(0, 1)]);
    assert_eq!(entries(table, pair_index(b'W', b'W')), vec![(1, 3)]);
    assert_eq!(
        entries(table, pair_index(b'M', b'I')),
        vec![(0, 6), (1, 0)]
    );

    let mut seen = 0u64;
    for index in 0..table.table_size() as u32 {
        for entry in table.lookup(index) {
            let seq_id = entry.seq_id;
            let position = entry.position as usize;
            let residues = lookup.get(seq_id);
            let mut fresh = Indexer::new(20, 2).unwrap();
            assert_eq!(
                fresh.next_index(&residues[position..position + 2]),
                index,
                "sequence {seq_id} position {position} filed under the wrong bucket"
            );
            seen += 1;
        }
    }
    assert_eq!(seen, table.entry_count());
}

#[test]
fn test_buckets_sorted_by_seq_then_position() {
    let result = build(2);
    let table = &result.table;
    for index in 0..table.table_size() as u32 {
        let bucket: Vec<(u32, u16)> = table
            .lookup(index)
            .iter()
            .map(|e: &IndexEntry| {
                let seq_id = e.seq_id;
                let position = e.position;
                (seq_id, position)
            })
            .collect();
        let mut sorted = bucket.clone();
        sorted.sort_unstable();
        assert_eq!(bucket, sorted, "bucket {index} out of order");
    }
}

#[test]
fn test_lookup_slices_match_inserted_sequences() {
    let result = build(2);
    let lookup = result.unmasked_lookup.as_ref().unwrap();
    let matrix = SubstitutionMatrix::blosum62();

    let expected0: Vec<u8> = SEQ0.iter().map(|&b| matrix.aa2int[b as usize]).collect();
    let expected1: Vec<u8> = SEQ1.iter().map(|&b| matrix.aa2int[b as usize]).collect();
    assert_eq!(lookup.get(0), &expected0[..]);
    assert_eq!(lookup.get(1), &expected1[..]);

    let offsets = lookup.offsets();
    assert_eq!(offsets.len(), 3);
    assert_eq!(*offsets.last().unwrap() as usize, lookup.data_size());
    // the data array is terminated past its payload
    assert_eq!(lookup.raw_data()[lookup.data_size()], 0);
}
