//! Persist-then-reopen scenarios: the written index must attach to the
//! identical entry sets, the version guard must refuse tampered files, and
//! discovery must probe candidates in the documented order.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use kseed::error::KseedError;
use kseed::index::builder::{fill_database, BuildOptions, MaskMode};
use kseed::index::file::{self, keys, CreateIndexOptions};
use kseed::index::IndexReader;
use kseed::sequence::{SeqType, Sequence};
use kseed::store::{index_path, StoreReader, StoreWriter};
use kseed::utils::matrix::SubstitutionMatrix;
use tempfile::tempdir;

const SEQ0: &[u8] = b"MIPAEAGRPSLADS";
const SEQ1: &[u8] = b"MSSAEAGRPSLADS";

fn write_sequence_db(dir: &Path, records: &[&[u8]]) -> PathBuf {
    let db_path = dir.join("db");
    let writer = StoreWriter::open(&db_path, 1).unwrap();
    for (key, seq) in records.iter().enumerate() {
        let mut record = seq.to_vec();
        record.push(b'\n');
        writer.write_data(&record, key as u32, 0).unwrap();
        writer.align_to_page_size(0).unwrap();
    }
    writer.close().unwrap();
    db_path
}

fn build_index(
    dir: &Path,
    records: &[&[u8]],
    matrix: &SubstitutionMatrix,
    seq_type: SeqType,
    mask_mode: MaskMode,
) -> PathBuf {
    let db_path = write_sequence_db(dir, records);
    let seq_db = StoreReader::open(&db_path).unwrap();
    let opts = CreateIndexOptions {
        kmer_size: 2,
        spaced: false,
        mask_mode,
        kmer_threshold: 0,
        max_seq_len: 65535,
        comp_bias_correction: false,
    };
    file::create_index_file(
        &db_path,
        &seq_db,
        None,
        matrix,
        seq_type,
        &opts,
        &AtomicBool::new(false),
    )
    .unwrap()
}

/// Small nucleotide index for the cheap failure-path tests.
fn build_nucl_index(dir: &Path) -> PathBuf {
    let matrix = SubstitutionMatrix::nucleotide();
    build_index(
        dir,
        &[b"ACGTACGTAC", b"TTGACCTGAA"],
        &matrix,
        SeqType::Nucleotides,
        MaskMode::Unmasked,
    )
}

fn reference_build() -> kseed::index::BuildResult {
    let matrix = SubstitutionMatrix::blosum62();
    let sequences = vec![
        Sequence::map_sequence(0, None, SEQ0, &matrix, SeqType::AminoAcids).unwrap(),
        Sequence::map_sequence(1, None, SEQ1, &matrix, SeqType::AminoAcids).unwrap(),
    ];
    let opts = BuildOptions {
        kmer_size: 2,
        spaced: false,
        kmer_threshold: 0,
        mask_mode: MaskMode::Both,
        max_seq_len: 65535,
        seq_type: SeqType::AminoAcids,
    };
    fill_database(&sequences, &matrix, &opts, &AtomicBool::new(false)).unwrap()
}

#[test]
fn test_persist_then_reopen_round_trip() {
    let dir = tempdir().unwrap();
    let matrix = SubstitutionMatrix::blosum62();
    let out_path = build_index(
        dir.path(),
        &[SEQ0, SEQ1],
        &matrix,
        SeqType::AminoAcids,
        MaskMode::Both,
    );
    assert_eq!(out_path, dir.path().join("db.k2"));

    let reference = reference_build();
    let reader = IndexReader::open(&out_path).unwrap();

    let meta = reader.metadata();
    assert_eq!(meta.kmer_size, 2);
    assert_eq!(meta.alphabet_size, 21);
    assert_eq!(meta.masked, 1);
    assert_eq!(meta.spaced_kmer, 0);
    assert_eq!(meta.seq_type, 0);
    assert_eq!(meta.headers, 0);

    let attached = reader.generate_index_table(true).unwrap();
    assert!(attached.is_attached());
    assert_eq!(attached.table_size(), reference.table.table_size());
    assert_eq!(attached.entry_count(), reference.table.entry_count());
    assert_eq!(attached.sequence_count(), 2);
    for index in 0..attached.table_size() as u32 {
        assert_eq!(
            attached.lookup(index),
            reference.table.lookup(index),
            "bucket {index} diverged after reopen"
        );
    }

    // both lookups were persisted and attach without copying
    let masked = reader.masked_sequence_lookup(false).unwrap().unwrap();
    let unmasked = reader.unmasked_sequence_lookup(true).unwrap().unwrap();
    assert!(masked.is_attached());
    assert!(unmasked.is_attached());
    assert_eq!(
        masked.data(),
        reference.masked_lookup.as_ref().unwrap().data()
    );
    assert_eq!(
        unmasked.data(),
        reference.unmasked_lookup.as_ref().unwrap().data()
    );
    assert_eq!(unmasked.get(0).len(), SEQ0.len());

    // dropping attached views must leave the mapping intact
    drop(attached);
    drop(masked);
    drop(unmasked);
    let again = reader.generate_index_table(false).unwrap();
    assert_eq!(again.entry_count(), reference.table.entry_count());

    // extended-matrix snapshots ride along for residue alphabets
    let two_mer = reader.two_mer_score_matrix(false).unwrap().unwrap();
    assert_eq!(two_mer.row_size, 400);
    let (scores, indexes) = two_mer.lookup_row(0);
    assert_eq!(scores.len(), 400);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(indexes.len(), 400);
    assert!(reader.store().get_id(keys::SCOREMATRIX3MER).is_some());

    // the embedded db index re-opens the original sequence store
    let seq_db = reader.sequence_db_reader(false).unwrap();
    assert_eq!(seq_db.size(), 2);
    let mut expected = SEQ0.to_vec();
    expected.push(b'\n');
    assert_eq!(seq_db.get_data_by_key(0).unwrap().unwrap(), &expected[..]);

    assert!(IndexReader::check_if_index_file(reader.store()));
    assert_eq!(reader.substitution_matrix_name().unwrap(), "blosum62");
    reader.print_summary().unwrap();
}

#[test]
fn test_version_tamper_is_rejected() {
    let dir = tempdir().unwrap();
    let out_path = build_nucl_index(dir.path());

    // locate the VERSION blob through the store index and flip its byte
    let index_text = std::fs::read_to_string(index_path(&out_path)).unwrap();
    let version_line = index_text
        .lines()
        .find(|line| line.starts_with("0\t"))
        .expect("VERSION entry missing");
    let offset: u64 = version_line.split('\t').nth(1).unwrap().parse().unwrap();

    let mut file = OpenOptions::new().write(true).open(&out_path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(b"8").unwrap();
    drop(file);

    let err = IndexReader::open(&out_path)
        .err()
        .expect("tampered index accepted");
    match err {
        KseedError::VersionMismatch { found, expected } => {
            assert_eq!(found, "8");
            assert_eq!(expected, "7");
        }
        other => panic!("wrong error kind: {other}"),
    }
}

#[test]
fn test_missing_version_blob_is_rejected() {
    let dir = tempdir().unwrap();
    let out_path = build_nucl_index(dir.path());

    let index_file = index_path(&out_path);
    let stripped: String = std::fs::read_to_string(&index_file)
        .unwrap()
        .lines()
        .filter(|line| !line.starts_with("0\t"))
        .map(|line| format!("{line}\n"))
        .collect();
    std::fs::write(&index_file, stripped).unwrap();

    assert!(matches!(
        IndexReader::open(&out_path),
        Err(KseedError::MissingBlob { key: 0, .. })
    ));
}

#[test]
fn test_search_for_index_probe_order() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("db");
    assert_eq!(file::search_for_index(&base), None);

    // unspaced candidates win over spaced ones regardless of k
    std::fs::write(dir.path().join("db.sk5"), b"").unwrap();
    std::fs::write(dir.path().join("db.k6"), b"").unwrap();
    assert_eq!(
        file::search_for_index(&base),
        Some(dir.path().join("db.k6"))
    );

    std::fs::write(dir.path().join("db.k5"), b"").unwrap();
    assert_eq!(
        file::search_for_index(&base),
        Some(dir.path().join("db.k5"))
    );

    std::fs::remove_file(dir.path().join("db.k5")).unwrap();
    std::fs::remove_file(dir.path().join("db.k6")).unwrap();
    assert_eq!(
        file::search_for_index(&base),
        Some(dir.path().join("db.sk5"))
    );
}
