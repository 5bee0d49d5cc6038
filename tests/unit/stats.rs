//! Statistics reducers over an on-disk result store.

use std::path::Path;

use kseed::stats::{StatsComputer, Statistic};
use kseed::store::{StoreReader, StoreWriter};
use tempfile::tempdir;

fn write_store(path: &Path, entries: &[(u32, &[u8])]) {
    let writer = StoreWriter::open(path, 1).unwrap();
    for &(key, data) in entries {
        writer.write_data(data, key, 0).unwrap();
        writer.align_to_page_size(0).unwrap();
    }
    writer.close().unwrap();
}

#[test]
fn test_sequence_wise_stat_resolves_targets() {
    let dir = tempdir().unwrap();
    let target_path = dir.path().join("targets");
    write_store(
        &target_path,
        &[(10, b"MKV\n"), (20, b"MKVLAA\n"), (30, b"ACZDEF\n")],
    );
    let result_path = dir.path().join("results");
    write_store(
        &result_path,
        &[(0, b"10 0.9\n20 0.8\n"), (1, b"30\n"), (2, b"10\n10\n")],
    );

    let targets = StoreReader::open(&target_path).unwrap();
    let results = StoreReader::open(&result_path).unwrap();
    let out_path = dir.path().join("stats");
    StatsComputer::new(Statistic::Seqlen)
        .run(&results, Some(&targets), &out_path, 2)
        .unwrap();

    let out = StoreReader::open(&out_path).unwrap();
    assert_eq!(out.size(), 3);
    assert_eq!(out.get_data_by_key(0).unwrap().unwrap(), b"3\n6\n");
    // Z terminates the residue count under the strict predicate
    assert_eq!(out.get_data_by_key(1).unwrap().unwrap(), b"2\n");
    // repeated targets are scored per hit line
    assert_eq!(out.get_data_by_key(2).unwrap().unwrap(), b"3\n3\n");
}

#[test]
fn test_entry_wise_stats_over_store() {
    let dir = tempdir().unwrap();
    let result_path = dir.path().join("results");
    write_store(&result_path, &[(5, b"1\n2\n3\n"), (6, b"10\nnope\n20\n")]);

    let results = StoreReader::open(&result_path).unwrap();
    let out_path = dir.path().join("sums");
    StatsComputer::new(Statistic::Sum)
        .run(&results, None, &out_path, 3)
        .unwrap();

    let out = StoreReader::open(&out_path).unwrap();
    assert_eq!(out.get_data_by_key(5).unwrap().unwrap(), b"6\n");
    // the malformed line is skipped, not spun on
    assert_eq!(out.get_data_by_key(6).unwrap().unwrap(), b"30\n");
}
