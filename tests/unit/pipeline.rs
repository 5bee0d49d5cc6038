//! Contig → ORF → index pipeline, driven through the tool entry points.

use std::path::Path;

use kseed::index::IndexReader;
use kseed::orf::parse_orf_header;
use kseed::sequence::{read_dbtype, write_dbtype, SeqType};
use kseed::store::{StoreReader, StoreWriter};
use kseed::tools::{createdb, createindex, extractorfs};
use tempfile::tempdir;

fn write_contig_db(dir: &Path) -> std::path::PathBuf {
    let contig_db = dir.join("contigs");
    let writer = StoreWriter::open(&contig_db, 1).unwrap();
    for (key, contig) in [
        (0u32, &b"ATGAAATAA"[..]),
        (1, b"TTATTTCAT"),
        (2, b"ATGAAAGGGTTTCCCGGGAAATAAGG"),
    ] {
        let mut record = contig.to_vec();
        record.push(b'\n');
        writer.write_data(&record, key, 0).unwrap();
        writer.align_to_page_size(0).unwrap();
    }
    writer.close().unwrap();
    write_dbtype(&contig_db, SeqType::Nucleotides).unwrap();
    contig_db
}

#[test]
fn test_extract_orfs_then_index_them() {
    let dir = tempdir().unwrap();
    let contig_db = write_contig_db(dir.path());
    let orf_db = dir.path().join("orfs");

    extractorfs::run(extractorfs::ExtractorfsArgs {
        contig_db: contig_db.clone(),
        orf_db: orf_db.clone(),
        min_length: 3,
        max_length: usize::MAX,
        max_gaps: 30,
        forward_frames: "1,2,3".to_string(),
        reverse_frames: "1,2,3".to_string(),
        start_mode: 0,
        gen_code: 1,
        use_all_table_starts: false,
        threads: 2,
    })
    .unwrap();

    assert_eq!(read_dbtype(&orf_db).unwrap(), SeqType::Nucleotides);
    let orfs = StoreReader::open(&orf_db).unwrap();
    assert!(orfs.size() >= 2, "expected ORFs from both test contigs");

    // headers round-trip and reference real contigs
    let mut headers_path = orf_db.as_os_str().to_os_string();
    headers_path.push("_h");
    let headers = StoreReader::open(Path::new(&headers_path)).unwrap();
    assert_eq!(headers.size(), orfs.size());
    let contigs = StoreReader::open(&contig_db).unwrap();
    for id in 0..headers.size() {
        let line = headers.get_data(id).unwrap();
        let text = std::str::from_utf8(line).unwrap();
        let (orf_id, location) = parse_orf_header(text).unwrap();
        assert_eq!(orf_id, headers.get_key(id));
        assert!(contigs.get_id(location.id).is_some());
        assert!(location.from < location.to);
    }

    // the single forward ORF of contig 0 covers it entirely
    let fragment = orfs.get_data_by_key(0).unwrap().unwrap();
    assert_eq!(fragment, b"ATGAAATAA\n");

    // the extracted fragments feed straight into the index build
    createindex::run(createindex::CreateindexArgs {
        sequence_db: orf_db.clone(),
        out_index: orf_db.clone(),
        k: 6,
        spaced_kmer: true,
        mask: 0,
        kmer_score: 0,
        max_seq_len: 65535,
        comp_bias_correction: false,
        alphabet_size: 5,
        threads: 2,
    })
    .unwrap();

    let index_path = dir.path().join("orfs.sk6");
    let reader = IndexReader::open(&index_path).unwrap();
    let meta = reader.metadata();
    assert_eq!(meta.kmer_size, 6);
    assert_eq!(meta.spaced_kmer, 1);
    assert_eq!(meta.seq_type, SeqType::Nucleotides.to_i32());
    assert_eq!(reader.substitution_matrix_name().unwrap(), "nucleotide");

    let table = reader.generate_index_table(false).unwrap();
    // base 4, k 6
    assert_eq!(table.table_size(), 4096);
    assert!(table.entry_count() > 0);

    // nucleotide indexes carry the small extended matrices too
    let two_mer = reader.two_mer_score_matrix(false).unwrap().unwrap();
    assert_eq!(two_mer.row_size, 16);
    let three_mer = reader.three_mer_score_matrix(false).unwrap().unwrap();
    assert_eq!(three_mer.row_size, 64);

    // the ORF header store was picked up and embedded alongside
    assert_eq!(meta.headers, 1);
    let header_reader = reader
        .header_db_reader(Path::new(&headers_path), false)
        .unwrap()
        .unwrap();
    assert_eq!(header_reader.size(), orfs.size());
}

#[test]
fn test_createdb_from_fasta() {
    let dir = tempdir().unwrap();
    let fasta_path = dir.path().join("input.fasta");
    std::fs::write(
        &fasta_path,
        ">contig1 first test contig\nATGAAATAA\n>contig2\nTTATTTCAT\n",
    )
    .unwrap();

    let db_path = dir.path().join("db");
    createdb::run(createdb::CreatedbArgs {
        input: fasta_path,
        output: db_path.clone(),
        dbtype: "auto".to_string(),
    })
    .unwrap();

    assert_eq!(read_dbtype(&db_path).unwrap(), SeqType::Nucleotides);
    let seqs = StoreReader::open(&db_path).unwrap();
    assert_eq!(seqs.size(), 2);
    assert_eq!(seqs.get_data_by_key(0).unwrap().unwrap(), b"ATGAAATAA\n");

    let mut header_path = db_path.as_os_str().to_os_string();
    header_path.push("_h");
    let headers = StoreReader::open(Path::new(&header_path)).unwrap();
    assert_eq!(
        headers.get_data_by_key(0).unwrap().unwrap(),
        b"contig1 first test contig\n"
    );
}
