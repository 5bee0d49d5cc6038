//! Six-frame scan scenarios: start policies, gap cutoff, strand mapping.

use kseed::orf::{
    format_orf_header, parse_orf_header, OrfFinder, OrfParams, StartMode, Strand, ALL_FRAMES,
};

fn params(start_mode: StartMode) -> OrfParams {
    OrfParams {
        min_length: 3,
        max_length: usize::MAX,
        max_gaps: 30,
        forward_frames: ALL_FRAMES,
        reverse_frames: ALL_FRAMES,
        start_mode,
    }
}

#[test]
fn test_single_forward_orf() {
    let finder = OrfFinder::new(1, false).unwrap();
    let orfs = finder
        .find_all(b"ATGAAATAA", &params(StartMode::StartToStop))
        .unwrap();
    assert_eq!(orfs.len(), 1);
    let orf = orfs[0];
    assert_eq!((orf.from, orf.to), (0, 9));
    assert_eq!(orf.strand, Strand::Plus);
    assert!(!orf.incomplete_start);
    assert!(!orf.incomplete_end);
}

#[test]
fn test_gap_run_discards_orf() {
    let mut contig = Vec::new();
    contig.extend_from_slice(b"ATG");
    contig.extend_from_slice(&[b'N'; 40]);
    contig.extend_from_slice(b"TAA");

    let finder = OrfFinder::new(1, false).unwrap();
    for mode in [StartMode::StartToStop, StartMode::AnyToStop] {
        let orfs = finder.find_all(&contig, &params(mode)).unwrap();
        assert!(orfs.is_empty(), "gap cutoff ignored in {mode:?}");
    }
}

#[test]
fn test_reverse_strand_orf_maps_to_forward_space() {
    // reverse complement of ATGAAATAA
    let finder = OrfFinder::new(1, false).unwrap();
    let orfs = finder
        .find_all(b"TTATTTCAT", &params(StartMode::StartToStop))
        .unwrap();
    assert_eq!(orfs.len(), 1);
    let orf = orfs[0];
    assert_eq!((orf.from, orf.to), (0, 9));
    assert_eq!(orf.strand, Strand::Minus);
    assert!(!orf.incomplete_start);
    assert!(!orf.incomplete_end);

    // the minus-strand fragment reads as the forward ORF again
    assert_eq!(finder.extract(b"TTATTTCAT", &orf), b"ATGAAATAA".to_vec());
}

#[test]
fn test_any_to_stop_tiles_the_frame() {
    // frame 0: TTT AAA TAG | CCC TAA, stops at 6..9 and 12..15
    let contig = b"TTTAAATAGCCCTAA";
    let finder = OrfFinder::new(1, false).unwrap();
    let orfs = finder.find_all(contig, &params(StartMode::AnyToStop)).unwrap();

    let frame0: Vec<_> = orfs
        .iter()
        .filter(|o| o.strand == Strand::Plus && o.from % 3 == 0)
        .collect();
    assert!(frame0.iter().any(|o| o.from == 0 && o.to == 9));
    assert!(frame0.iter().any(|o| o.from == 9 && o.to == 15));

    // the first piece starts at the frame edge with no start codon
    let first = frame0.iter().find(|o| o.from == 0).unwrap();
    assert!(first.incomplete_start);
    // the second is bounded by a stop upstream
    let second = frame0.iter().find(|o| o.from == 9).unwrap();
    assert!(!second.incomplete_start);
}

#[test]
fn test_incomplete_end_when_no_stop_before_edge() {
    // ATG then codons, never a stop in frame 0
    let finder = OrfFinder::new(1, false).unwrap();
    let orfs = finder
        .find_all(b"ATGAAAGGGCCC", &params(StartMode::StartToStop))
        .unwrap();
    let forward: Vec<_> = orfs.iter().filter(|o| o.strand == Strand::Plus).collect();
    assert_eq!(forward.len(), 1);
    assert_eq!((forward[0].from, forward[0].to), (0, 12));
    assert!(forward[0].incomplete_end);
}

#[test]
fn test_last_start_to_stop_picks_last_start() {
    // frame 0: ATG AAA ATG CCC TAA - the fragment must open at the second ATG
    let contig = b"ATGAAAATGCCCTAA";
    let finder = OrfFinder::new(1, false).unwrap();
    let orfs = finder
        .find_all(contig, &params(StartMode::LastStartToStop))
        .unwrap();
    let frame0: Vec<_> = orfs
        .iter()
        .filter(|o| o.strand == Strand::Plus && o.from % 3 == 0)
        .collect();
    assert_eq!(frame0.len(), 1);
    assert_eq!((frame0[0].from, frame0[0].to), (6, 15));
    assert!(!frame0[0].incomplete_start);
}

#[test]
fn test_length_filter_in_nucleotides() {
    let finder = OrfFinder::new(1, false).unwrap();
    let mut p = params(StartMode::StartToStop);
    p.min_length = 12;
    // the only ORF is 9 nt long and falls below the floor
    assert!(finder.find_all(b"ATGAAATAA", &p).unwrap().is_empty());

    p.min_length = 3;
    p.max_length = 6;
    assert!(finder.find_all(b"ATGAAATAA", &p).unwrap().is_empty());
}

#[test]
fn test_rejects_inverted_length_bounds() {
    let finder = OrfFinder::new(1, false).unwrap();
    let mut p = params(StartMode::StartToStop);
    p.min_length = 10;
    p.max_length = 5;
    assert!(finder.find_all(b"ATGAAATAA", &p).is_err());
}

#[test]
fn test_reverse_coordinates_stay_inside_contig() {
    let contig = b"ATGAAATAACCATGTTTTGATTGGCCGGCCAATCGT";
    let finder = OrfFinder::new(1, true).unwrap();
    let orfs = finder.find_all(contig, &params(StartMode::AnyToStop)).unwrap();
    assert!(!orfs.is_empty());
    for orf in &orfs {
        assert!(orf.from < orf.to, "empty range emitted");
        assert!(orf.to <= contig.len());
        assert_eq!((orf.to - orf.from) % 3, 0, "fragment not codon-aligned");
    }
}

#[test]
fn test_header_survives_extraction_round_trip() {
    let finder = OrfFinder::new(1, false).unwrap();
    let orfs = finder
        .find_all(b"TTATTTCAT", &params(StartMode::StartToStop))
        .unwrap();
    let mut orf = orfs[0];
    orf.id = 12345;
    let header = format_orf_header(9, &orf);
    let (orf_id, parsed) = parse_orf_header(&header).unwrap();
    assert_eq!(orf_id, 9);
    assert_eq!(parsed, orf);
}
