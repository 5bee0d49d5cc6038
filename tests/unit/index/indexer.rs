//! K-mer packing over a protein test sequence.

use kseed::index::Indexer;
use kseed::sequence::{SeqType, Sequence};
use kseed::utils::matrix::SubstitutionMatrix;

const SEQ0: &[u8] = b"MIPAEAGRPSLADS";

fn encode(ascii: &[u8]) -> Vec<u8> {
    let matrix = SubstitutionMatrix::blosum62();
    Sequence::map_sequence(0, None, ascii, &matrix, SeqType::AminoAcids)
        .unwrap()
        .residues
}

#[test]
fn test_kmer_indices_cover_sequence() {
    // alphabet 21 drops X from the digit space: indices live in [0, 400)
    let residues = encode(SEQ0);
    let k = 2;
    let mut indexer = Indexer::new(20, k).unwrap();

    let mut indices = Vec::new();
    for pos in 0..=(residues.len() - k) {
        indices.push(indexer.next_index(&residues[pos..pos + k]));
    }
    assert_eq!(indices.len(), SEQ0.len() - k + 1);
    assert_eq!(indices.len(), 13);
    assert!(indices.iter().all(|&index| index < 400));
}

#[test]
fn test_index_to_residues_restores_every_pair() {
    let residues = encode(SEQ0);
    let k = 2;
    let mut indexer = Indexer::new(20, k).unwrap();

    for pos in 0..=(residues.len() - k) {
        let index = indexer.next_index(&residues[pos..pos + k]);
        let mut decoded = [0u8; 2];
        indexer.index_to_residues(index, &mut decoded);
        assert_eq!(
            &decoded[..],
            &residues[pos..pos + k],
            "round trip broke at position {pos}"
        );
    }
}

#[test]
fn test_known_index_values() {
    // M=10, I=7 under the ACDEFGHIKLMNPQRSTVWYX encoding
    let residues = encode(SEQ0);
    let mut indexer = Indexer::new(20, 2).unwrap();
    assert_eq!(indexer.next_index(&residues[0..2]), 10 + 7 * 20);
    assert_eq!(indexer.next_index(&residues[1..3]), 7 + 12 * 20);
}

#[test]
fn test_reset_between_sequences() {
    let residues = encode(SEQ0);
    let other = encode(b"MSSAEAGRPSLADS");
    let mut indexer = Indexer::new(20, 2).unwrap();
    for pos in 0..=(residues.len() - 2) {
        indexer.next_index(&residues[pos..pos + 2]);
    }
    indexer.reset();
    // after a reset the rolling state must not leak across sequences
    assert_eq!(indexer.next_index(&other[0..2]), 10 + 15 * 20);
}
