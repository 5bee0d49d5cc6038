//! Open reading frame extraction.
//!
//! A six-frame scan over an IUPAC nucleotide contig yields candidate
//! coding fragments as coordinate ranges. Reverse-strand hits are scanned
//! on the reverse complement and reported back in forward-strand space.
//! Emitted ranges include the terminating stop codon; fragments that run
//! into a contig edge carry incompleteness flags instead.

pub mod gencode;

pub use gencode::GeneticCode;

use crate::error::{KseedError, Result};

pub const FRAME_1: u32 = 1 << 0;
pub const FRAME_2: u32 = 1 << 1;
pub const FRAME_3: u32 = 1 << 2;
pub const ALL_FRAMES: u32 = FRAME_1 | FRAME_2 | FRAME_3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Plus = 1,
    Minus = -1,
}

/// Which positions may open an ORF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Every start codon up to its next in-frame stop.
    StartToStop = 0,
    /// Stop-delimited pieces tiling the whole frame.
    AnyToStop = 1,
    /// The last start codon inside each stop-delimited piece.
    LastStartToStop = 2,
}

impl StartMode {
    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(StartMode::StartToStop),
            1 => Ok(StartMode::AnyToStop),
            2 => Ok(StartMode::LastStartToStop),
            other => Err(KseedError::Parameter(format!(
                "ORF start mode {other} outside {{0, 1, 2}}"
            ))),
        }
    }
}

/// One extracted ORF in forward-strand contig coordinates, `[from, to)`.
/// For the minus strand the fragment reads from `to - 1` down to `from` on
/// the reverse complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLocation {
    pub id: u32,
    pub from: usize,
    pub to: usize,
    pub incomplete_start: bool,
    pub incomplete_end: bool,
    pub strand: Strand,
}

pub struct OrfParams {
    /// Minimum fragment length in nucleotides.
    pub min_length: usize,
    /// Maximum fragment length in nucleotides.
    pub max_length: usize,
    /// Longest run of consecutive ambiguous bases tolerated inside an ORF.
    pub max_gaps: usize,
    pub forward_frames: u32,
    pub reverse_frames: u32,
    pub start_mode: StartMode,
}

impl Default for OrfParams {
    fn default() -> Self {
        OrfParams {
            min_length: 1,
            max_length: usize::MAX,
            max_gaps: 30,
            forward_frames: ALL_FRAMES,
            reverse_frames: ALL_FRAMES,
            start_mode: StartMode::AnyToStop,
        }
    }
}

impl OrfParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_length < self.min_length {
            return Err(KseedError::Parameter(format!(
                "ORF max length {} below min length {}",
                self.max_length, self.min_length
            )));
        }
        Ok(())
    }
}

pub struct OrfFinder {
    code: GeneticCode,
    use_all_table_starts: bool,
}

impl OrfFinder {
    pub fn new(gen_code: u8, use_all_table_starts: bool) -> Result<Self> {
        Ok(OrfFinder {
            code: GeneticCode::from_id(gen_code)?,
            use_all_table_starts,
        })
    }

    pub fn genetic_code(&self) -> &GeneticCode {
        &self.code
    }

    /// All ORFs of both orientations. Reverse-strand coordinates are
    /// mapped into forward space: a hit at `[r_from, r_to)` on the reverse
    /// complement becomes `[len - r_to, len - r_from)` with strand -1.
    pub fn find_all(&self, sequence: &[u8], params: &OrfParams) -> Result<Vec<SequenceLocation>> {
        params.validate()?;
        let mut result = Vec::new();
        if params.forward_frames != 0 {
            self.find_forward(
                sequence,
                params,
                params.forward_frames,
                Strand::Plus,
                &mut result,
            );
        }
        if params.reverse_frames != 0 {
            let reverse = reverse_complement(sequence);
            let mut reverse_hits = Vec::new();
            self.find_forward(
                &reverse,
                params,
                params.reverse_frames,
                Strand::Minus,
                &mut reverse_hits,
            );
            let len = sequence.len();
            result.extend(reverse_hits.into_iter().map(|loc| SequenceLocation {
                from: len - loc.to,
                to: len - loc.from,
                ..loc
            }));
        }
        Ok(result)
    }

    /// Scan the selected frames of one strand. Coordinates are relative to
    /// `sequence` as given; the caller maps reverse hits.
    fn find_forward(
        &self,
        sequence: &[u8],
        params: &OrfParams,
        frames: u32,
        strand: Strand,
        result: &mut Vec<SequenceLocation>,
    ) {
        let n = sequence.len();
        if n < 3 {
            return;
        }
        // Base positions where the running count of consecutive ambiguous
        // bases first exceeds max_gaps; a candidate dies if such a point
        // falls inside it.
        let latest_kill = latest_kill_positions(sequence, params.max_gaps);

        for frame in 0..3usize {
            if frames & (1 << frame) == 0 || frame + 3 > n {
                continue;
            }
            self.scan_frame(sequence, frame, params, strand, &latest_kill, result);
        }
    }

    fn scan_frame(
        &self,
        sequence: &[u8],
        frame: usize,
        params: &OrfParams,
        strand: Strand,
        latest_kill: &[Option<usize>],
        result: &mut Vec<SequenceLocation>,
    ) {
        let n = sequence.len();
        let frame_end = frame + (n - frame) / 3 * 3;
        let mut emit = |from: usize, to: usize, incomplete_start: bool, incomplete_end: bool| {
            let length = to - from;
            if length < params.min_length || length > params.max_length {
                return;
            }
            // discarded when an excessive gap run ends inside the fragment
            if matches!(latest_kill[to - 1], Some(kill) if kill >= from) {
                return;
            }
            result.push(SequenceLocation {
                id: 0,
                from,
                to,
                incomplete_start,
                incomplete_end,
                strand,
            });
        };

        match params.start_mode {
            StartMode::StartToStop => {
                let mut orf_from: Option<usize> = None;
                let mut pos = frame;
                while pos + 3 <= n {
                    let codon = &sequence[pos..pos + 3];
                    if self.code.is_stop(codon) {
                        if let Some(from) = orf_from.take() {
                            emit(from, pos + 3, false, false);
                        }
                    } else if orf_from.is_none()
                        && self.code.is_start(codon, self.use_all_table_starts)
                    {
                        orf_from = Some(pos);
                    }
                    pos += 3;
                }
                if let Some(from) = orf_from {
                    // ran off the contig without a stop
                    emit(from, frame_end, false, true);
                }
            }
            StartMode::AnyToStop => {
                let mut piece_from = frame;
                let mut seen_stop = false;
                let mut pos = frame;
                while pos + 3 <= n {
                    let codon = &sequence[pos..pos + 3];
                    if self.code.is_stop(codon) {
                        emit(
                            piece_from,
                            pos + 3,
                            self.frame_initial_incomplete(sequence, piece_from, frame, seen_stop),
                            false,
                        );
                        piece_from = pos + 3;
                        seen_stop = true;
                    }
                    pos += 3;
                }
                // a 1-2 nt remainder past the last stop is never a fragment
                if piece_from < frame_end {
                    emit(
                        piece_from,
                        frame_end,
                        self.frame_initial_incomplete(sequence, piece_from, frame, seen_stop),
                        true,
                    );
                }
            }
            StartMode::LastStartToStop => {
                let mut piece_from = frame;
                let mut last_start: Option<usize> = None;
                let mut seen_stop = false;
                let mut pos = frame;
                while pos + 3 <= n {
                    let codon = &sequence[pos..pos + 3];
                    if self.code.is_stop(codon) {
                        if let Some(start) = last_start {
                            emit(start, pos + 3, false, false);
                        } else if piece_from == frame && !seen_stop {
                            // startless frame-initial piece: the true start
                            // may lie upstream of the contig
                            emit(piece_from, pos + 3, true, false);
                        }
                        piece_from = pos + 3;
                        last_start = None;
                        seen_stop = true;
                    } else if self.code.is_start(codon, self.use_all_table_starts) {
                        last_start = Some(pos);
                    }
                    pos += 3;
                }
                if let Some(start) = last_start {
                    emit(start, frame_end, false, true);
                } else if piece_from == frame && !seen_stop && piece_from < frame_end {
                    emit(piece_from, frame_end, true, true);
                }
            }
        }
    }

    /// A fragment opening at the frame start with no upstream stop is
    /// incomplete unless it already begins at a start codon.
    fn frame_initial_incomplete(
        &self,
        sequence: &[u8],
        piece_from: usize,
        frame: usize,
        seen_stop: bool,
    ) -> bool {
        piece_from == frame
            && !seen_stop
            && !self
                .code
                .is_start(&sequence[piece_from..piece_from + 3], self.use_all_table_starts)
    }

    /// Fragment bases of an ORF: the forward slice, or its reverse
    /// complement for minus-strand hits.
    pub fn extract(&self, contig: &[u8], location: &SequenceLocation) -> Vec<u8> {
        let slice = &contig[location.from..location.to];
        match location.strand {
            Strand::Plus => slice.to_vec(),
            Strand::Minus => reverse_complement(slice),
        }
    }
}

/// IUPAC-aware reverse complement. Ambiguity codes map to their
/// complements; anything unrecognized passes through unchanged so gap
/// characters keep their positions.
pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence
        .iter()
        .rev()
        .map(|&base| {
            let complement = match base.to_ascii_uppercase() {
                b'A' => b'T',
                b'C' => b'G',
                b'G' => b'C',
                b'T' | b'U' => b'A',
                b'R' => b'Y',
                b'Y' => b'R',
                b'S' => b'S',
                b'W' => b'W',
                b'K' => b'M',
                b'M' => b'K',
                b'B' => b'V',
                b'V' => b'B',
                b'D' => b'H',
                b'H' => b'D',
                b'N' => b'N',
                other => return other,
            };
            if base.is_ascii_lowercase() {
                complement.to_ascii_lowercase()
            } else {
                complement
            }
        })
        .collect()
}

/// For every base position, the latest position at or before it where the
/// running count of consecutive ambiguous bases exceeded `max_gaps`.
fn latest_kill_positions(sequence: &[u8], max_gaps: usize) -> Vec<Option<usize>> {
    let mut latest = vec![None; sequence.len()];
    let mut run = 0usize;
    let mut last_kill = None;
    for (i, &base) in sequence.iter().enumerate() {
        if matches!(base.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'U') {
            run = 0;
        } else {
            run += 1;
            if run > max_gaps {
                last_kill = Some(i);
            }
        }
        latest[i] = last_kill;
    }
    latest
}

/// Render the persisted ORF header line. `parse_orf_header` is the exact
/// inverse; the two must round-trip byte-for-byte.
pub fn format_orf_header(orf_id: u32, location: &SequenceLocation) -> String {
    format!(
        "[{}] from={} to={} strand={} incStart={} incEnd={} contigId={}",
        orf_id,
        location.from,
        location.to,
        match location.strand {
            Strand::Plus => "+1",
            Strand::Minus => "-1",
        },
        location.incomplete_start as u8,
        location.incomplete_end as u8,
        location.id,
    )
}

/// Parse an ORF header line back into `(orf_id, location)`.
pub fn parse_orf_header(header: &str) -> Result<(u32, SequenceLocation)> {
    let malformed = || KseedError::Parse(format!("malformed ORF header: {header:?}"));
    let header = header.trim_end_matches(['\n', '\0']);

    let rest = header.strip_prefix('[').ok_or_else(malformed)?;
    let (orf_id, rest) = rest.split_once("] ").ok_or_else(malformed)?;
    let orf_id: u32 = orf_id.parse().map_err(|_| malformed())?;

    let mut fields = rest.split(' ');
    let mut field = |name: &str| -> Result<&str> {
        fields
            .next()
            .and_then(|f| f.strip_prefix(name))
            .ok_or_else(malformed)
    };
    let from: usize = field("from=")?.parse().map_err(|_| malformed())?;
    let to: usize = field("to=")?.parse().map_err(|_| malformed())?;
    let strand = match field("strand=")? {
        "+1" => Strand::Plus,
        "-1" => Strand::Minus,
        _ => return Err(malformed()),
    };
    let incomplete_start = parse_flag(field("incStart=")?).ok_or_else(malformed)?;
    let incomplete_end = parse_flag(field("incEnd=")?).ok_or_else(malformed)?;
    let id: u32 = field("contigId=")?.parse().map_err(|_| malformed())?;

    Ok((
        orf_id,
        SequenceLocation {
            id,
            from,
            to,
            incomplete_start,
            incomplete_end,
            strand,
        },
    ))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}
