//! Six-frame ORF extraction tool.
//!
//! Reads a nucleotide contig store and writes two stores: the ORF
//! fragments (ready for `createindex`) and their headers, which record the
//! contig coordinates for later back-mapping. ORF keys are assigned
//! deterministically in contig order; the writes fan out over per-thread
//! shards.

use anyhow::{Context, Result};
use clap::Args;
use rayon::prelude::*;
use std::path::PathBuf;

use crate::error::KseedError;
use crate::orf::{
    OrfFinder, OrfParams, SequenceLocation, StartMode, ALL_FRAMES, FRAME_1, FRAME_2, FRAME_3,
};
use crate::sequence::{read_dbtype, write_dbtype, SeqType};
use crate::store::{StoreReader, StoreWriter};
use crate::tools::setup_thread_pool;
use crate::utils::timer::Timer;

#[derive(Args, Debug)]
pub struct ExtractorfsArgs {
    /// Input contig database (nucleotide)
    pub contig_db: PathBuf,
    /// Output ORF database
    pub orf_db: PathBuf,
    /// Minimum ORF length in nucleotides
    #[arg(long, default_value_t = 1)]
    pub min_length: usize,
    /// Maximum ORF length in nucleotides
    #[arg(long, default_value_t = usize::MAX)]
    pub max_length: usize,
    /// Longest tolerated run of ambiguous bases inside an ORF
    #[arg(long, default_value_t = 30)]
    pub max_gaps: usize,
    /// Forward frames to scan, e.g. "1,2,3"
    #[arg(long, default_value = "1,2,3")]
    pub forward_frames: String,
    /// Reverse frames to scan, e.g. "1,2,3"
    #[arg(long, default_value = "1,2,3")]
    pub reverse_frames: String,
    /// Start policy: 0 start-to-stop, 1 any-to-stop, 2 last-start-to-stop
    #[arg(long, default_value_t = 1)]
    pub start_mode: i32,
    /// NCBI genetic code id
    #[arg(long, default_value_t = 1)]
    pub gen_code: u8,
    /// Accept every start codon of the translation table, not only ATG
    #[arg(long, default_value_t = false)]
    pub use_all_table_starts: bool,
    /// Worker threads (0 = all cores)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub threads: usize,
}

fn parse_frames(value: &str) -> Result<u32> {
    let mut mask = 0u32;
    for part in value.split(',').filter(|p| !p.is_empty()) {
        match part.trim() {
            "1" => mask |= FRAME_1,
            "2" => mask |= FRAME_2,
            "3" => mask |= FRAME_3,
            other => {
                return Err(KseedError::Parameter(format!(
                    "frame {other:?} outside {{1, 2, 3}}"
                ))
                .into())
            }
        }
    }
    Ok(mask & ALL_FRAMES)
}

pub fn run(args: ExtractorfsArgs) -> Result<()> {
    let params = OrfParams {
        min_length: args.min_length,
        max_length: args.max_length,
        max_gaps: args.max_gaps,
        forward_frames: parse_frames(&args.forward_frames)?,
        reverse_frames: parse_frames(&args.reverse_frames)?,
        start_mode: StartMode::from_i32(args.start_mode)?,
    };
    params.validate()?;
    let finder = OrfFinder::new(args.gen_code, args.use_all_table_starts)?;
    let threads = setup_thread_pool(args.threads);

    let timer = Timer::new();
    match read_dbtype(&args.contig_db) {
        Ok(SeqType::Nucleotides) => {}
        Ok(other) => {
            return Err(KseedError::Parameter(format!(
                "contig database has type {other:?}, ORFs need nucleotides"
            ))
            .into())
        }
        // legacy stores may lack the sidecar; assume nucleotides
        Err(KseedError::Io(_)) => {}
        Err(err) => return Err(err.into()),
    }
    let contigs = StoreReader::open(&args.contig_db)
        .with_context(|| format!("Failed to open {}", args.contig_db.display()))?;

    // Pass 1: locate ORFs per contig, in store order.
    let located: Vec<(u32, Vec<SequenceLocation>)> = (0..contigs.size())
        .into_par_iter()
        .map(|id| -> crate::error::Result<(u32, Vec<SequenceLocation>)> {
            let key = contigs.get_key(id);
            let contig = trim_record(contigs.get_data(id)?);
            let mut locations = finder.find_all(contig, &params)?;
            for location in &mut locations {
                location.id = key;
            }
            Ok((key, locations))
        })
        .collect::<crate::error::Result<_>>()?;

    // Deterministic ORF keys: a running count in contig order.
    let mut bases = Vec::with_capacity(located.len());
    let mut next_key = 0u32;
    for (_, locations) in &located {
        bases.push(next_key);
        next_key += locations.len() as u32;
    }

    let mut header_path = args.orf_db.as_os_str().to_os_string();
    header_path.push("_h");
    let header_path = PathBuf::from(header_path);
    let seq_writer = StoreWriter::open(&args.orf_db, threads)?;
    let header_writer = StoreWriter::open(&header_path, threads)?;

    // Pass 2: extract and persist, sharded by worker thread.
    located
        .par_iter()
        .zip(bases.par_iter())
        .try_for_each(|((_, locations), &base)| -> crate::error::Result<()> {
            let shard = rayon::current_thread_index().unwrap_or(0);
            for (i, location) in locations.iter().enumerate() {
                let orf_key = base + i as u32;
                let contig_id = contigs
                    .get_id(location.id)
                    .expect("located contig vanished from the store");
                let contig = trim_record(contigs.get_data(contig_id)?);
                let mut fragment = finder.extract(contig, location);
                fragment.push(b'\n');
                seq_writer.write_data(&fragment, orf_key, shard)?;
                seq_writer.align_to_page_size(shard)?;

                let mut header = crate::orf::format_orf_header(orf_key, location);
                header.push('\n');
                header_writer.write_data(header.as_bytes(), orf_key, shard)?;
                header_writer.align_to_page_size(shard)?;
            }
            Ok(())
        })?;

    seq_writer.close()?;
    header_writer.close()?;
    write_dbtype(&args.orf_db, SeqType::Nucleotides)?;

    eprintln!(
        "[INFO] extracted {} ORFs from {} contigs in {}",
        next_key,
        contigs.size(),
        timer.lap()
    );
    Ok(())
}

/// Contig records carry a trailing newline (and page padding NULs once
/// mapped); the scan wants bare bases.
fn trim_record(record: &[u8]) -> &[u8] {
    let mut end = record.len();
    while end > 0 && (record[end - 1] == 0 || record[end - 1] == b'\n' || record[end - 1] == b'\r')
    {
        end -= 1;
    }
    &record[..end]
}
