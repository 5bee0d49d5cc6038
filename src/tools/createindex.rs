//! Prefilter index build tool.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::error::KseedError;
use crate::index::builder::MaskMode;
use crate::index::file::{self, CreateIndexOptions};
use crate::index::indexer::{MAX_KMER_SIZE, MIN_KMER_SIZE};
use crate::sequence::read_dbtype;
use crate::store::StoreReader;
use crate::tools::setup_thread_pool;
use crate::utils::matrix::SubstitutionMatrix;
use crate::utils::timer::Timer;

#[derive(Args, Debug)]
pub struct CreateindexArgs {
    /// Input sequence database
    pub sequence_db: PathBuf,
    /// Output index base path
    pub out_index: PathBuf,
    /// K-mer size
    #[arg(short, default_value_t = 6)]
    pub k: usize,
    /// Index spaced k-mers instead of contiguous ones
    #[arg(long, default_value_t = false)]
    pub spaced_kmer: bool,
    /// Masking: 0 none, 1 mask low-complexity regions, 2 keep both views
    #[arg(long, default_value_t = 1)]
    pub mask: i32,
    /// Minimum k-mer self-score for indexing
    #[arg(long, default_value_t = 0)]
    pub kmer_score: i32,
    /// Longest sequence prefix that is scanned for k-mers
    #[arg(long, default_value_t = 65535)]
    pub max_seq_len: usize,
    /// Correct for locally biased residue composition
    #[arg(long, default_value_t = false)]
    pub comp_bias_correction: bool,
    /// Alphabet size including the unknown symbol
    #[arg(long, default_value_t = 21)]
    pub alphabet_size: usize,
    /// Worker threads (0 = all cores)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub threads: usize,
}

pub fn run(args: CreateindexArgs) -> Result<()> {
    // parameter checks come before any I/O
    if !(MIN_KMER_SIZE..=MAX_KMER_SIZE).contains(&args.k) {
        return Err(KseedError::Parameter(format!(
            "k-mer size {} outside [{MIN_KMER_SIZE}, {MAX_KMER_SIZE}]",
            args.k
        ))
        .into());
    }
    if args.max_seq_len == 0 {
        return Err(KseedError::Parameter("max sequence length must be positive".into()).into());
    }
    let mask_mode = MaskMode::from_i32(args.mask)?;
    setup_thread_pool(args.threads);

    let timer = Timer::new();
    let seq_type = read_dbtype(&args.sequence_db).with_context(|| {
        format!(
            "Failed to read database type of {}",
            args.sequence_db.display()
        )
    })?;
    let matrix = SubstitutionMatrix::for_seq_type(seq_type);
    if args.alphabet_size != matrix.alphabet_size {
        return Err(KseedError::Parameter(format!(
            "alphabet size {} does not match the {} matrix ({})",
            args.alphabet_size,
            matrix.matrix_name(),
            matrix.alphabet_size
        ))
        .into());
    }

    let seq_db = StoreReader::open(&args.sequence_db)
        .with_context(|| format!("Failed to open {}", args.sequence_db.display()))?;

    // headers are optional; the convention places them at <db>_h
    let mut header_path = args.sequence_db.as_os_str().to_os_string();
    header_path.push("_h");
    let header_path = PathBuf::from(header_path);
    let header_db = if header_path.exists() {
        Some(StoreReader::open(&header_path)?)
    } else {
        None
    };

    if let Some(existing) = file::search_for_index(&args.out_index) {
        eprintln!("[INFO] replacing existing index {}", existing.display());
    }

    let opts = CreateIndexOptions {
        kmer_size: args.k,
        spaced: args.spaced_kmer,
        mask_mode,
        kmer_threshold: args.kmer_score,
        max_seq_len: args.max_seq_len,
        comp_bias_correction: args.comp_bias_correction,
    };
    let cancel = AtomicBool::new(false);
    let out_path = file::create_index_file(
        &args.out_index,
        &seq_db,
        header_db.as_ref(),
        &matrix,
        seq_type,
        &opts,
        &cancel,
    )?;

    eprintln!(
        "[INFO] wrote index {} in {}",
        out_path.display(),
        timer.lap()
    );
    Ok(())
}
