//! FASTA to sequence-store conversion.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::error::KseedError;
use crate::sequence::{write_dbtype, SeqType};
use crate::store::StoreWriter;
use crate::utils::timer::Timer;

#[derive(Args, Debug)]
pub struct CreatedbArgs {
    /// Input FASTA file
    pub input: PathBuf,
    /// Output sequence database
    pub output: PathBuf,
    /// Database type: auto, aa or nucl
    #[arg(long, default_value = "auto")]
    pub dbtype: String,
}

/// Fraction of nucleotide letters above which a database is auto-typed as
/// nucleotide.
const NUCL_FRACTION: f64 = 0.9;

pub fn run(args: CreatedbArgs) -> Result<()> {
    // parameter checks come before any I/O
    let forced_type = match args.dbtype.as_str() {
        "aa" => Some(SeqType::AminoAcids),
        "nucl" => Some(SeqType::Nucleotides),
        "auto" => None,
        other => {
            return Err(KseedError::Parameter(format!(
                "unknown dbtype {other:?}, expected auto, aa or nucl"
            ))
            .into())
        }
    };

    let timer = Timer::new();
    let reader = bio::io::fasta::Reader::from_file(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let mut header_path = args.output.as_os_str().to_os_string();
    header_path.push("_h");
    let header_path = PathBuf::from(header_path);

    let seq_writer = StoreWriter::open(&args.output, 1)?;
    let header_writer = StoreWriter::open(&header_path, 1)?;

    let mut key = 0u32;
    let mut nucl_letters = 0u64;
    let mut total_letters = 0u64;
    for record in reader.records() {
        let record = record.context("Failed to parse FASTA record")?;
        let mut entry = record.seq().to_vec();
        entry.push(b'\n');
        seq_writer.write_data(&entry, key, 0)?;

        let mut header = record.id().to_string();
        if let Some(description) = record.desc() {
            header.push(' ');
            header.push_str(description);
        }
        header.push('\n');
        header_writer.write_data(header.as_bytes(), key, 0)?;

        for &b in record.seq() {
            if matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'U' | b'N') {
                nucl_letters += 1;
            }
            total_letters += 1;
        }
        key += 1;
    }
    seq_writer.close()?;
    header_writer.close()?;

    let seq_type = forced_type.unwrap_or(
        if total_letters > 0 && nucl_letters as f64 / total_letters as f64 >= NUCL_FRACTION {
            SeqType::Nucleotides
        } else {
            SeqType::AminoAcids
        },
    );
    write_dbtype(&args.output, seq_type)?;

    eprintln!(
        "[INFO] wrote {} sequences ({:?}) in {}",
        key,
        seq_type,
        timer.lap()
    );
    Ok(())
}
