//! Versioned on-disk index container.
//!
//! All artifacts live in one key→blob store under fixed numeric keys. The
//! writer pads every blob to the page size so a reader can attach typed
//! views straight into the mapping; the reader refuses anything whose
//! VERSION blob is not byte-identical to `CURRENT_VERSION`.

use byteorder::{ByteOrder, LittleEndian};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use crate::error::{KseedError, Result};
use crate::index::builder::{self, BuildOptions, MaskMode};
use crate::index::ext_matrix::ScoreMatrix;
use crate::index::table::{IndexEntry, IndexTable};
use crate::sequence::{Sequence, SequenceLookup, SeqType};
use crate::store::{StoreReader, StoreWriter};
use crate::utils::matrix::SubstitutionMatrix;

/// Bump on any layout change; readers byte-compare this string.
pub const CURRENT_VERSION: &str = "7";

/// Fixed key assignments inside the index store.
pub mod keys {
    pub const VERSION: u32 = 0;
    pub const META: u32 = 1;
    pub const SCOREMATRIXNAME: u32 = 2;
    pub const SCOREMATRIX2MER: u32 = 3;
    pub const SCOREMATRIX3MER: u32 = 4;
    pub const DBRINDEX: u32 = 5;
    pub const HDRINDEX: u32 = 6;
    pub const ENTRIES: u32 = 7;
    pub const ENTRIESOFFSETS: u32 = 8;
    pub const ENTRIESNUM: u32 = 9;
    pub const SEQCOUNT: u32 = 10;
    pub const MASKEDSEQINDEXDATA: u32 = 11;
    pub const SEQINDEXDATASIZE: u32 = 12;
    pub const SEQINDEXSEQOFFSET: u32 = 13;
    pub const UNMASKEDSEQINDEXDATA: u32 = 14;
    pub const GENERATOR: u32 = 15;
}

/// The seven-field metadata record, persisted as little-endian i32s in
/// this exact order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMetadata {
    pub kmer_size: i32,
    pub alphabet_size: i32,
    pub masked: i32,
    pub spaced_kmer: i32,
    pub kmer_threshold: i32,
    pub seq_type: i32,
    pub headers: i32,
}

impl IndexMetadata {
    pub const SIZE: usize = 7 * 4;

    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let fields = [
            self.kmer_size,
            self.alphabet_size,
            self.masked,
            self.spaced_kmer,
            self.kmer_threshold,
            self.seq_type,
            self.headers,
        ];
        let mut bytes = [0u8; Self::SIZE];
        for (i, field) in fields.into_iter().enumerate() {
            LittleEndian::write_i32(&mut bytes[i * 4..(i + 1) * 4], field);
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(KseedError::Parse(format!(
                "metadata record holds {} bytes, expected {}",
                bytes.len(),
                Self::SIZE
            )));
        }
        let field = |i: usize| LittleEndian::read_i32(&bytes[i * 4..(i + 1) * 4]);
        Ok(IndexMetadata {
            kmer_size: field(0),
            alphabet_size: field(1),
            masked: field(2),
            spaced_kmer: field(3),
            kmer_threshold: field(4),
            seq_type: field(5),
            headers: field(6),
        })
    }

    pub fn seq_type(&self) -> Result<SeqType> {
        SeqType::from_i32(self.seq_type)
    }

    /// Digit base of the persisted table.
    pub fn effective_alphabet_size(&self) -> Result<usize> {
        Ok(builder::effective_alphabet_size(
            self.alphabet_size as usize,
            self.seq_type()?,
        ))
    }

    pub fn print(&self) {
        eprintln!("[INFO] KmerSize:     {}", self.kmer_size);
        eprintln!("[INFO] AlphabetSize: {}", self.alphabet_size);
        eprintln!("[INFO] Masked:       {}", self.masked);
        eprintln!("[INFO] Spaced:       {}", self.spaced_kmer);
        eprintln!("[INFO] KmerScore:    {}", self.kmer_threshold);
        eprintln!("[INFO] SequenceType: {}", self.seq_type);
        eprintln!("[INFO] Headers:      {}", self.headers);
    }
}

pub struct CreateIndexOptions {
    pub kmer_size: usize,
    pub spaced: bool,
    pub mask_mode: MaskMode,
    pub kmer_threshold: i32,
    pub max_seq_len: usize,
    pub comp_bias_correction: bool,
}

/// Output path for an index over `out_db`: `<out_db>.k<k>` or
/// `<out_db>.sk<k>` for spaced k-mers.
pub fn index_file_name(out_db: &Path, kmer_size: usize, spaced: bool) -> PathBuf {
    let mut os = out_db.as_os_str().to_os_string();
    os.push(format!(".{}k{}", if spaced { "s" } else { "" }, kmer_size));
    PathBuf::from(os)
}

/// Build the prefilter index over a sequence store and persist it.
/// Sequences that fail strict decoding are warned about and skipped (they
/// occupy an empty slot so ids stay aligned with the store). Failures that
/// invalidate the whole index remove the partial output.
pub fn create_index_file(
    out_db: &Path,
    seq_db: &StoreReader,
    header_db: Option<&StoreReader>,
    matrix: &SubstitutionMatrix,
    seq_type: SeqType,
    opts: &CreateIndexOptions,
    cancel: &AtomicBool,
) -> Result<PathBuf> {
    let out_path = index_file_name(out_db, opts.kmer_size, opts.spaced);
    match write_index(&out_path, seq_db, header_db, matrix, seq_type, opts, cancel) {
        Ok(()) => Ok(out_path),
        Err(err) => {
            // a partial index is worse than none
            let _ = std::fs::remove_file(&out_path);
            let _ = std::fs::remove_file(crate::store::index_path(&out_path));
            Err(err)
        }
    }
}

fn write_index(
    out_path: &Path,
    seq_db: &StoreReader,
    header_db: Option<&StoreReader>,
    matrix: &SubstitutionMatrix,
    seq_type: SeqType,
    opts: &CreateIndexOptions,
    cancel: &AtomicBool,
) -> Result<()> {
    let writer = StoreWriter::open(out_path, 1)?;
    let effective = builder::effective_alphabet_size(matrix.alphabet_size, seq_type);

    if !seq_type.is_profile() {
        let s3 = ScoreMatrix::calc(matrix, effective, 3);
        eprintln!("[INFO] Write SCOREMATRIX3MER ({})", keys::SCOREMATRIX3MER);
        writer.write_data(&s3.serialize(), keys::SCOREMATRIX3MER, 0)?;
        writer.align_to_page_size(0)?;
        drop(s3);

        let s2 = ScoreMatrix::calc(matrix, effective, 2);
        eprintln!("[INFO] Write SCOREMATRIX2MER ({})", keys::SCOREMATRIX2MER);
        writer.write_data(&s2.serialize(), keys::SCOREMATRIX2MER, 0)?;
        writer.align_to_page_size(0)?;
    }

    // Decode the collection; ids are store positions so the table, the
    // lookups and the embedded store index agree.
    let bar = ProgressBar::new(seq_db.size() as u64);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
            .expect("static progress template")
            .progress_chars("=> "),
    );
    bar.set_message("decoding");
    let mut sequences = Vec::with_capacity(seq_db.size());
    for id in 0..seq_db.size() {
        let record = seq_db.get_data(id)?;
        let sequence =
            match Sequence::map_sequence(id as u32, None, record, matrix, seq_type) {
                Ok(sequence) => sequence,
                Err(KseedError::InvalidResidue {
                    seq_id,
                    position,
                    byte,
                }) => {
                    eprintln!(
                        "[WARN] sequence {seq_id}: invalid residue {byte:#04x} at {position}, skipping"
                    );
                    Sequence {
                        id: id as u32,
                        header: None,
                        seq_type,
                        residues: Vec::new(),
                    }
                }
                Err(err) => return Err(err),
            };
        sequences.push(sequence);
        bar.inc(1);
    }
    bar.finish_and_clear();

    let build_opts = BuildOptions {
        kmer_size: opts.kmer_size,
        spaced: opts.spaced,
        kmer_threshold: opts.kmer_threshold,
        mask_mode: opts.mask_mode,
        max_seq_len: opts.max_seq_len,
        seq_type,
    };
    let result = builder::fill_database(&sequences, matrix, &build_opts, cancel)?;
    let table = &result.table;
    let stats = table.statistics();
    eprintln!(
        "[INFO] index table: {} entries over {} buckets (max bucket {})",
        stats.entries, stats.used_buckets, stats.max_bucket
    );

    let lookup = result
        .masked_lookup
        .as_ref()
        .or(result.unmasked_lookup.as_ref())
        .ok_or_else(|| {
            KseedError::Parameter("no sequence lookup created by the index build".to_string())
        })?;

    eprintln!("[INFO] Write ENTRIES ({})", keys::ENTRIES);
    writer.write_data(bytemuck::cast_slice(table.entries()), keys::ENTRIES, 0)?;
    writer.align_to_page_size(0)?;

    eprintln!("[INFO] Write ENTRIESOFFSETS ({})", keys::ENTRIESOFFSETS);
    writer.write_data(bytemuck::cast_slice(table.offsets()), keys::ENTRIESOFFSETS, 0)?;
    writer.align_to_page_size(0)?;

    eprintln!("[INFO] Write SEQINDEXDATASIZE ({})", keys::SEQINDEXDATASIZE);
    let data_size = lookup.data_size() as i64;
    writer.write_data(&data_size.to_le_bytes(), keys::SEQINDEXDATASIZE, 0)?;
    writer.align_to_page_size(0)?;

    eprintln!("[INFO] Write SEQINDEXSEQOFFSET ({})", keys::SEQINDEXSEQOFFSET);
    writer.write_data(
        bytemuck::cast_slice(lookup.offsets()),
        keys::SEQINDEXSEQOFFSET,
        0,
    )?;
    writer.align_to_page_size(0)?;

    if let Some(masked) = &result.masked_lookup {
        eprintln!(
            "[INFO] Write MASKEDSEQINDEXDATA ({})",
            keys::MASKEDSEQINDEXDATA
        );
        writer.write_data(masked.raw_data(), keys::MASKEDSEQINDEXDATA, 0)?;
        writer.align_to_page_size(0)?;
    }
    if let Some(unmasked) = &result.unmasked_lookup {
        eprintln!(
            "[INFO] Write UNMASKEDSEQINDEXDATA ({})",
            keys::UNMASKEDSEQINDEXDATA
        );
        writer.write_data(unmasked.raw_data(), keys::UNMASKEDSEQINDEXDATA, 0)?;
        writer.align_to_page_size(0)?;
    }

    eprintln!("[INFO] Write ENTRIESNUM ({})", keys::ENTRIESNUM);
    writer.write_data(&table.entry_count().to_le_bytes(), keys::ENTRIESNUM, 0)?;
    writer.align_to_page_size(0)?;

    eprintln!("[INFO] Write SEQCOUNT ({})", keys::SEQCOUNT);
    let seq_count = table.sequence_count() as u64;
    writer.write_data(&seq_count.to_le_bytes(), keys::SEQCOUNT, 0)?;
    writer.align_to_page_size(0)?;

    eprintln!("[INFO] Write META ({})", keys::META);
    let metadata = IndexMetadata {
        kmer_size: opts.kmer_size as i32,
        alphabet_size: matrix.alphabet_size as i32,
        masked: opts.mask_mode.wants_masked() as i32,
        spaced_kmer: opts.spaced as i32,
        kmer_threshold: opts.kmer_threshold,
        seq_type: seq_type.to_i32(),
        headers: header_db.is_some() as i32,
    };
    writer.write_data(&metadata.to_bytes(), keys::META, 0)?;
    writer.align_to_page_size(0)?;
    metadata.print();

    eprintln!("[INFO] Write SCOREMATRIXNAME ({})", keys::SCOREMATRIXNAME);
    writer.write_data(matrix.matrix_name().as_bytes(), keys::SCOREMATRIXNAME, 0)?;
    writer.align_to_page_size(0)?;

    eprintln!("[INFO] Write VERSION ({})", keys::VERSION);
    writer.write_data(CURRENT_VERSION.as_bytes(), keys::VERSION, 0)?;
    writer.align_to_page_size(0)?;

    eprintln!("[INFO] Write DBRINDEX ({})", keys::DBRINDEX);
    writer.write_data(&seq_db.serialize(), keys::DBRINDEX, 0)?;
    writer.align_to_page_size(0)?;

    if let Some(headers) = header_db {
        eprintln!("[INFO] Write HDRINDEX ({})", keys::HDRINDEX);
        writer.write_data(&headers.serialize(), keys::HDRINDEX, 0)?;
        writer.align_to_page_size(0)?;
    }

    eprintln!("[INFO] Write GENERATOR ({})", keys::GENERATOR);
    let generator = format!("kseed {}", env!("CARGO_PKG_VERSION"));
    writer.write_data(generator.as_bytes(), keys::GENERATOR, 0)?;
    writer.align_to_page_size(0)?;

    writer.close()?;
    Ok(())
}

/// Handle over an opened, version-checked index file. Attachment methods
/// hand out views borrowed from the underlying mapping.
pub struct IndexReader {
    reader: StoreReader,
    metadata: IndexMetadata,
}

impl IndexReader {
    /// Open and validate an index file: byte-exact version check, then the
    /// metadata parse. Everything else attaches on demand.
    pub fn open(index_path: &Path) -> Result<Self> {
        let reader = StoreReader::open(index_path)?;
        let version = reader
            .get_data_by_key(keys::VERSION)?
            .ok_or(KseedError::MissingBlob {
                key: keys::VERSION,
                name: "VERSION",
            })?;
        if version != CURRENT_VERSION.as_bytes() {
            return Err(KseedError::VersionMismatch {
                found: String::from_utf8_lossy(version).into_owned(),
                expected: CURRENT_VERSION.to_string(),
            });
        }
        let metadata = IndexMetadata::from_bytes(require(&reader, keys::META, "META")?)?;
        Ok(IndexReader { reader, metadata })
    }

    /// Cheap compatibility probe: does this store look like one of ours?
    pub fn check_if_index_file(reader: &StoreReader) -> bool {
        matches!(
            reader.get_data_by_key(keys::VERSION),
            Ok(Some(version)) if version == CURRENT_VERSION.as_bytes()
        )
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn store(&self) -> &StoreReader {
        &self.reader
    }

    /// Attach the inverted table to the mapped entry blobs.
    pub fn generate_index_table(&self, touch: bool) -> Result<IndexTable<'_>> {
        let entries_num = read_u64(require(&self.reader, keys::ENTRIESNUM, "ENTRIESNUM")?)?;
        let seq_count = read_u64(require(&self.reader, keys::SEQCOUNT, "SEQCOUNT")?)?;
        let entries_blob = require(&self.reader, keys::ENTRIES, "ENTRIES")?;
        let offsets_blob = require(&self.reader, keys::ENTRIESOFFSETS, "ENTRIESOFFSETS")?;

        // the entry width travels implicitly: blob size over entry count
        if entries_num > 0
            && entries_blob.len() as u64 / entries_num != std::mem::size_of::<IndexEntry>() as u64
        {
            return Err(KseedError::Parse(format!(
                "entry width mismatch: {} bytes for {} entries",
                entries_blob.len(),
                entries_num
            )));
        }
        if touch {
            for key in [
                keys::ENTRIESNUM,
                keys::SEQCOUNT,
                keys::ENTRIES,
                keys::ENTRIESOFFSETS,
            ] {
                if let Some(id) = self.reader.get_id(key) {
                    self.reader.touch_data(id);
                }
            }
        }

        let entries: &[IndexEntry] = bytemuck::try_cast_slice(entries_blob)
            .map_err(|e| KseedError::Parse(format!("entries blob cast failed: {e}")))?;
        let offsets: &[u64] = bytemuck::try_cast_slice(offsets_blob)
            .map_err(|e| KseedError::Parse(format!("offsets blob cast failed: {e}")))?;
        IndexTable::attach(
            self.metadata.effective_alphabet_size()?,
            self.metadata.kmer_size as usize,
            seq_count as usize,
            entries,
            offsets,
        )
    }

    /// Attach the masked sequence lookup, if the index carries one.
    pub fn masked_sequence_lookup(&self, touch: bool) -> Result<Option<SequenceLookup<'_>>> {
        self.sequence_lookup(keys::MASKEDSEQINDEXDATA, touch)
    }

    /// Attach the unmasked sequence lookup, if the index carries one.
    pub fn unmasked_sequence_lookup(&self, touch: bool) -> Result<Option<SequenceLookup<'_>>> {
        self.sequence_lookup(keys::UNMASKEDSEQINDEXDATA, touch)
    }

    fn sequence_lookup(&self, data_key: u32, touch: bool) -> Result<Option<SequenceLookup<'_>>> {
        let Some(data_id) = self.reader.get_id(data_key) else {
            return Ok(None);
        };
        let data = self.reader.get_data(data_id)?;
        let offsets_blob = require(&self.reader, keys::SEQINDEXSEQOFFSET, "SEQINDEXSEQOFFSET")?;
        let data_size = read_u64(require(&self.reader, keys::SEQINDEXDATASIZE, "SEQINDEXDATASIZE")?)?;
        if touch {
            self.reader.touch_data(data_id);
            if let Some(id) = self.reader.get_id(keys::SEQINDEXSEQOFFSET) {
                self.reader.touch_data(id);
            }
        }
        let offsets: &[u64] = bytemuck::try_cast_slice(offsets_blob)
            .map_err(|e| KseedError::Parse(format!("lookup offsets cast failed: {e}")))?;
        SequenceLookup::attach(data, data_size as usize, offsets).map(Some)
    }

    /// The bundled 2-mer extended matrix, absent for profile types.
    pub fn two_mer_score_matrix(&self, touch: bool) -> Result<Option<ScoreMatrix>> {
        self.score_matrix(keys::SCOREMATRIX2MER, 2, touch)
    }

    /// The bundled 3-mer extended matrix, absent for profile types.
    pub fn three_mer_score_matrix(&self, touch: bool) -> Result<Option<ScoreMatrix>> {
        self.score_matrix(keys::SCOREMATRIX3MER, 3, touch)
    }

    fn score_matrix(&self, key: u32, kmer_size: usize, touch: bool) -> Result<Option<ScoreMatrix>> {
        let Some(id) = self.reader.get_id(key) else {
            return Ok(None);
        };
        if touch {
            self.reader.touch_data(id);
        }
        let blob = self.reader.get_data(id)?;
        ScoreMatrix::deserialize(blob, self.metadata.effective_alphabet_size()?, kmer_size)
            .map(Some)
    }

    pub fn substitution_matrix_name(&self) -> Result<String> {
        let blob = require(&self.reader, keys::SCOREMATRIXNAME, "SCOREMATRIXNAME")?;
        Ok(String::from_utf8_lossy(blob).into_owned())
    }

    /// Reconstruct the reader of the sequence store the index was built
    /// over, remapped from its recorded data path.
    pub fn sequence_db_reader(&self, touch: bool) -> Result<StoreReader> {
        let id = self
            .reader
            .get_id(keys::DBRINDEX)
            .ok_or(KseedError::MissingBlob {
                key: keys::DBRINDEX,
                name: "DBRINDEX",
            })?;
        if touch {
            self.reader.touch_data(id);
        }
        let mut db = StoreReader::deserialize(self.reader.get_data(id)?)?;
        db.open_data()?;
        Ok(db)
    }

    /// Reconstruct the header store reader, pointing it at the given data
    /// file. `None` when the index was built without headers.
    pub fn header_db_reader(&self, data_path: &Path, touch: bool) -> Result<Option<StoreReader>> {
        let Some(id) = self.reader.get_id(keys::HDRINDEX) else {
            return Ok(None);
        };
        if touch {
            self.reader.touch_data(id);
        }
        let mut db = StoreReader::deserialize(self.reader.get_data(id)?)?;
        db.set_data_file(data_path)?;
        Ok(Some(db))
    }

    pub fn print_summary(&self) -> Result<()> {
        eprintln!("[INFO] Index version: {CURRENT_VERSION}");
        if let Some(generator) = self.reader.get_data_by_key(keys::GENERATOR)? {
            eprintln!(
                "[INFO] Generated by:  {}",
                String::from_utf8_lossy(generator)
            );
        }
        self.metadata.print();
        eprintln!("[INFO] ScoreMatrix:  {}", self.substitution_matrix_name()?);
        Ok(())
    }
}

fn require<'r>(reader: &'r StoreReader, key: u32, name: &'static str) -> Result<&'r [u8]> {
    reader
        .get_data_by_key(key)?
        .ok_or(KseedError::MissingBlob { key, name })
}

fn read_u64(blob: &[u8]) -> Result<u64> {
    if blob.len() < 8 {
        return Err(KseedError::Parse(
            "numeric blob shorter than eight bytes".to_string(),
        ));
    }
    Ok(LittleEndian::read_u64(&blob[..8]))
}

/// Probe for a persisted index next to a database: unspaced then spaced,
/// k = 5..7, first existing file wins. No version check here; opening
/// performs that.
pub fn search_for_index(path_to_db: &Path) -> Option<PathBuf> {
    for spaced in [false, true] {
        for k in 5..=7 {
            let candidate = index_file_name(path_to_db, k, spaced);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}
