//! Per-entry statistics over a result store.
//!
//! A result store maps each query key to a text entry, one line per hit,
//! where the first token of a line is a target key. Statistics come in two
//! shapes: entry-wise kinds digest the entry text itself, sequence-wise
//! kinds resolve each referenced target sequence and score it. Dispatch is
//! a plain enum, so the statistic table is data rather than codegen, and
//! the residue scales are immutable tables passed around explicitly.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::str::FromStr;

use crate::error::{KseedError, Result};
use crate::store::{StoreReader, StoreWriter};

/// Kyte-Doolittle hydropathy and side-chain charge, indexed by ASCII
/// letter. Unlisted letters contribute zero.
pub struct AminoAcidScales {
    doolittle: [f32; 128],
    charges: [f32; 128],
}

impl AminoAcidScales {
    pub fn new() -> Self {
        let mut doolittle = [0f32; 128];
        for (letter, value) in [
            (b'A', 1.8),
            (b'R', -4.5),
            (b'N', -3.5),
            (b'D', -3.5),
            (b'C', 2.5),
            (b'Q', -3.5),
            (b'E', -3.5),
            (b'G', -0.4),
            (b'H', -3.2),
            (b'I', 4.5),
            (b'L', 3.8),
            (b'K', -3.9),
            (b'M', 1.9),
            (b'F', 2.8),
            (b'P', -1.6),
            (b'S', -0.8),
            (b'T', -0.7),
            (b'W', -0.9),
            (b'Y', -1.3),
            (b'V', 4.2),
        ] {
            doolittle[letter as usize] = value;
            doolittle[letter.to_ascii_lowercase() as usize] = value;
        }
        let mut charges = [0f32; 128];
        for (letter, value) in [
            (b'R', 1.0),
            (b'K', 1.0),
            (b'H', 0.1),
            (b'D', -1.0),
            (b'E', -1.0),
        ] {
            charges[letter as usize] = value;
            charges[letter.to_ascii_lowercase() as usize] = value;
        }
        AminoAcidScales { doolittle, charges }
    }
}

impl Default for AminoAcidScales {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Linecount,
    Mean,
    Sum,
    Doolittle,
    Charges,
    Seqlen,
    Strlen,
    Firstline,
}

impl FromStr for Statistic {
    type Err = KseedError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "linecount" => Ok(Statistic::Linecount),
            "mean" => Ok(Statistic::Mean),
            "sum" => Ok(Statistic::Sum),
            "doolittle" => Ok(Statistic::Doolittle),
            "charges" => Ok(Statistic::Charges),
            "seqlen" => Ok(Statistic::Seqlen),
            "strlen" => Ok(Statistic::Strlen),
            "firstline" => Ok(Statistic::Firstline),
            other => Err(KseedError::Parameter(format!(
                "unrecognized statistic {other:?}"
            ))),
        }
    }
}

impl Statistic {
    /// Sequence-wise statistics resolve target sequences; entry-wise ones
    /// only read the result entry.
    pub fn is_sequence_wise(self) -> bool {
        matches!(
            self,
            Statistic::Doolittle | Statistic::Charges | Statistic::Seqlen | Statistic::Strlen
        )
    }

    /// Score one target sequence record.
    fn compute_sequence(self, sequence: &[u8], scales: &AminoAcidScales) -> String {
        match self {
            Statistic::Doolittle => format_float(average_on_amino_acids(&scales.doolittle, sequence)),
            Statistic::Charges => format_float(average_on_amino_acids(&scales.charges, sequence)),
            Statistic::Seqlen => seqlen(sequence).to_string(),
            Statistic::Strlen => sequence
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(sequence.len())
                .to_string(),
            _ => unreachable!("entry-wise statistic used sequence-wise"),
        }
    }

    /// Digest a whole result entry.
    fn compute_entry(self, entry: &[u8], key: u32) -> String {
        let text = String::from_utf8_lossy(entry);
        let text = text.trim_end_matches('\0');
        match self {
            Statistic::Linecount => {
                format!("{}\n", text.lines().count())
            }
            Statistic::Mean => {
                let mut sum = 0f64;
                let mut count = 0usize;
                let mut warned = false;
                for line in text.lines() {
                    // malformed lines are skipped, never spun on
                    match first_token(line).parse::<f64>() {
                        Ok(value) => {
                            sum += value;
                            count += 1;
                        }
                        Err(_) => {
                            if !warned && !line.is_empty() {
                                eprintln!("[WARN] invalid value in entry {key}");
                                warned = true;
                            }
                        }
                    }
                }
                format!("{}\n", format_float64(sum / count.max(1) as f64))
            }
            Statistic::Sum => {
                let mut sum = 0u64;
                let mut warned = false;
                for line in text.lines() {
                    match first_token(line).parse::<u64>() {
                        Ok(value) => sum += value,
                        Err(_) => {
                            if !warned && !line.is_empty() {
                                eprintln!("[WARN] invalid value in entry {key}");
                                warned = true;
                            }
                        }
                    }
                }
                format!("{sum}\n")
            }
            Statistic::Firstline => {
                format!("{}\n", text.lines().next().unwrap_or(""))
            }
            _ => unreachable!("sequence-wise statistic used entry-wise"),
        }
    }
}

/// Residue count of a record. Mirrors the historical predicate exactly:
/// the comparisons are strict, so `Z` and `z` terminate the count.
fn seqlen(sequence: &[u8]) -> usize {
    let mut length = 0;
    for &b in sequence {
        if (b'A'..b'Z').contains(&b) || (b'a'..b'z').contains(&b) || b == b'*' {
            length += 1;
        } else {
            break;
        }
    }
    length
}

fn average_on_amino_acids(values: &[f32; 128], sequence: &[u8]) -> f32 {
    let mut sum = 0f32;
    let mut count = 0usize;
    for &b in sequence {
        if b == b'\n' || b == 0 {
            break;
        }
        if b < 128 {
            sum += values[b as usize];
        }
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

fn first_token(line: &str) -> &str {
    line.split_ascii_whitespace().next().unwrap_or("")
}

fn format_float(value: f32) -> String {
    format!("{value:.6}")
}

fn format_float64(value: f64) -> String {
    format!("{value:.6}")
}

/// Apply one statistic over every entry of a result store, writing one
/// output record per entry under the same key. Entries are processed in
/// parallel; each worker owns its output shard.
pub struct StatsComputer {
    statistic: Statistic,
    scales: AminoAcidScales,
}

impl StatsComputer {
    pub fn new(statistic: Statistic) -> Self {
        StatsComputer {
            statistic,
            scales: AminoAcidScales::new(),
        }
    }

    /// Format the output record for one result entry.
    pub fn compute_entry(
        &self,
        entry: &[u8],
        key: u32,
        targets: Option<&StoreReader>,
    ) -> Result<String> {
        if !self.statistic.is_sequence_wise() {
            return Ok(self.statistic.compute_entry(entry, key));
        }
        let targets = targets.ok_or_else(|| {
            KseedError::Parameter(format!(
                "statistic {:?} needs a target sequence database",
                self.statistic
            ))
        })?;

        let text = String::from_utf8_lossy(entry);
        let text = text.trim_end_matches('\0');
        let mut output = String::new();
        // hot targets repeat across hits; memoize their scores
        let mut memo: FxHashMap<u32, String> = FxHashMap::default();
        for line in text.lines() {
            let token = first_token(line);
            if token.is_empty() {
                continue;
            }
            let Ok(target_key) = token.parse::<u32>() else {
                eprintln!("[WARN] invalid key in entry {key}");
                continue;
            };
            let value = match memo.entry(target_key) {
                std::collections::hash_map::Entry::Occupied(hit) => hit.get().clone(),
                std::collections::hash_map::Entry::Vacant(slot) => {
                    let Some(id) = targets.get_id(target_key) else {
                        eprintln!("[WARN] unknown target {target_key} in entry {key}");
                        continue;
                    };
                    let sequence = targets.get_data(id)?;
                    slot.insert(self.statistic.compute_sequence(sequence, &self.scales))
                        .clone()
                }
            };
            output.push_str(&value);
            output.push('\n');
        }
        Ok(output)
    }

    /// Run over a whole result store with per-thread output shards.
    pub fn run(
        &self,
        results: &StoreReader,
        targets: Option<&StoreReader>,
        out_path: &Path,
        threads: usize,
    ) -> Result<()> {
        let writer = StoreWriter::open(out_path, threads.max(1))?;
        (0..results.size())
            .into_par_iter()
            .try_for_each(|id| -> Result<()> {
                let shard = rayon::current_thread_index().unwrap_or(0);
                let key = results.get_key(id);
                let entry = results.get_data(id)?;
                let output = self.compute_entry(entry, key, targets)?;
                writer.write_data(output.as_bytes(), key, shard)?;
                Ok(())
            })?;
        writer.close()
    }
}
