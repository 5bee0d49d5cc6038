//! Sharded store writer.
//!
//! Each worker thread owns one shard (data file + in-memory index) and
//! appends without coordination; `close` concatenates the shards in thread
//! order, rebases the offsets and writes the final index sorted by key.
//! Shards end page-aligned, so rebasing never breaks blob alignment.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{KseedError, Result};
use crate::store::{index_path, PAGE_SIZE};

struct Shard {
    data: BufWriter<File>,
    path: PathBuf,
    entries: Vec<(u32, u64, u64)>,
    offset: u64,
}

pub struct StoreWriter {
    data_path: PathBuf,
    index_path: PathBuf,
    shards: Vec<Mutex<Shard>>,
}

impl StoreWriter {
    /// Create a writer with `threads` independent shards. With a single
    /// shard the data file is written in place; otherwise shard files
    /// `<data>.<i>` are merged on close.
    pub fn open(data_path: &Path, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(KseedError::Parameter(
                "store writer needs at least one shard".to_string(),
            ));
        }
        let mut shards = Vec::with_capacity(threads);
        for i in 0..threads {
            let path = if threads == 1 {
                data_path.to_path_buf()
            } else {
                let mut os = data_path.as_os_str().to_os_string();
                os.push(format!(".{i}"));
                PathBuf::from(os)
            };
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)?;
            shards.push(Mutex::new(Shard {
                data: BufWriter::new(file),
                path,
                entries: Vec::new(),
                offset: 0,
            }));
        }
        Ok(StoreWriter {
            data_path: data_path.to_path_buf(),
            index_path: index_path(data_path),
            shards,
        })
    }

    pub fn thread_count(&self) -> usize {
        self.shards.len()
    }

    /// Append one blob under `key` to the shard of `thread_idx`.
    pub fn write_data(&self, data: &[u8], key: u32, thread_idx: usize) -> Result<()> {
        let mut shard = self
            .shards[thread_idx % self.shards.len()]
            .lock()
            .expect("store shard poisoned");
        let offset = shard.offset;
        shard.data.write_all(data)?;
        shard.offset += data.len() as u64;
        shard.entries.push((key, offset, data.len() as u64));
        Ok(())
    }

    /// Pad the shard with zero bytes up to the next page boundary. The
    /// padding doubles as NUL termination for string blobs.
    pub fn align_to_page_size(&self, thread_idx: usize) -> Result<()> {
        let mut shard = self
            .shards[thread_idx % self.shards.len()]
            .lock()
            .expect("store shard poisoned");
        let aligned = shard.offset.div_ceil(PAGE_SIZE) * PAGE_SIZE;
        let pad = (aligned - shard.offset) as usize;
        if pad > 0 {
            shard.data.write_all(&vec![0u8; pad])?;
            shard.offset = aligned;
        }
        Ok(())
    }

    /// Flush everything, merge the shards and write the index file.
    pub fn close(self) -> Result<()> {
        let mut merged: Vec<(u32, u64, u64)> = Vec::new();
        let mut shard_meta: Vec<(PathBuf, u64, Vec<(u32, u64, u64)>)> = Vec::new();
        for shard in self.shards {
            let mut shard = shard.into_inner().expect("store shard poisoned");
            // every shard ends aligned so the next one starts aligned
            let aligned = shard.offset.div_ceil(PAGE_SIZE) * PAGE_SIZE;
            let pad = (aligned - shard.offset) as usize;
            if pad > 0 {
                shard.data.write_all(&vec![0u8; pad])?;
                shard.offset = aligned;
            }
            shard.data.flush()?;
            shard_meta.push((shard.path, shard.offset, shard.entries));
        }

        if shard_meta.len() == 1 {
            merged = shard_meta.pop().map(|(_, _, e)| e).unwrap_or_default();
        } else {
            let mut out = BufWriter::new(File::create(&self.data_path)?);
            let mut base = 0u64;
            for (path, size, entries) in shard_meta {
                let mut input = File::open(&path)?;
                std::io::copy(&mut input, &mut out)?;
                fs::remove_file(&path)?;
                merged.extend(entries.into_iter().map(|(k, o, l)| (k, o + base, l)));
                base += size;
            }
            out.flush()?;
        }

        merged.sort_unstable_by_key(|&(key, offset, _)| (key, offset));
        let mut index = BufWriter::new(File::create(&self.index_path)?);
        for (key, offset, length) in merged {
            writeln!(index, "{key}\t{offset}\t{length}")?;
        }
        index.flush()?;
        Ok(())
    }
}
