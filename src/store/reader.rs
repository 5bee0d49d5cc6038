//! Memory-mapped store reader.
//!
//! The data file is mapped once; `get` hands out borrowed slices into the
//! mapping, so attached consumers (index table, sequence lookups) never
//! copy. The reader itself is serializable: its index plus the data path
//! round-trip through a blob, which lets an index file embed a description
//! of the sequence database it was built from.

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{KseedError, Result};
use crate::store::{index_path, PAGE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StoreEntry {
    key: u32,
    offset: u64,
    length: u64,
}

pub struct StoreReader {
    data_path: PathBuf,
    mmap: Option<Mmap>,
    entries: Vec<StoreEntry>,
}

impl StoreReader {
    /// Open `<data>` + `<data>.index` and map the data file.
    pub fn open(data_path: &Path) -> Result<Self> {
        let index = std::fs::read_to_string(index_path(data_path))?;
        let mut entries = Vec::new();
        for (lineno, line) in index.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let entry = (|| -> Option<StoreEntry> {
                let key = fields.next()?.parse().ok()?;
                let offset = fields.next()?.parse().ok()?;
                let length = fields.next()?.parse().ok()?;
                Some(StoreEntry {
                    key,
                    offset,
                    length,
                })
            })()
            .ok_or_else(|| {
                KseedError::Parse(format!(
                    "malformed store index line {} in {}",
                    lineno + 1,
                    data_path.display()
                ))
            })?;
            entries.push(entry);
        }
        entries.sort_unstable_by_key(|e| (e.key, e.offset));

        let mut reader = StoreReader {
            data_path: data_path.to_path_buf(),
            mmap: None,
            entries,
        };
        reader.open_data()?;
        Ok(reader)
    }

    /// Map (or re-map) the current data file.
    pub fn open_data(&mut self) -> Result<()> {
        let file = File::open(&self.data_path)?;
        let len = file.metadata()?.len();
        self.mmap = if len == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(())
    }

    /// Point the reader at a different data file and re-map it. Used when a
    /// deserialized index is paired with a data file chosen by the caller.
    pub fn set_data_file(&mut self, data_path: &Path) -> Result<()> {
        self.data_path = data_path.to_path_buf();
        self.open_data()
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Position of `key`, if present.
    pub fn get_id(&self, key: u32) -> Option<usize> {
        self.entries
            .binary_search_by_key(&key, |e| e.key)
            .ok()
    }

    pub fn get_key(&self, id: usize) -> u32 {
        self.entries[id].key
    }

    pub fn get_length(&self, id: usize) -> usize {
        self.entries[id].length as usize
    }

    /// Blob at entry `id`, borrowed from the mapping.
    pub fn get_data(&self, id: usize) -> Result<&[u8]> {
        let entry = self.entries.get(id).ok_or_else(|| {
            KseedError::Parse(format!("store entry {id} out of range"))
        })?;
        let mmap = self.mmap.as_ref().ok_or_else(|| {
            KseedError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "store data file not attached",
            ))
        })?;
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        if end > mmap.len() {
            return Err(KseedError::Parse(format!(
                "store entry {} overruns data file {}",
                entry.key,
                self.data_path.display()
            )));
        }
        Ok(&mmap[start..end])
    }

    /// Blob stored under `key`, or `None` when the key is absent.
    pub fn get_data_by_key(&self, key: u32) -> Result<Option<&[u8]>> {
        match self.get_id(key) {
            Some(id) => self.get_data(id).map(Some),
            None => Ok(None),
        }
    }

    /// Best-effort prefetch: fault in every page of the blob.
    pub fn touch_data(&self, id: usize) {
        if let Ok(data) = self.get_data(id) {
            let mut checksum = 0u64;
            let mut pos = 0;
            while pos < data.len() {
                checksum = checksum.wrapping_add(data[pos] as u64);
                pos += PAGE_SIZE as usize;
            }
            std::hint::black_box(checksum);
        }
    }

    /// Pack the index (entries + data path) into a blob.
    pub fn serialize(&self) -> Vec<u8> {
        let path = self.data_path.to_string_lossy();
        let path_bytes = path.as_bytes();
        let mut blob = vec![0u8; 16 + path_bytes.len() + self.entries.len() * 20];
        LittleEndian::write_u64(&mut blob[0..8], self.entries.len() as u64);
        LittleEndian::write_u64(&mut blob[8..16], path_bytes.len() as u64);
        blob[16..16 + path_bytes.len()].copy_from_slice(path_bytes);
        let mut pos = 16 + path_bytes.len();
        for e in &self.entries {
            LittleEndian::write_u32(&mut blob[pos..pos + 4], e.key);
            LittleEndian::write_u64(&mut blob[pos + 4..pos + 12], e.offset);
            LittleEndian::write_u64(&mut blob[pos + 12..pos + 20], e.length);
            pos += 20;
        }
        blob
    }

    /// Inverse of [`serialize`]. The data file is not mapped yet; call
    /// [`open_data`] or [`set_data_file`] before reading blobs.
    ///
    /// [`serialize`]: StoreReader::serialize
    /// [`open_data`]: StoreReader::open_data
    /// [`set_data_file`]: StoreReader::set_data_file
    pub fn deserialize(blob: &[u8]) -> Result<Self> {
        if blob.len() < 16 {
            return Err(KseedError::Parse(
                "serialized store index too short".to_string(),
            ));
        }
        let count = LittleEndian::read_u64(&blob[0..8]) as usize;
        let path_len = LittleEndian::read_u64(&blob[8..16]) as usize;
        let expected = 16 + path_len + count * 20;
        if blob.len() < expected {
            return Err(KseedError::Parse(
                "serialized store index truncated".to_string(),
            ));
        }
        let path = std::str::from_utf8(&blob[16..16 + path_len])
            .map_err(|_| KseedError::Parse("store data path is not UTF-8".to_string()))?;
        let mut entries = Vec::with_capacity(count);
        let mut pos = 16 + path_len;
        for _ in 0..count {
            entries.push(StoreEntry {
                key: LittleEndian::read_u32(&blob[pos..pos + 4]),
                offset: LittleEndian::read_u64(&blob[pos + 4..pos + 12]),
                length: LittleEndian::read_u64(&blob[pos + 12..pos + 20]),
            });
            pos += 20;
        }
        Ok(StoreReader {
            data_path: PathBuf::from(path),
            mmap: None,
            entries,
        })
    }
}
