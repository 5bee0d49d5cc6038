//! Key→blob store: a data file of page-padded blobs plus a text index of
//! `key<TAB>offset<TAB>length` lines.
//!
//! The indexing core consumes this store through a narrow contract (open,
//! get, touch, serialize/deserialize); the writer side supports per-thread
//! output shards that are merged on close, so parallel producers never
//! share a file handle.

pub mod reader;
pub mod writer;

pub use reader::StoreReader;
pub use writer::StoreWriter;

/// Blob alignment inside the data file. Every blob starts on a page
/// boundary so mapped views can be cast to typed slices.
pub const PAGE_SIZE: u64 = 4096;

/// Suffix of the index file that accompanies a data file.
pub const INDEX_SUFFIX: &str = ".index";

/// Index path for a given data path.
pub fn index_path(data_path: &std::path::Path) -> std::path::PathBuf {
    let mut os = data_path.as_os_str().to_os_string();
    os.push(INDEX_SUFFIX);
    std::path::PathBuf::from(os)
}
