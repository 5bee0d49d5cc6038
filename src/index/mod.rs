//! The k-mer prefilter index: k-mer packing, the inverted occurrence
//! table, its two-pass builder, the extended-matrix snapshots and the
//! versioned on-disk container.

pub mod builder;
pub mod ext_matrix;
pub mod file;
pub mod indexer;
pub mod table;

pub use builder::{fill_database, BuildOptions, BuildResult, MaskMode};
pub use ext_matrix::ScoreMatrix;
pub use file::{create_index_file, search_for_index, IndexMetadata, IndexReader};
pub use indexer::Indexer;
pub use table::{IndexEntry, IndexTable};
