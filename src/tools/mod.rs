//! Command-line tools. Each module owns its argument struct and `run()`
//! entry point; the binary only dispatches.

pub mod createdb;
pub mod createindex;
pub mod extractorfs;
pub mod result2stats;

/// Install the global rayon pool: `threads == 0` means all cores. The
/// pool can only be installed once per process; later calls keep the
/// existing pool and only report the requested width.
pub fn setup_thread_pool(threads: usize) -> usize {
    let threads = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
    threads
}
