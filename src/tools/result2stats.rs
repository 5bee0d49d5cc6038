//! Statistics reducer tool.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::stats::{StatsComputer, Statistic};
use crate::store::StoreReader;
use crate::tools::setup_thread_pool;
use crate::utils::timer::Timer;

#[derive(Args, Debug)]
pub struct Result2statsArgs {
    /// Input result database
    pub result_db: PathBuf,
    /// Output statistics database
    pub stat_db: PathBuf,
    /// Statistic: linecount, mean, sum, doolittle, charges, seqlen,
    /// strlen or firstline
    #[arg(long)]
    pub stat: Statistic,
    /// Target sequence database (needed by the sequence-wise statistics)
    #[arg(long)]
    pub target_db: Option<PathBuf>,
    /// Worker threads (0 = all cores)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub threads: usize,
}

pub fn run(args: Result2statsArgs) -> Result<()> {
    let threads = setup_thread_pool(args.threads);
    let timer = Timer::new();

    let results = StoreReader::open(&args.result_db)
        .with_context(|| format!("Failed to open {}", args.result_db.display()))?;
    let targets = args
        .target_db
        .as_ref()
        .map(|path| {
            StoreReader::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))
        })
        .transpose()?;

    let computer = StatsComputer::new(args.stat);
    computer.run(&results, targets.as_ref(), &args.stat_db, threads)?;

    eprintln!(
        "[INFO] computed {:?} over {} entries in {}",
        args.stat,
        results.size(),
        timer.lap()
    );
    Ok(())
}
