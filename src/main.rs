use clap::{Parser, Subcommand};
use kseed::error::KseedError;
use kseed::tools::{createdb, createindex, extractorfs, result2stats};

#[derive(Parser)]
#[command(name = "kseed")]
#[command(version)]
#[command(about = "k-mer prefilter indexing toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert FASTA into a sequence database
    Createdb(createdb::CreatedbArgs),

    /// Build the k-mer prefilter index over a sequence database
    Createindex(createindex::CreateindexArgs),

    /// Extract open reading frames from nucleotide contigs
    Extractorfs(extractorfs::ExtractorfsArgs),

    /// Reduce a result database to per-entry statistics
    Result2stats(result2stats::Result2statsArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Createdb(args) => createdb::run(args),
        Commands::Createindex(args) => createindex::run(args),
        Commands::Extractorfs(args) => extractorfs::run(args),
        Commands::Result2stats(args) => result2stats::run(args),
    };

    if let Err(err) = result {
        eprintln!("[ERROR] {err:#}");
        let code = err
            .downcast_ref::<KseedError>()
            .map_or(1, KseedError::exit_code);
        std::process::exit(code);
    }
}
