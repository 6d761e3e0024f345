use clap::{Parser, Subcommand};

mod commands;

/// Fibra demonstration driver
///
/// Runs one coordination protocol on the fiber/channel substrate,
/// blocks until it terminates, and exits.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the Fibonacci sequence with two fibers messaging each
    /// other back and forth
    Fibonacci {
        /// Stop once a term exceeds this value
        #[clap(long, default_value_t = 1000)]
        limit: u64,
    },

    /// Solve a stream of random quadratic equations on a partitioned
    /// worker pool
    Quadratic {
        /// Number of equations to generate
        #[clap(long, default_value_t = 10)]
        count: usize,

        /// Worker pool size; must exceed the largest square coefficient (9)
        #[clap(long, default_value_t = 10)]
        workers: usize,

        /// Seed for the equation generator; omit for a random run
        #[clap(long)]
        seed: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fibonacci { limit } => commands::fibonacci::run(limit)?,
        Commands::Quadratic {
            count,
            workers,
            seed,
        } => commands::quadratic::run(count, workers, seed)?,
    }
    Ok(())
}
