mod args;

use std::path::PathBuf;

use anyhow::{Context, Result};
use cache_core::{
    config::{Associativity, CacheConfig, ReplacementPolicy},
    sim::{SimulationOption, Simulator},
    trace::TraceReader,
};
use clap::{Parser, ValueEnum};

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

/// Simulates a set-associative cache over a memory access trace, with and without prefetching
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cache size in bytes (power of 2)
    cache_size: u64,
    /// `direct`, `assoc` (fully associative) or `assoc:<n>`
    #[arg(value_parser = args::parse_associativity)]
    associativity: Associativity,
    /// Replacement policy: `fifo` or `lru`
    policy: ReplacementPolicy,
    /// Block size in bytes (power of 2)
    block_size: u64,
    /// File path to trace (`<pc>: <R|W> <address>` per line)
    trace_file: PathBuf,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    /// Print the outcome of every access
    #[arg(long)]
    trace: bool,
    /// Format of the final report
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl Cli {
    fn config(&self) -> CacheConfig {
        CacheConfig {
            capacity_bytes: self.cache_size,
            associativity: self.associativity,
            policy: self.policy,
            block_size_bytes: self.block_size,
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
    let mut sim = Simulator::new(&args.config()).context("invalid cache configuration")?;
    let mut trace = TraceReader::open(&args.trace_file)?;
    sim.run(
        trace.by_ref(),
        &SimulationOption {
            do_trace: args.trace,
        },
    )?;
    log::info!(
        "finished trace: {} accesses, {} malformed lines skipped.",
        trace.records(),
        trace.skipped()
    );
    output_stat(&sim);
    let report = sim.report();
    match args.format {
        Format::Text => println!("{report}"),
        Format::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

#[cfg(not(feature = "stat"))]
fn output_stat(_: &Simulator) {}

#[cfg(feature = "stat")]
fn output_stat(sim: &Simulator) {
    let max_width = get_terminal_width().unwrap_or(120) as usize;
    log::info!("statistics:\n{}", sim.collect_stat().view(max_width));
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}
