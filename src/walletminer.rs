//! Random private-key search against a table of funded P2PKH addresses.
//!
//! The table is `<address><TAB><balance>` per line. The default backend
//! loads it into memory; `--index disk` binary-searches the file in place
//! instead, which requires it sorted ascending by address (and, with
//! `--layout fixed`, padded to a uniform line length).
//!
//! Runs until killed. Matches are appended to per-thread
//! `walletminer.balance.<id>.txt` files; a cumulative tested-key count is
//! kept in the stats file across restarts.

use anyhow::ensure;
use clap::{Parser, ValueEnum};
use hex_literal::hex;
use log::{error, info};
use secp256k1::Secp256k1;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::thread;

use walletminer::address::{derive_address, PubkeyScheme};
use walletminer::balance::{AddressIndex, Layout, MemoryIndex, SortedFileIndex};
use walletminer::stats::{Counters, StatsReporter};
use walletminer::worker::Worker;

#[derive(Parser)]
#[command(about = "Search random private keys for addresses with a balance")]
struct Args {
    /// Balance table: one `<address>\t<balance>` record per line
    balance_file: PathBuf,

    /// Lookup backend
    #[arg(long, value_enum, default_value = "memory")]
    index: IndexKind,

    /// Line layout of the sorted file (disk backend only)
    #[arg(long, value_enum, default_value = "variable")]
    layout: LayoutKind,

    /// Hash uncompressed public keys instead of compressed ones
    #[arg(long)]
    uncompressed: bool,

    /// Worker threads; defaults to all hardware threads
    #[arg(long)]
    threads: Option<usize>,

    /// Cumulative tested-key counter, kept across restarts
    #[arg(long, default_value = "walletminer.stats.txt")]
    stats_file: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexKind {
    /// Hash index built in memory at startup
    Memory,
    /// Binary search over the file on disk; requires it sorted by address
    Disk,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutKind {
    Fixed,
    Variable,
}

impl From<LayoutKind> for Layout {
    fn from(kind: LayoutKind) -> Self {
        match kind {
            LayoutKind::Fixed => Layout::FixedWidth,
            LayoutKind::Variable => Layout::VariableWidth,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    self_check()?;

    let scheme = if args.uncompressed {
        PubkeyScheme::Uncompressed
    } else {
        PubkeyScheme::Compressed
    };

    // the memory backend is built once and shared; the disk backend gets
    // one independently seeking handle per worker
    let memory = match args.index {
        IndexKind::Memory => match MemoryIndex::load(&args.balance_file) {
            Ok(index) => {
                info!("loaded {} addresses from file", index.len());
                Some(Arc::new(index))
            }
            Err(e) => {
                error!("cannot load {}: {e}", args.balance_file.display());
                exit(2);
            }
        },
        IndexKind::Disk => None,
    };

    let counters = Arc::new(Counters::default());
    let threads = args.threads.unwrap_or_else(num_cpus::get);
    info!("starting {threads} workers");

    thread::scope(|s| {
        for _ in 0..threads {
            let index: Box<dyn AddressIndex> = match &memory {
                Some(index) => Box::new(Arc::clone(index)),
                None => match SortedFileIndex::open(&args.balance_file, args.layout.into()) {
                    Ok(index) => Box::new(index),
                    Err(e) => {
                        error!("cannot open {}: {e}", args.balance_file.display());
                        exit(2);
                    }
                },
            };
            let worker = Worker::new(index, Arc::clone(&counters), scheme);
            s.spawn(move || {
                if let Err(e) = worker.run() {
                    error!("worker died: {e:#}");
                    exit(1);
                }
            });
        }
        StatsReporter::new(Arc::clone(&counters), args.stats_file.clone()).run()
    })
}

/// Asserts the derivation pipeline against a known key before burning CPU
/// on garbage. Both serialization schemes are checked.
fn self_check() -> anyhow::Result<()> {
    let scalar = hex!("be63955589062b68320f0a3d5b450551c67bbb5f6e5b34cec57738f3a96316a9");
    let secp = Secp256k1::signing_only();
    ensure!(
        derive_address(&secp, &scalar, PubkeyScheme::Compressed)? == "1Dai8FBumerEYMzijW7hfMgD45HowqYzVP",
        "compressed address derivation self-check failed"
    );
    ensure!(
        derive_address(&secp, &scalar, PubkeyScheme::Uncompressed)? == "18pRzZBpMyrfPbcBBQcfVYMXoibm6fhqYs",
        "uncompressed address derivation self-check failed"
    );
    Ok(())
}
