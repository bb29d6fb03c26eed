//! segkv Inspection Binary
//!
//! Views of on-disk segkv directories: page listings, journal dumps and
//! fixed index lookups. Index lookups read the latest generation in place;
//! opening a journal still truncates a torn tail record.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use segkv::codec::RawCodec;
use segkv::{Config, FixedIndex, Journal, Key, Offset, Result, SegError};
use tracing_subscriber::{fmt, EnvFilter};

/// segkv inspector
#[derive(Parser, Debug)]
#[command(name = "segkv-inspect")]
#[command(about = "Inspect segkv journals and indexes")]
#[command(version)]
struct Args {
    /// Journal page capacity in bytes
    #[arg(long, default_value = "67108864")]
    journal_page_capacity: u64,

    /// Fixed index partition count
    #[arg(short, long, default_value = "128")]
    partitions: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the pages of a journal directory
    Pages {
        /// Journal directory
        dir: PathBuf,
    },

    /// Print every journal event with its revision
    Journal {
        /// Journal directory
        dir: PathBuf,

        /// Print payloads as UTF-8 text instead of byte counts
        #[arg(long)]
        text: bool,
    },

    /// Look up a key in a fixed index of offsets
    Index {
        /// Index directory
        dir: PathBuf,

        /// Key as 32 hex characters
        #[arg(short, long)]
        key: Option<String>,

        /// Derive the key from this content instead
        #[arg(long)]
        content: Option<String>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,segkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("segkv-inspect v{}", segkv::VERSION);

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::builder()
        .journal_page_capacity(args.journal_page_capacity)
        .partition_num(args.partitions)
        .build()?;

    match args.command {
        Command::Pages { dir } => {
            existing(&dir)?;
            let journal = Journal::open(&dir, RawCodec, &config)?;
            println!("{:>20}  {:>12}  {}", "FIRST REVISION", "BYTES", "MODE");
            for page in journal.pages() {
                let mode = if page.is_read_only() { "sealed" } else { "writable" };
                println!("{:>20}  {:>12}  {}", page.number(), page.len(), mode);
            }
            println!("next revision: {}", journal.revision());
        }

        Command::Journal { dir, text } => {
            existing(&dir)?;
            let journal = Journal::open(&dir, RawCodec, &config)?;
            for item in journal.iter() {
                let (revision, payload) = item?;
                if text {
                    println!("{:>12}  {}", revision, String::from_utf8_lossy(&payload));
                } else {
                    println!("{:>12}  {} bytes", revision, payload.len());
                }
            }
        }

        Command::Index { dir, key, content } => {
            let snapshot = FixedIndex::<Offset>::latest_snapshot(&dir, &config)?;
            let key = match (key, content) {
                (Some(hex), _) => hex.parse::<Key>()?,
                (None, Some(content)) => Key::generate(content),
                (None, None) => {
                    println!(
                        "generation {}: {} entries in {} partitions",
                        snapshot.generation(),
                        snapshot.len(),
                        snapshot.partition_count()
                    );
                    return Ok(());
                }
            };
            match snapshot.get(&key) {
                Ok(offset) => println!("{} -> {}", key, offset.value()),
                Err(e) => println!("{}: {}", key, e),
            }
        }
    }

    Ok(())
}

/// Opening a store creates its directory, so a mistyped path must fail first
fn existing(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(SegError::NotFound(format!("directory {}", dir.display())))
    }
}
