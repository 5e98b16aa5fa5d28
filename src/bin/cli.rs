//! CaskDB CLI
//!
//! Command-line access to a local CaskDB data file.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use caskdb::storage::{LogSegment, Recovery};
use caskdb::{Config, Engine, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// CaskDB CLI
#[derive(Parser, Debug)]
#[command(name = "caskdb-cli")]
#[command(about = "CLI for the CaskDB embedded key-value store")]
#[command(version)]
struct Args {
    /// Data file
    #[arg(short, long, default_value = "./caskdb_data/cask.log")]
    path: PathBuf,

    /// fsync every N writes instead of every write
    #[arg(long)]
    sync_every: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List live keys
    Keys,

    /// Scan the data file and report its health without modifying it
    Verify,

    /// Rewrite the data file without overwritten or deleted records
    Compact,

    /// Print every record in log order
    Dump,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caskdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> caskdb::Result<()> {
    match args.command {
        Commands::Verify => {
            let result = Recovery::verify(&args.path)?;
            println!("records:    {}", result.records_scanned);
            println!("puts:       {}", result.puts);
            println!("tombstones: {}", result.tombstones);
            println!("live keys:  {}", result.live_keys);
            println!("valid len:  {}", result.valid_len);
            if result.was_truncated {
                println!("torn tail:  {} bytes would be discarded", result.discarded_bytes);
            }
            Ok(())
        }
        Commands::Dump => {
            let segment = LogSegment::open_read_only(&args.path, 0)?;
            for item in Recovery::scan(&segment) {
                let scanned = item?;
                let kind = if scanned.record.is_tombstone() { "DEL" } else { "PUT" };
                println!(
                    "{:>10} {:>8} {} ts={} key={}",
                    scanned.offset,
                    scanned.length,
                    kind,
                    scanned.record.timestamp,
                    String::from_utf8_lossy(scanned.record.key())
                );
            }
            Ok(())
        }
        Commands::Get { key } => with_engine(&args.path, args.sync_every, |engine| {
            match engine.get(key.as_bytes())? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => println!("(nil)"),
            }
            Ok(())
        }),
        Commands::Put { key, value } => with_engine(&args.path, args.sync_every, |engine| {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
            Ok(())
        }),
        Commands::Del { key } => with_engine(&args.path, args.sync_every, |engine| {
            engine.delete(key.as_bytes())?;
            println!("OK");
            Ok(())
        }),
        Commands::Keys => with_engine(&args.path, args.sync_every, |engine| {
            let mut keys = engine.keys()?;
            keys.sort();
            for key in keys {
                println!("{}", String::from_utf8_lossy(&key));
            }
            Ok(())
        }),
        Commands::Compact => with_engine(&args.path, args.sync_every, |engine| {
            let result = engine.compact()?;
            println!(
                "compacted {} -> {} bytes ({} live records)",
                result.bytes_before, result.bytes_after, result.records_kept
            );
            Ok(())
        }),
    }
}

/// Open the engine, run `f`, and close it even if `f` failed
fn with_engine<F>(path: &Path, sync_every: Option<usize>, f: F) -> caskdb::Result<()>
where
    F: FnOnce(&Engine) -> caskdb::Result<()>,
{
    let mut builder = Config::builder().path(path);
    if let Some(count) = sync_every {
        builder = builder.sync_strategy(SyncStrategy::EveryNEntries { count });
    }

    let engine = Engine::open_with(builder.build())?;
    let result = f(&engine);
    let closed = engine.close();
    result.and(closed)
}
