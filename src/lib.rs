//! # CaskDB
//!
//! An embedded, Bitcask-style key-value store with:
//! - A single append-only log file with CRC32-checked records
//! - An in-memory hash index (key directory) rebuilt on open
//! - Crash recovery that drops a torn final write and refuses interior corruption
//! - A portable, byte-exact record format (little-endian, no padding)
//! - Single-writer/multi-reader concurrency within one process
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │        put / get / delete / close / compact                 │
//! │            (Single Writer / Multi Reader)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ LogSegment  │◄─────────│   KeyDir    │
//!   │  (Append)   │ pointers │ (HashMap)   │
//!   └──────┬──────┘          └──────▲──────┘
//!          │                        │
//!          ▼                        │
//!   ┌─────────────┐          ┌──────┴──────┐
//!   │   Record    │─────────►│  Recovery   │
//!   │   (Codec)   │  replay  │  (on open)  │
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! # fn main() -> caskdb::Result<()> {
//! let db = caskdb::Engine::open("./data/cask.log")?;
//! db.put(b"othello", b"shakespeare")?;
//! assert_eq!(db.get(b"othello")?.as_deref(), Some(&b"shakespeare"[..]));
//! db.delete(b"othello")?;
//! db.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod keydir;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::{Config, SyncStrategy};
pub use engine::{CompactionResult, Engine};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CaskDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
