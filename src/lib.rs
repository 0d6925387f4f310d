//! # walog
//!
//! A segmented write-ahead log: an append-only, crash-recoverable byte
//! log used as the durability primitive beneath a storage engine.
//!
//! ## Features
//!
//! - **Ordered appends**: every payload gets a strictly monotonic LSN
//! - **Bounded segments**: the log rolls over into size-capped files
//! - **Retention**: displaced segments move to an archival directory
//! - **Integrity**: per-record CRC32 and self-checksummed segment headers
//! - **Checkpoint-anchored replay**: resume a state machine from the
//!   last known-good point after a crash
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use walog::Wal;
//!
//! // Open (or create) a log directory
//! let wal = Wal::open("./data/log")?;
//!
//! // Append opaque payloads
//! wal.append(b"first record")?;
//! wal.append(b"second record")?;
//!
//! // Force durability with a checkpoint
//! wal.sync(true)?;
//!
//! // Replay everything past the last checkpoint
//! wal.recover_from_checkpoint(|lsn, _record_type, data| {
//!     println!("replay {}: {:?}", lsn, data);
//! })?;
//!
//! wal.close()?;
//! ```

// Public modules
pub mod error;
pub mod options;
pub mod record;
pub mod segment;

// Internal modules
mod util;
mod wal;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{Options, OptionsBuilder};
pub use record::{LogRecord, RecordType};
pub use segment::{SegmentHeader, HEADER_SIZE, SEGMENT_PREFIX, SEGMENT_SUFFIX};

// Log handle
pub use wal::Wal;
