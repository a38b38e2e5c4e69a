//! # Donut Core
//!
//! A minimal content-addressed file store.
//!
//! Files are "checked in" to a repository: each file's content is
//! streamed through a from-scratch SHA-256 engine and the file is
//! relocated into the repository's data area under its truncated hex
//! digest, so byte-identical content is stored exactly once no matter
//! how often or under what name it is checked in.
//!
//! ## Features
//!
//! - Content-addressed storage: files named by their digest
//! - Streaming SHA-256 implemented in this crate (no hashing dependency)
//! - Arena-backed scratch buffers and dedup index with bulk release
//! - Optional named "dataframes" to group check-ins
//! - Repository health checks (`doctor`)
//!
//! ## Example
//!
//! ```no_run
//! use donut_core::Repo;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Initialize a repository, then check a file in
//! let repo = Repo::init("./my-project")?;
//! let outcomes = repo.check_in(Path::new("./notes.txt"), None)?;
//!
//! for outcome in &outcomes {
//!     if outcome.stored {
//!         println!("stored as {}", outcome.id);
//!     } else {
//!         println!("already present as {}", outcome.id);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod arena;
mod checkin;
mod error;
mod index;
mod repo;
mod sha256;

pub use arena::{Arena, CACHE_LINE, PAGE_SIZE, Slab, SlabHandle};
pub use checkin::CheckinOutcome;
pub use error::{Error, Result};
pub use index::{DataIndex, SLOT_WIDTH, SLOTS_PER_PAGE};
pub use repo::{
    DATA_DIR, DEFAULT_DATAFRAME, DataEntry, DoctorIssue, DoctorReport, ID_WIDTH, MARKER_DIR,
    Problem, Repo,
};
pub use sha256::{BLOCK_SIZE, DIGEST_SIZE, Sha256, to_hex};
