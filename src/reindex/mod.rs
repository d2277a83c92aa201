//! Reindex coordination
//!
//! A cycle rebuilds every collection into a staging index named
//! `<production><shadow_suffix>` and swaps all of them in with a single store
//! request. Readers of a production name see either the previous generation
//! or the new one, never a mix and never an empty index.
//!
//! Failure handling:
//!
//! - a file that cannot be fetched or parsed is reported and dropped
//! - a collection that cannot be fetched or written aborts the cycle before
//!   the swap; its staging indexes are deleted and production is untouched
//! - a failed swap aborts the cycle without deleting anything

mod coordinator;
mod error;
mod phase;
mod report;

pub use coordinator::ReindexCoordinator;
pub use error::ReindexError;
pub use phase::{CyclePhase, ReindexMode};
pub use report::{CollectionReport, CycleReport};
