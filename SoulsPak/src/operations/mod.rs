//! High-level operations: the unpack/repack orchestrator
//!
//! A [`Session`] routes each input path: files are unpacked into a sibling
//! directory, directories carrying a `SoulsPak` manifest are repacked. Every
//! per-item error ends up in that item's [`Outcome`].

mod options;
mod outcome;
mod repack;
mod session;
mod unpack;

pub use options::SessionOptions;
pub use outcome::{BatchReport, ItemReport, Outcome};
pub use session::{Session, TARGET_SUFFIX, target_dir_for};
