//! # SoulsPak
//!
//! A Rust library and CLI for unpacking and repacking FromSoftware archives.
//!
//! ## Supported Formats
//!
//! - **BND3 / BND4** - Single-file binders
//! - **BXF3 / BXF4** - Split binders (`.bhd` header plus `.bdt` data)
//! - **TPF** - Texture containers, unpacked to one `.dds` per texture
//! - **DCX** - Whole-file compression (DFLT via zlib, KRAK via an Oodle library)
//! - **Regulation** - Encrypted parameter binders for ELDEN RING, Dark Souls III
//!   and Dark Souls II (decrypt only)
//!
//! Other FromSoftware formats (FMG, GPARAM, ...) are identified but have
//! no codec in this crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use soulspak::prelude::*;
//! use std::path::Path;
//!
//! let session = Session::new(SessionOptions::new());
//!
//! // Unpack into `c0000-anibnd-dcx/`
//! let outcome = session.process(Path::new("c0000.anibnd.dcx"), &silent);
//! println!("{outcome}");
//!
//! // Repack the directory back into `c0000.anibnd.dcx`
//! let outcome = session.process(Path::new("c0000-anibnd-dcx"), &silent);
//! assert!(!outcome.needs_attention());
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `soulspak` command-line binary

pub mod compression;
pub mod config;
pub mod error;
pub mod formats;
pub mod operations;
pub mod progress;
pub mod regulation;
pub mod source;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, ErrorKind, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};

    pub use crate::compression::{CompressionShim, DcxType, LazyOodle, OodleEngine};
    pub use crate::config::Settings;
    pub use crate::formats::{Binder, BinderFile, BinderKind, Codec, FormatKind, codec_for, identify};
    pub use crate::operations::{BatchReport, Outcome, Session, SessionOptions};
    pub use crate::progress::{Phase, Progress, ProgressCallback, silent};
    pub use crate::regulation::{RegulationPipeline, RegulationVariant};
    pub use crate::source::ArchiveSource;
    pub use crate::utils::{TraversalPolicy, sanitize};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
