//! Utility functions

pub mod binary;
pub mod path;

pub use binary::{ByteReader, ByteWriter};
pub use path::{SanitizedPath, TraversalPolicy, sanitize};
