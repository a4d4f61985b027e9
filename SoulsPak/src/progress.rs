//! Progress reporting shared by codecs and the orchestrator

/// Progress callback type
pub type ProgressCallback<'a> = &'a dyn Fn(&Progress);

/// Progress update during unpack or repack
#[derive(Debug, Clone)]
pub struct Progress {
    /// Current operation phase
    pub phase: Phase,
    /// Current item number (1-indexed)
    pub current: usize,
    /// Total number of items
    pub total: usize,
    /// Current entry being processed (if applicable)
    pub current_file: Option<String>,
}

impl Progress {
    #[must_use]
    pub fn new(phase: Phase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: None,
        }
    }

    #[must_use]
    pub fn with_file(phase: Phase, current: usize, total: usize, file: impl Into<String>) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: Some(file.into()),
        }
    }

    /// Fraction complete in `0.0..=1.0`.
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Operation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Stripping DCX compression
    Decompressing,
    /// Decrypting a regulation file
    Decrypting,
    /// Writing entries to disk (during unpack)
    WritingEntries,
    /// Reading entries from disk (during repack)
    ReadingEntries,
    /// Re-applying DCX compression
    Compressing,
    /// Encrypting a regulation file
    Encrypting,
    /// Operation complete
    Complete,
}

impl Phase {
    /// Get a human-readable description of this phase
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decompressing => "Decompressing",
            Self::Decrypting => "Decrypting",
            Self::WritingEntries => "Writing entries",
            Self::ReadingEntries => "Reading entries",
            Self::Compressing => "Compressing",
            Self::Encrypting => "Encrypting",
            Self::Complete => "Complete",
        }
    }
}

/// Callback that ignores every update.
pub fn silent(_: &Progress) {}
