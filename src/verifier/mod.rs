//! Post-compression verification between two directory trees.

pub mod engine;

pub use engine::VerificationEngine;

use crate::prober::MediaProperties;
use std::fmt;
use std::path::PathBuf;

/// Outcome of verifying one file pair (or the whole run, for the sentinel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// All compared properties within tolerance
    Match,
    /// One or more properties out of tolerance
    Mismatch,
    /// A converted file with no original counterpart
    OriginalMissing,
    /// An original file with no converted counterpart
    ConvertedMissing,
    /// Probing the original failed
    OriginalError,
    /// Probing the converted file failed
    ConvertedError,
    /// The probing tool is not installed; nothing could be compared
    FfprobeNotFound,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Match => "MATCH",
            Self::Mismatch => "MISMATCH",
            Self::OriginalMissing => "ORIGINAL_MISSING",
            Self::ConvertedMissing => "CONVERTED_MISSING",
            Self::OriginalError => "ORIGINAL_ERROR",
            Self::ConvertedError => "CONVERTED_ERROR",
            Self::FfprobeNotFound => "FFPROBE_NOT_FOUND",
        };
        f.pad(s)
    }
}

/// One entry in a verification report
#[derive(Debug, Clone)]
pub struct VerificationRecord {
    pub original_file: Option<PathBuf>,
    pub converted_file: Option<PathBuf>,
    pub original_props: Option<MediaProperties>,
    pub converted_props: Option<MediaProperties>,
    pub status: VerificationStatus,
    pub mismatches: Vec<String>,
}

impl VerificationRecord {
    pub fn is_match(&self) -> bool {
        self.status == VerificationStatus::Match
    }
}
