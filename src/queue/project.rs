use crate::config::CompressionSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Status of a project in the queue.
///
/// Held as an enum in memory; the snake_case string form exists only at the
/// persistence boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Waiting in the queue
    Pending,
    /// Files are being compressed
    Processing,
    /// Compression finished, properties being compared against originals
    Verifying,
    /// Compressed and verified
    Completed,
    /// One or more files failed, or the handler errored
    Failed,
    /// Cancelled before or during processing
    Canceled,
    /// Compression succeeded but verification found mismatches; the staged
    /// originals were kept
    VerificationFailed,
}

impl ProjectStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Canceled | Self::VerificationFailed
        )
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::VerificationFailed => "verification failed",
        };
        f.pad(s)
    }
}

/// A named batch of input media files sharing one output directory and settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub input_files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub settings: CompressionSettings,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: String,
}

/// Outcome a project handler reports back to the queue driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOutcome {
    /// All files compressed and verified
    Completed,
    /// Compression or the handler itself failed
    Failed,
    /// Compression succeeded but verification found mismatches
    VerificationFailed,
}

/// Verification results attached to a project's stats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub matches: usize,
    pub mismatches: usize,
    /// Whether the staged-aside originals were deleted
    pub originals_deleted: bool,
    /// Why cleanup was skipped, when it was
    pub skip_reason: Option<String>,
}

/// Aggregated statistics for one processed project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub total_input_size: u64,
    pub total_output_size: u64,
    pub total_size_reduction: i64,
    pub average_reduction_percent: f64,
    /// Sum of per-file compression times in seconds
    pub total_file_secs: f64,
    /// Wall-clock time for the whole project, filled in by the queue driver
    #[serde(default)]
    pub processing_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationSummary>,
}

impl ProjectStats {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Per-state project counts for the whole queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectCounts {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub verifying: usize,
    pub completed: usize,
    pub failed: usize,
    pub canceled: usize,
    pub verification_failed: usize,
}
