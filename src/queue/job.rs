use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Status of a file job in the compression queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting to be processed
    Pending,
    /// Currently being compressed
    Processing,
    /// Successfully compressed
    Completed,
    /// Compression failed
    Failed,
    /// Never started because the run was cancelled
    Cancelled,
}

/// Result recorded for one processed file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressionResult {
    pub input_size: u64,
    pub output_size: u64,
    pub size_diff: i64,
    pub reduction_percent: f64,
    /// Wall-clock compression time in seconds
    pub duration_secs: f64,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl CompressionResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// One file-compression job within a project
#[derive(Debug, Clone)]
pub struct FileJob {
    pub path: PathBuf,
    pub status: JobStatus,
    pub result: Option<CompressionResult>,
}

impl FileJob {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            status: JobStatus::Pending,
            result: None,
        }
    }

    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

static CAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CAM\s*(\d+)").expect("valid regex"));
static FILE_NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{3,})").expect("valid regex"));

/// Ordering key for camera footage filenames.
///
/// Files are sorted by camera number first, then by the first long digit run
/// in the name. Files without either component sort after everything else.
pub fn sort_key(path: &Path) -> (u32, u64) {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let cam_number = CAM_RE
        .captures(&filename)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(999);

    let file_number = FILE_NUM_RE
        .captures(&filename)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(999_999);

    (cam_number, file_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn sort_key_extracts_camera_and_file_numbers() {
        assert_eq!(sort_key(&PathBuf::from("CAM2_005.mov")), (2, 5));
        assert_eq!(sort_key(&PathBuf::from("cam 12 clip 0042.mp4")), (12, 42));
        // A filename with no CAM marker falls to the back of its batch
        assert_eq!(sort_key(&PathBuf::from("holiday_001.mov")), (999, 1));
        assert_eq!(sort_key(&PathBuf::from("notes.mov")), (999, 999_999));
    }

    #[test]
    fn sort_key_orders_across_cameras() {
        let mut files = vec![
            PathBuf::from("CAM2_005.mov"),
            PathBuf::from("CAM1_002.mov"),
            PathBuf::from("CAM1_001.mov"),
            PathBuf::from("CAM2_002.mov"),
        ];
        files.sort_by_key(|p| sort_key(p));
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            ["CAM1_001.mov", "CAM1_002.mov", "CAM2_002.mov", "CAM2_005.mov"]
        );
    }
}
