//! Input discovery: video files and camera folders.

use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

const VALID_EXTENSIONS: &[&str] = &["mov", "mp4"];

fn is_video_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|ext| VALID_EXTENSIONS.contains(&ext.as_str()))
}

/// Scan a directory for video files, sorted for stable ordering.
pub fn scan_directory(directory: &Path, recursive: bool) -> Vec<PathBuf> {
    info!(
        "Scanning directory: {} (recursive={})",
        directory.display(),
        recursive
    );

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.into_path())
        .filter(|p| is_video_file(p))
        .collect();
    files.sort();

    info!("Found {} video files", files.len());
    files
}

/// Find all camera folders within a directory tree.
///
/// A camera folder is any directory whose name contains the pattern,
/// case-insensitively.
pub fn find_cam_folders(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let needle = pattern.to_uppercase();
    let mut folders: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir() && e.path() != root)
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .to_uppercase()
                .contains(&needle)
        })
        .map(|e| e.into_path())
        .collect();
    folders.sort();

    info!("Found {} camera folders under {}", folders.len(), root.display());
    folders
}
