//! Stage-aside maneuver around a project's media root.
//!
//! The live media root (e.g. `01 VIDEO`) is renamed aside (`01 VIDEO.old`),
//! an empty directory is recreated at the original path, and every
//! non-camera subfolder is copied back into it. Compression then reads from
//! the staged tree and writes into the fresh one, so the originals stay
//! untouched until verification has passed.

use crate::config::{OutputConfig, StagingConfig};
use crate::error::AppError;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Paths produced by a completed stage-aside maneuver
#[derive(Debug, Clone)]
pub struct StagedTree {
    /// The fresh, recreated media root
    pub fresh_root: PathBuf,
    /// The renamed original tree
    pub staged_root: PathBuf,
}

impl StagingConfig {
    /// Directory name of the staged-aside media root
    pub fn staged_name(&self) -> String {
        format!("{}{}", self.media_root, self.stage_suffix)
    }

    fn is_camera_folder(&self, name: &str) -> bool {
        name.to_uppercase()
            .contains(&self.camera_pattern.to_uppercase())
    }
}

/// Find the media root within the given input paths.
///
/// Returns the ancestor directory whose final component matches the
/// configured sentinel name, from the first input path that contains one.
pub fn find_media_root(input_files: &[PathBuf], staging: &StagingConfig) -> Option<PathBuf> {
    for path in input_files {
        let mut current = path.as_path();
        while let Some(parent) = current.parent() {
            if parent
                .file_name()
                .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(&staging.media_root))
            {
                return Some(parent.to_path_buf());
            }
            current = parent;
        }
    }
    None
}

/// Perform the stage-aside maneuver on a media root.
///
/// Renames the root aside, recreates an empty directory at the original
/// path, and copies every non-camera subfolder into it. Per-subfolder copy
/// failures are logged and skipped. Fails without touching anything if the
/// staged name is already occupied.
pub fn stage_aside(media_root: &Path, staging: &StagingConfig) -> Result<StagedTree, AppError> {
    if !media_root.is_dir() {
        return Err(AppError::Staging {
            path: media_root.to_path_buf(),
            message: "media root is not a directory".to_string(),
        });
    }

    let parent = media_root.parent().ok_or_else(|| AppError::Staging {
        path: media_root.to_path_buf(),
        message: "media root has no parent directory".to_string(),
    })?;
    let staged_root = parent.join(staging.staged_name());

    if staged_root.exists() {
        return Err(AppError::Staging {
            path: staged_root,
            message: "staged directory already exists from a previous run".to_string(),
        });
    }

    std::fs::rename(media_root, &staged_root)?;
    info!("Renamed {} -> {}", media_root.display(), staged_root.display());

    std::fs::create_dir_all(media_root)?;

    // Bring non-camera subfolders (graphics, audio, project files...) back
    // into the fresh tree so only camera footage is replaced.
    let entries = match std::fs::read_dir(&staged_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not list staged tree {}: {}", staged_root.display(), e);
            return Ok(StagedTree {
                fresh_root: media_root.to_path_buf(),
                staged_root,
            });
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if staging.is_camera_folder(&name) {
            continue;
        }

        let target = media_root.join(&name);
        if let Err(e) = copy_dir_recursive(&path, &target) {
            warn!(
                "Failed to copy subfolder {} into fresh tree: {}",
                path.display(),
                e
            );
        } else {
            info!("Copied subfolder {} into fresh tree", name);
        }
    }

    Ok(StagedTree {
        fresh_root: media_root.to_path_buf(),
        staged_root,
    })
}

/// Remap an input path that pointed inside the now-renamed media root to its
/// staged-aside location.
///
/// The direct component substitution is tried first; if the substituted path
/// does not exist, a best-effort by-filename search within the staged tree
/// is attempted before giving up.
pub fn remap_input(path: &Path, fresh_root: &Path, staged_root: &Path) -> Option<PathBuf> {
    if let Ok(relative) = path.strip_prefix(fresh_root) {
        let candidate = staged_root.join(relative);
        if candidate.is_file() {
            return Some(candidate);
        }

        // Fallback: the layout under the root may have shifted, match by name
        if let Some(filename) = path.file_name() {
            for entry in WalkDir::new(staged_root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                if entry.file_name() == filename {
                    warn!(
                        "Remapped {} by filename search to {}",
                        path.display(),
                        entry.path().display()
                    );
                    return Some(entry.path().to_path_buf());
                }
            }
        }
        return None;
    }

    // Path never pointed inside the media root; use it as-is if still there
    path.is_file().then(|| path.to_path_buf())
}

/// Compute the output path for one compressed file.
///
/// Inputs inside a staged-aside tree are mirrored back into the fresh tree
/// at the same relative location; everything else lands in `output_dir`
/// when given, or next to the input otherwise. The filename gets the
/// configured suffix and container.
pub fn resolve_output_path(
    input: &Path,
    output_dir: Option<&Path>,
    naming: &OutputConfig,
    staging: &StagingConfig,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let filename = format!("{}{}.{}", stem, naming.suffix, naming.container);

    let parent = input.parent().unwrap_or(Path::new("."));
    if let Some(unstaged) = unstage_dir(parent, staging) {
        return unstaged.join(filename);
    }

    match output_dir {
        Some(dir) => dir.join(filename),
        None => parent.join(filename),
    }
}

/// Replace a staged-aside component (`01 VIDEO.old`) in a directory path
/// with the live media root name, if present.
fn unstage_dir(dir: &Path, staging: &StagingConfig) -> Option<PathBuf> {
    let staged_name = staging.staged_name();
    let mut found = false;
    let mut result = PathBuf::new();

    for component in dir.components() {
        match component {
            Component::Normal(name) if name.to_string_lossy() == staged_name.as_str() => {
                result.push(&staging.media_root);
                found = true;
            }
            other => result.push(other.as_os_str()),
        }
    }

    found.then_some(result)
}

/// Recursively copy a directory tree
fn copy_dir_recursive(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(target)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn staging() -> StagingConfig {
        StagingConfig::default()
    }

    fn build_media_tree(root: &TempDir) -> PathBuf {
        let video = root.path().join("03 MEDIA").join("01 VIDEO");
        fs::create_dir_all(video.join("CAM 1")).unwrap();
        fs::create_dir_all(video.join("CAM 2")).unwrap();
        fs::create_dir_all(video.join("GRAPHICS")).unwrap();
        fs::write(video.join("CAM 1").join("CAM1_001.mov"), b"clip1").unwrap();
        fs::write(video.join("CAM 2").join("CAM2_001.mov"), b"clip2").unwrap();
        fs::write(video.join("GRAPHICS").join("logo.png"), b"png").unwrap();
        video
    }

    #[test]
    fn finds_media_root_in_input_paths() {
        let files = vec![PathBuf::from(
            "/events/smith/03 MEDIA/01 VIDEO/CAM 1/CAM1_001.mov",
        )];
        let root = find_media_root(&files, &staging()).unwrap();
        assert_eq!(root, PathBuf::from("/events/smith/03 MEDIA/01 VIDEO"));
    }

    #[test]
    fn media_root_absent_yields_none() {
        let files = vec![PathBuf::from("/clips/holiday.mov")];
        assert!(find_media_root(&files, &staging()).is_none());
    }

    #[test]
    fn stage_aside_renames_and_copies_non_camera_folders() {
        let dir = TempDir::new().unwrap();
        let video = build_media_tree(&dir);

        let staged = stage_aside(&video, &staging()).unwrap();

        assert_eq!(staged.fresh_root, video);
        assert!(staged.staged_root.ends_with("01 VIDEO.old"));
        // Originals moved aside intact
        assert!(staged.staged_root.join("CAM 1/CAM1_001.mov").is_file());
        // Non-camera folder copied into the fresh tree
        assert!(video.join("GRAPHICS/logo.png").is_file());
        // Camera folders were not copied back
        assert!(!video.join("CAM 1").exists());
    }

    #[test]
    fn stage_aside_refuses_when_staged_dir_exists() {
        let dir = TempDir::new().unwrap();
        let video = build_media_tree(&dir);
        fs::create_dir_all(dir.path().join("03 MEDIA").join("01 VIDEO.old")).unwrap();

        let err = stage_aside(&video, &staging()).unwrap_err();
        assert!(matches!(err, AppError::Staging { .. }));
        // Nothing was renamed
        assert!(video.join("CAM 1/CAM1_001.mov").is_file());
    }

    #[test]
    fn remap_swaps_prefix_into_staged_tree() {
        let dir = TempDir::new().unwrap();
        let video = build_media_tree(&dir);
        let original_input = video.join("CAM 1").join("CAM1_001.mov");

        let staged = stage_aside(&video, &staging()).unwrap();
        let remapped =
            remap_input(&original_input, &staged.fresh_root, &staged.staged_root).unwrap();
        assert_eq!(remapped, staged.staged_root.join("CAM 1/CAM1_001.mov"));
    }

    #[test]
    fn remap_falls_back_to_filename_search() {
        let dir = TempDir::new().unwrap();
        let video = build_media_tree(&dir);
        // Caller recorded the file under a stale subfolder name
        let stale_input = video.join("CAM A").join("CAM1_001.mov");

        let staged = stage_aside(&video, &staging()).unwrap();
        let remapped = remap_input(&stale_input, &staged.fresh_root, &staged.staged_root).unwrap();
        assert_eq!(remapped, staged.staged_root.join("CAM 1/CAM1_001.mov"));
    }

    #[test]
    fn remap_gives_up_on_unknown_files() {
        let dir = TempDir::new().unwrap();
        let video = build_media_tree(&dir);
        let unknown = video.join("CAM 1").join("nope.mov");

        let staged = stage_aside(&video, &staging()).unwrap();
        assert!(remap_input(&unknown, &staged.fresh_root, &staged.staged_root).is_none());
    }

    #[test]
    fn output_path_mirrors_staged_inputs_into_fresh_tree() {
        let input = PathBuf::from("/ev/03 MEDIA/01 VIDEO.old/CAM 1/CAM1_001.mov");
        let out = resolve_output_path(&input, None, &OutputConfig::default(), &staging());
        assert_eq!(
            out,
            PathBuf::from("/ev/03 MEDIA/01 VIDEO/CAM 1/CAM1_001_24mbps.mp4")
        );
    }

    #[test]
    fn output_path_uses_output_dir_for_unstaged_inputs() {
        let input = PathBuf::from("/clips/holiday.mov");
        let out = resolve_output_path(
            &input,
            Some(Path::new("/out")),
            &OutputConfig::default(),
            &staging(),
        );
        assert_eq!(out, PathBuf::from("/out/holiday_24mbps.mp4"));

        let beside = resolve_output_path(&input, None, &OutputConfig::default(), &staging());
        assert_eq!(beside, PathBuf::from("/clips/holiday_24mbps.mp4"));
    }
}
