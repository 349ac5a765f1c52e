//! Finder label annotation for completed projects.
//!
//! Best-effort and cosmetic: failures are logged, never propagated.

use std::path::Path;
use std::process::Command;
use tracing::{error, info, warn};

/// Finder label color mapping (indexes used by AppleScript)
const FINDER_LABEL_COLORS: &[(&str, u8)] = &[
    ("None", 0),
    ("Orange", 1),
    ("Red", 2),
    ("Yellow", 3),
    ("Blue", 4),
    ("Purple", 5),
    ("Green", 6),
    ("Gray", 7),
];

/// Collaborator that marks a path with a cosmetic annotation
pub trait LabelAnnotator: Send + Sync {
    /// Apply the named label. Returns whether it was actually applied.
    fn set_label(&self, path: &Path, color_name: &str) -> bool;
}

/// Sets Finder label colors through `osascript`. No-op off macOS.
#[derive(Debug, Default)]
pub struct FinderLabelAnnotator;

impl LabelAnnotator for FinderLabelAnnotator {
    fn set_label(&self, path: &Path, color_name: &str) -> bool {
        if !cfg!(target_os = "macos") {
            warn!("Finder labels can only be set on macOS. Skipping.");
            return false;
        }

        let Some(color_index) = FINDER_LABEL_COLORS
            .iter()
            .find(|(name, _)| *name == color_name)
            .map(|(_, index)| *index)
        else {
            error!(
                "Invalid label color name: {}. Available colors: {:?}",
                color_name,
                FINDER_LABEL_COLORS.iter().map(|(n, _)| *n).collect::<Vec<_>>()
            );
            return false;
        };

        let script = format!(
            "tell application \"Finder\"\n\
             set p_file to (POSIX file \"{}\" as alias)\n\
             set label index of p_file to {}\n\
             update p_file\n\
             end tell",
            path.display(),
            color_index
        );

        match Command::new("osascript").arg("-e").arg(&script).output() {
            Ok(output) if output.status.success() => {
                info!(
                    "Set Finder label '{}' for {}",
                    color_name,
                    path.display()
                );
                true
            }
            Ok(output) => {
                error!(
                    "Failed to set Finder label for {}: {}",
                    path.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                error!("Could not run osascript: {}", e);
                false
            }
        }
    }
}
