use super::{VerificationRecord, VerificationStatus};
use crate::error::ProbeError;
use crate::prober::{MediaProber, MediaProperties};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Allowed difference in seconds between matching durations
pub const DURATION_TOLERANCE_SECS: f64 = 1.0;
/// Allowed difference between parsed frame rates (29.97 vs 30000/1001 noise)
pub const FRAME_RATE_TOLERANCE: f64 = 0.1;

const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "wmv", "flv", "ts", "m4v",
];

/// Compares media properties between an original and a converted directory
/// tree, matching files by lowercased stem.
pub struct VerificationEngine<'a> {
    prober: &'a dyn MediaProber,
    /// Filename suffix the compressor appended to outputs, stripped from
    /// converted stems before matching
    output_suffix: Option<String>,
}

impl<'a> VerificationEngine<'a> {
    pub fn new(prober: &'a dyn MediaProber) -> Self {
        Self {
            prober,
            output_suffix: None,
        }
    }

    pub fn with_output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = Some(suffix.into());
        self
    }

    /// Recursively discover media files under a folder, keyed by lowercased
    /// stem.
    ///
    /// Hidden files and `Thumbs.db` are skipped. When two files share a stem
    /// with different extensions, the later one encountered wins; this is an
    /// accepted ambiguity, not a collision-free mapping.
    pub fn discover(&self, folder: &Path) -> BTreeMap<String, PathBuf> {
        self.discover_with(folder, None)
    }

    fn discover_with(&self, folder: &Path, strip: Option<&str>) -> BTreeMap<String, PathBuf> {
        let mut found = BTreeMap::new();
        if !folder.is_dir() {
            return found;
        }

        for entry in WalkDir::new(folder)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') || name == "Thumbs.db" {
                continue;
            }
            let has_media_ext = entry
                .path()
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()));
            if !has_media_ext {
                continue;
            }

            let Some(stem) = entry.path().file_stem() else {
                continue;
            };
            let mut key = stem.to_string_lossy().to_lowercase();
            if let Some(suffix) = strip
                && let Some(stripped) = key.strip_suffix(&suffix.to_lowercase())
            {
                key = stripped.to_string();
            }
            found.insert(key, entry.path().to_path_buf());
        }

        found
    }

    /// Compare two probed property sets, returning mismatch descriptions.
    ///
    /// An empty list means the pair matches. The audio/video skew check on
    /// the converted file is asymmetric: a skew already present in the
    /// original is never counted against the conversion.
    pub fn compare(original: &MediaProperties, converted: &MediaProperties) -> Vec<String> {
        let mut mismatches = Vec::new();

        let orig_video_duration = original.video_duration();
        let conv_video_duration = converted.video_duration();
        if (orig_video_duration - conv_video_duration).abs() > DURATION_TOLERANCE_SECS {
            mismatches.push(format!(
                "Duration mismatch: original {:.2}s, converted {:.2}s",
                orig_video_duration, conv_video_duration
            ));
        }

        match (original.video_streams.first(), converted.video_streams.first()) {
            (Some(orig_video), Some(conv_video)) => {
                if orig_video.width != conv_video.width || orig_video.height != conv_video.height {
                    mismatches.push(format!(
                        "Resolution mismatch: original {}x{}, converted {}x{}",
                        orig_video.width.unwrap_or(0),
                        orig_video.height.unwrap_or(0),
                        conv_video.width.unwrap_or(0),
                        conv_video.height.unwrap_or(0)
                    ));
                }
                if (orig_video.frame_rate - conv_video.frame_rate).abs() > FRAME_RATE_TOLERANCE {
                    mismatches.push(format!(
                        "Frame rate mismatch: original {:.2} (raw: {}), converted {:.2} (raw: {})",
                        orig_video.frame_rate,
                        orig_video.frame_rate_raw,
                        conv_video.frame_rate,
                        conv_video.frame_rate_raw
                    ));
                }
            }
            (Some(_), None) => {
                mismatches.push("Converted file is missing video stream(s).".to_string());
            }
            (None, Some(_)) => {
                mismatches.push(
                    "Original file was missing video stream(s), but converted has them (unexpected)."
                        .to_string(),
                );
            }
            (None, None) => {}
        }

        if original.audio_streams.len() != converted.audio_streams.len() {
            mismatches.push(format!(
                "Audio stream count mismatch: original {}, converted {}",
                original.audio_streams.len(),
                converted.audio_streams.len()
            ));
        } else if let (Some(orig_audio), Some(conv_audio)) =
            (original.audio_streams.first(), converted.audio_streams.first())
        {
            if orig_audio.channels != conv_audio.channels {
                mismatches.push(format!(
                    "Audio channels mismatch: original {:?}, converted {:?}",
                    orig_audio.channels, conv_audio.channels
                ));
            }

            if (orig_audio.duration - conv_audio.duration).abs() > DURATION_TOLERANCE_SECS {
                mismatches.push(format!(
                    "Audio stream duration mismatch: original {:.2}s, converted {:.2}s",
                    orig_audio.duration, conv_audio.duration
                ));
            }

            let orig_skew = (orig_video_duration - orig_audio.duration).abs();
            let conv_skew = (conv_video_duration - conv_audio.duration).abs();
            if orig_skew > DURATION_TOLERANCE_SECS {
                // A pre-existing inconsistency in the original, not a
                // conversion defect
                warn!(
                    "Original file has audio/video duration mismatch: video {:.2}s, audio {:.2}s",
                    orig_video_duration, orig_audio.duration
                );
            }
            if conv_skew > DURATION_TOLERANCE_SECS {
                if orig_skew <= DURATION_TOLERANCE_SECS {
                    mismatches.push(format!(
                        "Converted file has audio/video duration mismatch (original didn't): video {:.2}s, audio {:.2}s",
                        conv_video_duration, conv_audio.duration
                    ));
                } else if (orig_skew - conv_skew).abs() > DURATION_TOLERANCE_SECS {
                    mismatches.push(format!(
                        "Audio/video duration mismatch differs between files: original mismatch {:.2}s, converted mismatch {:.2}s",
                        orig_skew, conv_skew
                    ));
                }
            }
        }

        mismatches
    }

    /// Verify every file in the original tree against its converted
    /// counterpart.
    ///
    /// A missing probing tool short-circuits the whole call with a single
    /// `FfprobeNotFound` record. An absent converted folder still enumerates
    /// every original as `ConvertedMissing`.
    pub fn verify(&self, original_folder: &Path, converted_folder: &Path) -> Vec<VerificationRecord> {
        if !self.prober.is_available() {
            error!("Critical: probing tool not found, verification cannot proceed");
            return vec![Self::ffprobe_not_found(original_folder, converted_folder)];
        }

        if !original_folder.is_dir() {
            error!("Original folder not found: {}", original_folder.display());
            return vec![VerificationRecord {
                original_file: Some(original_folder.to_path_buf()),
                converted_file: Some(converted_folder.to_path_buf()),
                original_props: None,
                converted_props: None,
                status: VerificationStatus::OriginalError,
                mismatches: vec![format!(
                    "Original folder does not exist: {}",
                    original_folder.display()
                )],
            }];
        }
        if !converted_folder.is_dir() {
            warn!(
                "Converted folder not found: {}. All files will be marked as missing.",
                converted_folder.display()
            );
        }

        let original_files = self.discover(original_folder);
        info!(
            "Found {} media files in {}",
            original_files.len(),
            original_folder.display()
        );
        let converted_files =
            self.discover_with(converted_folder, self.output_suffix.as_deref());
        info!(
            "Found {} media files in {}",
            converted_files.len(),
            converted_folder.display()
        );

        let mut report = Vec::new();
        let mut matched_stems = Vec::new();

        for (stem, orig_path) in &original_files {
            let orig_props = match self.prober.probe(orig_path) {
                Ok(props) => props,
                Err(ProbeError::ToolNotFound) => {
                    return vec![Self::ffprobe_not_found(original_folder, converted_folder)];
                }
                Err(e) => {
                    report.push(VerificationRecord {
                        original_file: Some(orig_path.clone()),
                        converted_file: None,
                        original_props: None,
                        converted_props: None,
                        status: VerificationStatus::OriginalError,
                        mismatches: vec![format!(
                            "Failed to get properties for original {}: {}",
                            orig_path.display(),
                            e
                        )],
                    });
                    continue;
                }
            };

            let Some(conv_path) = converted_files.get(stem) else {
                report.push(VerificationRecord {
                    original_file: Some(orig_path.clone()),
                    converted_file: None,
                    original_props: Some(orig_props),
                    converted_props: None,
                    status: VerificationStatus::ConvertedMissing,
                    mismatches: vec![format!(
                        "Converted file for {} not found based on name '{}'.",
                        orig_path.display(),
                        stem
                    )],
                });
                continue;
            };
            matched_stems.push(stem.clone());

            match self.prober.probe(conv_path) {
                Ok(conv_props) => {
                    let mismatches = Self::compare(&orig_props, &conv_props);
                    let status = if mismatches.is_empty() {
                        VerificationStatus::Match
                    } else {
                        VerificationStatus::Mismatch
                    };
                    report.push(VerificationRecord {
                        original_file: Some(orig_path.clone()),
                        converted_file: Some(conv_path.clone()),
                        original_props: Some(orig_props),
                        converted_props: Some(conv_props),
                        status,
                        mismatches,
                    });
                }
                Err(ProbeError::ToolNotFound) => {
                    return vec![Self::ffprobe_not_found(original_folder, converted_folder)];
                }
                Err(e) => {
                    report.push(VerificationRecord {
                        original_file: Some(orig_path.clone()),
                        converted_file: Some(conv_path.clone()),
                        original_props: Some(orig_props),
                        converted_props: None,
                        status: VerificationStatus::ConvertedError,
                        mismatches: vec![format!(
                            "Failed to get properties for converted {}: {}",
                            conv_path.display(),
                            e
                        )],
                    });
                }
            }
        }

        // Converted files with no original counterpart
        for (stem, conv_path) in &converted_files {
            if matched_stems.contains(stem) {
                continue;
            }
            let conv_props = self.prober.probe(conv_path).ok();
            report.push(VerificationRecord {
                original_file: None,
                converted_file: Some(conv_path.clone()),
                original_props: None,
                converted_props: conv_props,
                status: VerificationStatus::OriginalMissing,
                mismatches: vec![format!(
                    "Original file for {} not found based on name '{}'.",
                    conv_path.display(),
                    stem
                )],
            });
        }

        report
    }

    fn ffprobe_not_found(original_folder: &Path, converted_folder: &Path) -> VerificationRecord {
        VerificationRecord {
            original_file: Some(original_folder.to_path_buf()),
            converted_file: Some(converted_folder.to_path_buf()),
            original_props: None,
            converted_props: None,
            status: VerificationStatus::FfprobeNotFound,
            mismatches: vec![
                "ffprobe command not found. Please ensure FFmpeg is installed and in your system's PATH."
                    .to_string(),
            ],
        }
    }
}
