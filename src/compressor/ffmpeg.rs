use super::command::build_ffmpeg_args;
use super::{CompressOutcome, Compressor, FileProgressFn};
use crate::config::CompressionSettings;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Compresses video files by shelling out to ffmpeg.
///
/// Progress is read from ffmpeg's `-progress` output file, scaled against
/// the input duration obtained via ffprobe.
#[derive(Debug, Default)]
pub struct FfmpegCompressor;

impl FfmpegCompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Compressor for FfmpegCompressor {
    fn compress(
        &self,
        input: &Path,
        output: &Path,
        settings: &CompressionSettings,
        on_progress: FileProgressFn,
        cancel: &Arc<AtomicBool>,
    ) -> CompressOutcome {
        let duration = get_duration(input).unwrap_or(0.0);
        if duration <= 0.0 {
            warn!("Could not determine duration of {}", input.display());
        }

        if let Some(parent) = output.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            return CompressOutcome::Error(format!(
                "Failed to create output directory {}: {}",
                parent.display(),
                e
            ));
        }

        let mut args = build_ffmpeg_args(input, output, settings);

        let progress_file = std::env::temp_dir().join(format!(
            "mediavault_progress_{}_{}",
            std::process::id(),
            input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        if std::fs::File::create(&progress_file).is_err() {
            return CompressOutcome::Error("Failed to create progress file".to_string());
        }

        // Insert progress args after -nostdin
        args.insert(2, "-progress".to_string());
        args.insert(3, progress_file.to_string_lossy().to_string());

        info!("Compressing {} -> {}", input.display(), output.display());

        let mut child = match Command::new("ffmpeg")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                let _ = std::fs::remove_file(&progress_file);
                return CompressOutcome::Error(format!("Failed to start ffmpeg: {}", e));
            }
        };

        let result = run_compress_loop(
            &mut child,
            &progress_file,
            duration,
            on_progress,
            cancel,
            output,
        );

        let _ = std::fs::remove_file(&progress_file);
        result
    }
}

/// Get media duration in seconds via ffprobe
pub fn get_duration(input: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .ok()?;

    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
}

fn run_compress_loop(
    child: &mut Child,
    progress_file: &Path,
    duration: f64,
    on_progress: FileProgressFn,
    cancel: &Arc<AtomicBool>,
    output: &Path,
) -> CompressOutcome {
    loop {
        if cancel.load(Ordering::Relaxed) {
            let _ = child.kill();
            let _ = child.wait();
            let _ = std::fs::remove_file(output);
            info!("Compression cancelled, removed partial output");
            return CompressOutcome::Cancelled;
        }

        if let Ok(content) = std::fs::read_to_string(progress_file) {
            let mut latest_time_us: Option<f64> = None;
            for line in content.lines() {
                if let Some(value) = line.strip_prefix("out_time_us=")
                    && let Ok(time_us) = value.trim().parse::<f64>()
                    && time_us > 0.0
                {
                    latest_time_us = Some(time_us);
                }
            }

            if let Some(time_us) = latest_time_us
                && duration > 0.0
            {
                let progress = ((time_us / 1_000_000.0) / duration).min(1.0) as f32;
                on_progress(progress);
            }
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    let stderr = child
                        .stderr
                        .take()
                        .and_then(|mut s| {
                            use std::io::Read;
                            let mut buf = String::new();
                            s.read_to_string(&mut buf).ok()?;
                            Some(buf)
                        })
                        .unwrap_or_default();

                    let _ = std::fs::remove_file(output);

                    let error_msg = if stderr.is_empty() {
                        format!("ffmpeg failed with status: {}", status)
                    } else {
                        let last_lines: Vec<&str> = stderr.lines().rev().take(5).collect();
                        format!(
                            "ffmpeg failed: {}",
                            last_lines.into_iter().rev().collect::<Vec<_>>().join("\n")
                        )
                    };

                    return CompressOutcome::Error(error_msg);
                }
                on_progress(1.0);
                return CompressOutcome::Success;
            }
            Ok(None) => {
                thread::sleep(Duration::from_millis(250));
            }
            Err(e) => {
                return CompressOutcome::Error(format!("Failed to check ffmpeg status: {}", e));
            }
        }
    }
}
