use super::job::{CompressionResult, FileJob, JobStatus, sort_key};
use crate::compressor::{CompressOutcome, Compressor};
use crate::config::{CompressionSettings, OutputConfig, StagingConfig};
use crate::staging::resolve_output_path;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{error, info};

/// Per-state job counts for one queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Sequential queue of file-compression jobs within one project.
///
/// The cancellation flag is owned by the queue instance; callers that need to
/// cancel from another thread take a handle via [`cancel_handle`].
///
/// [`cancel_handle`]: FileJobQueue::cancel_handle
pub struct FileJobQueue {
    jobs: Vec<FileJob>,
    naming: OutputConfig,
    staging: StagingConfig,
    cancel: Arc<AtomicBool>,
}

impl FileJobQueue {
    pub fn new(naming: OutputConfig, staging: StagingConfig) -> Self {
        Self {
            jobs: Vec::new(),
            naming,
            staging,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add files to the queue.
    ///
    /// Paths already queued and paths that are not existing files are
    /// dropped. The newly added batch is sorted by camera/file number before
    /// being appended; jobs already in the queue keep their position.
    pub fn add(&mut self, paths: &[PathBuf]) -> usize {
        let mut batch: Vec<PathBuf> = Vec::new();

        for path in paths {
            if batch.contains(path) || self.jobs.iter().any(|j| &j.path == path) {
                continue;
            }
            if !path.is_file() {
                continue;
            }
            batch.push(path.clone());
        }

        batch.sort_by_key(|p| sort_key(p));

        let added = batch.len();
        self.jobs.extend(batch.into_iter().map(FileJob::new));

        info!("Added {} files to queue", added);
        added
    }

    /// Process all jobs in order.
    ///
    /// A failed job does not stop the run; the queue moves on to the next
    /// file. Returns `false` if the queue was empty, any job failed, or the
    /// run was cancelled.
    pub fn process(
        &mut self,
        output_dir: Option<&Path>,
        settings: &CompressionSettings,
        compressor: &dyn Compressor,
        on_progress: &mut dyn FnMut(&Path, f32, f32),
    ) -> bool {
        if self.jobs.is_empty() {
            info!("File queue is empty, nothing to process");
            return false;
        }

        self.cancel.store(false, Ordering::Relaxed);
        let total = self.jobs.len();
        let mut all_success = true;
        let mut cancelled = false;

        for index in 0..total {
            if self.cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }

            let input = self.jobs[index].path.clone();
            self.jobs[index].status = JobStatus::Processing;
            info!(
                "Processing file {}/{}: {}",
                index + 1,
                total,
                input.display()
            );

            let output =
                resolve_output_path(&input, output_dir, &self.naming, &self.staging);

            let mut file_progress = |progress: f32| {
                let overall = (index as f32 + progress) / total as f32;
                on_progress(&input, progress, overall);
            };

            let start = Instant::now();
            let outcome = compressor.compress(
                &input,
                &output,
                settings,
                &mut file_progress,
                &self.cancel,
            );
            let elapsed = start.elapsed().as_secs_f64();

            match outcome {
                CompressOutcome::Success => {
                    self.jobs[index].status = JobStatus::Completed;
                    self.jobs[index].result =
                        Some(build_result(&input, &output, elapsed));
                    info!("Successfully compressed {}", input.display());
                }
                CompressOutcome::Cancelled => {
                    self.jobs[index].status = JobStatus::Cancelled;
                    cancelled = true;
                    info!("Compression of {} was cancelled", input.display());
                }
                CompressOutcome::Error(message) => {
                    self.jobs[index].status = JobStatus::Failed;
                    self.jobs[index].result =
                        Some(CompressionResult::failure("Compression failed"));
                    error!("Failed to compress {}: {}", input.display(), message);
                    all_success = false;
                }
            }

            // Job boundary: the file is done one way or another
            on_progress(&input, 1.0, (index + 1) as f32 / total as f32);

            if cancelled {
                break;
            }
        }

        if cancelled {
            info!("Queue processing was cancelled");
            for job in &mut self.jobs {
                if job.status == JobStatus::Pending {
                    job.status = JobStatus::Cancelled;
                }
            }
            return false;
        }

        all_success
    }

    /// Handle for cancelling a run in progress from another thread
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn status(&self) -> JobCounts {
        let mut counts = JobCounts {
            total: self.jobs.len(),
            ..Default::default()
        };
        for job in &self.jobs {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    pub fn results(&self) -> HashMap<PathBuf, CompressionResult> {
        self.jobs
            .iter()
            .filter_map(|j| j.result.clone().map(|r| (j.path.clone(), r)))
            .collect()
    }

    pub fn jobs(&self) -> &[FileJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.cancel.store(false, Ordering::Relaxed);
    }
}

fn build_result(input: &Path, output: &Path, duration_secs: f64) -> CompressionResult {
    let input_size = std::fs::metadata(input).map(|m| m.len()).unwrap_or(0);
    let output_size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    let size_diff = input_size as i64 - output_size as i64;
    let reduction_percent = if input_size > 0 {
        (size_diff as f64 / input_size as f64) * 100.0
    } else {
        0.0
    };

    info!(
        "Compression result: {:.1}% reduction ({} -> {})",
        reduction_percent,
        crate::utils::format_file_size(input_size),
        crate::utils::format_file_size(output_size),
    );

    CompressionResult {
        input_size,
        output_size,
        size_diff,
        reduction_percent,
        duration_secs,
        output_path: Some(output.to_path_buf()),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::FileProgressFn;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn new_queue() -> FileJobQueue {
        FileJobQueue::new(OutputConfig::default(), StagingConfig::default())
    }

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"fake video data").unwrap();
        path
    }

    /// Compressor stub that writes a small output file, with optional
    /// failure injection by filename and cancellation after N files.
    #[derive(Default)]
    struct StubCompressor {
        fail_on: Vec<String>,
        cancel_after: Option<usize>,
        calls: Mutex<Vec<PathBuf>>,
    }

    impl Compressor for StubCompressor {
        fn compress(
            &self,
            input: &Path,
            output: &Path,
            _settings: &CompressionSettings,
            on_progress: FileProgressFn,
            cancel: &Arc<AtomicBool>,
        ) -> CompressOutcome {
            if cancel.load(Ordering::Relaxed) {
                return CompressOutcome::Cancelled;
            }

            let mut calls = self.calls.lock().unwrap();
            calls.push(input.to_path_buf());

            let name = input.file_name().unwrap().to_string_lossy().to_string();
            if self.fail_on.contains(&name) {
                return CompressOutcome::Error("boom".to_string());
            }

            on_progress(0.5);
            fs::write(output, b"smaller").unwrap();
            if let Some(limit) = self.cancel_after
                && calls.len() >= limit
            {
                cancel.store(true, Ordering::Relaxed);
            }
            CompressOutcome::Success
        }
    }

    #[test]
    fn add_dedups_and_drops_missing_files() {
        let dir = TempDir::new().unwrap();
        let a = touch(&dir, "a.mov");
        let b = touch(&dir, "b.mov");
        let missing = dir.path().join("missing.mov");

        let mut queue = new_queue();
        let added = queue.add(&[a.clone(), a.clone(), b, missing]);

        assert_eq!(added, 2);
        assert_eq!(queue.len(), 2);

        // Adding the same file again is a no-op
        assert_eq!(queue.add(&[a]), 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn add_sorts_batch_by_camera_then_file_number() {
        let dir = TempDir::new().unwrap();
        let paths = vec![
            touch(&dir, "CAM2_005.mov"),
            touch(&dir, "CAM1_002.mov"),
            touch(&dir, "CAM1_001.mov"),
            touch(&dir, "CAM2_002.mov"),
        ];

        let mut queue = new_queue();
        queue.add(&paths);

        let order: Vec<String> = queue.jobs().iter().map(|j| j.filename()).collect();
        assert_eq!(
            order,
            ["CAM1_001.mov", "CAM1_002.mov", "CAM2_002.mov", "CAM2_005.mov"]
        );
    }

    #[test]
    fn earlier_batches_keep_their_position() {
        let dir = TempDir::new().unwrap();
        let first = touch(&dir, "CAM9_900.mov");
        let second = touch(&dir, "CAM1_001.mov");

        let mut queue = new_queue();
        queue.add(&[first]);
        queue.add(&[second]);

        let order: Vec<String> = queue.jobs().iter().map(|j| j.filename()).collect();
        assert_eq!(order, ["CAM9_900.mov", "CAM1_001.mov"]);
    }

    #[test]
    fn process_empty_queue_returns_false() {
        let mut queue = new_queue();
        let compressor = StubCompressor::default();
        let ok = queue.process(
            None,
            &CompressionSettings::default(),
            &compressor,
            &mut |_, _, _| {},
        );
        assert!(!ok);
    }

    #[test]
    fn failed_job_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let paths = vec![
            touch(&dir, "CAM1_001.mov"),
            touch(&dir, "CAM1_002.mov"),
            touch(&dir, "CAM1_003.mov"),
        ];

        let mut queue = new_queue();
        queue.add(&paths);

        let compressor = StubCompressor {
            fail_on: vec!["CAM1_002.mov".to_string()],
            ..Default::default()
        };
        let ok = queue.process(
            Some(out.path()),
            &CompressionSettings::default(),
            &compressor,
            &mut |_, _, _| {},
        );

        assert!(!ok);
        let counts = queue.status();
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 0);
        // All three were attempted
        assert_eq!(compressor.calls.lock().unwrap().len(), 3);

        let results = queue.results();
        let failed = results.get(&paths[1]).unwrap();
        assert_eq!(failed.error.as_deref(), Some("Compression failed"));
    }

    #[test]
    fn cancellation_marks_unstarted_jobs_cancelled() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let paths = vec![
            touch(&dir, "CAM1_001.mov"),
            touch(&dir, "CAM1_002.mov"),
            touch(&dir, "CAM1_003.mov"),
            touch(&dir, "CAM1_004.mov"),
        ];

        let mut queue = new_queue();
        queue.add(&paths);

        let compressor = StubCompressor {
            cancel_after: Some(2),
            ..Default::default()
        };
        let ok = queue.process(
            Some(out.path()),
            &CompressionSettings::default(),
            &compressor,
            &mut |_, _, _| {},
        );

        assert!(!ok);
        let counts = queue.status();
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.cancelled, 2);
        assert_eq!(counts.pending, 0);
    }

    #[test]
    fn progress_reports_file_and_overall_fractions() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let paths = vec![touch(&dir, "CAM1_001.mov"), touch(&dir, "CAM1_002.mov")];

        let mut queue = new_queue();
        queue.add(&paths);

        let compressor = StubCompressor::default();
        let mut updates: Vec<(f32, f32)> = Vec::new();
        queue.process(
            Some(out.path()),
            &CompressionSettings::default(),
            &compressor,
            &mut |_, file, overall| updates.push((file, overall)),
        );

        // Boundary updates reach 50% after the first file and 100% at the end
        assert!(updates.contains(&(1.0, 0.5)));
        assert_eq!(updates.last(), Some(&(1.0, 1.0)));
    }

    #[test]
    fn successful_run_records_sizes() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let input = touch(&dir, "CAM1_001.mov");

        let mut queue = new_queue();
        queue.add(&[input.clone()]);

        let compressor = StubCompressor::default();
        let ok = queue.process(
            Some(out.path()),
            &CompressionSettings::default(),
            &compressor,
            &mut |_, _, _| {},
        );

        assert!(ok);
        let results = queue.results();
        let result = results.get(&input).unwrap();
        assert_eq!(result.input_size, 15);
        assert_eq!(result.output_size, 7);
        assert!(result.reduction_percent > 50.0);
        assert!(result.error.is_none());
        assert_eq!(
            result.output_path.as_ref().unwrap(),
            &out.path().join("CAM1_001_24mbps.mp4")
        );
    }
}
