//! Bridges the project queue and the per-project file queue.
//!
//! The orchestrator owns the collaborators (compressor, prober, annotator)
//! and the per-project handler: stage the media root aside, compress the
//! remapped inputs into the fresh tree, verify the two trees against each
//! other, and delete the staged originals only when everything matched.

use crate::compressor::Compressor;
use crate::config::{AppConfig, CompressionSettings};
use crate::label::LabelAnnotator;
use crate::prober::MediaProber;
use crate::queue::{
    Project, ProjectCounts, ProjectEntry, ProjectOutcome, ProjectStats, ProjectStatus,
    ProjectQueue, FileJobQueue, QueueSummary, VerificationSummary,
};
use crate::staging::{find_media_root, remap_input, stage_aside, StagedTree};
use crate::verifier::{VerificationEngine, VerificationRecord, VerificationStatus};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Progress notifications emitted during a run, on the worker thread
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Sub-file and within-project progress for the file being compressed
    File {
        project_id: String,
        file: PathBuf,
        file_progress: f32,
        project_progress: f32,
    },
    /// A project finished, with the fraction of the run completed
    Project {
        project_id: String,
        status: ProjectStatus,
        run_progress: f64,
    },
}

pub type ProgressFn = Box<dyn FnMut(ProgressEvent) + Send + 'static>;

/// Drives project execution end to end.
#[derive(Clone)]
pub struct ProjectOrchestrator {
    queue: ProjectQueue,
    config: Arc<AppConfig>,
    compressor: Arc<dyn Compressor>,
    prober: Arc<dyn MediaProber>,
    annotator: Arc<dyn LabelAnnotator>,
    /// Cancel handle of the file queue currently running, if any
    active_cancel: Arc<Mutex<Option<Arc<AtomicBool>>>>,
}

impl ProjectOrchestrator {
    pub fn new(
        config: AppConfig,
        compressor: Arc<dyn Compressor>,
        prober: Arc<dyn MediaProber>,
        annotator: Arc<dyn LabelAnnotator>,
    ) -> Self {
        let queue = ProjectQueue::new(config.state_file_path());
        queue.load_state();
        Self {
            queue,
            config: Arc::new(config),
            compressor,
            prober,
            annotator,
            active_cancel: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a project and enqueue it.
    ///
    /// Projects without explicit settings use the configured defaults.
    pub fn create_project(
        &self,
        name: impl Into<String>,
        input_files: Vec<PathBuf>,
        output_dir: PathBuf,
        settings: Option<CompressionSettings>,
        metadata: BTreeMap<String, String>,
    ) -> String {
        self.queue.add(Project {
            id: String::new(),
            name: name.into(),
            input_files,
            output_dir,
            settings: settings.unwrap_or_else(|| self.config.compression.clone()),
            metadata,
            created_at: String::new(),
        })
    }

    /// Start processing the queue on a background worker.
    ///
    /// Returns `false` if a run is already active or nothing is pending.
    /// All progress events fire on the worker thread.
    pub fn start(&self, on_progress: ProgressFn) -> bool {
        let progress = Arc::new(Mutex::new(on_progress));

        let handler = self.clone();
        let file_progress = Arc::clone(&progress);
        let process_fn = Box::new(move |project: &Project| {
            handler.process_project(project, &file_progress)
        });

        let queue_view = self.queue.clone();
        let project_progress = Arc::clone(&progress);
        let on_project_done = Box::new(move |id: &str, _project: &Project, ratio: f64| {
            let status = queue_view
                .status_of(id)
                .unwrap_or(ProjectStatus::Completed);
            let mut emit = project_progress.lock().expect("progress lock poisoned");
            (*emit)(ProgressEvent::Project {
                project_id: id.to_string(),
                status,
                run_progress: ratio,
            });
        });

        self.queue.start(process_fn, on_project_done, Box::new(|_all| {}))
    }

    /// Cancel the active run: stops the current file queue and prevents any
    /// new project from starting.
    pub fn cancel(&self) -> bool {
        if !self.queue.cancel() {
            return false;
        }
        if let Some(handle) = self
            .active_cancel
            .lock()
            .expect("cancel lock poisoned")
            .as_ref()
        {
            handle.store(true, std::sync::atomic::Ordering::Relaxed);
        }
        true
    }

    pub fn is_processing(&self) -> bool {
        self.queue.is_processing()
    }

    pub fn list_projects(&self) -> Vec<ProjectEntry> {
        self.queue.list()
    }

    pub fn queue_status(&self) -> ProjectCounts {
        self.queue.queue_status()
    }

    pub fn results_summary(&self) -> QueueSummary {
        self.queue.results_summary()
    }

    pub fn remove_project(&self, id: &str) -> bool {
        self.queue.remove(id)
    }

    pub fn reorder_project(&self, id: &str, new_index: usize) -> bool {
        self.queue.reorder(id, new_index)
    }

    pub fn clear_queue(&self) -> bool {
        self.queue.clear()
    }

    /// Standalone verification between two directory trees
    pub fn verify_trees(&self, original: &Path, converted: &Path) -> Vec<VerificationRecord> {
        VerificationEngine::new(self.prober.as_ref())
            .with_output_suffix(self.config.output.suffix.clone())
            .verify(original, converted)
    }

    /// Per-project handler invoked by the queue worker.
    fn process_project(
        &self,
        project: &Project,
        progress: &Arc<Mutex<ProgressFn>>,
    ) -> (ProjectOutcome, ProjectStats) {
        info!("Processing project '{}' ({})", project.name, project.id);

        // Stage the media root aside when the inputs live under one
        let staged = match find_media_root(&project.input_files, &self.config.staging) {
            Some(media_root) => match stage_aside(&media_root, &self.config.staging) {
                Ok(staged) => Some(staged),
                Err(e) => {
                    error!("Stage-aside failed for {}: {}", media_root.display(), e);
                    return (
                        ProjectOutcome::Failed,
                        ProjectStats::failure(format!("Stage-aside failed: {}", e)),
                    );
                }
            },
            None => None,
        };

        let inputs = self.remap_inputs(project, staged.as_ref());
        if inputs.is_empty() {
            return (
                ProjectOutcome::Failed,
                ProjectStats::failure("No input files could be resolved"),
            );
        }

        let mut file_queue = FileJobQueue::new(
            self.config.output.clone(),
            self.config.staging.clone(),
        );
        file_queue.add(&inputs);
        if file_queue.is_empty() {
            return (
                ProjectOutcome::Failed,
                ProjectStats::failure("No input files found on disk"),
            );
        }

        // Expose the file queue's cancel handle for the duration of the run
        *self.active_cancel.lock().expect("cancel lock poisoned") =
            Some(file_queue.cancel_handle());

        let output_dir = (!project.output_dir.as_os_str().is_empty())
            .then_some(project.output_dir.as_path());
        let project_id = project.id.clone();
        let progress_fn = Arc::clone(progress);
        let success = file_queue.process(
            output_dir,
            &project.settings,
            self.compressor.as_ref(),
            &mut |file, file_progress, project_progress| {
                let mut emit = progress_fn.lock().expect("progress lock poisoned");
                (*emit)(ProgressEvent::File {
                    project_id: project_id.clone(),
                    file: file.to_path_buf(),
                    file_progress,
                    project_progress,
                });
            },
        );

        *self.active_cancel.lock().expect("cancel lock poisoned") = None;

        let mut stats = aggregate_stats(&file_queue);
        if !success {
            if stats.error.is_none() {
                stats.error = Some("One or more files failed to compress".to_string());
            }
            return (ProjectOutcome::Failed, stats);
        }

        // Without a staged tree there is nothing to verify against
        let Some(staged) = staged else {
            return (ProjectOutcome::Completed, stats);
        };

        self.queue.mark_verifying(&project.id);
        let (outcome, summary) = self.verify_and_cleanup(&staged);
        stats.verification = Some(summary);
        (outcome, stats)
    }

    fn remap_inputs(&self, project: &Project, staged: Option<&StagedTree>) -> Vec<PathBuf> {
        let Some(staged) = staged else {
            return project.input_files.clone();
        };

        project
            .input_files
            .iter()
            .filter_map(|input| {
                let remapped = remap_input(input, &staged.fresh_root, &staged.staged_root);
                if remapped.is_none() {
                    warn!(
                        "Input {} could not be located after staging, skipping",
                        input.display()
                    );
                }
                remapped
            })
            .collect()
    }

    /// Compare the staged originals against the fresh tree; delete the
    /// staged tree only on a 100% match.
    fn verify_and_cleanup(&self, staged: &StagedTree) -> (ProjectOutcome, VerificationSummary) {
        let report = self.verify_trees(&staged.staged_root, &staged.fresh_root);

        let matches = report.iter().filter(|r| r.is_match()).count();
        let mut summary = VerificationSummary {
            total: report.len(),
            matches,
            mismatches: report.len() - matches,
            originals_deleted: false,
            skip_reason: None,
        };

        if report.is_empty() {
            summary.skip_reason = Some("No files were discovered for verification".to_string());
            warn!("Verification found nothing to compare; staged originals kept");
            return (ProjectOutcome::VerificationFailed, summary);
        }
        if report
            .iter()
            .any(|r| r.status == VerificationStatus::FfprobeNotFound)
        {
            summary.skip_reason =
                Some("ffprobe not found; verification could not be performed".to_string());
            error!("Verification skipped: probing tool not found");
            return (ProjectOutcome::VerificationFailed, summary);
        }
        if summary.mismatches > 0 {
            summary.skip_reason = Some(format!(
                "{} verification issue(s) found",
                summary.mismatches
            ));
            warn!(
                "Verification found {} issue(s); staged originals kept",
                summary.mismatches
            );
            return (ProjectOutcome::VerificationFailed, summary);
        }

        info!("All {} files verified, deleting staged originals", matches);
        match std::fs::remove_dir_all(&staged.staged_root) {
            Ok(()) => {
                summary.originals_deleted = true;
                self.annotate_success(&staged.fresh_root);
            }
            Err(e) => {
                error!(
                    "Failed to delete staged originals {}: {}",
                    staged.staged_root.display(),
                    e
                );
                summary.skip_reason = Some(format!("Failed to delete staged originals: {}", e));
            }
        }

        (ProjectOutcome::Completed, summary)
    }

    fn annotate_success(&self, fresh_root: &Path) {
        if !self.config.label.enabled {
            return;
        }
        // Mark the folder that contains the media root
        let target = fresh_root.parent().unwrap_or(fresh_root);
        self.annotator
            .set_label(target, &self.config.label.success_color);
    }
}

fn aggregate_stats(file_queue: &FileJobQueue) -> ProjectStats {
    let counts = file_queue.status();
    let mut stats = ProjectStats {
        files_processed: counts.completed,
        files_failed: counts.failed,
        ..Default::default()
    };

    for result in file_queue.results().values() {
        if result.error.is_some() {
            continue;
        }
        stats.total_input_size += result.input_size;
        stats.total_output_size += result.output_size;
        stats.total_file_secs += result.duration_secs;
    }
    stats.total_size_reduction =
        stats.total_input_size as i64 - stats.total_output_size as i64;
    if stats.total_input_size > 0 {
        stats.average_reduction_percent =
            stats.total_size_reduction as f64 / stats.total_input_size as f64 * 100.0;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::{CompressOutcome, FileProgressFn};
    use crate::config::CompressionSettings;
    use crate::error::ProbeError;
    use crate::prober::{AudioStreamProps, MediaProperties, VideoStreamProps};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Writes a small stand-in output file for every input
    struct StubCompressor;

    impl Compressor for StubCompressor {
        fn compress(
            &self,
            _input: &Path,
            output: &Path,
            _settings: &CompressionSettings,
            on_progress: FileProgressFn,
            _cancel: &Arc<AtomicBool>,
        ) -> CompressOutcome {
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(output, b"compressed").unwrap();
            on_progress(1.0);
            CompressOutcome::Success
        }
    }

    /// Reports fixed properties; converted files can be skewed to force
    /// mismatches.
    struct StubProber {
        converted_duration: f64,
    }

    impl StubProber {
        fn props(duration: f64) -> MediaProperties {
            MediaProperties {
                format_name: Some("mov".to_string()),
                duration,
                video_streams: vec![VideoStreamProps {
                    width: Some(1920),
                    height: Some(1080),
                    frame_rate: 25.0,
                    frame_rate_raw: "25/1".to_string(),
                    codec_name: Some("h264".to_string()),
                    duration,
                }],
                audio_streams: vec![AudioStreamProps {
                    channels: Some(2),
                    codec_name: Some("aac".to_string()),
                    sample_rate: Some(48000),
                    duration,
                }],
            }
        }
    }

    impl MediaProber for StubProber {
        fn is_available(&self) -> bool {
            true
        }

        fn probe(&self, path: &Path) -> Result<MediaProperties, ProbeError> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if name.contains("_24mbps") {
                Ok(Self::props(self.converted_duration))
            } else {
                Ok(Self::props(60.0))
            }
        }
    }

    struct CountingAnnotator {
        calls: AtomicUsize,
    }

    impl LabelAnnotator for CountingAnnotator {
        fn set_label(&self, _path: &Path, _color_name: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn build_media_tree(dir: &TempDir) -> (PathBuf, Vec<PathBuf>) {
        let video = dir.path().join("03 MEDIA").join("01 VIDEO");
        fs::create_dir_all(video.join("CAM 1")).unwrap();
        fs::create_dir_all(video.join("CAM 2")).unwrap();
        fs::create_dir_all(video.join("GRAPHICS")).unwrap();
        let a = video.join("CAM 1").join("CAM1_001.mov");
        let b = video.join("CAM 2").join("CAM2_001.mov");
        fs::write(&a, b"original footage a").unwrap();
        fs::write(&b, b"original footage b").unwrap();
        fs::write(video.join("GRAPHICS/logo.png"), b"png").unwrap();
        (video, vec![a, b])
    }

    fn orchestrator(
        state_dir: &TempDir,
        converted_duration: f64,
        annotator: Arc<CountingAnnotator>,
    ) -> ProjectOrchestrator {
        let config = AppConfig {
            state_file: Some(state_dir.path().join("state.json")),
            ..Default::default()
        };
        ProjectOrchestrator::new(
            config,
            Arc::new(StubCompressor),
            Arc::new(StubProber { converted_duration }),
            annotator,
        )
    }

    fn wait_until_idle(orch: &ProjectOrchestrator) {
        for _ in 0..400 {
            if !orch.is_processing() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("worker did not finish within 4s");
    }

    #[test]
    fn full_run_compresses_verifies_and_cleans_up() {
        let media = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        let (video, inputs) = build_media_tree(&media);

        let annotator = Arc::new(CountingAnnotator {
            calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(&state, 60.0, Arc::clone(&annotator));

        let id = orch.create_project("wedding", inputs, PathBuf::new(), None, BTreeMap::new());
        let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        assert!(orch.start(Box::new(move |ev| sink.lock().unwrap().push(ev))));
        wait_until_idle(&orch);

        let entry = orch
            .list_projects()
            .into_iter()
            .find(|e| e.project.id == id)
            .unwrap();
        assert_eq!(entry.status, ProjectStatus::Completed);

        let stats = entry.results.unwrap();
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_failed, 0);
        let verification = stats.verification.unwrap();
        assert_eq!(verification.mismatches, 0);
        assert!(verification.originals_deleted);

        // Outputs mirrored into the fresh tree, staged originals gone
        assert!(video.join("CAM 1/CAM1_001_24mbps.mp4").is_file());
        assert!(video.join("CAM 2/CAM2_001_24mbps.mp4").is_file());
        assert!(video.join("GRAPHICS/logo.png").is_file());
        assert!(!video.parent().unwrap().join("01 VIDEO.old").exists());

        // Label applied once, on the folder containing the media root
        assert_eq!(annotator.calls.load(Ordering::SeqCst), 1);

        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, ProgressEvent::File { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::Project {
                status: ProjectStatus::Completed,
                ..
            }
        )));
    }

    #[test]
    fn verification_mismatch_keeps_staged_originals() {
        let media = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        let (video, inputs) = build_media_tree(&media);

        let annotator = Arc::new(CountingAnnotator {
            calls: AtomicUsize::new(0),
        });
        // Converted files probe 10 seconds short
        let orch = orchestrator(&state, 50.0, Arc::clone(&annotator));

        let id = orch.create_project("wedding", inputs, PathBuf::new(), None, BTreeMap::new());
        assert!(orch.start(Box::new(|_| {})));
        wait_until_idle(&orch);

        let entry = orch
            .list_projects()
            .into_iter()
            .find(|e| e.project.id == id)
            .unwrap();
        assert_eq!(entry.status, ProjectStatus::VerificationFailed);

        let verification = entry.results.unwrap().verification.unwrap();
        assert!(verification.mismatches > 0);
        assert!(!verification.originals_deleted);
        assert!(verification.skip_reason.is_some());

        // Staged tree intact, nothing labeled
        assert!(video.parent().unwrap().join("01 VIDEO.old").is_dir());
        assert_eq!(annotator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn inputs_outside_a_media_root_compress_to_the_output_dir() {
        let media = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        let input = media.path().join("holiday.mov");
        fs::write(&input, b"clip").unwrap();

        let annotator = Arc::new(CountingAnnotator {
            calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(&state, 60.0, annotator);

        let id = orch.create_project(
            "loose clips",
            vec![input],
            out.path().to_path_buf(),
            None,
            BTreeMap::new(),
        );
        assert!(orch.start(Box::new(|_| {})));
        wait_until_idle(&orch);

        let entry = orch
            .list_projects()
            .into_iter()
            .find(|e| e.project.id == id)
            .unwrap();
        assert_eq!(entry.status, ProjectStatus::Completed);
        // No staging happened, so no verification summary either
        assert!(entry.results.unwrap().verification.is_none());
        assert!(out.path().join("holiday_24mbps.mp4").is_file());
    }

    #[test]
    fn project_with_no_resolvable_inputs_fails() {
        let state = TempDir::new().unwrap();
        let annotator = Arc::new(CountingAnnotator {
            calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(&state, 60.0, annotator);

        let id = orch.create_project(
            "ghost",
            vec![PathBuf::from("/nonexistent/clip.mov")],
            PathBuf::new(),
            None,
            BTreeMap::new(),
        );
        assert!(orch.start(Box::new(|_| {})));
        wait_until_idle(&orch);

        let entry = orch
            .list_projects()
            .into_iter()
            .find(|e| e.project.id == id)
            .unwrap();
        assert_eq!(entry.status, ProjectStatus::Failed);
        assert!(entry.results.unwrap().error.is_some());
    }
}
