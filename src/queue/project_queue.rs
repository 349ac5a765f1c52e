use super::project::{Project, ProjectCounts, ProjectOutcome, ProjectStats, ProjectStatus};
use crate::error::AppError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn};

/// Handler that processes a single project
pub type ProcessProjectFn =
    Box<dyn Fn(&Project) -> (ProjectOutcome, ProjectStats) + Send + 'static>;

/// Progress callback: (project id, project, completed / total pending at start)
pub type QueueProgressFn = Box<dyn FnMut(&str, &Project, f64) + Send + 'static>;

/// Completion callback: receives whether every processed project succeeded
pub type QueueCompleteFn = Box<dyn FnOnce(bool) + Send + 'static>;

/// A project together with its queue status and results
#[derive(Debug, Clone, Serialize)]
pub struct ProjectEntry {
    #[serde(flatten)]
    pub project: Project,
    pub status: ProjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ProjectStats>,
}

/// Aggregate results across all completed projects
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueSummary {
    pub total_projects: usize,
    pub completed_projects: usize,
    pub failed_projects: usize,
    pub total_processing_secs: f64,
    pub total_files_processed: usize,
    pub total_input_size: u64,
    pub total_output_size: u64,
    pub total_size_reduction: i64,
    pub average_reduction_percent: f64,
}

#[derive(Debug, Default)]
struct QueueInner {
    projects: Vec<Project>,
    status: HashMap<String, ProjectStatus>,
    results: HashMap<String, ProjectStats>,
    current_index: i64,
}

/// Persisted snapshot of the whole queue
#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    projects: Vec<Project>,
    status: HashMap<String, ProjectStatus>,
    results: HashMap<String, ProjectStats>,
    current_index: i64,
    is_processing: bool,
    saved_at: String,
}

/// Persisted, ordered queue of projects processed one at a time by a single
/// background worker.
///
/// State is written back synchronously after every status transition, so a
/// crash at any point leaves a loadable snapshot behind. Reloaded state
/// never resumes mid-project: anything found `Processing` (or `Verifying`)
/// is demoted to `Pending`.
#[derive(Clone)]
pub struct ProjectQueue {
    inner: Arc<Mutex<QueueInner>>,
    processing: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    state_path: PathBuf,
}

impl ProjectQueue {
    pub fn new(state_path: PathBuf) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                current_index: -1,
                ..Default::default()
            })),
            processing: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            state_path,
        }
    }

    /// Add a project to the queue.
    ///
    /// Assigns a generation-ordered id, fills in name and creation timestamp
    /// when absent, sets status `Pending` and persists synchronously.
    pub fn add(&self, mut project: Project) -> String {
        let id = {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            let id = format!(
                "project_{}_{}",
                Utc::now().timestamp(),
                inner.projects.len()
            );
            project.id = id.clone();
            if project.name.is_empty() {
                project.name = format!("Project {}", inner.projects.len() + 1);
            }
            if project.created_at.is_empty() {
                project.created_at = Utc::now().to_rfc3339();
            }
            info!("Added project '{}' with ID {} to queue", project.name, id);
            inner.status.insert(id.clone(), ProjectStatus::Pending);
            inner.projects.push(project);
            id
        };
        self.persist();
        id
    }

    /// Remove a project. Rejected while the project is being processed.
    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            let Some(index) = inner.projects.iter().position(|p| p.id == id) else {
                warn!("Attempt to remove non-existent project {}", id);
                return false;
            };
            if matches!(
                inner.status.get(id),
                Some(ProjectStatus::Processing | ProjectStatus::Verifying)
            ) {
                warn!("Cannot remove project {} while it is being processed", id);
                return false;
            }
            inner.projects.remove(index);
            inner.status.remove(id);
            inner.results.remove(id);
            if (index as i64) < inner.current_index {
                inner.current_index -= 1;
            }
            info!("Removed project {}", id);
            true
        };
        if removed {
            self.persist();
        }
        removed
    }

    /// Move a project to a new position in the queue.
    ///
    /// Rejected for the currently-processing project; otherwise the active
    /// pointer is adjusted so it keeps referring to the same project.
    pub fn reorder(&self, id: &str, new_index: usize) -> bool {
        let moved = {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            let Some(index) = inner.projects.iter().position(|p| p.id == id) else {
                return false;
            };
            if new_index >= inner.projects.len() {
                return false;
            }
            if matches!(
                inner.status.get(id),
                Some(ProjectStatus::Processing | ProjectStatus::Verifying)
            ) {
                warn!("Cannot reorder project {} while it is being processed", id);
                return false;
            }

            let project = inner.projects.remove(index);
            inner.projects.insert(new_index, project);

            let current = inner.current_index;
            if current >= 0 {
                let (old, new) = (index as i64, new_index as i64);
                if old == current {
                    inner.current_index = new;
                } else if old < current && new >= current {
                    inner.current_index -= 1;
                } else if old > current && new <= current {
                    inner.current_index += 1;
                }
            }

            info!("Moved project {} from position {} to {}", id, index, new_index);
            true
        };
        if moved {
            self.persist();
        }
        moved
    }

    /// Clear all projects. Rejected while a run is active.
    pub fn clear(&self) -> bool {
        if self.processing.load(Ordering::SeqCst) {
            warn!("Cannot clear queue while processing projects");
            return false;
        }
        {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            inner.projects.clear();
            inner.status.clear();
            inner.results.clear();
            inner.current_index = -1;
        }
        info!("Project queue cleared");
        self.persist();
        true
    }

    pub fn get(&self, id: &str) -> Option<Project> {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner.projects.iter().find(|p| p.id == id).cloned()
    }

    /// All projects in queue order with status and results merged in
    pub fn list(&self) -> Vec<ProjectEntry> {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner
            .projects
            .iter()
            .map(|p| ProjectEntry {
                project: p.clone(),
                status: inner
                    .status
                    .get(&p.id)
                    .copied()
                    .unwrap_or(ProjectStatus::Pending),
                results: inner.results.get(&p.id).cloned(),
            })
            .collect()
    }

    pub fn status_of(&self, id: &str) -> Option<ProjectStatus> {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner.status.get(id).copied()
    }

    /// Transition the active project from `Processing` to `Verifying`.
    ///
    /// Only the worker that owns the project calls this; the transition is
    /// persisted immediately.
    pub fn mark_verifying(&self, id: &str) -> bool {
        let changed = {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            match inner.status.get(id) {
                Some(ProjectStatus::Processing) => {
                    inner.status.insert(id.to_string(), ProjectStatus::Verifying);
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.persist();
        }
        changed
    }

    pub fn queue_status(&self) -> ProjectCounts {
        let inner = self.inner.lock().expect("queue lock poisoned");
        let mut counts = ProjectCounts {
            total: inner.projects.len(),
            ..Default::default()
        };
        for status in inner.status.values() {
            match status {
                ProjectStatus::Pending => counts.pending += 1,
                ProjectStatus::Processing => counts.processing += 1,
                ProjectStatus::Verifying => counts.verifying += 1,
                ProjectStatus::Completed => counts.completed += 1,
                ProjectStatus::Failed => counts.failed += 1,
                ProjectStatus::Canceled => counts.canceled += 1,
                ProjectStatus::VerificationFailed => counts.verification_failed += 1,
            }
        }
        counts
    }

    /// Aggregate statistics across completed projects
    pub fn results_summary(&self) -> QueueSummary {
        let inner = self.inner.lock().expect("queue lock poisoned");
        let mut summary = QueueSummary {
            total_projects: inner.projects.len(),
            ..Default::default()
        };

        for (id, result) in &inner.results {
            match inner.status.get(id) {
                Some(ProjectStatus::Completed) => {
                    summary.completed_projects += 1;
                    summary.total_processing_secs += result.processing_secs;
                    summary.total_files_processed += result.files_processed;
                    summary.total_input_size += result.total_input_size;
                    summary.total_output_size += result.total_output_size;
                }
                Some(ProjectStatus::Failed) => summary.failed_projects += 1,
                _ => {}
            }
        }

        if summary.total_input_size > 0 {
            summary.total_size_reduction =
                summary.total_input_size as i64 - summary.total_output_size as i64;
            summary.average_reduction_percent =
                summary.total_size_reduction as f64 / summary.total_input_size as f64 * 100.0;
        }

        summary
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Save the queue state synchronously
    pub fn save_state(&self) -> Result<(), AppError> {
        let state = {
            let inner = self.inner.lock().expect("queue lock poisoned");
            PersistedState {
                projects: inner.projects.clone(),
                status: inner.status.clone(),
                results: inner.results.clone(),
                current_index: inner.current_index,
                is_processing: self.processing.load(Ordering::SeqCst),
                saved_at: Utc::now().to_rfc3339(),
            }
        };

        if let Some(parent) = self.state_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| AppError::State(format!("Failed to serialize queue state: {}", e)))?;
        std::fs::write(&self.state_path, json)?;
        Ok(())
    }

    /// Load queue state from disk.
    ///
    /// Load failures are treated optimistically as "no saved state": the
    /// queue starts empty and the error is logged. Any project found
    /// `Processing` or `Verifying` is demoted to `Pending`; no mid-project
    /// resume is ever attempted.
    pub fn load_state(&self) -> bool {
        if !self.state_path.exists() {
            info!("No queue state file found at {}", self.state_path.display());
            return false;
        }

        let state: PersistedState = match std::fs::read_to_string(&self.state_path)
            .map_err(AppError::from)
            .and_then(|content| {
                serde_json::from_str(&content)
                    .map_err(|e| AppError::State(format!("Failed to parse queue state: {}", e)))
            }) {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to load queue state: {}", e);
                return false;
            }
        };

        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.projects = state.projects;
        inner.status = state.status;
        inner.results = state.results;
        inner.current_index = state.current_index;

        if state.is_processing {
            warn!("Resetting processing flag from previous incomplete run");
        }
        for (id, status) in inner.status.iter_mut() {
            if matches!(
                status,
                ProjectStatus::Processing | ProjectStatus::Verifying
            ) {
                info!("Reset project {} status to pending after unclean shutdown", id);
                *status = ProjectStatus::Pending;
            }
        }

        info!(
            "Queue state loaded from {} with {} projects",
            self.state_path.display(),
            inner.projects.len()
        );
        true
    }

    /// Start the background worker.
    ///
    /// Refused when a run is already active, the queue is empty, or no
    /// project is `Pending`. Projects are processed strictly in queue order;
    /// a failed project never stops the run.
    pub fn start(
        &self,
        process_fn: ProcessProjectFn,
        mut on_progress: QueueProgressFn,
        on_complete: QueueCompleteFn,
    ) -> bool {
        if self.processing.swap(true, Ordering::SeqCst) {
            warn!("Project queue is already being processed");
            return false;
        }

        let start_index = {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            if inner.projects.is_empty() {
                warn!("Cannot process queue: project queue is empty");
                self.processing.store(false, Ordering::SeqCst);
                return false;
            }
            let first_pending = inner.projects.iter().position(|p| {
                matches!(inner.status.get(&p.id), Some(ProjectStatus::Pending))
            });
            let Some(index) = first_pending else {
                warn!("No pending projects found in queue");
                self.processing.store(false, Ordering::SeqCst);
                return false;
            };
            inner.current_index = index as i64;
            index
        };

        self.cancel.store(false, Ordering::SeqCst);
        self.persist();

        let queue = self.clone();
        std::thread::spawn(move || {
            let all_success = queue.run_loop(process_fn, &mut on_progress);
            queue.processing.store(false, Ordering::SeqCst);
            info!(
                "Project queue processing completed {}",
                if all_success { "successfully" } else { "with errors" }
            );
            queue.persist();
            on_complete(all_success);
        });

        info!("Started processing project queue at index {}", start_index);
        true
    }

    /// Request cancellation of the active run.
    ///
    /// Cooperative: observed at project boundaries (and within the active
    /// file queue when its cancel handle is shared). No new project starts
    /// after the flag is observed.
    pub fn cancel(&self) -> bool {
        if !self.processing.load(Ordering::SeqCst) {
            warn!("Cannot cancel: queue is not being processed");
            return false;
        }
        info!("Canceling project queue processing");
        self.cancel.store(true, Ordering::SeqCst);
        true
    }

    fn run_loop(
        &self,
        process_fn: ProcessProjectFn,
        on_progress: &mut QueueProgressFn,
    ) -> bool {
        let mut all_success = true;

        let total_pending = {
            let inner = self.inner.lock().expect("queue lock poisoned");
            inner
                .projects
                .iter()
                .skip(inner.current_index.max(0) as usize)
                .filter(|p| matches!(inner.status.get(&p.id), Some(ProjectStatus::Pending)))
                .count()
        };
        let mut completed_count = 0usize;

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            // Claim the next pending project, skipping anything else
            let claimed = {
                let mut inner = self.inner.lock().expect("queue lock poisoned");
                let mut index = inner.current_index.max(0) as usize;
                loop {
                    if index >= inner.projects.len() {
                        break None;
                    }
                    let id = inner.projects[index].id.clone();
                    if matches!(inner.status.get(&id), Some(ProjectStatus::Pending)) {
                        inner.current_index = index as i64;
                        inner.status.insert(id, ProjectStatus::Processing);
                        break Some((inner.projects[index].clone(), index));
                    }
                    index += 1;
                }
            };
            let Some((project, index)) = claimed else {
                break;
            };

            info!(
                "Processing project {}/{}: {} (ID: {})",
                index + 1,
                self.inner.lock().expect("queue lock poisoned").projects.len(),
                project.name,
                project.id
            );
            self.persist();

            let started = Instant::now();
            let (outcome, mut stats) = process_fn(&project);
            stats.processing_secs = started.elapsed().as_secs_f64();

            let cancelled = self.cancel.load(Ordering::SeqCst);
            let status = match outcome {
                ProjectOutcome::Completed => ProjectStatus::Completed,
                ProjectOutcome::VerificationFailed => ProjectStatus::VerificationFailed,
                ProjectOutcome::Failed if cancelled => {
                    if stats.error.is_none() {
                        stats.error = Some("Canceled by user".to_string());
                    }
                    ProjectStatus::Canceled
                }
                ProjectOutcome::Failed => ProjectStatus::Failed,
            };

            match status {
                ProjectStatus::Completed => info!(
                    "Successfully processed project {} in {:.2} seconds",
                    project.id, stats.processing_secs
                ),
                ProjectStatus::Canceled => {
                    info!("Processing of project {} was canceled by user", project.id)
                }
                _ => error!("Failed to process project {}", project.id),
            }
            if outcome != ProjectOutcome::Completed {
                all_success = false;
            }

            {
                let mut inner = self.inner.lock().expect("queue lock poisoned");
                inner.status.insert(project.id.clone(), status);
                inner.results.insert(project.id.clone(), stats);
                inner.current_index += 1;
            }
            self.persist();

            completed_count += 1;
            if total_pending > 0 {
                on_progress(
                    &project.id,
                    &project,
                    completed_count as f64 / total_pending as f64,
                );
            }
        }

        // Cancellation marks everything that never started
        if self.cancel.load(Ordering::SeqCst) {
            info!("Queue processing was canceled");
            {
                let mut inner = self.inner.lock().expect("queue lock poisoned");
                let from = inner.current_index.max(0) as usize;
                let ids: Vec<String> = inner
                    .projects
                    .iter()
                    .skip(from)
                    .map(|p| p.id.clone())
                    .collect();
                for id in ids {
                    if matches!(inner.status.get(&id), Some(ProjectStatus::Pending)) {
                        inner.status.insert(id, ProjectStatus::Canceled);
                    }
                }
            }
            self.persist();
        }

        all_success
    }

    fn persist(&self) {
        if let Err(e) = self.save_state() {
            error!("Failed to save queue state: {}", e);
        }
    }
}
