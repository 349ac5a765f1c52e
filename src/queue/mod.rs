//! Two-level job queue: per-project file queues driven by a persisted,
//! sequential project queue.

pub mod file_queue;
pub mod job;
pub mod project;
pub mod project_queue;

pub use file_queue::{FileJobQueue, JobCounts};
pub use job::{CompressionResult, FileJob, JobStatus};
pub use project::{
    Project, ProjectCounts, ProjectOutcome, ProjectStats, ProjectStatus, VerificationSummary,
};
pub use project_queue::{ProjectEntry, ProjectQueue, QueueSummary};
