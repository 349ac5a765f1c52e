//! Persisted, sequential compression queue for media projects.
//!
//! Projects are batches of camera footage. Each one is compressed file by
//! file into a freshly staged copy of its media root, verified against the
//! originals with ffprobe, and only then is the staged-aside original tree
//! deleted.

pub mod compressor;
pub mod config;
pub mod error;
pub mod label;
pub mod orchestrator;
pub mod prober;
pub mod queue;
pub mod scan;
pub mod staging;
pub mod utils;
pub mod verifier;

pub use config::AppConfig;
pub use error::{AppError, ProbeError};
pub use orchestrator::{ProgressEvent, ProjectOrchestrator};
