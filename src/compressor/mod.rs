pub mod command;
pub mod ffmpeg;

pub use ffmpeg::FfmpegCompressor;

use crate::config::CompressionSettings;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Per-file progress callback, fed values in [0.0, 1.0]
pub type FileProgressFn<'a> = &'a mut dyn FnMut(f32);

/// Outcome of one compression run
#[derive(Debug)]
pub enum CompressOutcome {
    /// Compression completed successfully
    Success,
    /// Compression was cancelled; partial output has been removed
    Cancelled,
    /// Compression failed; partial output has been removed
    Error(String),
}

/// Collaborator that transcodes a single file.
///
/// Implementations must delete partial output on failure or cancellation,
/// and should poll `cancel` during the run to support mid-file cancellation.
pub trait Compressor: Send + Sync {
    fn compress(
        &self,
        input: &Path,
        output: &Path,
        settings: &CompressionSettings,
        on_progress: FileProgressFn,
        cancel: &Arc<AtomicBool>,
    ) -> CompressOutcome;
}
