pub mod ffprobe;

pub use ffprobe::FfprobeProber;

use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extracted media properties for one file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaProperties {
    /// Container format name
    pub format_name: Option<String>,
    /// Container duration in seconds
    pub duration: f64,
    pub video_streams: Vec<VideoStreamProps>,
    pub audio_streams: Vec<AudioStreamProps>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoStreamProps {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Frame rate parsed from the rational form
    pub frame_rate: f64,
    /// Original rational string kept for reporting
    pub frame_rate_raw: String,
    pub codec_name: Option<String>,
    /// Stream duration in seconds
    pub duration: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioStreamProps {
    pub channels: Option<u32>,
    pub codec_name: Option<String>,
    pub sample_rate: Option<u32>,
    /// Stream duration in seconds
    pub duration: f64,
}

impl MediaProperties {
    /// Duration of the primary video stream, falling back to the container
    pub fn video_duration(&self) -> f64 {
        self.video_streams
            .first()
            .map(|s| s.duration)
            .unwrap_or(self.duration)
    }
}

/// Collaborator that extracts media properties from a file.
///
/// Implementations are expected to enforce their own timeouts; the engine
/// does not wrap probe calls with any.
pub trait MediaProber: Send + Sync {
    /// Whether the probing tool can be invoked at all
    fn is_available(&self) -> bool;

    /// Probe one media file
    fn probe(&self, path: &Path) -> Result<MediaProperties, ProbeError>;
}
