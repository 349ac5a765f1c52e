use serde::{Deserialize, Serialize};

/// Compression settings handed to the compressor for every file in a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Video codec
    pub codec: String,
    /// Encoder profile
    pub profile: String,
    /// Encoding speed/quality tradeoff
    pub preset: String,
    /// Constant Rate Factor (quality-based)
    pub crf: u8,
    /// Extra x265 parameters
    pub x265_params: String,
    /// Pixel format
    pub pixel_format: String,
    /// Color primaries
    pub color_primaries: String,
    /// Color transfer characteristics
    pub color_trc: String,
    /// Color space
    pub colorspace: String,
    /// Codec tag written into the container
    pub tag: String,
    /// Whether to enable faststart for streaming-friendly output
    pub faststart: bool,
    /// Audio codec
    pub audio_codec: String,
    /// Audio bitrate
    pub audio_bitrate: String,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            codec: "libx265".to_string(),
            profile: "main10".to_string(),
            preset: "medium".to_string(),
            crf: 12,
            x265_params: "profile=main10".to_string(),
            pixel_format: "yuv420p10le".to_string(),
            color_primaries: "bt709".to_string(),
            color_trc: "bt709".to_string(),
            colorspace: "bt709".to_string(),
            tag: "hvc1".to_string(),
            faststart: true,
            audio_codec: "aac".to_string(),
            audio_bitrate: "320k".to_string(),
        }
    }
}

/// Output naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Suffix appended to the output filename stem
    pub suffix: String,
    /// Output container format
    pub container: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: "_24mbps".to_string(),
            container: "mp4".to_string(),
        }
    }
}

/// Stage-aside configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Name of the media root directory that gets staged aside
    pub media_root: String,
    /// Suffix appended to the staged-aside directory name
    pub stage_suffix: String,
    /// Subfolders whose name contains this pattern hold camera footage and
    /// are not copied into the fresh tree
    pub camera_pattern: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            media_root: "01 VIDEO".to_string(),
            stage_suffix: ".old".to_string(),
            camera_pattern: "CAM".to_string(),
        }
    }
}

/// Finder label annotation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Whether to annotate the project folder after a verified run
    pub enabled: bool,
    /// Label color applied on success
    pub success_color: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            success_color: "Green".to_string(),
        }
    }
}
