use super::{AudioStreamProps, MediaProber, MediaProperties, VideoStreamProps};
use crate::error::ProbeError;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::error;

/// Probes media files by shelling out to ffprobe
#[derive(Debug, Default)]
pub struct FfprobeProber;

impl FfprobeProber {
    pub fn new() -> Self {
        Self
    }
}

impl MediaProber for FfprobeProber {
    fn is_available(&self) -> bool {
        match Command::new("ffprobe").arg("-version").output() {
            Ok(_) => true,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    error!("ffprobe command not found in PATH");
                }
                false
            }
        }
    }

    fn probe(&self, path: &Path) -> Result<MediaProperties, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::FileNotFound(path.to_path_buf()));
        }

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::ToolNotFound
                } else {
                    ProbeError::Failed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::Failed(format!(
                "ffprobe error for {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        let raw: FfprobeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProbeError::Parse(e.to_string()))?;

        Ok(extract_properties(raw))
    }
}

fn extract_properties(raw: FfprobeOutput) -> MediaProperties {
    let format_duration = raw
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let mut props = MediaProperties {
        format_name: raw.format.and_then(|f| f.format_name),
        duration: format_duration,
        video_streams: Vec::new(),
        audio_streams: Vec::new(),
    };

    for stream in raw.streams {
        match stream.codec_type.as_deref() {
            Some("video") => {
                let rate_raw = stream.r_frame_rate.clone().unwrap_or_else(|| "0/1".into());
                props.video_streams.push(VideoStreamProps {
                    width: stream.width,
                    height: stream.height,
                    frame_rate: parse_frame_rate(&rate_raw),
                    frame_rate_raw: rate_raw,
                    codec_name: stream.codec_name,
                    duration: stream
                        .duration
                        .as_deref()
                        .and_then(|d| d.parse().ok())
                        .unwrap_or(0.0),
                });
            }
            Some("audio") => {
                props.audio_streams.push(AudioStreamProps {
                    channels: stream.channels,
                    codec_name: stream.codec_name,
                    sample_rate: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
                    duration: stream
                        .duration
                        .as_deref()
                        .and_then(|d| d.parse().ok())
                        .unwrap_or(0.0),
                });
            }
            _ => {}
        }
    }

    // Some containers report stream durations only at format level
    if format_duration > 0.0 {
        if let Some(first) = props.video_streams.first_mut()
            && first.duration == 0.0
        {
            first.duration = format_duration;
        }
        for audio in &mut props.audio_streams {
            if audio.duration == 0.0 {
                audio.duration = format_duration;
            }
        }
    }

    props
}

/// Parse a frame rate like "30000/1001" into a float
fn parse_frame_rate(rate_str: &str) -> f64 {
    let parts: Vec<&str> = rate_str.split('/').collect();
    if parts.len() == 2 {
        let num = parts[0].parse::<f64>().unwrap_or(0.0);
        let den = parts[1].parse::<f64>().unwrap_or(0.0);
        if den != 0.0 {
            return num / den;
        }
    }
    0.0
}

// JSON deserialization structures

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<RawStream>,
    format: Option<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    duration: Option<String>,
}
