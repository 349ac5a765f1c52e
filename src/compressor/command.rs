use crate::config::CompressionSettings;
use std::path::Path;

/// Build the ffmpeg argument list for one compression run
pub fn build_ffmpeg_args(
    input: &Path,
    output: &Path,
    settings: &CompressionSettings,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
    ];

    args.extend([
        "-c:v".into(),
        settings.codec.clone(),
        "-profile:v".into(),
        settings.profile.clone(),
        "-preset".into(),
        settings.preset.clone(),
        "-crf".into(),
        settings.crf.to_string(),
        "-pix_fmt".into(),
        settings.pixel_format.clone(),
    ]);

    if !settings.x265_params.is_empty() {
        args.extend(["-x265-params".into(), settings.x265_params.clone()]);
    }

    args.extend([
        "-color_primaries".into(),
        settings.color_primaries.clone(),
        "-color_trc".into(),
        settings.color_trc.clone(),
        "-colorspace".into(),
        settings.colorspace.clone(),
    ]);

    args.extend(["-tag:v".into(), settings.tag.clone()]);
    if settings.faststart {
        args.extend(["-movflags".into(), "+faststart".into()]);
    }

    args.extend([
        "-c:a".into(),
        settings.audio_codec.clone(),
        "-b:a".into(),
        settings.audio_bitrate.clone(),
    ]);

    args.push(output.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn builds_x265_command() {
        let settings = CompressionSettings::default();
        let args = build_ffmpeg_args(
            &PathBuf::from("/in/a.mov"),
            &PathBuf::from("/out/a_24mbps.mp4"),
            &settings,
        );

        assert_eq!(args.last().map(String::as_str), Some("/out/a_24mbps.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx265"));
        assert!(joined.contains("-crf 12"));
        assert!(joined.contains("-tag:v hvc1"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(joined.contains("-b:a 320k"));
    }

    #[test]
    fn faststart_can_be_disabled() {
        let settings = CompressionSettings {
            faststart: false,
            ..Default::default()
        };
        let args = build_ffmpeg_args(
            &PathBuf::from("in.mov"),
            &PathBuf::from("out.mp4"),
            &settings,
        );
        assert!(!args.iter().any(|a| a == "-movflags"));
    }
}
