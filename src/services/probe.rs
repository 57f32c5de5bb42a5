// src/services/probe.rs
//
// Media Probing
//
// Extracts catalog metadata (title, size, duration, dimensions, frame rate)
// from a video file.
//
// RULES:
// - Filesystem facts always come from the file itself
// - Stream facts come from `ffprobe`; when it is missing or fails the item is
//   still cataloged with those fields unknown
// - A missing `ffprobe` binary is reported once, not per file

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::MediaInfo;
use crate::error::{AppError, AppResult};

/// Extracts catalog metadata from a video file
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> AppResult<MediaInfo>;
}

pub(crate) fn modified_at(metadata: &fs::Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

// ---------------------------------------------------------------------
// Filesystem probe
// ---------------------------------------------------------------------

/// Filesystem-only probe: size, mtime and a title from the file name.
/// Duration and dimensions stay unknown until a player reports them.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicProbe;

impl MediaProbe for BasicProbe {
    fn probe(&self, path: &Path) -> AppResult<MediaInfo> {
        let metadata = fs::metadata(path)?;
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| AppError::Other(format!("No file name in {:?}", path)))?;

        Ok(MediaInfo {
            path: path.to_path_buf(),
            title,
            size: metadata.len(),
            duration_ms: None,
            width: 0,
            height: 0,
            frame_rate: 0.0,
            thumbnail_path: None,
            modified_at: modified_at(&metadata),
        })
    }
}

// ---------------------------------------------------------------------
// ffprobe
// ---------------------------------------------------------------------

/// Stream facts read from `ffprobe` JSON output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamInfo {
    pub duration_ms: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

impl StreamInfo {
    fn apply(self, info: &mut MediaInfo) {
        info.duration_ms = self.duration_ms;
        info.width = self.width;
        info.height = self.height;
        info.frame_rate = self.frame_rate;
    }
}

/// Probe that runs `ffprobe` on top of [`BasicProbe`]
pub struct FfprobeProbe {
    binary: String,
    missing_reported: AtomicBool,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            missing_reported: AtomicBool::new(false),
        }
    }

    fn run(&self, path: &Path) -> AppResult<StreamInfo> {
        let file = path
            .to_str()
            .ok_or_else(|| AppError::Other(format!("Path is not UTF-8: {:?}", path)))?;

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
                file,
            ])
            .output()?;

        if !output.status.success() {
            return Err(AppError::Other(format!(
                "{} exited with {}",
                self.binary, output.status
            )));
        }

        let json = std::str::from_utf8(&output.stdout)
            .map_err(|_| AppError::Other("ffprobe output is not UTF-8".to_string()))?;
        parse_ffprobe_output(json)
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> AppResult<MediaInfo> {
        let mut info = BasicProbe.probe(path)?;

        match self.run(path) {
            Ok(stream) => stream.apply(&mut info),
            Err(AppError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                if !self.missing_reported.swap(true, Ordering::Relaxed) {
                    log::warn!(
                        "{} not found; durations and dimensions will stay unknown",
                        self.binary
                    );
                }
            }
            Err(e) => log::debug!("ffprobe gave nothing for {:?}: {}", path, e),
        }

        Ok(info)
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
///
/// The container duration wins over the stream duration. Durations are
/// seconds, either as strings or numbers. Frame rates are `num/den` strings.
pub fn parse_ffprobe_output(json: &str) -> AppResult<StreamInfo> {
    let json: Value = serde_json::from_str(json)?;
    let stream = json["streams"]
        .as_array()
        .and_then(|streams| streams.first())
        .cloned()
        .unwrap_or(Value::Null);

    let duration_ms = seconds_to_ms(&json["format"]["duration"])
        .or_else(|| seconds_to_ms(&stream["duration"]));

    let frame_rate = ratio(&stream["avg_frame_rate"])
        .or_else(|| ratio(&stream["r_frame_rate"]))
        .unwrap_or(0.0);

    Ok(StreamInfo {
        duration_ms,
        width: dimension(&stream["width"]),
        height: dimension(&stream["height"]),
        frame_rate,
    })
}

fn seconds_to_ms(value: &Value) -> Option<u64> {
    let seconds = match value {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    if seconds.is_finite() && seconds > 0.0 {
        Some((seconds * 1000.0).round() as u64)
    } else {
        None
    }
}

fn ratio(value: &Value) -> Option<f64> {
    let (num, den) = value.as_str()?.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    // "0/0" means unknown
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

fn dimension(value: &Value) -> u32 {
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "24000/1001",
                "avg_frame_rate": "24000/1001",
                "duration": "120.000000"
            }
        ],
        "format": {
            "filename": "movie.mkv",
            "duration": "5400.250000"
        }
    }"#;

    #[test]
    fn test_parse_reads_container_duration_and_stream_shape() {
        let stream = parse_ffprobe_output(SAMPLE).unwrap();

        assert_eq!(stream.duration_ms, Some(5_400_250));
        assert_eq!(stream.width, 1920);
        assert_eq!(stream.height, 1080);
        assert!((stream.frame_rate - 23.976).abs() < 0.001);
    }

    #[test]
    fn test_parse_falls_back_to_stream_values() {
        let json = r#"{
            "streams": [
                { "width": 640, "height": 360, "avg_frame_rate": "0/0", "r_frame_rate": "30/1", "duration": 12.5 }
            ],
            "format": {}
        }"#;

        let stream = parse_ffprobe_output(json).unwrap();

        assert_eq!(stream.duration_ms, Some(12_500));
        assert_eq!(stream.frame_rate, 30.0);
    }

    #[test]
    fn test_parse_without_video_stream_leaves_fields_unknown() {
        let stream = parse_ffprobe_output(r#"{ "streams": [], "format": { "duration": "N/A" } }"#).unwrap();

        assert_eq!(stream, StreamInfo::default());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_ffprobe_output("not json"),
            Err(AppError::Serialization(_))
        ));
    }

    #[test]
    fn test_filesystem_facts_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Holiday Clip.mp4");
        fs::write(&path, vec![0u8; 2048]).unwrap();

        let info = BasicProbe.probe(&path).unwrap();

        assert_eq!(info.title, "Holiday Clip");
        assert_eq!(info.size, 2048);
        assert_eq!(info.duration_ms, None);
    }

    #[test]
    fn test_missing_binary_falls_back_to_filesystem_facts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        fs::write(&path, vec![0u8; 64]).unwrap();
        let probe = FfprobeProbe::new("nextplayer-no-such-ffprobe");

        let first = probe.probe(&path).unwrap();
        let second = probe.probe(&path).unwrap();

        assert_eq!(first.size, 64);
        assert_eq!(first.duration_ms, None);
        assert_eq!(second.title, "clip");
        assert!(probe.missing_reported.load(Ordering::Relaxed));
    }

    #[test]
    fn test_unreadable_output_keeps_filesystem_facts() {
        // `true` exits successfully with empty output
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        fs::write(&path, vec![0u8; 64]).unwrap();

        if Command::new("true").output().is_err() {
            return;
        }
        let info = FfprobeProbe::new("true").probe(&path).unwrap();

        assert_eq!(info.size, 64);
        assert_eq!(info.width, 0);
    }
}
