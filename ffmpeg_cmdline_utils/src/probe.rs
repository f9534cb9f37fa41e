use std::{ffi::OsStr, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::process::Tool;
use crate::{FfmpegError, ProbeError};

const FFPROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Stream properties of a video, as reported by ffprobe.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize, Default)]
pub struct VideoInfo {
    duration: Duration,
    file_size: u64,
    resolution: (u32, u32),
    frame_count: Option<u64>,
}

impl VideoInfo {
    /// Run ffprobe on `src_path` and describe its first video stream.
    ///
    /// # Errors
    /// * ffprobe is missing, fails or times out.
    /// * ffprobe's output cannot be parsed.
    pub fn probe(src_path: impl AsRef<Path>) -> Result<Self, FfmpegError> {
        let json = probe_json(src_path)?;
        Ok(Self::from_ffprobe_json(&json)?)
    }

    /// Parse the output of `ffprobe -show_format -show_streams -print_format json`.
    ///
    /// A file without a video stream parses successfully with a `(0, 0)` resolution.
    pub fn from_ffprobe_json(json: &str) -> Result<Self, ProbeError> {
        let output: ProbeOutput = serde_json::from_str(json)?;

        let duration = match output.format.duration {
            Some(secs) => Duration::try_from_secs_f64(secs.parse_f64("duration")?).unwrap_or_default(),
            None => Duration::ZERO,
        };
        let file_size = output.format.size.map(|size| size.parse_u64("size")).transpose()?.unwrap_or(0);

        let Some(video) = output.streams.iter().find(|stream| stream.is_video()) else {
            return Ok(Self {
                duration,
                file_size,
                ..Self::default()
            });
        };

        let width = u32::try_from(video.width.unwrap_or(0)).unwrap_or(0);
        let height = u32::try_from(video.height.unwrap_or(0)).unwrap_or(0);

        //ffmpeg rotates frames as it decodes them, but ffprobe reports the stored (unrotated) size
        let resolution = if video.rotation()?.is_quarter_turn() {
            (height, width)
        } else {
            (width, height)
        };

        //containers that do not index their frames report no count, or zero
        let frame_count = video
            .nb_frames
            .as_ref()
            .and_then(|n| n.parse_u64("nb_frames").ok())
            .filter(|&n| n > 0);

        Ok(Self {
            duration,
            file_size,
            resolution,
            frame_count,
        })
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Size of the file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Width and height of the decoded frames, after any rotation declared in the metadata.
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Number of frames in the first video stream, if the container records it.
    pub fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }
}

/// Run ffprobe on a file and return its JSON description of the container and streams.
pub fn probe_json(src_path: impl AsRef<Path>) -> Result<String, FfmpegError> {
    #[rustfmt::skip]
    let args = [
        OsStr::new("-v"),            OsStr::new("quiet"),
        OsStr::new("-show_format"),
        OsStr::new("-show_streams"),
        OsStr::new("-print_format"), OsStr::new("json"),
        src_path.as_ref().as_os_str(),
    ];

    let stdout = Tool::Ffprobe.run(args, FFPROBE_TIMEOUT)?;
    String::from_utf8(stdout).map_err(|e| ProbeError::Json(e.to_string()).into())
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<NumberOrString>,
    size: Option<NumberOrString>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u64>,
    height: Option<u64>,
    nb_frames: Option<NumberOrString>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
    #[serde(default)]
    tags: StreamTags,
}

#[derive(Debug, Deserialize)]
struct SideData {
    rotation: Option<NumberOrString>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamTags {
    rotate: Option<NumberOrString>,
}

impl ProbeStream {
    fn is_video(&self) -> bool {
        self.codec_type.as_deref() == Some("video")
    }

    // newer ffprobe reports a display matrix in the side data, older ones a tag
    fn rotation(&self) -> Result<Rotation, ProbeError> {
        let declared = self
            .side_data_list
            .iter()
            .find_map(|side_data| side_data.rotation.as_ref())
            .or(self.tags.rotate.as_ref());

        match declared {
            None => Ok(Rotation::default()),
            Some(value) => value
                .parse_i64("rotation")
                .ok()
                .and_then(Rotation::from_degrees)
                .ok_or_else(|| ProbeError::Rotation(value.to_string())),
        }
    }
}

/// ffprobe prints some numeric fields (durations, nb_frames) as JSON strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(serde_json::Number),
    String(String),
}

impl NumberOrString {
    fn malformed(&self, field: &str) -> ProbeError {
        ProbeError::Field {
            field: field.to_string(),
            value: self.to_string(),
        }
    }

    fn parse_u64(&self, field: &str) -> Result<u64, ProbeError> {
        match self {
            Self::Number(n) => n.as_u64(),
            Self::String(s) => s.trim().parse().ok(),
        }
        .ok_or_else(|| self.malformed(field))
    }

    fn parse_i64(&self, field: &str) -> Result<i64, ProbeError> {
        match self {
            Self::Number(n) => n.as_i64(),
            Self::String(s) => s.trim().parse().ok(),
        }
        .ok_or_else(|| self.malformed(field))
    }

    fn parse_f64(&self, field: &str) -> Result<f64, ProbeError> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::String(s) => s.trim().parse().ok(),
        }
        .ok_or_else(|| self.malformed(field))
    }
}

impl std::fmt::Display for NumberOrString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
enum Rotation {
    #[default]
    Upright,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Upright),
            90 => Some(Self::Quarter),
            180 => Some(Self::Half),
            270 => Some(Self::ThreeQuarter),
            _ => None,
        }
    }

    fn is_quarter_turn(self) -> bool {
        matches!(self, Self::Quarter | Self::ThreeQuarter)
    }
}
