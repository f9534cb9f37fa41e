use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of the ffmpeg and ffprobe tools.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum FfmpegError {
    /// The tool could not be started because it is not installed or not on `PATH`.
    #[error("{0} not found. Make sure ffmpeg and ffprobe are installed and visible on the command line")]
    NotFound(String),

    #[error("{tool} IO error: {reason}")]
    Io { tool: String, reason: String },

    /// Nonzero exit. Holds the start of what the tool printed to stderr.
    #[error("{tool} failed: {stderr}")]
    Failed { tool: String, stderr: String },

    /// The tool did not exit within the given number of seconds and was killed.
    #[error("{tool} did not finish within {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    /// Usually means the input is an audio file or not a media file at all.
    #[error("ffprobe found no video stream with a usable resolution")]
    NoVideoStream,

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// The JSON printed by ffprobe could not be understood.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeError {
    #[error("ffprobe output is not valid: {0}")]
    Json(String),

    #[error("ffprobe reported a malformed {field}: {value}")]
    Field { field: String, value: String },

    /// Only quarter turns are supported.
    #[error("Unsupported video rotation: {0}")]
    Rotation(String),
}

impl From<serde_json::Error> for ProbeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string().chars().take(500).collect())
    }
}
