//! A thin wrapper around the `ffmpeg` and `ffprobe` command line tools.
//!
//! Frames are decoded by spawning ffmpeg with a rawvideo rgb24 pipe on stdout and reading
//! exactly one frame's worth of bytes at a time, so only one frame is ever held in memory.
//! Stream properties (resolution, rotation, duration, frame count) come from ffprobe's JSON
//! output.
//!
//! Both tools must be installed and visible on the command line. Use
//! [`ffmpeg_and_ffprobe_are_callable`] to check before starting any work.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]

mod decode;
mod errors;
mod probe;
mod process;

pub use decode::{DecodeOptions, RgbFrameStream};
pub use errors::{FfmpegError, ProbeError};
pub use probe::{probe_json, VideoInfo};
pub use process::ffmpeg_and_ffprobe_are_callable;
