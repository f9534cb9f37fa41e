use std::{
    ffi::OsString,
    io::Read,
    path::Path,
    process::{Child, ChildStdout},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use image::RgbImage;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::process::{reap, Tool};
use crate::{FfmpegError, VideoInfo};

// refuse frames larger than this rather than allocate for a corrupt resolution
const MAX_FRAME_BYTES: usize = 1 << 30;

/// Limits applied while decoding a video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Stop yielding frames this long after ffmpeg was started, even if ffmpeg is
    /// stuck in the middle of a frame.
    pub timeout: Option<Duration>,
}

#[derive(Debug)]
enum FramePipe {
    Direct(ChildStdout),
    // filled by a reader thread, so waiting for a frame can give up at the deadline
    Watched { frames: Receiver<Vec<u8>>, deadline: Instant },
    Closed,
}

impl FramePipe {
    fn new(stdout: Option<ChildStdout>, frame_bytes: usize, deadline: Option<Instant>) -> Self {
        match (stdout, deadline) {
            (None, _) => Self::Closed,
            (Some(stdout), None) => Self::Direct(stdout),
            (Some(stdout), Some(deadline)) => Self::Watched {
                frames: read_frames_on_thread(stdout, frame_bytes),
                deadline,
            },
        }
    }

    fn next_frame(&mut self, frame_bytes: usize) -> Result<Vec<u8>, String> {
        match self {
            Self::Direct(stdout) => {
                let mut buf = vec![0u8; frame_bytes];
                stdout.read_exact(&mut buf).map_err(|e| format!("pipe closed ({e})"))?;
                Ok(buf)
            }
            Self::Watched { frames, deadline } => {
                match frames.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(buf) => Ok(buf),
                    Err(RecvTimeoutError::Timeout) => Err("timed out waiting for a frame".to_string()),
                    Err(RecvTimeoutError::Disconnected) => Err("pipe closed".to_string()),
                }
            }
            Self::Closed => Err("no pipe".to_string()),
        }
    }
}

// The thread exits when the pipe closes or the receiver is dropped.
fn read_frames_on_thread(mut pipe: impl Read + Send + 'static, frame_bytes: usize) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::sync_channel(0);
    thread::spawn(move || loop {
        let mut buf = vec![0u8; frame_bytes];
        if pipe.read_exact(&mut buf).is_err() || tx.send(buf).is_err() {
            break;
        }
    });
    rx
}

/// The decoded frames of one video, in presentation order, as 8-bit RGB images.
///
/// ffmpeg writes raw rgb24 frames to a pipe and each call to `next` reads exactly one
/// frame from it. With a timeout the pipe is read on a separate thread, which holds at
/// most one frame ahead. The stream ends when ffmpeg closes
/// the pipe, a frame is cut short, the frame limit is reached or the timeout passes.
/// Once ended it stays ended.
///
/// Dropping the stream kills ffmpeg if it is still running.
#[derive(Debug)]
pub struct RgbFrameStream {
    ffmpeg: Child,
    pipe: FramePipe,
    width: u32,
    height: u32,
    frame_bytes: usize,
    remaining: u64,
    deadline: Option<Instant>,
    frames_read: u64,
    ended: bool,
}

impl RgbFrameStream {
    /// Probe `src_path` with ffprobe, then start ffmpeg decoding it.
    ///
    /// The stream yields at most the smaller of `opts.max_frames` and the frame count
    /// ffprobe reports; if neither is known it runs until ffmpeg stops.
    ///
    /// # Errors
    /// * Any ffprobe failure (see [`VideoInfo::probe`]).
    /// * [`FfmpegError::NoVideoStream`] if the file has no video or a zero resolution.
    /// * ffmpeg cannot be started.
    pub fn spawn(src_path: impl AsRef<Path>, opts: &DecodeOptions) -> Result<(Self, VideoInfo), FfmpegError> {
        let src_path = src_path.as_ref();
        let info = VideoInfo::probe(src_path)?;

        let (width, height) = info.resolution();
        let frame_bytes = usize::try_from(u64::from(width) * u64::from(height) * 3)
            .ok()
            .filter(|&bytes| bytes > 0 && bytes <= MAX_FRAME_BYTES)
            .ok_or(FfmpegError::NoVideoStream)?;

        let remaining = match (opts.max_frames, info.frame_count()) {
            (Some(max), Some(count)) => max.min(count),
            (max, count) => max.or(count).unwrap_or(u64::MAX),
        };

        let args = ffmpeg_args(src_path, opts.max_frames);
        trace!(
            "ffmpeg {}",
            args.iter().map(|arg| arg.to_string_lossy()).collect::<Vec<_>>().join(" ")
        );
        let ffmpeg = Tool::Ffmpeg.spawn(&args, true)?;

        Ok((Self::from_child(ffmpeg, (width, height), frame_bytes, remaining, opts.timeout), info))
    }

    fn from_child(
        mut ffmpeg: Child,
        (width, height): (u32, u32),
        frame_bytes: usize,
        remaining: u64,
        timeout: Option<Duration>,
    ) -> Self {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let pipe = FramePipe::new(ffmpeg.stdout.take(), frame_bytes, deadline);

        Self {
            ffmpeg,
            pipe,
            width,
            height,
            frame_bytes,
            remaining,
            deadline,
            frames_read: 0,
            ended: false,
        }
    }

    /// Width and height of every frame in the stream.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    fn end(&mut self, why: &str) {
        if !self.ended {
            debug!("ffmpeg stream ended after {} frames: {why}", self.frames_read);
            self.ended = true;
            self.pipe = FramePipe::Closed;
            reap(&mut self.ffmpeg);
        }
    }
}

fn ffmpeg_args(src_path: &Path, max_frames: Option<u64>) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostats", "-nostdin", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(src_path.into());

    if let Some(max_frames) = max_frames {
        args.push(OsString::from("-frames:v"));
        args.push(OsString::from(max_frames.to_string()));
    }

    args.extend(
        ["-an", "-pix_fmt", "rgb24", "-c:v", "rawvideo", "-f", "image2pipe", "-"]
            .into_iter()
            .map(OsString::from),
    );
    args
}

impl Iterator for RgbFrameStream {
    type Item = RgbImage;

    fn next(&mut self) -> Option<RgbImage> {
        if self.ended {
            return None;
        }
        if self.remaining == 0 {
            self.end("frame limit reached");
            return None;
        }
        if self.deadline.is_some_and(|deadline| Instant::now() > deadline) {
            self.end("timed out");
            return None;
        }

        let buf = match self.pipe.next_frame(self.frame_bytes) {
            Ok(buf) => buf,
            Err(why) => {
                self.end(&why);
                return None;
            }
        };

        self.remaining -= 1;
        self.frames_read += 1;
        RgbImage::from_raw(self.width, self.height, buf)
    }
}

impl Drop for RgbFrameStream {
    fn drop(&mut self) {
        reap(&mut self.ffmpeg);
    }
}
