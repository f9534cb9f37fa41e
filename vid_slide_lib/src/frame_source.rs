use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_cmdline_utils::{DecodeOptions, RgbFrameStream, VideoInfo};
use image::RgbImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::definitions::STILL_IMAGE_EXTENSIONS;
use crate::{DecodeError, Frame, SourceError};

/// Options shared by every kind of frame source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOptions {
    /// Stop after yielding this many frames.
    pub max_frames: Option<u64>,
    /// Stop decoding a video after this many seconds.
    pub timeout_secs: Option<u64>,
}

/// An ordered, lazily decoded sequence of frames from a video or a directory of images.
///
/// Frames are produced one at a time; the sequence is finite and can only be
/// iterated once.
#[derive(Debug)]
pub enum FrameSequence {
    Video(VideoFrames),
    Images(ImageDirFrames),
}

impl FrameSequence {
    /// Open a video file for decoding.
    ///
    /// # Errors
    /// [`SourceError::Unavailable`] if the file does not exist, ffprobe cannot read it,
    /// it has no video stream, or ffmpeg cannot be started.
    pub fn open_video(path: impl AsRef<Path>, opts: SourceOptions) -> Result<Self, SourceError> {
        VideoFrames::open(path.as_ref(), opts).map(Self::Video)
    }

    /// Open a directory of still images. Images are decoded in lexicographic filename order.
    ///
    /// # Errors
    /// [`SourceError::Unavailable`] if the directory cannot be listed.
    pub fn open_directory(path: impl AsRef<Path>, opts: SourceOptions) -> Result<Self, SourceError> {
        ImageDirFrames::open(path.as_ref(), opts).map(Self::Images)
    }

    /// Number of inputs that could not be decoded and were skipped.
    pub fn decode_failures(&self) -> u64 {
        match self {
            Self::Video(_) => 0,
            Self::Images(images) => images.decode_failures(),
        }
    }
}

impl Iterator for FrameSequence {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        match self {
            Self::Video(video) => video.next(),
            Self::Images(images) => images.next(),
        }
    }
}

/// Frames decoded from a video by ffmpeg.
#[derive(Debug)]
pub struct VideoFrames {
    src_path: PathBuf,
    frames: RgbFrameStream,
    info: VideoInfo,
    max_frames: Option<u64>,
    next_index: u64,
    ended: bool,
}

impl VideoFrames {
    fn open(src_path: &Path, opts: SourceOptions) -> Result<Self, SourceError> {
        let unavailable = |reason: String| SourceError::Unavailable {
            path: src_path.to_path_buf(),
            reason,
        };

        if !src_path.is_file() {
            return Err(unavailable("not a file".to_string()));
        }

        let decode_opts = DecodeOptions {
            max_frames: opts.max_frames,
            timeout: opts.timeout_secs.map(Duration::from_secs),
        };
        let (frames, info) = RgbFrameStream::spawn(src_path, &decode_opts).map_err(|e| unavailable(e.to_string()))?;

        let (width, height) = info.resolution();
        match info.frame_count() {
            Some(count) => info!("Decoding {}: {width}x{height}, {count} frames", src_path.display()),
            None => info!("Decoding {}: {width}x{height}, unknown frame count", src_path.display()),
        }

        Ok(Self {
            src_path: src_path.to_path_buf(),
            frames,
            info,
            max_frames: opts.max_frames,
            next_index: 0,
            ended: false,
        })
    }

    /// Stream properties reported by ffprobe.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn log_end(&self) {
        let expected = match (self.info.frame_count(), self.max_frames) {
            (Some(count), Some(max)) => Some(count.min(max)),
            (count, max) => count.or(max),
        };

        match expected {
            Some(expected) if self.next_index < expected => warn!(
                "{}: decoding ended after {} of {expected} expected frames",
                self.src_path.display(),
                self.next_index
            ),
            _ => debug!("{}: decoded {} frames", self.src_path.display(), self.next_index),
        }
    }
}

impl Iterator for VideoFrames {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.ended {
            return None;
        }

        match self.frames.next() {
            Some(image) => {
                let frame = Frame::new(self.next_index, image);
                self.next_index += 1;
                Some(frame)
            }
            None => {
                self.ended = true;
                self.log_end();
                None
            }
        }
    }
}

/// Frames decoded from the still images in one directory.
#[derive(Debug)]
pub struct ImageDirFrames {
    paths: std::vec::IntoIter<PathBuf>,
    max_frames: Option<u64>,
    next_index: u64,
    decode_failures: u64,
}

impl ImageDirFrames {
    fn open(dir: &Path, opts: SourceOptions) -> Result<Self, SourceError> {
        let paths = list_still_images(dir)?;
        info!("Found {} images in {}", paths.len(), dir.display());

        Ok(Self {
            paths: paths.into_iter(),
            max_frames: opts.max_frames,
            next_index: 0,
            decode_failures: 0,
        })
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }
}

impl Iterator for ImageDirFrames {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.max_frames.is_some_and(|max| self.next_index >= max) {
            return None;
        }

        for path in self.paths.by_ref() {
            match decode_still_image(&path) {
                Ok(image) => {
                    let frame = Frame::new(self.next_index, image).with_src_path(path);
                    self.next_index += 1;
                    return Some(frame);
                }
                Err(e) => {
                    warn!("{e}, skipping");
                    self.decode_failures += 1;
                }
            }
        }

        None
    }
}

/// Decode one still image file to 8-bit RGB.
pub fn decode_still_image(path: &Path) -> Result<RgbImage, DecodeError> {
    image::open(path)
        .map(|image| image.to_rgb8())
        .map_err(|e| DecodeError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// List the still images directly inside `dir`, sorted lexicographically by file name.
///
/// Only regular files (or links to them) with one of the extensions in
/// [`STILL_IMAGE_EXTENSIONS`] are listed, compared case-insensitively. Sub-directories
/// are not searched.
///
/// The sort is a plain string comparison, so `img10.png` comes before `img2.png`.
pub fn list_still_images(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let unavailable = |reason: String| SourceError::Unavailable {
        path: dir.to_path_buf(),
        reason,
    };

    if !dir.is_dir() {
        return Err(unavailable("not a directory".to_string()));
    }

    let mut paths = vec![];
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| unavailable(e.to_string()))?;
        if entry.file_type().is_file() && has_still_image_extension(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(paths)
}

fn has_still_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| STILL_IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
