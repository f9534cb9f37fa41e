use std::path::{Path, PathBuf};

use image::RgbImage;

/// One decoded image from a video or a directory of stills, together with its position in
/// the sequence it came from.
///
/// The pixel data is an interleaved 8-bit RGB buffer. Frames are never modified once
/// produced; ownership moves downstream through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    index: u64,
    image: RgbImage,
    src_path: Option<PathBuf>,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self {
            index,
            image,
            src_path: None,
        }
    }

    /// Build a frame from a raw rgb24 buffer. Returns `None` if the buffer is too short
    /// for the given dimensions.
    pub fn from_raw(index: u64, width: u32, height: u32, buf: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, buf).map(|image| Self::new(index, image))
    }

    /// Record the file this frame was decoded from.
    #[must_use]
    pub fn with_src_path(mut self, src_path: impl Into<PathBuf>) -> Self {
        self.src_path = Some(src_path.into());
        self
    }

    /// Zero based position of this frame in its source sequence.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn src_path(&self) -> Option<&Path> {
        self.src_path.as_deref()
    }

    /// The frame's pixel data, interleaved RGB, row major.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// A human readable name for log messages: the source path if known, otherwise the index.
    pub fn describe(&self) -> String {
        match &self.src_path {
            Some(path) => format!("frame {} ({})", self.index, path.display()),
            None => format!("frame {}", self.index),
        }
    }
}
