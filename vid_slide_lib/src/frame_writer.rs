use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use image::{codecs::jpeg::JpegEncoder, ImageError, ImageFormat};
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::definitions::{DEFAULT_FRAME_JPEG_QUALITY, FRAME_FILE_PREFIX, FRAME_NUMBER_WIDTH};
use crate::{list_still_images, ConfigError, EncodeError, Frame, SourceError};

/// Image format for frames written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameFormat {
    #[default]
    Png,
    Jpeg { quality: u8 },
}

impl FrameFormat {
    /// JPEG with the given quality, which must be between 1 and 100.
    pub fn jpeg(quality: u8) -> Result<Self, ConfigError> {
        if (1..=100).contains(&quality) {
            Ok(Self::Jpeg { quality })
        } else {
            Err(ConfigError::InvalidJpegQuality(quality))
        }
    }

    /// JPEG at the highest quality.
    pub fn jpeg_default() -> Self {
        Self::Jpeg {
            quality: DEFAULT_FRAME_JPEG_QUALITY,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
        }
    }
}

/// Writes frames to a directory as `img00001.png`, `img00002.png`, ...
///
/// Numbers start at 1 and follow the order frames are written. A number is only used
/// up by a successful write, so the files on disk are always contiguously numbered.
#[derive(Debug)]
pub struct FrameWriter {
    dir: PathBuf,
    format: FrameFormat,
    next_number: u64,
}

impl FrameWriter {
    /// Create `dir` (and any missing parents) and prepare to write frames into it.
    ///
    /// # Errors
    /// [`SourceError::OutputUnavailable`] if the directory cannot be created.
    pub fn new(dir: impl AsRef<Path>, format: FrameFormat) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| SourceError::OutputUnavailable {
            path: dir.to_path_buf(),
            source,
        })?;

        if list_still_images(dir).is_ok_and(|existing| !existing.is_empty()) {
            warn!(
                "{} already contains images; they may be mixed up with the frames written now",
                dir.display()
            );
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            format,
            next_number: 1,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Number of frames successfully written so far.
    pub fn written(&self) -> u64 {
        self.next_number - 1
    }

    /// The path the `number`th written frame is (or will be) stored at.
    pub fn frame_path(&self, number: u64) -> PathBuf {
        self.dir.join(format!(
            "{FRAME_FILE_PREFIX}{number:0width$}.{ext}",
            width = FRAME_NUMBER_WIDTH,
            ext = self.format.extension()
        ))
    }

    /// Encode `frame` to the next numbered file and return its path.
    ///
    /// # Errors
    /// [`EncodeError`] if the file cannot be created or encoded. Any partially written
    /// file is removed and the number is reused for the next frame.
    pub fn write(&mut self, frame: &Frame) -> Result<PathBuf, EncodeError> {
        let path = self.frame_path(self.next_number);

        let result = match self.format {
            FrameFormat::Png => frame.image().save_with_format(&path, ImageFormat::Png),
            FrameFormat::Jpeg { quality } => File::create(&path)
                .map_err(ImageError::IoError)
                .and_then(|file| {
                    let mut writer = BufWriter::new(file);
                    JpegEncoder::new_with_quality(&mut writer, quality).encode_image(frame.image())?;
                    writer.flush().map_err(ImageError::IoError)
                }),
        };

        if let Err(source) = result {
            let _remove_error = fs::remove_file(&path);
            return Err(EncodeError {
                index: frame.index(),
                path,
                source,
            });
        }

        trace!("Wrote {} to {}", frame.describe(), path.display());
        self.next_number += 1;
        Ok(path)
    }
}

#[cfg(test)]
mod test {
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;

    fn frame(index: u64, width: u32, height: u32) -> Frame {
        Frame::new(index, RgbImage::from_pixel(width, height, Rgb([index as u8, 100, 200])))
    }

    #[test]
    fn test_names_are_numbered_from_one_and_padded() {
        let dir = TempDir::new().unwrap();
        let mut writer = FrameWriter::new(dir.path(), FrameFormat::Png).unwrap();

        let first = writer.write(&frame(7, 4, 4)).unwrap();
        let second = writer.write(&frame(9, 4, 4)).unwrap();

        assert_eq!(first, dir.path().join("img00001.png"));
        assert_eq!(second, dir.path().join("img00002.png"));
        assert_eq!(writer.written(), 2);

        let reread = image::open(&first).unwrap().to_rgb8();
        assert_eq!(reread.get_pixel(0, 0), &Rgb([7, 100, 200]));
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");

        let mut writer = FrameWriter::new(&nested, FrameFormat::jpeg_default()).unwrap();
        let path = writer.write(&frame(0, 8, 8)).unwrap();

        assert_eq!(path, nested.join("img00001.jpg"));
        assert!(path.is_file());
    }

    #[test]
    fn test_uncreatable_directory_is_output_unavailable() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a_file");
        fs::write(&file, b"").unwrap();

        let result = FrameWriter::new(file.join("frames"), FrameFormat::Png);
        assert!(matches!(result, Err(SourceError::OutputUnavailable { .. })));
    }

    #[test]
    fn test_failed_write_does_not_consume_a_number() {
        let dir = TempDir::new().unwrap();
        let frames_dir = dir.path().join("frames");
        let mut writer = FrameWriter::new(&frames_dir, FrameFormat::Png).unwrap();

        // the output directory disappearing makes the next write fail
        fs::remove_dir_all(&frames_dir).unwrap();
        let err = writer.write(&frame(3, 2, 2)).unwrap_err();
        assert_eq!(err.index, 3);
        assert_eq!(writer.written(), 0);

        fs::create_dir_all(&frames_dir).unwrap();
        let path = writer.write(&frame(4, 2, 2)).unwrap();
        assert_eq!(path, frames_dir.join("img00001.png"));
    }

    #[test]
    fn test_jpeg_quality_validation() {
        assert!(FrameFormat::jpeg(0).is_err());
        assert!(FrameFormat::jpeg(101).is_err());
        assert_eq!(FrameFormat::jpeg(80).unwrap(), FrameFormat::Jpeg { quality: 80 });
    }
}
