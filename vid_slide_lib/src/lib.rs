#![allow(clippy::let_and_return)]
#![warn(clippy::cast_lossless)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::todo)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::unimplemented)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::panic)]
#![allow(clippy::doc_markdown)]

//! # Overview
//! `vid_slide_lib` turns a slideshow-style video (a lecture capture, a screen recording) into
//! a short sequence of distinct frames, and optionally into a PDF with one page per frame.
//!
//! Videos like these show the same slide for hundreds of frames at a time. This library
//! walks the frames in order and keeps a frame only when it differs enough from the last
//! frame it kept, so each slide ends up in the output once.
//!
//! # High Level API
//! Describe a run with a [`PipelineCfg`] and hand it to [`run_pipeline`]:
//! ```rust,no_run
//! use vid_slide_lib::{run_pipeline, DocumentCfg, Input, PipelineCfg, YtDlpFetcher};
//!
//! let mut cfg = PipelineCfg::new(Input::Video("lecture.mp4".into()));
//! cfg.frames_dir = Some("slides".into());
//! cfg.document = Some(DocumentCfg::new("lecture.pdf"));
//!
//! let report = run_pipeline(&cfg, &YtDlpFetcher::default()).unwrap();
//! println!("kept {} of {} frames", report.frames_kept, report.frames_read);
//! ```
//!
//! The filter can also be used on its own, on any iterator of [`Frame`]s:
//! ```rust
//! use image::{Rgb, RgbImage};
//! use vid_slide_lib::{Frame, RetainChanged, RetentionThreshold};
//!
//! let slide_a = RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]));
//! let slide_b = RgbImage::from_pixel(64, 48, Rgb([0, 0, 0]));
//! let frames = vec![
//!     Frame::new(0, slide_a.clone()),
//!     Frame::new(1, slide_a),
//!     Frame::new(2, slide_b.clone()),
//!     Frame::new(3, slide_b),
//! ];
//!
//! let kept: Vec<u64> = frames
//!     .into_iter()
//!     .retain_changed(RetentionThreshold::default())
//!     .map(|frame| frame.index())
//!     .collect();
//!
//! assert_eq!(kept, vec![0, 2]);
//! ```
//!
//! # Prerequisites
//! Video input uses Ffmpeg from the command line. You must make Ffmpeg and Ffprobe available
//! on the command line, for example:
//!
//! * Debian-based systems: ```# apt-get install ffmpeg```
//! * Yum-based systems: ```# yum install ffmpeg```
//!
//! Downloading remote videos ([`Input::Url`]) additionally needs `yt-dlp`.
//! Directories of still images need neither.
//!
//! # How it works
//! Two frames of the same size are compared pixel by pixel. For each pixel the absolute
//! difference of each colour channel is combined into one value with the weights of an
//! RGB to grayscale conversion; the pixel has changed if that value is non-zero. The
//! dissimilarity of the frames is the fraction of changed pixels. Frames of different
//! sizes are maximally dissimilar.
//!
//! The first frame is always kept. Every later frame is compared with the most recently
//! *kept* frame and kept if its dissimilarity is strictly greater than the threshold
//! (default [`DEFAULT_RETENTION_THRESHOLD`]). Comparing against the last kept frame rather
//! than the previous frame means a slow transition is eventually captured. If two frames
//! cannot be compared the newer one is kept.
//!
//! Kept frames are written as `img00001.png`, `img00002.png`, ... and laid out one per page,
//! scaled to fit the page and centred.
//!
//! # Limitations
//! The comparison is exact, not perceptual: video compression noise over a large part of
//! the frame can push an unchanged slide over the threshold, and a small change (one new
//! bullet point) can stay under it. Tune the threshold to the material.
//!
//! Directories of still images are processed in plain lexicographic filename order, so
//! `img10.png` comes before `img2.png`. Files written by this library are zero padded and
//! sort correctly.

mod compose;
mod definitions;
mod document;
mod error;
mod fetch;
mod frame;
mod frame_source;
mod frame_writer;
mod layout;
mod metric;
mod pipeline;
mod retention;

pub use compose::{compose_directory, compose_page, ComposeReport, PageComposer};
pub use definitions::{
    A4_POINTS, DEFAULT_FRAME_JPEG_QUALITY, DEFAULT_PDF_JPEG_QUALITY, DEFAULT_RETENTION_THRESHOLD,
    LETTER_POINTS, STILL_IMAGE_EXTENSIONS,
};
pub use document::{DocumentSink, PageHandle, PdfDocument};
pub use error::{
    ComposeError, ConfigError, DecodeError, DocumentError, EncodeError, Error, FetchError, FilterError,
    SourceError,
};
pub use fetch::{RemoteFetcher, YtDlpFetcher};
pub use frame::Frame;
pub use frame_source::{
    decode_still_image, list_still_images, FrameSequence, ImageDirFrames, SourceOptions, VideoFrames,
};
pub use frame_writer::{FrameFormat, FrameWriter};
pub use layout::{layout, Orientation, PageDimensions, PaperSize, PlacedImage};
pub use metric::{combined_difference, dissimilarity, MAX_DISSIMILARITY};
pub use pipeline::{assemble_document, process_frames, run_pipeline, DocumentCfg, Input, PipelineCfg, RunReport};
pub use retention::{filter_frames, KeptFrames, RetainChanged, Retention, RetentionFilter, RetentionThreshold};
