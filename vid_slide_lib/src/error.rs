use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An input could not be opened, or an output location could not be created.
/// Always fatal to a run.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Cannot open {}: {reason}", path.display())]
    Unavailable { path: PathBuf, reason: String },

    #[error("Cannot create output directory {}: {source}", path.display())]
    OutputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single still image could not be decoded. The image is skipped.
#[derive(Error, Debug)]
#[error("Failed to decode {}: {reason}", path.display())]
pub struct DecodeError {
    pub path: PathBuf,
    pub reason: String,
}

/// Two frames could not be compared. The newer frame is kept.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterError {
    #[error("Frame {index} is malformed ({width}x{height}, {len} bytes)")]
    Malformed {
        index: u64,
        width: u32,
        height: u32,
        len: usize,
    },
}

/// A kept frame could not be written to disk. The frame is skipped.
#[derive(Error, Debug)]
#[error("Failed to write frame {index} to {}: {source}", path.display())]
pub struct EncodeError {
    pub index: u64,
    pub path: PathBuf,
    #[source]
    pub source: image::ImageError,
}

/// Failures of the document backend.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("No such page: {0}")]
    UnknownPage(usize),

    #[error("Failed to encode image for embedding: {0}")]
    ImageEncode(#[from] image::ImageError),

    #[error("Failed to build PDF content: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Failed to save document to {}: {reason}", path.display())]
    Save { path: PathBuf, reason: String },
}

/// A single page could not be produced. The page is skipped.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Cannot lay out an empty {width}x{height} image")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Page size {width}x{height} is not usable")]
    InvalidPage { width: f32, height: f32 },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Failures of the remote video download.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum FetchError {
    #[error("{0} not found. Make sure it is installed and visible on the command line")]
    ToolNotFound(String),

    #[error("Download IO error: {0}")]
    Io(String),

    #[error("Download failed: {0}")]
    Failed(String),

    #[error("Download did not finish within {0} seconds")]
    Timeout(u64),

    #[error("Download finished but no video was found in {}", .0.display())]
    NoOutput(PathBuf),

    #[error("Cannot create download directory {}: {reason}", path.display())]
    Destination { path: PathBuf, reason: String },
}

/// Invalid values supplied by the caller.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("Retention threshold must be greater than 0 and at most 1, got {0}")]
    InvalidThreshold(f64),

    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidJpegQuality(u8),
}

/// Errors that abort a whole run.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
