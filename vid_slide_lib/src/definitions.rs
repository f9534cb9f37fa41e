/// The default retention threshold: a frame is kept when more than this fraction of its
/// pixels differ from the last kept frame. Values between 0.20 and 0.40 work well for
/// typical slide decks.
pub const DEFAULT_RETENTION_THRESHOLD: f64 = 0.20;

/// A pixel whose combined (luma-weighted) channel difference is above this value counts
/// as changed. Zero means any visible difference counts.
pub const PIXEL_CHANGE_TOLERANCE: u8 = 0;

/// Fixed point Rec.601 luma weights (red, green, blue), out of [`LUMA_WEIGHT_SCALE`].
pub const LUMA_WEIGHTS: [u32; 3] = [299, 587, 114];

/// Denominator for [`LUMA_WEIGHTS`].
pub const LUMA_WEIGHT_SCALE: u32 = 1000;

/// Lowercase file extensions treated as still images when listing a directory.
pub const STILL_IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Filename prefix for frames written to disk.
pub const FRAME_FILE_PREFIX: &str = "img";

/// Written frames are numbered from 1 and zero padded to this many digits, so that
/// sorting the filenames lexicographically gives back the order they were written in.
pub const FRAME_NUMBER_WIDTH: usize = 5;

/// JPEG quality used for frames written to disk as JPEG.
pub const DEFAULT_FRAME_JPEG_QUALITY: u8 = 100;

/// JPEG quality used for images embedded in a PDF.
pub const DEFAULT_PDF_JPEG_QUALITY: u8 = 90;

/// ISO A4 paper, in PDF points (1/72 inch).
pub const A4_POINTS: (f32, f32) = (595.276, 841.89);

/// US Letter paper, in PDF points (1/72 inch).
pub const LETTER_POINTS: (f32, f32) = (612.0, 792.0);

/// File stem used for videos downloaded by yt-dlp. yt-dlp picks the extension.
pub const DOWNLOAD_FILE_STEM: &str = "downloaded_video";
