use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::definitions::DEFAULT_PDF_JPEG_QUALITY;
use crate::{
    compose_directory, ComposeReport, DocumentSink, Error, Frame, FrameFormat, FrameSequence, FrameWriter,
    PageComposer, PageDimensions, PdfDocument, RemoteFetcher, RetentionFilter, RetentionThreshold,
    SourceOptions,
};

// report progress at info level every this many frames
const PROGRESS_INTERVAL: u64 = 1000;

/// Where the frames of a run come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Input {
    /// A local video file.
    Video(PathBuf),
    /// A remote video, downloaded before processing.
    Url(String),
    /// A directory of still images, processed in lexicographic filename order.
    ImageDir(PathBuf),
}

/// Settings for the PDF produced by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCfg {
    pub path: PathBuf,
    pub page: PageDimensions,
    pub jpeg_quality: u8,
}

impl DocumentCfg {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            page: PageDimensions::default(),
            jpeg_quality: DEFAULT_PDF_JPEG_QUALITY,
        }
    }
}

/// Everything needed to run the pipeline once.
///
/// * `filter: None` keeps every frame (plain frame extraction).
/// * `frames_dir` writes the kept frames to disk.
/// * `document` writes the kept frames to a PDF, one page each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCfg {
    pub input: Input,
    pub filter: Option<RetentionThreshold>,
    pub frames_dir: Option<PathBuf>,
    pub frame_format: FrameFormat,
    pub document: Option<DocumentCfg>,
    pub source: SourceOptions,
    /// Where [`Input::Url`] videos are downloaded to.
    pub download_dir: PathBuf,
}

impl PipelineCfg {
    /// Filter with the default threshold, write nothing.
    pub fn new(input: Input) -> Self {
        Self {
            input,
            filter: Some(RetentionThreshold::default()),
            frames_dir: None,
            frame_format: FrameFormat::default(),
            document: None,
            source: SourceOptions::default(),
            download_dir: std::env::temp_dir(),
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub frames_read: u64,
    pub frames_kept: u64,
    pub frames_written: u64,
    pub pages: u64,
    pub decode_failures: u64,
    pub comparison_failures: u64,
    pub encode_failures: u64,
    pub page_failures: u64,
    pub source_path: Option<PathBuf>,
    pub frames_dir: Option<PathBuf>,
    pub document_path: Option<PathBuf>,
}

/// Run the whole pipeline: acquire the input, filter its frames, and write the kept
/// frames to a directory and/or a PDF.
///
/// Per-frame failures (undecodable images, frames that cannot be compared, written or
/// laid out) are logged, counted in the report, and skipped.
///
/// # Errors
/// Fatal problems abort the run before or after frame processing:
/// * the download fails ([`Error::Fetch`]),
/// * the input cannot be opened or the frames directory cannot be created ([`Error::Source`]),
/// * the document cannot be saved ([`Error::Document`]).
pub fn run_pipeline(cfg: &PipelineCfg, fetcher: &dyn RemoteFetcher) -> Result<RunReport, Error> {
    let (source_path, mut frames) = match &cfg.input {
        Input::Video(path) => (path.clone(), FrameSequence::open_video(path, cfg.source)?),
        Input::Url(url) => {
            let path = fetcher.fetch(url, &cfg.download_dir)?;
            info!("Downloaded {url} to {}", path.display());
            let frames = FrameSequence::open_video(&path, cfg.source)?;
            (path, frames)
        }
        Input::ImageDir(dir) => (dir.clone(), FrameSequence::open_directory(dir, cfg.source)?),
    };

    let mut writer = cfg
        .frames_dir
        .as_ref()
        .map(|dir| FrameWriter::new(dir, cfg.frame_format))
        .transpose()?;

    let mut document = cfg.document.as_ref().map(|doc_cfg| {
        (
            PdfDocument::new(doc_cfg.jpeg_quality),
            PageComposer::new(doc_cfg.page),
        )
    });

    let mut report = process_frames(
        &mut frames,
        cfg.filter,
        writer.as_mut(),
        document.as_mut().map(|(doc, composer)| (doc, composer)),
    );
    report.decode_failures = frames.decode_failures();
    report.source_path = Some(source_path);
    report.frames_dir = writer.as_ref().map(|writer| writer.dir().to_path_buf());

    if let (Some((doc, _)), Some(doc_cfg)) = (document, &cfg.document) {
        if doc.page_count() == 0 {
            warn!("No pages were produced; {} will be empty", doc_cfg.path.display());
        }
        doc.save(&doc_cfg.path)?;
        report.document_path = Some(doc_cfg.path.clone());
    }

    info!(
        "Read {} frames, kept {}, wrote {} frames and {} pages",
        report.frames_read, report.frames_kept, report.frames_written, report.pages
    );

    Ok(report)
}

/// Stream `frames` through the retention filter (if any) into the frame writer and page
/// composer (if any). Only the current frame and the filter's reference are held at once.
pub fn process_frames<S: DocumentSink>(
    frames: impl Iterator<Item = Frame>,
    threshold: Option<RetentionThreshold>,
    mut writer: Option<&mut FrameWriter>,
    mut document: Option<(&mut S, &mut PageComposer)>,
) -> RunReport {
    let mut filter = threshold.map(RetentionFilter::new);
    let mut report = RunReport::default();

    for frame in frames {
        report.frames_read += 1;
        if report.frames_read % PROGRESS_INTERVAL == 0 {
            info!("{} frames read, {} kept", report.frames_read, report.frames_kept);
        }

        if let Some(filter) = filter.as_mut() {
            if !filter.consider(&frame).is_kept() {
                continue;
            }
        }
        report.frames_kept += 1;

        if let Some(writer) = writer.as_deref_mut() {
            match writer.write(&frame) {
                Ok(path) => {
                    debug!("{} written to {}", frame.describe(), path.display());
                    report.frames_written += 1;
                }
                Err(e) => {
                    warn!("{e}, skipping");
                    report.encode_failures += 1;
                }
            }
        }

        if let Some((sink, composer)) = document.as_mut() {
            match composer.add_frame(&mut **sink, &frame) {
                Some(_) => report.pages += 1,
                None => report.page_failures += 1,
            }
        }
    }

    report.comparison_failures = filter.as_ref().map_or(0, RetentionFilter::frames_unscored);
    report
}

/// Build a PDF with one page per still image in `dir` (lexicographic filename order)
/// without filtering, then save it.
///
/// # Errors
/// [`Error::Source`] if the directory cannot be listed, [`Error::Document`] if the
/// document cannot be saved.
pub fn assemble_document(dir: &Path, doc_cfg: &DocumentCfg) -> Result<ComposeReport, Error> {
    let mut doc = PdfDocument::new(doc_cfg.jpeg_quality);
    let report = compose_directory(dir, doc_cfg.page, &mut doc)?;
    doc.save(&doc_cfg.path)?;
    Ok(report)
}

#[cfg(test)]
mod test {
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;
    use crate::FetchError;

    struct NoFetch;

    impl RemoteFetcher for NoFetch {
        fn fetch(&self, url: &str, _dest_dir: &Path) -> Result<PathBuf, FetchError> {
            Err(FetchError::Failed(format!("refusing to fetch {url}")))
        }
    }

    fn solid(index: u64, shade: u8) -> Frame {
        Frame::new(index, RgbImage::from_pixel(8, 8, Rgb([shade, shade, shade])))
    }

    #[test]
    fn test_process_frames_without_outputs_counts() {
        let frames = vec![solid(0, 0), solid(1, 0), solid(2, 255), solid(3, 255)];
        let report = process_frames::<PdfDocument>(frames.into_iter(), Some(RetentionThreshold::default()), None, None);

        assert_eq!(report.frames_read, 4);
        assert_eq!(report.frames_kept, 2);
        assert_eq!(report.frames_written, 0);
        assert_eq!(report.pages, 0);
    }

    #[test]
    fn test_no_filter_keeps_everything() {
        let frames = vec![solid(0, 0), solid(1, 0), solid(2, 0)];
        let report = process_frames::<PdfDocument>(frames.into_iter(), None, None, None);
        assert_eq!(report.frames_kept, 3);
    }

    #[test]
    fn test_fetch_failure_is_fatal() {
        let cfg = PipelineCfg::new(Input::Url("https://example.com/v".to_string()));
        let result = run_pipeline(&cfg, &NoFetch);
        assert!(matches!(result, Err(Error::Fetch(FetchError::Failed(_)))));
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        let cfg = PipelineCfg::new(Input::ImageDir(dir.path().join("missing")));
        let result = run_pipeline(&cfg, &NoFetch);
        assert!(matches!(result, Err(Error::Source(_))));
    }
}
