use std::path::Path;

use image::RgbImage;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    decode_still_image, layout, list_still_images, ComposeError, DocumentSink, Frame, PageDimensions,
    PageHandle, SourceError,
};

/// Counts of pages produced and skipped by a [`PageComposer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeReport {
    pub pages_added: u64,
    pub pages_skipped: u64,
}

/// Adds one page per image to a [`DocumentSink`], with the image scaled to fit the page
/// and centred on it.
///
/// A page that cannot be produced is skipped with a warning; later pages are still added.
#[derive(Debug, Clone)]
pub struct PageComposer {
    page: PageDimensions,
    report: ComposeReport,
}

impl PageComposer {
    pub fn new(page: PageDimensions) -> Self {
        Self {
            page,
            report: ComposeReport::default(),
        }
    }

    pub fn page(&self) -> PageDimensions {
        self.page
    }

    pub fn report(&self) -> ComposeReport {
        self.report
    }

    /// Add a page showing `frame`. Returns `None` if the page was skipped.
    pub fn add_frame<S: DocumentSink>(&mut self, sink: &mut S, frame: &Frame) -> Option<PageHandle> {
        self.record(compose_page(sink, frame.image(), self.page), &frame.describe())
    }

    /// Decode the image at `path` and add a page showing it. Returns `None` if the page
    /// was skipped.
    pub fn add_file<S: DocumentSink>(&mut self, sink: &mut S, path: &Path) -> Option<PageHandle> {
        let result = decode_still_image(path)
            .map_err(ComposeError::from)
            .and_then(|image| compose_page(sink, &image, self.page));
        self.record(result, &path.display().to_string())
    }

    fn record(&mut self, result: Result<PageHandle, ComposeError>, what: &str) -> Option<PageHandle> {
        match result {
            Ok(handle) => {
                self.report.pages_added += 1;
                Some(handle)
            }
            Err(e) => {
                self.report.pages_skipped += 1;
                warn!("Skipping page for {what}: {e}");
                None
            }
        }
    }
}

/// Lay out `image` on a new page of `sink`. If the image cannot be placed the page is
/// removed again, so a failure never leaves a blank page behind.
pub fn compose_page<S: DocumentSink>(
    sink: &mut S,
    image: &RgbImage,
    page: PageDimensions,
) -> Result<PageHandle, ComposeError> {
    let placement = layout(image.dimensions(), page)?;

    let handle = sink.add_page(page);
    if let Err(e) = sink.place_image(handle, image, placement) {
        sink.discard_page(handle);
        return Err(e.into());
    }

    Ok(handle)
}

/// Add one page per still image in `dir`, in lexicographic filename order.
/// Images that cannot be decoded or placed are skipped with a warning.
///
/// # Errors
/// [`SourceError::Unavailable`] if the directory cannot be listed.
pub fn compose_directory<S: DocumentSink>(
    dir: &Path,
    page: PageDimensions,
    sink: &mut S,
) -> Result<ComposeReport, SourceError> {
    let paths = list_still_images(dir)?;
    info!("Composing {} images from {}", paths.len(), dir.display());

    let mut composer = PageComposer::new(page);
    for path in &paths {
        composer.add_file(sink, path);
    }

    Ok(composer.report())
}

#[cfg(test)]
mod test {
    use std::fs;

    use image::Rgb;
    use tempfile::TempDir;

    use super::*;
    use crate::{DocumentError, PlacedImage};

    #[derive(Default)]
    struct RecordingSink {
        pages: Vec<Option<(PageDimensions, Vec<((u32, u32), PlacedImage)>)>>,
        reject_placements: bool,
    }

    impl DocumentSink for RecordingSink {
        fn add_page(&mut self, page: PageDimensions) -> PageHandle {
            self.pages.push(Some((page, vec![])));
            PageHandle::new(self.pages.len() - 1)
        }

        fn place_image(&mut self, page: PageHandle, image: &RgbImage, at: PlacedImage) -> Result<(), DocumentError> {
            if self.reject_placements {
                return Err(DocumentError::UnknownPage(page.id()));
            }
            let (_, images) = self.pages[page.id()].as_mut().unwrap();
            images.push((image.dimensions(), at));
            Ok(())
        }

        fn discard_page(&mut self, page: PageHandle) {
            self.pages[page.id()] = None;
        }

        fn page_count(&self) -> usize {
            self.pages.iter().flatten().count()
        }

        fn save(self, _path: &Path) -> Result<(), DocumentError> {
            Ok(())
        }
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([1, 2, 3]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_one_page_per_frame() {
        let mut sink = RecordingSink::default();
        let mut composer = PageComposer::new(PageDimensions::new(1000.0, 700.0));

        composer.add_frame(&mut sink, &Frame::new(0, RgbImage::new(640, 480)));
        composer.add_frame(&mut sink, &Frame::new(1, RgbImage::new(480, 640)));

        assert_eq!(sink.page_count(), 2);
        let (_, first_images) = sink.pages[0].as_ref().unwrap();
        assert_eq!(first_images.len(), 1);
        assert_eq!(first_images[0].0, (640, 480));
        assert!((first_images[0].1.height - 700.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_frame_is_skipped_without_a_page() {
        let mut sink = RecordingSink::default();
        let mut composer = PageComposer::new(PageDimensions::default());

        assert!(composer.add_frame(&mut sink, &Frame::new(0, RgbImage::new(0, 0))).is_none());
        assert!(composer.add_frame(&mut sink, &Frame::new(1, RgbImage::new(4, 4))).is_some());

        assert_eq!(sink.page_count(), 1);
        assert_eq!(
            composer.report(),
            ComposeReport {
                pages_added: 1,
                pages_skipped: 1
            }
        );
    }

    #[test]
    fn test_sink_failure_discards_the_page() {
        let mut sink = RecordingSink {
            reject_placements: true,
            ..RecordingSink::default()
        };
        let mut composer = PageComposer::new(PageDimensions::default());

        assert!(composer.add_frame(&mut sink, &Frame::new(0, RgbImage::new(4, 4))).is_none());
        assert_eq!(sink.page_count(), 0);
        assert_eq!(composer.report().pages_skipped, 1);
    }

    #[test]
    fn test_compose_directory_skips_unreadable_images() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "img1.png", 64, 48);
        fs::write(dir.path().join("img2.png"), b"broken").unwrap();
        write_png(dir.path(), "img10.png", 48, 64);

        let mut sink = RecordingSink::default();
        let report = compose_directory(dir.path(), PageDimensions::default(), &mut sink).unwrap();

        assert_eq!(
            report,
            ComposeReport {
                pages_added: 2,
                pages_skipped: 1
            }
        );

        //lexicographic: img1, img10, img2
        let sizes: Vec<_> = sink.pages.iter().flatten().map(|(_, images)| images[0].0).collect();
        assert_eq!(sizes, vec![(64, 48), (48, 64)]);
    }
}
