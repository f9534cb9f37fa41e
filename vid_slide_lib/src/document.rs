use std::path::Path;

use image::{codecs::jpeg::JpegEncoder, RgbImage};
use log::{debug, info};
use lopdf::{
    content::{Content, Operation},
    dictionary, Dictionary, Document, Object, ObjectId, Stream,
};

use crate::definitions::DEFAULT_PDF_JPEG_QUALITY;
use crate::{DocumentError, PageDimensions, PlacedImage};

/// Identifies a page previously added to a [`DocumentSink`]. Each sink decides what
/// the number inside means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(usize);

impl PageHandle {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn id(self) -> usize {
        self.0
    }
}

/// A paginated document that images can be drawn onto.
///
/// Pages appear in the saved document in the order they were added.
/// `save` consumes the sink, so a document can only be written once.
pub trait DocumentSink {
    fn add_page(&mut self, page: PageDimensions) -> PageHandle;

    /// Draw `image` on `page`, scaled to fill the rectangle `at`.
    fn place_image(&mut self, page: PageHandle, image: &RgbImage, at: PlacedImage) -> Result<(), DocumentError>;

    /// Remove a page, for example after placing its image failed.
    fn discard_page(&mut self, page: PageHandle);

    fn page_count(&self) -> usize;

    fn save(self, path: &Path) -> Result<(), DocumentError>
    where
        Self: Sized;
}

#[derive(Debug)]
struct PendingPage {
    dims: PageDimensions,
    images: Vec<(ObjectId, PlacedImage)>,
}

/// A PDF document built with `lopdf`.
///
/// Images are JPEG compressed when they are placed and embedded as DCTDecode image
/// XObjects; the page tree is assembled when the document is saved.
#[derive(Debug)]
pub struct PdfDocument {
    doc: Document,
    pages_id: ObjectId,
    pages: Vec<Option<PendingPage>>,
    jpeg_quality: u8,
}

impl PdfDocument {
    /// `jpeg_quality` is clamped to 1..=100.
    pub fn new(jpeg_quality: u8) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        Self {
            doc,
            pages_id,
            pages: Vec::new(),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    fn pending_page(&mut self, page: PageHandle) -> Result<&mut PendingPage, DocumentError> {
        self.pages
            .get_mut(page.0)
            .and_then(Option::as_mut)
            .ok_or(DocumentError::UnknownPage(page.0))
    }

    fn embed_jpeg(&mut self, image: &RgbImage) -> Result<ObjectId, DocumentError> {
        let mut jpeg_bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg_bytes, self.jpeg_quality).encode_image(image)?;

        let (width, height) = image.dimensions();
        let xobject = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            jpeg_bytes,
        );

        Ok(self.doc.add_object(xobject))
    }

    fn build_page(&mut self, page: &PendingPage) -> Result<ObjectId, DocumentError> {
        let mut xobjects = Dictionary::new();
        let mut operations = Vec::with_capacity(page.images.len() * 4);

        for (i, (image_id, at)) in page.images.iter().enumerate() {
            let name = format!("Im{i}");
            xobjects.set(name.clone(), *image_id);

            // map the unit square onto the placement rectangle, then paint the image into it
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![at.width.into(), 0.into(), 0.into(), at.height.into(), at.x.into(), at.y.into()],
                ),
                Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                Operation::new("Q", vec![]),
            ]);
        }

        let content = Content { operations }.encode()?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page.dims.width.into(), page.dims.height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => xobjects,
            },
        });

        Ok(page_id)
    }
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new(DEFAULT_PDF_JPEG_QUALITY)
    }
}

impl DocumentSink for PdfDocument {
    fn add_page(&mut self, page: PageDimensions) -> PageHandle {
        self.pages.push(Some(PendingPage {
            dims: page,
            images: Vec::new(),
        }));
        PageHandle(self.pages.len() - 1)
    }

    fn place_image(&mut self, page: PageHandle, image: &RgbImage, at: PlacedImage) -> Result<(), DocumentError> {
        //check the handle before doing the expensive encode
        self.pending_page(page)?;
        let image_id = self.embed_jpeg(image)?;
        self.pending_page(page)?.images.push((image_id, at));
        Ok(())
    }

    fn discard_page(&mut self, page: PageHandle) {
        if let Some(slot) = self.pages.get_mut(page.0) {
            // images already embedded for this page stay unreferenced; lopdf writes them anyway
            *slot = None;
        }
    }

    fn page_count(&self) -> usize {
        self.pages.iter().flatten().count()
    }

    fn save(mut self, path: &Path) -> Result<(), DocumentError> {
        let pages = std::mem::take(&mut self.pages);

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for page in pages.iter().flatten() {
            kids.push(self.build_page(page)?.into());
        }
        let page_count = kids.len();

        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        debug!("Writing {page_count} pages to {}", path.display());
        self.doc.save(path).map_err(|e| DocumentError::Save {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Saved {page_count} page document to {}", path.display());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use image::Rgb;
    use tempfile::TempDir;

    use super::*;
    use crate::layout;

    fn checkerboard(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 128])
            }
        })
    }

    fn add_image_page(doc: &mut PdfDocument, image: &RgbImage) {
        let page = PageDimensions::default();
        let handle = doc.add_page(page);
        let at = layout(image.dimensions(), page).unwrap();
        doc.place_image(handle, image, at).unwrap();
    }

    #[test]
    fn test_saved_document_has_one_page_per_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slides.pdf");

        let mut doc = PdfDocument::default();
        add_image_page(&mut doc, &checkerboard(64, 48));
        add_image_page(&mut doc, &checkerboard(48, 64));
        add_image_page(&mut doc, &checkerboard(32, 32));
        assert_eq!(doc.page_count(), 3);
        doc.save(&path).unwrap();

        let loaded = Document::load(&path).unwrap();
        assert_eq!(loaded.get_pages().len(), 3);
    }

    #[test]
    fn test_discarded_pages_are_not_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slides.pdf");

        let mut doc = PdfDocument::default();
        add_image_page(&mut doc, &checkerboard(16, 16));
        let blank = doc.add_page(PageDimensions::default());
        add_image_page(&mut doc, &checkerboard(16, 16));
        doc.discard_page(blank);

        assert_eq!(doc.page_count(), 2);
        let at = layout((16, 16), PageDimensions::default()).unwrap();
        let result = doc.place_image(blank, &checkerboard(16, 16), at);
        assert!(matches!(result, Err(DocumentError::UnknownPage(1))));

        doc.save(&path).unwrap();
        assert_eq!(Document::load(&path).unwrap().get_pages().len(), 2);
    }

    #[test]
    fn test_empty_document_can_be_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.pdf");

        PdfDocument::default().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no_such_dir").join("slides.pdf");

        let result = PdfDocument::default().save(&path);
        assert!(matches!(result, Err(DocumentError::Save { .. })));
    }
}
