use serde::{Deserialize, Serialize};

use crate::definitions::{A4_POINTS, LETTER_POINTS};
use crate::ComposeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    #[default]
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaperSize {
    #[default]
    A4,
    Letter,
}

/// The size of one page, in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
}

impl PageDimensions {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn paper(size: PaperSize, orientation: Orientation) -> Self {
        let (short, long) = match size {
            PaperSize::A4 => A4_POINTS,
            PaperSize::Letter => LETTER_POINTS,
        };

        match orientation {
            Orientation::Portrait => Self::new(short, long),
            Orientation::Landscape => Self::new(long, short),
        }
    }

    fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// A4 landscape.
impl Default for PageDimensions {
    fn default() -> Self {
        Self::paper(PaperSize::default(), Orientation::default())
    }
}

/// Where an image is drawn on a page. `(x, y)` is the lower left corner, in PDF points
/// measured from the lower left corner of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacedImage {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Scale an image of `frame_dims` pixels to the largest size that fits on `page` without
/// changing its aspect ratio, and centre it. Images smaller than the page are scaled up.
///
/// # Errors
/// * [`ComposeError::EmptyFrame`] if either frame dimension is zero.
/// * [`ComposeError::InvalidPage`] if the page has no usable area.
pub fn layout((frame_width, frame_height): (u32, u32), page: PageDimensions) -> Result<PlacedImage, ComposeError> {
    if frame_width == 0 || frame_height == 0 {
        return Err(ComposeError::EmptyFrame {
            width: frame_width,
            height: frame_height,
        });
    }
    if !page.is_usable() {
        return Err(ComposeError::InvalidPage {
            width: page.width,
            height: page.height,
        });
    }

    let page_width = f64::from(page.width);
    let page_height = f64::from(page.height);
    let frame_width = f64::from(frame_width);
    let frame_height = f64::from(frame_height);

    let scale = (page_width / frame_width).min(page_height / frame_height);
    let drawn_width = frame_width * scale;
    let drawn_height = frame_height * scale;

    Ok(PlacedImage {
        x: ((page_width - drawn_width) / 2.0) as f32,
        y: ((page_height - drawn_height) / 2.0) as f32,
        width: drawn_width as f32,
        height: drawn_height as f32,
    })
}
