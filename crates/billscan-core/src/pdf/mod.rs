//! PDF rasterization and page compositing.

mod composite;
mod rasterizer;

pub use composite::{build_composite, CompositeImage};
pub use rasterizer::{inspect_pdf, PdfInfo, PdftoppmRasterizer};

use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// One rendered page.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// Page index (0-based, document order).
    pub index: usize,
    /// Rendered pixels.
    pub image: DynamicImage,
}

impl RasterPage {
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self { index, image }
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
}

/// Trait for turning a PDF on disk into page bitmaps.
pub trait PageRasterizer: Send + Sync {
    /// Render every page at `dpi`, in document order.
    fn rasterize(&self, path: &Path, dpi: u32) -> Result<Vec<RasterPage>>;
}
