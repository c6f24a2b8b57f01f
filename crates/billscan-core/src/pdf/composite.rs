//! Vertical stacking of rendered pages.

use image::{imageops, Rgb, RgbImage};
use tracing::debug;

use super::RasterPage;
use crate::error::DimensionError;

/// Background used to pad pages narrower than the widest one.
const PAD_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// All pages of a document stacked top to bottom in page order.
#[derive(Debug, Clone)]
pub struct CompositeImage {
    image: RgbImage,
    page_heights: Vec<u32>,
}

impl CompositeImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Heights of the stacked pages, in order.
    pub fn page_heights(&self) -> &[u32] {
        &self.page_heights
    }

    pub fn page_count(&self) -> usize {
        self.page_heights.len()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }
}

/// Stack pages vertically.
///
/// The canvas is as wide as the widest page; narrower pages are left-aligned
/// and padded with white, never scaled or cropped.
pub fn build_composite(pages: &[RasterPage]) -> Result<CompositeImage, DimensionError> {
    if pages.is_empty() {
        return Err(DimensionError::NoPages);
    }

    let mut width = 0u32;
    let mut height = 0u32;
    for page in pages {
        let (w, h) = page.dimensions();
        if w == 0 || h == 0 {
            return Err(DimensionError::EmptyPage {
                index: page.index,
                width: w,
                height: h,
            });
        }
        width = width.max(w);
        height = height.checked_add(h).ok_or(DimensionError::HeightOverflow)?;
    }

    let mut canvas = RgbImage::from_pixel(width, height, PAD_COLOR);
    let mut page_heights = Vec::with_capacity(pages.len());
    let mut y = 0u32;

    for page in pages {
        let rgb = page.image.to_rgb8();
        imageops::replace(&mut canvas, &rgb, 0, i64::from(y));
        page_heights.push(rgb.height());
        y += rgb.height();
    }

    debug!(
        "Built composite {}x{} from {} pages",
        width,
        height,
        pages.len()
    );

    Ok(CompositeImage {
        image: canvas,
        page_heights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn solid_page(index: usize, width: u32, height: u32, value: u8) -> RasterPage {
        let image = RgbImage::from_pixel(width, height, Rgb([value, value, value]));
        RasterPage::new(index, DynamicImage::ImageRgb8(image))
    }

    #[test]
    fn test_equal_width_pages() {
        let pages = vec![
            solid_page(0, 40, 30, 10),
            solid_page(1, 40, 50, 20),
            solid_page(2, 40, 20, 30),
        ];

        let composite = build_composite(&pages).unwrap();
        assert_eq!(composite.width(), 40);
        assert_eq!(composite.height(), 100);
        assert_eq!(composite.page_heights(), &[30, 50, 20]);
    }

    #[test]
    fn test_page_order_preserved() {
        let pages = vec![solid_page(0, 10, 5, 10), solid_page(1, 10, 5, 200)];

        let composite = build_composite(&pages).unwrap();
        let rgb = composite.as_rgb();
        assert_eq!(rgb.get_pixel(0, 0)[0], 10);
        assert_eq!(rgb.get_pixel(0, 4)[0], 10);
        assert_eq!(rgb.get_pixel(0, 5)[0], 200);
        assert_eq!(rgb.get_pixel(9, 9)[0], 200);
    }

    #[test]
    fn test_narrow_pages_padded_not_cropped() {
        let pages = vec![solid_page(0, 30, 10, 0), solid_page(1, 50, 10, 0)];

        let composite = build_composite(&pages).unwrap();
        assert_eq!(composite.width(), 50);
        assert_eq!(composite.height(), 20);

        let rgb = composite.as_rgb();
        // Every pixel of the narrow page survives
        for x in 0..30 {
            for y in 0..10 {
                assert_eq!(rgb.get_pixel(x, y), &Rgb([0, 0, 0]));
            }
        }
        // Padding to the right is white
        assert_eq!(rgb.get_pixel(30, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(49, 9), &Rgb([255, 255, 255]));
        // Wider page is intact
        assert_eq!(rgb.get_pixel(49, 10), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(build_composite(&[]).unwrap_err(), DimensionError::NoPages);
    }

    #[test]
    fn test_zero_height_page() {
        let pages = vec![
            solid_page(0, 10, 10, 0),
            RasterPage::new(1, DynamicImage::ImageRgb8(RgbImage::new(10, 0))),
        ];

        assert_eq!(
            build_composite(&pages).unwrap_err(),
            DimensionError::EmptyPage {
                index: 1,
                width: 10,
                height: 0
            }
        );
    }
}
