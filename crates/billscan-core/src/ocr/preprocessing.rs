//! Image normalization for OCR.

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use tracing::debug;

use crate::models::config::PreprocessingConfig;
use crate::pdf::CompositeImage;

/// Grayscale, edge-preserving smoothing, then Gaussian adaptive binarization.
///
/// Scans have uneven illumination, so every pixel is thresholded against a
/// Gaussian-weighted mean of its own neighborhood. Smoothing first keeps
/// scan speckle from fragmenting the threshold around glyph strokes.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    /// Smoothing neighborhood diameter.
    diameter: u32,
    /// Smoothing intensity sigma.
    sigma_color: f32,
    /// Smoothing spatial sigma.
    sigma_space: f32,
    /// Threshold neighborhood side (odd).
    block_size: u32,
    /// Constant subtracted from the local mean.
    offset: i32,
}

impl ImageNormalizer {
    /// Create a normalizer with default settings.
    pub fn new() -> Self {
        Self::from_config(&PreprocessingConfig::default())
    }

    pub fn from_config(config: &PreprocessingConfig) -> Self {
        Self {
            diameter: config.bilateral_diameter,
            sigma_color: config.sigma_color,
            sigma_space: config.sigma_space,
            block_size: config.threshold_block_size,
            offset: config.threshold_offset,
        }
    }

    /// Set smoothing parameters.
    pub fn with_bilateral(mut self, diameter: u32, sigma_color: f32, sigma_space: f32) -> Self {
        self.diameter = diameter;
        self.sigma_color = sigma_color;
        self.sigma_space = sigma_space;
        self
    }

    /// Normalize a composite page stack into a black/white image of the same size.
    pub fn normalize(&self, composite: &CompositeImage) -> GrayImage {
        self.normalize_gray(luma_601(composite.as_rgb()))
    }

    /// Normalize an arbitrary image.
    pub fn normalize_image(&self, image: &DynamicImage) -> GrayImage {
        self.normalize_gray(luma_601(&image.to_rgb8()))
    }

    fn normalize_gray(&self, gray: GrayImage) -> GrayImage {
        debug!(
            "Normalizing {}x{} image (bilateral d={} sc={} ss={}, block={} C={})",
            gray.width(),
            gray.height(),
            self.diameter,
            self.sigma_color,
            self.sigma_space,
            self.block_size,
            self.offset
        );

        let smoothed = self.bilateral_filter(&gray);
        self.adaptive_threshold(&smoothed)
    }

    /// Edge-preserving smoothing over a circular neighborhood.
    ///
    /// Each neighbor is weighted by its spatial distance and by its intensity
    /// difference from the center, so strong glyph edges survive while small
    /// speckle is averaged away. Borders are mirrored without repeating the
    /// edge pixel (`dcb|abcd|cba`).
    fn bilateral_filter(&self, image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        let radius = i64::from(self.diameter / 2);
        if radius == 0 || width == 0 || height == 0 {
            return image.clone();
        }

        let space_coeff = -0.5 / (self.sigma_space * self.sigma_space);
        let color_coeff = -0.5 / (self.sigma_color * self.sigma_color);

        let color_weights: Vec<f32> = (0..256u32)
            .map(|d| ((d * d) as f32 * color_coeff).exp())
            .collect();

        let mut offsets = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let r2 = dx * dx + dy * dy;
                if r2 > radius * radius {
                    continue;
                }
                offsets.push((dx, dy, (r2 as f32 * space_coeff).exp()));
            }
        }

        let src = image.as_raw();
        let (w, h) = (i64::from(width), i64::from(height));
        let mut result = GrayImage::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let center = i32::from(src[y as usize * width as usize + x as usize]);
                let mut sum = 0.0f32;
                let mut weight_sum = 0.0f32;

                for &(dx, dy, space_weight) in &offsets {
                    let sx = reflect_101(i64::from(x) + dx, w);
                    let sy = reflect_101(i64::from(y) + dy, h);
                    let value = i32::from(src[(sy * w + sx) as usize]);

                    let weight =
                        space_weight * color_weights[(value - center).unsigned_abs() as usize];
                    sum += weight * value as f32;
                    weight_sum += weight;
                }

                let output = (sum / weight_sum).round().clamp(0.0, 255.0) as u8;
                result.put_pixel(x, y, Luma([output]));
            }
        }

        result
    }

    /// Binarize against a Gaussian-weighted local mean minus `offset`.
    ///
    /// Pixels brighter than the threshold become white (255), the rest black.
    fn adaptive_threshold(&self, image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        let mut result = GrayImage::new(width, height);
        if width == 0 || height == 0 {
            return result;
        }

        let local_mean = self.gaussian_mean(image);

        for (x, y, pixel) in image.enumerate_pixels() {
            let mean = i32::from(local_mean[y as usize * width as usize + x as usize]);
            let threshold = mean - self.offset;
            let output = if i32::from(pixel[0]) > threshold { 255 } else { 0 };
            result.put_pixel(x, y, Luma([output]));
        }

        result
    }

    /// Separable Gaussian blur with replicated borders, rounded to u8.
    fn gaussian_mean(&self, image: &GrayImage) -> Vec<u8> {
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);
        let kernel = gaussian_kernel(self.block_size);
        let half = (kernel.len() / 2) as i64;
        let src = image.as_raw();

        // Horizontal pass
        let mut horizontal = vec![0.0f32; w * h];
        for y in 0..h {
            let row = &src[y * w..(y + 1) * w];
            for x in 0..w {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = (x as i64 + k as i64 - half).clamp(0, w as i64 - 1) as usize;
                    acc += weight * f32::from(row[sx]);
                }
                horizontal[y * w + x] = acc;
            }
        }

        // Vertical pass
        let mut mean = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = (y as i64 + k as i64 - half).clamp(0, h as i64 - 1) as usize;
                    acc += weight * horizontal[sy * w + x];
                }
                mean[y * w + x] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }

        mean
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// ITU-R BT.601 luma in 14-bit fixed point, rounded.
fn luma_601(image: &RgbImage) -> GrayImage {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;

    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        let y = (u32::from(r) * R + u32::from(g) * G + u32::from(b) * B + (1 << 13)) >> 14;
        *dst = Luma([y as u8]);
    }
    gray
}

/// Mirror an out-of-range index back into `0..n` without repeating the edge.
fn reflect_101(i: i64, n: i64) -> i64 {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let i = i.rem_euclid(period);
    if i < n { i } else { period - i }
}

/// Normalized 1-D Gaussian kernel of `size` taps.
///
/// Sigma is derived from the size the same way common vision libraries do
/// when none is given: `0.3 * ((size - 1) / 2 - 1) + 0.8`.
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.max(1) as usize;
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f32;
    let scale = -0.5 / (sigma * sigma);

    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (d * d * scale).exp()
        })
        .collect();

    let total: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= total;
    }
    kernel
}
