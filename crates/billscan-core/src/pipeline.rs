//! End-to-end extraction pipeline.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::bill::{self, BillFieldExtractor};
use crate::error::{BillscanError, Result};
use crate::models::bill::{BillRecord, ExtractionResult};
use crate::models::config::BillscanConfig;
use crate::ocr::{ImageNormalizer, TesseractEngine, TextRecognizer};
use crate::pdf::{self, PageRasterizer, PdftoppmRasterizer};

/// Runs the stages in order: rasterize, composite, normalize, recognize,
/// segment and extract.
///
/// A pipeline holds no per-document state, so one instance can serve
/// concurrent invocations.
pub struct BillPipeline<R, T> {
    rasterizer: R,
    recognizer: T,
    normalizer: ImageNormalizer,
    extractor: BillFieldExtractor,
    dpi: u32,
}

impl BillPipeline<PdftoppmRasterizer, TesseractEngine> {
    /// Build a pipeline backed by `pdftoppm` and `tesseract`.
    pub fn from_config(config: &BillscanConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self::new(
            PdftoppmRasterizer::new(config.pdf.pdftoppm_cmd.clone()),
            TesseractEngine::new(&config.ocr),
        )
        .with_normalizer(ImageNormalizer::from_config(&config.preprocessing))
        .with_dpi(config.pdf.render_dpi))
    }
}

impl<R: PageRasterizer, T: TextRecognizer> BillPipeline<R, T> {
    /// Create a pipeline with default normalization at 300 DPI.
    pub fn new(rasterizer: R, recognizer: T) -> Self {
        Self {
            rasterizer,
            recognizer,
            normalizer: ImageNormalizer::new(),
            extractor: BillFieldExtractor::new(),
            dpi: 300,
        }
    }

    pub fn with_normalizer(mut self, normalizer: ImageNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Process a bill, reporting every failure (panics included) in the
    /// returned result.
    pub fn process(&self, path: &Path) -> ExtractionResult {
        let start = Instant::now();
        info!("Processing {}", path.display());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_process(path)));

        let result = match outcome {
            Ok(result) => ExtractionResult::from(result),
            Err(payload) => ExtractionResult::from_error(&BillscanError::ExtractionFailure(
                panic_message(payload.as_ref()),
            )),
        };

        match result.error {
            None => info!(
                "Processed {} in {}ms",
                path.display(),
                start.elapsed().as_millis()
            ),
            Some(ref error) => warn!("Failed to process {}: {}", path.display(), error),
        }

        result
    }

    /// Process a bill, propagating the first failure.
    pub fn try_process(&self, path: &Path) -> Result<BillRecord> {
        let start = Instant::now();

        let pages = self.rasterizer.rasterize(path, self.dpi)?;
        debug!(
            "Rasterized {} pages in {}ms",
            pages.len(),
            start.elapsed().as_millis()
        );

        let composite = pdf::build_composite(&pages)?;
        drop(pages);
        info!(
            "Composite image {}x{} from {} pages",
            composite.width(),
            composite.height(),
            composite.page_count()
        );

        let binary = self.normalizer.normalize(&composite);
        drop(composite);

        let raw_text = self.recognizer.recognize(&binary)?;
        debug!("Recognized {} characters", raw_text.len());

        Ok(self.extract_from_text(&raw_text))
    }

    /// Segment and extract fields from already-recognized text.
    pub fn extract_from_text(&self, raw_text: &str) -> BillRecord {
        let layout = bill::segment(raw_text);
        let fields = self.extractor.extract(raw_text);

        BillRecord {
            fields,
            header_lines: layout.header_lines,
            footer_lines: layout.footer_lines,
        }
    }
}

/// Process a bill with the default configuration and environment overrides.
pub fn process(path: impl AsRef<Path>) -> ExtractionResult {
    let path = path.as_ref();
    let mut config = BillscanConfig::default();
    config.apply_env_overrides();

    match BillPipeline::from_config(&config) {
        Ok(pipeline) => pipeline.process(path),
        Err(e) => ExtractionResult::from_error(&e),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("unexpected panic: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("unexpected panic: {}", message)
    } else {
        "unexpected panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, OcrError, PdfError};
    use crate::pdf::RasterPage;
    use image::{DynamicImage, GrayImage, Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const BILL_TEXT: &str = "CITY OF EXAMPLE\nMR J SMITH\nStand No 4411\nAcc No 10023456\n\
                             Payments up to 01/02/2024\nPayments 100\nEnquiries\nPhone: 555 0100\n";

    /// Returns blank pages of fixed sizes.
    struct FakeRasterizer {
        sizes: Vec<(u32, u32)>,
    }

    impl PageRasterizer for FakeRasterizer {
        fn rasterize(&self, path: &Path, _dpi: u32) -> pdf::Result<Vec<RasterPage>> {
            if !path.exists() {
                return Err(PdfError::Unreadable {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(self
                .sizes
                .iter()
                .enumerate()
                .map(|(i, &(w, h))| {
                    let image = RgbImage::from_pixel(w, h, Rgb([250, 250, 250]));
                    RasterPage::new(i, DynamicImage::ImageRgb8(image))
                })
                .collect())
        }
    }

    /// Returns canned text and records the image geometry it was given.
    struct FakeRecognizer {
        text: std::result::Result<String, String>,
        seen: Mutex<Vec<(u32, u32)>>,
    }

    impl FakeRecognizer {
        fn returning(text: &str) -> Self {
            Self {
                text: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                text: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextRecognizer for FakeRecognizer {
        fn recognize(&self, image: &GrayImage) -> std::result::Result<String, OcrError> {
            self.seen.lock().unwrap().push(image.dimensions());
            self.text.clone().map_err(OcrError::Recognition)
        }
    }

    struct PanickingRecognizer;

    impl TextRecognizer for PanickingRecognizer {
        fn recognize(&self, _image: &GrayImage) -> std::result::Result<String, OcrError> {
            panic!("engine blew up");
        }
    }

    fn existing_pdf() -> tempfile::NamedTempFile {
        tempfile::Builder::new().suffix(".pdf").tempfile().unwrap()
    }

    #[test]
    fn test_process_success() {
        let file = existing_pdf();
        let pipeline = BillPipeline::new(
            FakeRasterizer {
                sizes: vec![(30, 20), (40, 25)],
            },
            FakeRecognizer::returning(BILL_TEXT),
        );

        let result = pipeline.process(file.path());
        assert!(result.success);
        assert!(result.error.is_none());

        // Recognizer saw one composite: max width, summed height
        assert_eq!(*pipeline.recognizer.seen.lock().unwrap(), vec![(40, 45)]);

        let record = result.results.unwrap();
        assert_eq!(record.fields.len(), 22);
        assert_eq!(record.fields.get("ACC_No"), Some("10023456"));
        assert_eq!(record.fields.get("Payments"), Some("100"));
        assert_eq!(record.fields.get("Payments_up_to"), Some("01/02/2024"));
        assert_eq!(record.header_lines, vec!["CITY OF EXAMPLE", "MR J SMITH"]);
        assert_eq!(record.footer_lines.len(), 7);
        assert_eq!(record.footer_lines.last().unwrap(), "Phone: 555 0100");
        assert_eq!(record.account_key(), Some(10023456));
    }

    #[test]
    fn test_missing_fields_still_succeed() {
        let file = existing_pdf();
        let pipeline = BillPipeline::new(
            FakeRasterizer {
                sizes: vec![(10, 10)],
            },
            FakeRecognizer::returning("illegible\nscan\n"),
        );

        let result = pipeline.process(file.path());
        assert!(result.success);
        let fields = result.fields().unwrap();
        assert_eq!(fields.found_count(), 0);
        assert!(result.results.unwrap().footer_lines.is_empty());
    }

    #[test]
    fn test_nonexistent_path() {
        let pipeline = BillPipeline::new(
            FakeRasterizer {
                sizes: vec![(10, 10)],
            },
            FakeRecognizer::returning(BILL_TEXT),
        );

        let result = pipeline.process(Path::new("/no/such/bill.pdf"));
        assert!(!result.success);
        assert!(result.results.is_none());
        assert_eq!(result.error_kind, Some(ErrorKind::PdfConversionError));
        assert!(result.error.unwrap().contains("PDF conversion error"));
    }

    #[test]
    fn test_default_entry_point_nonexistent_path() {
        let result = process("/no/such/bill.pdf");
        assert!(!result.success);
        assert!(result.results.is_none());
        assert_eq!(result.error_kind, Some(ErrorKind::PdfConversionError));
    }

    #[test]
    fn test_ocr_failure() {
        let file = existing_pdf();
        let pipeline = BillPipeline::new(
            FakeRasterizer {
                sizes: vec![(10, 10)],
            },
            FakeRecognizer::failing("no language data"),
        );

        let result = pipeline.process(file.path());
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::OcrEngineError));
        assert!(result.error.unwrap().contains("no language data"));
    }

    #[test]
    fn test_empty_page_is_dimension_mismatch() {
        let file = existing_pdf();
        let pipeline = BillPipeline::new(
            FakeRasterizer {
                sizes: vec![(10, 10), (10, 0)],
            },
            FakeRecognizer::returning(BILL_TEXT),
        );

        let result = pipeline.process(file.path());
        assert_eq!(result.error_kind, Some(ErrorKind::DimensionMismatchError));
        assert!(pipeline.recognizer.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_panic_becomes_extraction_failure() {
        let file = existing_pdf();
        let pipeline = BillPipeline::new(
            FakeRasterizer {
                sizes: vec![(10, 10)],
            },
            PanickingRecognizer,
        );

        let result = pipeline.process(file.path());
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::ExtractionFailure));
        assert!(result.error.unwrap().contains("engine blew up"));
    }

    #[test]
    fn test_extract_from_text() {
        let pipeline = BillPipeline::new(
            FakeRasterizer { sizes: vec![] },
            FakeRecognizer::returning(""),
        );

        let record = pipeline.extract_from_text(BILL_TEXT);
        assert_eq!(record.fields.get("Stand_No"), Some("4411"));
        assert_eq!(record.header_lines.len(), 2);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = BillscanConfig::default();
        config.preprocessing.threshold_block_size = 20;
        assert!(matches!(
            BillPipeline::from_config(&config),
            Err(BillscanError::Config(_))
        ));

        config.preprocessing.threshold_block_size = 21;
        let pipeline = BillPipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.dpi(), 300);
    }
}
