//! Core library for scanned utility-bill extraction.
//!
//! This crate provides:
//! - PDF rasterization (lopdf validation, poppler rendering) and page compositing
//! - Image normalization (edge-preserving smoothing, Gaussian adaptive threshold)
//! - Text recognition through the tesseract engine
//! - Header/footer segmentation and anchor-regex field extraction
//!
//! The single entry point is [`process`], which never fails: every error is
//! reported inside the returned [`ExtractionResult`].

pub mod bill;
pub mod error;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;

pub use bill::{BillFieldExtractor, FieldRule, PageLayout, FIELD_RULES};
pub use error::{BillscanError, ErrorKind, Result};
pub use models::bill::{BillRecord, ExtractionResult, FieldMap, ACCOUNT_KEY};
pub use models::config::BillscanConfig;
pub use ocr::{ImageNormalizer, OcrText, TesseractEngine, TextRecognizer};
pub use pdf::{CompositeImage, PageRasterizer, PdftoppmRasterizer, RasterPage};
pub use pipeline::{process, BillPipeline};
