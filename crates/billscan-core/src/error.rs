//! Error types for the billscan-core library.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the billscan library.
#[derive(Error, Debug)]
pub enum BillscanError {
    /// The PDF could not be opened, parsed or rendered.
    #[error("PDF conversion error: {0}")]
    PdfConversion(#[from] PdfError),

    /// Page geometry cannot be stacked into one composite image.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(#[from] DimensionError),

    /// The recognition engine is unavailable or failed.
    #[error("OCR engine error: {0}")]
    OcrEngine(#[from] OcrError),

    /// Any other unexpected condition.
    #[error("extraction failure: {0}")]
    ExtractionFailure(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BillscanError {
    /// Coarse error class reported alongside a failed extraction.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillscanError::PdfConversion(_) => ErrorKind::PdfConversionError,
            BillscanError::DimensionMismatch(_) => ErrorKind::DimensionMismatchError,
            BillscanError::OcrEngine(_) => ErrorKind::OcrEngineError,
            BillscanError::ExtractionFailure(_) | BillscanError::Config(_) => {
                ErrorKind::ExtractionFailure
            }
        }
    }
}

/// Error classes exposed to consumers of an `ExtractionResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    PdfConversionError,
    DimensionMismatchError,
    OcrEngineError,
    ExtractionFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::PdfConversionError => "PdfConversionError",
            ErrorKind::DimensionMismatchError => "DimensionMismatchError",
            ErrorKind::OcrEngineError => "OcrEngineError",
            ErrorKind::ExtractionFailure => "ExtractionFailure",
        };
        f.write_str(name)
    }
}

/// Errors related to PDF loading and rasterization.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The path does not point at a readable file.
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The PDF needs a user password to open.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The page renderer failed or produced unusable output.
    #[error("failed to render pages: {0}")]
    Render(String),
}

/// Errors raised while stacking pages into a composite image.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DimensionError {
    /// Nothing to stack.
    #[error("no pages to combine")]
    NoPages,

    /// A page has zero width or height.
    #[error("page {index} has degenerate size {width}x{height}")]
    EmptyPage { index: usize, width: u32, height: u32 },

    /// The stacked height does not fit in an image buffer.
    #[error("combined page height overflows")]
    HeightOverflow,
}

/// Errors related to text recognition.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The engine executable could not be started.
    #[error("engine {command} is unavailable: {source}")]
    EngineUnavailable {
        command: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran but reported a failure.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// The image could not be handed to the engine.
    #[error("failed to prepare image for recognition: {0}")]
    ImageHandoff(String),
}

/// Result type for the billscan library.
pub type Result<T> = std::result::Result<T, BillscanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            BillscanError::from(PdfError::Encrypted).kind(),
            ErrorKind::PdfConversionError
        );
        assert_eq!(
            BillscanError::from(DimensionError::NoPages).kind(),
            ErrorKind::DimensionMismatchError
        );
        assert_eq!(
            BillscanError::from(OcrError::Recognition("boom".to_string())).kind(),
            ErrorKind::OcrEngineError
        );
        assert_eq!(
            BillscanError::Config("bad".to_string()).kind(),
            ErrorKind::ExtractionFailure
        );
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::OcrEngineError.to_string(), "OcrEngineError");
    }
}
