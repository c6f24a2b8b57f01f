//! Image normalization and text recognition.

mod engine;
mod preprocessing;

pub use engine::TesseractEngine;
pub use preprocessing::ImageNormalizer;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// Recognition language. Bills are English-only.
pub const OCR_LANGUAGE: &str = "eng";

/// Trait for engines turning a binary image into text.
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text of `image`, lines separated by line breaks in
    /// top-to-bottom reading order.
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError>;
}

/// Raw recognizer output plus its trimmed, non-empty lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrText {
    /// Text exactly as produced by the recognizer.
    pub raw_text: String,
    /// Non-empty, trimmed lines in reading order.
    pub lines: Vec<String>,
}

impl OcrText {
    pub fn new(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let lines = split_lines(&raw_text);
        Self { raw_text, lines }
    }

    pub fn is_blank(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Split on every line boundary, trim each line and drop the empty ones.
///
/// Form feeds and the other Unicode line separators count as breaks, so the
/// page-end marker some engines emit never glues two lines together.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split(is_line_break)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}' | '\u{2028}'
            | '\u{2029}'
    )
}
