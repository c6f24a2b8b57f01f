//! Tesseract recognition engine driven as an external process.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use image::{GrayImage, ImageFormat};
use tracing::{debug, info};

use super::{TextRecognizer, OCR_LANGUAGE};
use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Recognizer that runs the `tesseract` executable on a temporary PNG.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: PathBuf,
    tessdata_dir: Option<PathBuf>,
    page_seg_mode: Option<u8>,
}

impl TesseractEngine {
    /// Create an engine from configuration.
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            command: config.tesseract_cmd.clone(),
            tessdata_dir: config.tessdata_dir.clone(),
            page_seg_mode: config.page_seg_mode,
        }
    }

    /// Create an engine using a specific executable and engine defaults.
    pub fn with_command(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            tessdata_dir: None,
            page_seg_mode: None,
        }
    }

    /// Path of the engine executable.
    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Report the engine version, failing when the executable cannot be started.
    pub fn version(&self) -> Result<String, OcrError> {
        let output = Command::new(&self.command)
            .arg("--version")
            .output()
            .map_err(|source| OcrError::EngineUnavailable {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OcrError::Recognition(format!(
                "{} --version exited with {}",
                self.command.display(),
                output.status
            )));
        }

        // Older releases print the banner on stderr
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        Ok(banner.lines().next().unwrap_or_default().trim().to_string())
    }

    fn build_command(&self, image_path: &Path) -> Command {
        let mut command = Command::new(&self.command);
        command
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(OCR_LANGUAGE);

        if let Some(ref dir) = self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
        if let Some(psm) = self.page_seg_mode {
            command.arg("--psm").arg(psm.to_string());
        }

        command
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new(&OcrConfig::default())
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
        let start = Instant::now();
        info!("Running OCR on {}x{} image", image.width(), image.height());

        let input = tempfile::Builder::new()
            .prefix("billscan-ocr")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::ImageHandoff(format!("failed to create temp file: {}", e)))?;

        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| OcrError::ImageHandoff(e.to_string()))?;

        let output = self
            .build_command(input.path())
            .output()
            .map_err(|source| OcrError::EngineUnavailable {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(format!(
                "{} exited with {}: {}",
                self.command.display(),
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();

        debug!(
            "OCR produced {} characters in {}ms",
            text.len(),
            start.elapsed().as_millis()
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_command_arguments() {
        let config = OcrConfig {
            tesseract_cmd: PathBuf::from("/opt/tesseract/bin/tesseract"),
            tessdata_dir: Some(PathBuf::from("/opt/tessdata")),
            page_seg_mode: Some(4),
        };
        let engine = TesseractEngine::new(&config);
        let command = engine.build_command(Path::new("/tmp/page.png"));

        assert_eq!(command.get_program(), "/opt/tesseract/bin/tesseract");
        let args: Vec<_> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "/tmp/page.png",
                "stdout",
                "-l",
                "eng",
                "--tessdata-dir",
                "/opt/tessdata",
                "--psm",
                "4"
            ]
        );
    }

    #[test]
    fn test_missing_engine_is_unavailable() {
        let engine = TesseractEngine::with_command("/no/such/tesseract");
        let image = GrayImage::from_pixel(8, 8, Luma([255]));

        let err = engine.recognize(&image).unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable { .. }));
        assert!(matches!(
            engine.version(),
            Err(OcrError::EngineUnavailable { .. })
        ));
    }
}
