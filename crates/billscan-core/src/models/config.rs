//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::BillscanError;

/// Environment variable overriding the tesseract executable.
pub const TESSERACT_CMD_ENV: &str = "TESSERACT_CMD";

/// Environment variable overriding the pdftoppm executable.
pub const PDFTOPPM_CMD_ENV: &str = "PDFTOPPM_CMD";

/// Main configuration for the billscan pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillscanConfig {
    /// PDF rasterization configuration.
    pub pdf: PdfConfig,

    /// Text recognition configuration.
    pub ocr: OcrConfig,

    /// Image normalization configuration.
    pub preprocessing: PreprocessingConfig,
}

/// PDF rasterization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// DPI for rendering PDF pages to images.
    pub render_dpi: u32,

    /// Path to poppler's `pdftoppm` executable.
    pub pdftoppm_cmd: PathBuf,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            render_dpi: 300,
            pdftoppm_cmd: default_pdftoppm_cmd(),
        }
    }
}

/// Recognition engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Path to the tesseract executable.
    pub tesseract_cmd: PathBuf,

    /// Directory holding `eng.traineddata`, if not the engine default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tessdata_dir: Option<PathBuf>,

    /// Page segmentation mode passed as `--psm`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_seg_mode: Option<u8>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: default_tesseract_cmd(),
            tessdata_dir: None,
            page_seg_mode: None,
        }
    }
}

/// Image normalization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Neighborhood diameter of the edge-preserving smoothing filter.
    pub bilateral_diameter: u32,

    /// Intensity sigma of the smoothing filter.
    pub sigma_color: f32,

    /// Spatial sigma of the smoothing filter.
    pub sigma_space: f32,

    /// Side of the Gaussian neighborhood used for local thresholds (odd).
    pub threshold_block_size: u32,

    /// Constant subtracted from the local weighted mean.
    pub threshold_offset: i32,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            bilateral_diameter: 9,
            sigma_color: 75.0,
            sigma_space: 75.0,
            threshold_block_size: 21,
            threshold_offset: 10,
        }
    }
}

fn default_tesseract_cmd() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe")
    } else {
        PathBuf::from("tesseract")
    }
}

fn default_pdftoppm_cmd() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("pdftoppm.exe")
    } else {
        PathBuf::from("pdftoppm")
    }
}

impl BillscanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Replace engine locations with `TESSERACT_CMD` / `PDFTOPPM_CMD` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Some(cmd) = std::env::var_os(TESSERACT_CMD_ENV).filter(|v| !v.is_empty()) {
            self.ocr.tesseract_cmd = PathBuf::from(cmd);
        }
        if let Some(cmd) = std::env::var_os(PDFTOPPM_CMD_ENV).filter(|v| !v.is_empty()) {
            self.pdf.pdftoppm_cmd = PathBuf::from(cmd);
        }
    }

    /// Check parameter ranges before building a pipeline.
    pub fn validate(&self) -> Result<(), BillscanError> {
        if self.pdf.render_dpi == 0 {
            return Err(BillscanError::Config("pdf.render_dpi must be positive".to_string()));
        }

        let pre = &self.preprocessing;
        if pre.bilateral_diameter == 0 {
            return Err(BillscanError::Config(
                "preprocessing.bilateral_diameter must be positive".to_string(),
            ));
        }
        if !(pre.sigma_color > 0.0) || !(pre.sigma_space > 0.0) {
            return Err(BillscanError::Config(
                "preprocessing sigmas must be positive".to_string(),
            ));
        }
        if pre.threshold_block_size < 3 || pre.threshold_block_size % 2 == 0 {
            return Err(BillscanError::Config(format!(
                "preprocessing.threshold_block_size must be odd and >= 3, got {}",
                pre.threshold_block_size
            )));
        }

        Ok(())
    }
}
