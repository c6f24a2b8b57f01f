//! Page rasterization using poppler's pdftoppm, with a lopdf pre-check for
//! password protection.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use lopdf::encryption::{get_encryption_key, DecryptionError};
use lopdf::Document;
use tracing::{debug, info, trace, warn};

use super::{PageRasterizer, RasterPage, Result};
use crate::error::PdfError;

/// Basic facts about a PDF, gathered before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfInfo {
    /// Number of pages lopdf found, if it could walk the page tree.
    pub page_count: Option<usize>,
    /// Whether the document carried an encryption dictionary.
    pub encrypted: bool,
}

/// Read a PDF and reject it only when it needs a user password.
///
/// Structural damage (broken xref tables, unreadable page trees) is left to
/// the renderer, which repairs many such files on its own.
pub fn inspect_pdf(path: &Path) -> Result<PdfInfo> {
    let data = fs::read(path).map_err(|source| PdfError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let doc = match Document::load_mem(&data) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("lopdf could not parse {}: {}; deferring to renderer", path.display(), e);
            return Ok(PdfInfo {
                page_count: None,
                encrypted: false,
            });
        }
    };

    let encrypted = doc.is_encrypted();
    if encrypted {
        // Owner-password-only files open with an empty user password
        match get_encryption_key(&doc, "", true) {
            Ok(_) => debug!("Encrypted PDF opens with empty user password"),
            Err(DecryptionError::IncorrectPassword) => return Err(PdfError::Encrypted),
            Err(e) => warn!("Cannot verify encryption of {}: {}", path.display(), e),
        }
    }

    let page_count = match doc.get_pages().len() {
        0 => {
            warn!("lopdf found no pages in {}; deferring to renderer", path.display());
            None
        }
        n => Some(n),
    };

    debug!("Inspected PDF: {:?} pages, encrypted: {}", page_count, encrypted);
    Ok(PdfInfo {
        page_count,
        encrypted,
    })
}

/// Rasterizer shelling out to `pdftoppm`.
///
/// Pages are written as PNGs into a temporary directory which is removed
/// before `rasterize` returns.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    command: PathBuf,
}

impl PdftoppmRasterizer {
    /// Create a rasterizer using the given `pdftoppm` executable.
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Path of the renderer executable.
    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Report the renderer version, failing when it cannot be started.
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.command)
            .arg("-v")
            .output()
            .map_err(|e| {
                PdfError::Render(format!("failed to run {}: {}", self.command.display(), e))
            })?;

        // pdftoppm prints its version banner on stderr
        let banner = if output.stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            String::from_utf8_lossy(&output.stderr).into_owned()
        };
        Ok(banner.lines().next().unwrap_or_default().trim().to_string())
    }

    fn render_to_dir(&self, path: &Path, dpi: u32, out_dir: &Path) -> Result<()> {
        let prefix = out_dir.join("page");
        let output = Command::new(&self.command)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(path)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                PdfError::Render(format!("failed to run {}: {}", self.command.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PdfError::Render(format!(
                "{} exited with {}: {}",
                self.command.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new(crate::models::config::PdfConfig::default().pdftoppm_cmd)
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, path: &Path, dpi: u32) -> Result<Vec<RasterPage>> {
        let start = Instant::now();
        let pdf = inspect_pdf(path)?;

        let out_dir = tempfile::Builder::new()
            .prefix("billscan-pages")
            .tempdir()
            .map_err(|e| PdfError::Render(format!("failed to create temp dir: {}", e)))?;

        self.render_to_dir(path, dpi, out_dir.path())?;

        let files = collect_page_files(out_dir.path())?;
        if files.is_empty() {
            return Err(PdfError::Render("renderer produced no pages".to_string()));
        }
        if let Some(expected) = pdf.page_count.filter(|&n| n != files.len()) {
            warn!(
                "Renderer produced {} pages but document has {}",
                files.len(),
                expected
            );
        }
        if pdf.encrypted {
            debug!("Rendered owner-password-protected PDF {}", path.display());
        }

        let mut pages = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let image = image::open(file).map_err(|e| {
                PdfError::Render(format!("failed to load {}: {}", file.display(), e))
            })?;
            trace!("Loaded page {} from {}", index + 1, file.display());
            pages.push(RasterPage::new(index, image));
        }

        info!(
            "Rasterized {} pages at {} DPI in {}ms",
            pages.len(),
            dpi,
            start.elapsed().as_millis()
        );

        Ok(pages)
    }
}

/// List rendered page files in page-number order.
///
/// pdftoppm zero-pads numbers to the width of the page count, so names are
/// ordered by their parsed number rather than lexically.
fn collect_page_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| PdfError::Render(format!("failed to list rendered pages: {}", e)))?;

    let mut numbered: Vec<(usize, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            page_number(name).map(|n| (n, path.clone()))
        })
        .collect();

    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

/// Parse the page number out of a `<prefix>-<n>.png` file name.
fn page_number(file_name: &str) -> Option<usize> {
    let stem = file_name.strip_suffix(".png")?;
    let (_, number) = stem.rsplit_once('-')?;
    number.parse().ok()
}
