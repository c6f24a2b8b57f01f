//! Check command - verify the external renderer and OCR engine.

use console::style;

use billscan_core::{PdftoppmRasterizer, TesseractEngine};

pub async fn run(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    config.validate()?;

    let rasterizer = PdftoppmRasterizer::new(config.pdf.pdftoppm_cmd.clone());
    let engine = TesseractEngine::new(&config.ocr);

    let renderer = rasterizer.version().map_err(|e| e.to_string());
    let recognizer = engine.version().map_err(|e| e.to_string());

    report("Renderer", &rasterizer.command().display().to_string(), &renderer);
    report("OCR engine", &engine.command().display().to_string(), &recognizer);

    if let Some(ref dir) = config.ocr.tessdata_dir {
        let model = dir.join("eng.traineddata");
        if model.exists() {
            println!("{} Language data: {}", style("✓").green(), model.display());
        } else {
            println!(
                "{} Language data not found: {}",
                style("✗").red(),
                model.display()
            );
        }
    }

    if renderer.is_err() || recognizer.is_err() {
        anyhow::bail!("External tools are not available");
    }

    Ok(())
}

fn report(label: &str, command: &str, outcome: &Result<String, String>) {
    match outcome {
        Ok(version) => println!("{} {}: {} ({})", style("✓").green(), label, version, command),
        Err(e) => println!("{} {}: {}", style("✗").red(), label, e),
    }
}
