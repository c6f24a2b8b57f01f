//! Process command - extract fields from a single bill.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use billscan_core::{BillPipeline, ExtractionResult, FIELD_RULES};

/// Separator used when a line block is flattened into one cell.
pub const LINE_JOINER: &str = " | ";

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;
    let pipeline = BillPipeline::from_config(&config)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("Extracting {}", args.input.display()));

    let input = args.input.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.process(&input)).await?;

    pb.finish_and_clear();

    let output = format_result(&args.input, &result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    if !result.success {
        anyhow::bail!(
            "Extraction failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

/// Render a result in the requested format.
pub fn format_result(
    path: &Path,
    result: &ExtractionResult,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(path, result),
        OutputFormat::Text => Ok(format_text(path, result)),
    }
}

fn format_csv(path: &Path, result: &ExtractionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["file", "success"];
    header.extend(FIELD_RULES.iter().map(|rule| rule.key));
    header.extend(["First 5 Customer Rows", "Footer Block", "error_kind", "error"]);
    wtr.write_record(&header)?;

    let mut row = vec![
        path.display().to_string(),
        result.success.to_string(),
    ];
    for rule in FIELD_RULES.iter() {
        let value = result.fields().and_then(|fields| fields.get(rule.key));
        row.push(value.unwrap_or_default().to_string());
    }
    match &result.results {
        Some(record) => {
            row.push(record.header_lines.join(LINE_JOINER));
            row.push(record.footer_lines.join(LINE_JOINER));
        }
        None => row.extend([String::new(), String::new()]),
    }
    row.push(result.error_kind.map(|k| k.to_string()).unwrap_or_default());
    row.push(result.error.clone().unwrap_or_default());
    wtr.write_record(&row)?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(path: &Path, result: &ExtractionResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Bill: {}\n", path.display()));

    let Some(record) = &result.results else {
        output.push_str(&format!(
            "Failed ({}): {}\n",
            result
                .error_kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "ExtractionFailure".to_string()),
            result.error.as_deref().unwrap_or("unknown error")
        ));
        return output;
    };

    output.push_str(&format!(
        "Fields found: {}/{}\n",
        record.fields.found_count(),
        record.fields.len()
    ));
    output.push('\n');

    output.push_str("Customer:\n");
    for line in &record.header_lines {
        output.push_str(&format!("  {}\n", line));
    }
    output.push('\n');

    output.push_str("Fields:\n");
    for (key, value) in record.fields.iter() {
        output.push_str(&format!("  {:<16} {}\n", key, value.unwrap_or("-")));
    }

    if !record.footer_lines.is_empty() {
        output.push('\n');
        output.push_str("Footer:\n");
        for line in &record.footer_lines {
            output.push_str(&format!("  {}\n", line));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use billscan_core::{BillRecord, ErrorKind, FieldMap};

    fn sample_result() -> ExtractionResult {
        let mut fields = FieldMap::new();
        for rule in FIELD_RULES.iter() {
            fields.insert(rule.key, None);
        }
        fields.insert("ACC_No", Some("10023456".to_string()));
        ExtractionResult::success(BillRecord {
            fields,
            header_lines: vec!["MR J SMITH".to_string(), "12 MAIN ROAD".to_string()],
            footer_lines: vec!["Phone: 555 0100".to_string()],
        })
    }

    #[test]
    fn test_csv_has_every_field_column() {
        let csv = format_csv(Path::new("bill.pdf"), &sample_result()).unwrap();
        let mut lines = csv.lines();
        let header: Vec<_> = lines.next().unwrap().split(',').collect();
        assert_eq!(header.len(), 2 + 22 + 4);
        assert_eq!(header[5], "ACC_No");

        let row = lines.next().unwrap();
        assert!(row.starts_with("bill.pdf,true,"));
        assert!(row.contains("10023456"));
        assert!(row.contains("MR J SMITH | 12 MAIN ROAD"));
    }

    #[test]
    fn test_text_failure() {
        let result = ExtractionResult::failure(ErrorKind::PdfConversionError, "cannot read");
        let text = format_text(Path::new("missing.pdf"), &result);
        assert!(text.contains("Failed (PdfConversionError): cannot read"));
    }

    #[test]
    fn test_text_success_lists_fields() {
        let text = format_text(Path::new("bill.pdf"), &sample_result());
        assert!(text.contains("Fields found: 1/22"));
        assert!(text.contains("ACC_No"));
        assert!(text.contains("Footer:"));
    }
}
