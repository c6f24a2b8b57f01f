//! Batch processing command for multiple bills.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use billscan_core::{BillPipeline, BillRecord, ExtractionResult, FIELD_RULES};

use super::process::{format_result, OutputFormat, LINE_JOINER};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV keyed by account number
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct FileOutcome {
    path: PathBuf,
    result: ExtractionResult,
    processed_at: DateTime<Local>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching PDF files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    // Invocations share only the read-only pipeline
    let pipeline = Arc::new(BillPipeline::from_config(&config)?);
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let pipeline = Arc::clone(&pipeline);
        let semaphore = Arc::clone(&semaphore);

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let file_start = Instant::now();
            let result = {
                let path = path.clone();
                tokio::task::spawn_blocking(move || pipeline.process(&path)).await?
            };

            Ok::<_, anyhow::Error>(FileOutcome {
                path,
                result,
                processed_at: Local::now(),
                processing_time_ms: file_start.elapsed().as_millis() as u64,
            })
        }));
    }

    // Collect in input order so later files win summary upserts
    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        let outcome = handle.await??;
        overall_pb.inc(1);

        if !outcome.result.success {
            let error_msg = outcome.result.error.as_deref().unwrap_or("unknown error");
            if args.continue_on_error {
                warn!("Failed to process {}: {}", outcome.path.display(), error_msg);
            } else {
                error!("Failed to process {}: {}", outcome.path.display(), error_msg);
                overall_pb.abandon();
                anyhow::bail!(
                    "Processing failed for {}: {}",
                    outcome.path.display(),
                    error_msg
                );
            }
        }

        outcomes.push(outcome);
    }

    overall_pb.finish_with_message("Complete");

    // Write per-file outputs
    if let Some(ref output_dir) = args.output_dir {
        for outcome in &outcomes {
            let output_name = outcome
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("bill");
            let output_path =
                output_dir.join(format!("{}.{}", output_name, args.format.extension()));

            let content = format_result(&outcome.path, &outcome.result, args.format)?;
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    let successful: Vec<_> = outcomes.iter().filter(|o| o.result.success).collect();
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.result.success).collect();

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        let mut ledger = SummaryLedger::new();
        for outcome in &successful {
            if let Some(record) = &outcome.result.results {
                ledger.upsert(&outcome.path, record, outcome.processed_at);
            }
        }

        ledger.write(&summary_path)?;
        println!(
            "{} Summary of {} accounts written to {}",
            style("✓").green(),
            ledger.len(),
            summary_path.display()
        );

        if !ledger.rejected().is_empty() {
            println!(
                "{}",
                style("Rejected (no integer account number):").yellow()
            );
            for path in ledger.rejected() {
                println!("  - {}", path.display());
            }
        }
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            println!(
                "  - {} ({}ms): {}",
                outcome.path.display(),
                outcome.processing_time_ms,
                outcome.result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// One summary row per account.
#[derive(Debug, Clone)]
struct SummaryRow {
    account: i64,
    path: PathBuf,
    processed_at: DateTime<Local>,
    record: BillRecord,
}

/// Account-keyed summary where a later record replaces an earlier one with
/// the same key.
#[derive(Debug, Default)]
struct SummaryLedger {
    rows: Vec<SummaryRow>,
    index: HashMap<i64, usize>,
    rejected: Vec<PathBuf>,
}

impl SummaryLedger {
    fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the row for the record's account. Returns `false`
    /// when the record has no integer account number.
    fn upsert(&mut self, path: &Path, record: &BillRecord, processed_at: DateTime<Local>) -> bool {
        let Some(account) = record.account_key() else {
            self.rejected.push(path.to_path_buf());
            return false;
        };

        let row = SummaryRow {
            account,
            path: path.to_path_buf(),
            processed_at,
            record: record.clone(),
        };

        match self.index.get(&account) {
            Some(&i) => {
                debug!(
                    "Account {} from {} replaces {}",
                    account,
                    path.display(),
                    self.rows[i].path.display()
                );
                self.rows[i] = row;
            }
            None => {
                self.index.insert(account, self.rows.len());
                self.rows.push(row);
            }
        }

        true
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn rejected(&self) -> &[PathBuf] {
        &self.rejected
    }

    fn write(&self, path: &Path) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;

        let mut header = vec!["account", "file", "processed_at"];
        header.extend(FIELD_RULES.iter().map(|rule| rule.key));
        header.extend(["First 5 Customer Rows", "Footer Block"]);
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![
                row.account.to_string(),
                row.path.display().to_string(),
                row.processed_at.to_rfc3339(),
            ];
            for rule in FIELD_RULES.iter() {
                record.push(row.record.fields.get(rule.key).unwrap_or_default().to_string());
            }
            record.push(row.record.header_lines.join(LINE_JOINER));
            record.push(row.record.footer_lines.join(LINE_JOINER));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billscan_core::FieldMap;

    fn record(account: Option<&str>, deposit: &str) -> BillRecord {
        let mut fields = FieldMap::new();
        fields.insert("ACC_No", account.map(str::to_string));
        fields.insert("Deposit", Some(deposit.to_string()));
        BillRecord {
            fields,
            header_lines: vec![],
            footer_lines: vec![],
        }
    }

    #[test]
    fn test_later_file_replaces_same_account() {
        let mut ledger = SummaryLedger::new();
        let now = Local::now();

        assert!(ledger.upsert(Path::new("a.pdf"), &record(Some("1234567"), "10.00"), now));
        assert!(ledger.upsert(Path::new("b.pdf"), &record(Some("7654321"), "20.00"), now));
        assert!(ledger.upsert(Path::new("c.pdf"), &record(Some("1234567"), "30.00"), now));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.rows[0].path, PathBuf::from("c.pdf"));
        assert_eq!(ledger.rows[0].record.fields.get("Deposit"), Some("30.00"));
        assert_eq!(ledger.rows[1].account, 7654321);
    }

    #[test]
    fn test_non_integer_account_rejected() {
        let mut ledger = SummaryLedger::new();
        let now = Local::now();

        assert!(!ledger.upsert(Path::new("a.pdf"), &record(None, "1.00"), now));
        assert!(!ledger.upsert(Path::new("b.pdf"), &record(Some("12AB567"), "1.00"), now));

        assert_eq!(ledger.len(), 0);
        assert_eq!(
            ledger.rejected(),
            &[PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]
        );
    }

    #[test]
    fn test_write_summary_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        let mut ledger = SummaryLedger::new();
        ledger.upsert(Path::new("a.pdf"), &record(Some("1234567"), "10.00"), Local::now());
        ledger.write(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("account,file,processed_at,Stand_No"));
        assert!(lines.next().unwrap().starts_with("1234567,a.pdf,"));
        assert!(lines.next().is_none());
    }
}
