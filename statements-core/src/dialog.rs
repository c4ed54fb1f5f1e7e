//! View models for the transient dialogs: upload, parse progress, file
//! selection and results. Front ends only draw these.

use serde::Serialize;

use crate::account::Account;
use crate::classify::FileKind;
use crate::inventory::MonthRecord;
use crate::month::MonthKey;
use crate::session::{ParseOutcome, ProgressRecord};
use crate::upload::{UploadBatch, UploadResult};

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRow {
    pub filename: String,
    pub size: String,
    pub valid: bool,
    /// Classification when valid, rejection reason otherwise.
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadDialog {
    pub rows: Vec<UploadRow>,
    pub can_submit: bool,
    pub summary: String,
}

impl UploadDialog {
    pub fn new(batch: &UploadBatch) -> Self {
        let rows = batch
            .checks
            .iter()
            .map(|c| UploadRow {
                filename: c.candidate.filename.clone(),
                size: format_size(c.candidate.size),
                valid: c.is_valid(),
                note: match &c.verdict {
                    Ok(class) => class.describe(),
                    Err(reason) => reason.to_string(),
                },
            })
            .collect();
        let valid = batch.valid_count();
        let invalid = batch.checks.len() - valid;
        let summary = if invalid == 0 {
            format!("{valid} file(s) ready to upload")
        } else {
            format!("{valid} file(s) ready, {invalid} rejected")
        };
        Self {
            rows,
            can_submit: batch.can_submit(),
            summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseProgressDialog {
    pub title: String,
    pub percentage: u8,
    pub status: String,
    pub details: String,
    pub current_file: Option<String>,
    pub counts: String,
}

impl ParseProgressDialog {
    pub fn new(account_name: &str, record: &ProgressRecord) -> Self {
        Self {
            title: format!("Parsing {account_name}"),
            percentage: record.progress_percentage,
            status: record.status.to_string(),
            details: record.details.clone(),
            current_file: record.current_file.clone(),
            counts: format!(
                "{}/{} processed, {} skipped, {} transactions",
                record.files_processed,
                record.total_files,
                record.files_skipped,
                record.transactions_added
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOption {
    pub kind: FileKind,
    pub label: String,
}

/// Shown when an STP month holds both variants and the user must pick one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSelectionDialog {
    pub title: String,
    pub account_id: String,
    pub month: MonthKey,
    pub options: Vec<FileOption>,
}

impl FileSelectionDialog {
    pub fn new(account: &Account, month: MonthKey, record: &MonthRecord) -> Self {
        let mut options = Vec::new();
        if let Some(x) = record.xlsx() {
            options.push(FileOption {
                kind: FileKind::Xlsx,
                label: format!("Excel ({} transactions)", x.transaction_count),
            });
        }
        if record.pdf().is_some() {
            options.push(FileOption {
                kind: FileKind::Pdf,
                label: "PDF".to_string(),
            });
        }
        Self {
            title: format!("{} {} {}", account.name, month.name(), month.year()),
            account_id: account.id.to_string(),
            month,
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultLine {
    pub success: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultsDialog {
    pub title: String,
    pub success: bool,
    pub lines: Vec<ResultLine>,
}

impl ResultsDialog {
    pub fn uploads(results: &[UploadResult]) -> Self {
        let ok = results.iter().filter(|r| r.success).count();
        let lines = results
            .iter()
            .map(|r| {
                let text = if r.success {
                    match &r.account_name {
                        Some(name) => format!("{}: uploaded to {name}", r.filename),
                        None => format!("{}: uploaded", r.filename),
                    }
                } else {
                    format!(
                        "{}: {}",
                        r.filename,
                        r.error.as_deref().unwrap_or("upload failed")
                    )
                };
                ResultLine {
                    success: r.success,
                    text,
                }
            })
            .collect();
        Self {
            title: format!("Upload results: {ok} of {} succeeded", results.len()),
            success: ok > 0,
            lines,
        }
    }

    pub fn parse(account_name: &str, outcome: &ParseOutcome) -> Self {
        let title = match outcome {
            ParseOutcome::AlreadyCurrent { .. } => format!("{account_name} is up to date"),
            ParseOutcome::Updated { .. } => format!("{account_name} parsed"),
            ParseOutcome::Failed { .. } => format!("{account_name} parse failed"),
        };
        Self {
            title,
            success: outcome.is_success(),
            lines: vec![ResultLine {
                success: outcome.is_success(),
                text: outcome.message(),
            }],
        }
    }
}
