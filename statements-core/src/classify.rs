//! Filename classifier for uploaded statements.
//!
//! Two naming schemes are recognised:
//!   STP:  ec-<18-digit account>-<YYYYMM>.<pdf|xlsx|xls>
//!   BBVA: <YYMM> <name>.pdf
//! Any other PDF is accepted and its account is detected from the content
//! later, on the server.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

use crate::account::{self, Account, AccountKind};
use crate::month::MonthKey;

/// Uploads larger than this are rejected before any network call.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

static STP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ec-(\d{18})-(\d{4})(0[1-9]|1[0-2])\.(?i:pdf|xlsx|xls)$").expect("valid STP regex")
});

static BBVA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})(0[1-9]|1[0-2])\s+(.+?)\.(?i:pdf)$").expect("valid BBVA regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Xlsx,
    Xls,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "xlsx" => Some(FileKind::Xlsx),
            "xls" => Some(FileKind::Xls),
            _ => None,
        }
    }

    pub fn from_filename(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Xlsx => "xlsx",
            FileKind::Xls => "xls",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            FileKind::Xls => "application/vnd.ms-excel",
        }
    }

    /// Spreadsheets land in the `xlsx` slot of a month record.
    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, FileKind::Xlsx | FileKind::Xls)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Stp {
        account_number: String,
        /// `None` when the number is well-formed but not in the registry.
        account: Option<&'static Account>,
        year: i32,
        month: u32,
        kind: FileKind,
    },
    Bbva {
        account: Option<&'static Account>,
        year: i32,
        month: u32,
        label: String,
    },
    /// A PDF with no recognisable name; the account comes from its content.
    AutoDetect,
}

impl Classification {
    pub fn account_kind(&self) -> AccountKind {
        match self {
            Classification::Stp { .. } => AccountKind::Stp,
            Classification::Bbva { .. } | Classification::AutoDetect => AccountKind::Bbva,
        }
    }

    pub fn account(&self) -> Option<&'static Account> {
        match self {
            Classification::Stp { account, .. } | Classification::Bbva { account, .. } => *account,
            Classification::AutoDetect => None,
        }
    }

    pub fn period(&self) -> Option<(i32, u32)> {
        match self {
            Classification::Stp { year, month, .. } | Classification::Bbva { year, month, .. } => {
                Some((*year, *month))
            }
            Classification::AutoDetect => None,
        }
    }

    /// Human readable one-liner for result lists.
    pub fn describe(&self) -> String {
        match self {
            Classification::Stp {
                account_number,
                account,
                year,
                month,
                kind,
            } => {
                let who = account
                    .map(|a| a.name.to_string())
                    .unwrap_or_else(|| format!("account {account_number}"));
                let ext = kind.extension().to_uppercase();
                format!("STP {ext} statement for {who}, {year}-{month:02}")
            }
            Classification::Bbva {
                account,
                year,
                month,
                label,
            } => {
                let who = account.map(|a| a.name).unwrap_or(label.as_str());
                format!("BBVA PDF statement for {who}, {year}-{month:02}")
            }
            Classification::AutoDetect => "PDF, account auto-detected from content".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("unsupported file type: {0}")]
    UnsupportedExtension(String),
    #[error("file too large: {size} bytes (max 50MB)")]
    TooLarge { size: u64 },
    #[error("filename does not match a known pattern (expected ec-<account>-YYYYMM.xlsx)")]
    PatternMismatch,
    #[error("unusable statement period: {0}")]
    InvalidPeriod(String),
}

fn period(year: &str, month: &str) -> Result<MonthKey, Rejection> {
    let invalid = || Rejection::InvalidPeriod(format!("{year}-{month}"));
    let year = year.parse().map_err(|_| invalid())?;
    let month = month.parse().map_err(|_| invalid())?;
    MonthKey::new(year, month).map_err(|e| Rejection::InvalidPeriod(e.to_string()))
}

/// Classify a filename by its naming scheme.
pub fn classify_name(filename: &str) -> Result<Classification, Rejection> {
    let name = filename.trim();

    let Some((_, ext)) = name.rsplit_once('.') else {
        return Err(Rejection::UnsupportedExtension("(none)".to_string()));
    };
    let Some(kind) = FileKind::from_extension(ext) else {
        return Err(Rejection::UnsupportedExtension(ext.to_ascii_lowercase()));
    };

    if let Some(caps) = STP_RE.captures(name) {
        let account_number = caps[1].to_string();
        let account = account::by_identifier(&account_number).filter(|a| a.is_stp());
        let key = period(&caps[2], &caps[3])?;
        return Ok(Classification::Stp {
            account_number,
            account,
            year: key.year(),
            month: key.month(),
            kind,
        });
    }

    if kind != FileKind::Pdf {
        return Err(Rejection::PatternMismatch);
    }

    if let Some(caps) = BBVA_RE.captures(name) {
        let key = period(&format!("20{}", &caps[1]), &caps[2])?;
        let account = account::by_filename(name).filter(|a| a.kind == AccountKind::Bbva);
        return Ok(Classification::Bbva {
            account,
            year: key.year(),
            month: key.month(),
            label: caps[3].trim().to_string(),
        });
    }

    Ok(Classification::AutoDetect)
}

/// Full local check for an upload candidate: size first, then the name.
pub fn validate_upload(filename: &str, size: u64) -> Result<Classification, Rejection> {
    if size > MAX_UPLOAD_BYTES {
        return Err(Rejection::TooLarge { size });
    }
    classify_name(filename)
}

#[derive(Debug, Clone, Serialize)]
pub struct FormatInfo {
    pub pattern: &'static str,
    pub example: &'static str,
    pub extensions: &'static [&'static str],
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportedFormats {
    pub stp: FormatInfo,
    pub bbva: FormatInfo,
}

pub fn supported_formats() -> SupportedFormats {
    SupportedFormats {
        stp: FormatInfo {
            pattern: "ec-[account]-YYYYMM.xlsx/pdf",
            example: "ec-646180559700000009-202501.xlsx",
            extensions: &["xlsx", "xls", "pdf"],
            description: "STP Excel statements and PDF exports",
        },
        bbva: FormatInfo {
            pattern: "YYMM [AccountName].pdf or any PDF for auto-detection",
            example: "2501 FSA BBVA MXN.pdf",
            extensions: &["pdf"],
            description: "BBVA PDF bank statements with auto-detection support",
        },
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stp_example() {
        let c = classify_name("ec-123456789012345678-202501.xlsx").unwrap();
        match c {
            Classification::Stp {
                account_number,
                account,
                year,
                month,
                kind,
            } => {
                assert_eq!(account_number, "123456789012345678");
                assert!(account.is_none());
                assert_eq!(year, 2025);
                assert_eq!(month, 1);
                assert_eq!(kind, FileKind::Xlsx);
            }
            other => panic!("expected STP, got {other:?}"),
        }
    }

    #[test]
    fn stp_known_account_resolves() {
        let c = classify_name("ec-646180559700000009-202412.pdf").unwrap();
        assert_eq!(c.account().unwrap().id, "stp_sa");
        assert_eq!(c.period(), Some((2024, 12)));
    }

    #[test]
    fn bbva_example() {
        let c = classify_name("2501 BBVA Account.pdf").unwrap();
        assert!(matches!(c, Classification::Bbva { year: 2025, month: 1, .. }));
        assert!(c.account().is_none());

        let c = classify_name("2502 FMX BBVA USD.pdf").unwrap();
        assert_eq!(c.account().unwrap().id, "bbva_mx_usd");
    }

    #[test]
    fn other_pdf_is_auto_detect() {
        assert_eq!(classify_name("estado de cuenta.pdf").unwrap(), Classification::AutoDetect);
        assert_eq!(classify_name("2513 bad month.pdf").unwrap(), Classification::AutoDetect);
    }

    #[test]
    fn unsupported_extensions() {
        let err = classify_name("random.docx").unwrap_err();
        assert_eq!(err, Rejection::UnsupportedExtension("docx".into()));
        assert!(err.to_string().starts_with("unsupported file type"));
        for name in ["notes.txt", "img.PNG", "archive.tar.gz", "noextension"] {
            assert!(matches!(
                classify_name(name),
                Err(Rejection::UnsupportedExtension(_))
            ));
        }
    }

    #[test]
    fn spreadsheet_must_follow_stp_scheme() {
        assert_eq!(classify_name("report.xlsx"), Err(Rejection::PatternMismatch));
        assert_eq!(
            classify_name("ec-646180559700000009-202513.xlsx"),
            Err(Rejection::PatternMismatch)
        );
    }

    #[test]
    fn size_limit_checked_before_name() {
        let too_big = 51 * 1024 * 1024;
        assert_eq!(
            validate_upload("ec-123456789012345678-202501.xlsx", too_big),
            Err(Rejection::TooLarge { size: too_big })
        );
        assert!(validate_upload("ec-123456789012345678-202501.xlsx", MAX_UPLOAD_BYTES).is_ok());
    }

    #[test]
    fn every_stp_match_is_valid() {
        for year in [1999, 2020, 2025] {
            for month in 1..=12 {
                for ext in ["pdf", "xlsx", "xls"] {
                    let name = format!("ec-000000000000000001-{year}{month:02}.{ext}");
                    let c = classify_name(&name).unwrap();
                    assert_eq!(c.period(), Some((year, month)));
                }
            }
        }
    }

    #[test]
    fn extensions_match_in_any_case() {
        let c = classify_name("ec-646180559700000009-202501.XLSX").unwrap();
        assert!(matches!(c, Classification::Stp { kind: FileKind::Xlsx, month: 1, .. }));
        assert_eq!(c.account().unwrap().id, "stp_sa");

        let c = classify_name("2501 FSA BBVA MXN.PDF").unwrap();
        assert!(matches!(c, Classification::Bbva { year: 2025, month: 1, .. }));
        assert_eq!(c.account().unwrap().id, "bbva_sa_mxn");
        assert!(classify_name("ec-646180559700000009-202501.Pdf").is_ok());
    }

    #[test]
    fn stp_year_outside_calendar_is_rejected() {
        let err = classify_name("ec-646180559700000009-000101.xlsx").unwrap_err();
        assert!(matches!(err, Rejection::InvalidPeriod(_)));
        assert!(err.to_string().contains("invalid year: 1"));
    }
}
