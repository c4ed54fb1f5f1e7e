//! Inventory model: which statement files exist for each account and month,
//! and whether they have been parsed.
//!
//! The inventory is one JSON document shared by every account:
//!
//! ```json
//! { "last_updated": "...", "version": "1.0",
//!   "accounts": { "stp_sa": { "2025-01": { "xlsx": { "exists": true, ... } } } } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::FileKind;
use crate::month::MonthKey;

pub const INVENTORY_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    #[default]
    NotParsed,
    Parsed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileInfo {
    pub exists: bool,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub parse_status: ParseStatus,
    #[serde(default)]
    pub transaction_count: u64,
    #[serde(default)]
    pub file_size: Option<u64>,
    /// Store id used for downloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

impl FileInfo {
    pub fn present(file_id: impl Into<String>) -> Self {
        Self {
            exists: true,
            file_id: Some(file_id.into()),
            ..Self::default()
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.transaction_count = count;
        self.parse_status = ParseStatus::Parsed;
        self
    }

    pub fn is_parsed(&self) -> bool {
        self.exists && self.parse_status == ParseStatus::Parsed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonthRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<FileInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xlsx: Option<FileInfo>,
}

impl MonthRecord {
    /// Present files only; entries with `exists: false` are ignored.
    pub fn pdf(&self) -> Option<&FileInfo> {
        self.pdf.as_ref().filter(|f| f.exists)
    }

    pub fn xlsx(&self) -> Option<&FileInfo> {
        self.xlsx.as_ref().filter(|f| f.exists)
    }

    pub fn file(&self, kind: FileKind) -> Option<&FileInfo> {
        if kind.is_spreadsheet() {
            self.xlsx()
        } else {
            self.pdf()
        }
    }

    pub fn set(&mut self, kind: FileKind, info: FileInfo) {
        if kind.is_spreadsheet() {
            self.xlsx = Some(info);
        } else {
            self.pdf = Some(info);
        }
    }

    pub fn file_count(&self) -> usize {
        usize::from(self.pdf().is_some()) + usize::from(self.xlsx().is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }

    pub fn any_parsed(&self) -> bool {
        self.pdf().is_some_and(FileInfo::is_parsed) || self.xlsx().is_some_and(FileInfo::is_parsed)
    }

    /// Newest `last_modified` of the present files (ISO strings sort lexically).
    pub fn last_modified(&self) -> Option<&str> {
        [self.pdf(), self.xlsx()]
            .into_iter()
            .flatten()
            .filter_map(|f| f.last_modified.as_deref())
            .max()
    }
}

pub type AccountInventory = BTreeMap<MonthKey, MonthRecord>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub last_updated: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountInventory>,
}

fn default_version() -> String {
    INVENTORY_VERSION.to_string()
}

impl Default for Inventory {
    fn default() -> Self {
        Self::empty()
    }
}

impl Inventory {
    pub fn empty() -> Self {
        Self {
            last_updated: Utc::now(),
            version: default_version(),
            accounts: BTreeMap::new(),
        }
    }

    pub fn account(&self, account_id: &str) -> Option<&AccountInventory> {
        self.accounts.get(account_id)
    }

    /// Months of `account_id` that fall in `year`.
    pub fn account_year(
        &self,
        account_id: &str,
        year: i32,
    ) -> impl Iterator<Item = (&MonthKey, &MonthRecord)> {
        self.accounts
            .get(account_id)
            .into_iter()
            .flat_map(|m| m.iter())
            .filter(move |(k, _)| k.year() == year)
    }

    pub fn month(&self, account_id: &str, key: MonthKey) -> Option<&MonthRecord> {
        self.accounts.get(account_id)?.get(&key)
    }

    pub fn set_file(&mut self, account_id: &str, key: MonthKey, kind: FileKind, info: FileInfo) {
        self.accounts
            .entry(account_id.to_string())
            .or_default()
            .entry(key)
            .or_default()
            .set(kind, info);
    }

    pub fn replace_account(&mut self, account_id: &str, months: AccountInventory) {
        self.accounts.insert(account_id.to_string(), months);
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
        if self.version.is_empty() {
            self.version = default_version();
        }
    }

    /// Total present files and parsed files, across all accounts.
    pub fn file_stats(&self) -> (usize, usize) {
        let mut found = 0;
        let mut parsed = 0;
        for month in self.accounts.values().flat_map(|m| m.values()) {
            for f in [month.pdf(), month.xlsx()].into_iter().flatten() {
                found += 1;
                if f.is_parsed() {
                    parsed += 1;
                }
            }
        }
        (found, parsed)
    }
}

/// Structural check of a raw inventory document, before it is deserialised.
/// Returns a list of human readable issues; empty means valid.
pub fn validate_structure(doc: &serde_json::Value) -> Vec<String> {
    let mut issues = Vec::new();

    for key in ["last_updated", "version", "accounts"] {
        if doc.get(key).is_none() {
            issues.push(format!("Missing required key: {key}"));
        }
    }

    let Some(accounts) = doc.get("accounts") else {
        return issues;
    };
    let Some(accounts) = accounts.as_object() else {
        issues.push("'accounts' must be a dictionary".to_string());
        return issues;
    };

    for (account_id, months) in accounts {
        let Some(months) = months.as_object() else {
            issues.push(format!("Account {account_id} data must be a dictionary"));
            continue;
        };
        for (month_key, files) in months {
            if month_key.parse::<MonthKey>().is_err() {
                issues.push(format!("Invalid month key {account_id}:{month_key}"));
            }
            let Some(files) = files.as_object() else {
                issues.push(format!("Month data {account_id}:{month_key} must be a dictionary"));
                continue;
            };
            for (file_type, data) in files {
                if file_type != "pdf" && file_type != "xlsx" {
                    issues.push(format!(
                        "Invalid file type {file_type} in {account_id}:{month_key}"
                    ));
                    continue;
                }
                let Some(data) = data.as_object() else {
                    issues.push(format!(
                        "File data must be dictionary: {account_id}:{month_key}:{file_type}"
                    ));
                    continue;
                };
                for field in ["exists", "parse_status", "transaction_count"] {
                    if !data.contains_key(field) {
                        issues.push(format!(
                            "Missing field {field} in {account_id}:{month_key}:{file_type}"
                        ));
                    }
                }
            }
        }
    }

    issues
}
