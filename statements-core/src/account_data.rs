//! Per-account, per-year view of the inventory, as served to the calendar.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::account::{Account, AccountKind};
use crate::inventory::{FileInfo, Inventory, MonthRecord};
use crate::month::MonthKey;
use crate::statement::StatementMonth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthStatus {
    Missing,
    /// Files on record, none parsed yet.
    Partial,
    /// At least one file parsed.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthView {
    pub month: u32,
    pub status: MonthStatus,
    #[serde(default)]
    pub pdf: Option<FileInfo>,
    #[serde(default)]
    pub xlsx: Option<FileInfo>,
    pub file_count: usize,
    #[serde(default)]
    pub transaction_count: u64,
}

impl MonthView {
    pub fn from_record(kind: AccountKind, key: MonthKey, record: &MonthRecord) -> Self {
        let status = if record.is_empty() {
            MonthStatus::Missing
        } else if record.any_parsed() {
            MonthStatus::Complete
        } else {
            MonthStatus::Partial
        };
        Self {
            month: key.month(),
            status,
            pdf: record.pdf().cloned(),
            xlsx: record.xlsx().cloned(),
            file_count: record.file_count(),
            transaction_count: StatementMonth::new(kind, record).transaction_count(),
        }
    }

    pub fn record(&self) -> MonthRecord {
        MonthRecord {
            pdf: self.pdf.clone(),
            xlsx: self.xlsx.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Loaded,
    NoInventory,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Inventory,
    Fallback,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AccountKind,
    pub name: String,
    pub identifier: String,
    pub currency: String,
    pub description: String,
    pub total_files: usize,
    pub total_transactions: u64,
    pub parsed_months: usize,
    pub months: BTreeMap<MonthKey, MonthView>,
    pub last_updated: Option<String>,
    pub has_transactions: bool,
    pub status: LoadStatus,
    pub data_source: DataSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccountData {
    fn blank(account: &Account, status: LoadStatus, source: DataSource) -> Self {
        Self {
            id: account.id.to_string(),
            kind: account.kind,
            name: account.name.to_string(),
            identifier: account.identifier.to_string(),
            currency: account.currency.to_string(),
            description: account.description.to_string(),
            total_files: 0,
            total_transactions: 0,
            parsed_months: 0,
            months: BTreeMap::new(),
            last_updated: None,
            has_transactions: false,
            status,
            data_source: source,
            error: None,
        }
    }

    /// Build the year view of `account` from the inventory.
    pub fn from_inventory(account: &Account, inventory: &Inventory, year: i32) -> Self {
        let mut data = Self::blank(account, LoadStatus::Loaded, DataSource::Inventory);

        for (key, record) in inventory.account_year(account.id, year) {
            if record.is_empty() {
                continue;
            }
            let view = MonthView::from_record(account.kind, *key, record);
            data.total_files += view.file_count;
            data.total_transactions += view.transaction_count;
            if view.status == MonthStatus::Complete {
                data.parsed_months += 1;
            }
            if let Some(ts) = record.last_modified() {
                if data.last_updated.as_deref().is_none_or(|cur| ts > cur) {
                    data.last_updated = Some(ts.to_string());
                }
            }
            data.months.insert(*key, view);
        }

        data.has_transactions = data.total_transactions > 0;
        data
    }

    /// Placeholder served when no inventory could be read.
    pub fn fallback(account: &Account, reason: &str) -> Self {
        let mut data = Self::blank(account, LoadStatus::NoInventory, DataSource::Fallback);
        data.error = Some(reason.to_string());
        data
    }

    pub fn failed(account: &Account, error: &str) -> Self {
        let mut data = Self::blank(account, LoadStatus::Error, DataSource::Error);
        data.error = Some(error.to_string());
        data
    }

    pub fn month(&self, key: MonthKey) -> Option<&MonthView> {
        self.months.get(&key)
    }
}

/// Compact calendar payload: which months have which file types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiMonth {
    pub month: u32,
    pub has_pdf: bool,
    pub has_xlsx: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiAccount {
    pub total_files: usize,
    pub months: Vec<UiMonth>,
}

pub type UiData = BTreeMap<String, UiAccount>;

/// Accounts without files are left out.
pub fn ui_data<'a>(accounts: impl IntoIterator<Item = &'a AccountData>) -> UiData {
    accounts
        .into_iter()
        .filter(|a| a.total_files > 0)
        .map(|a| {
            let months = a
                .months
                .values()
                .filter(|m| m.status != MonthStatus::Missing)
                .map(|m| UiMonth {
                    month: m.month,
                    has_pdf: m.pdf.is_some(),
                    has_xlsx: m.xlsx.is_some(),
                })
                .collect();
            (
                a.id.clone(),
                UiAccount {
                    total_files: a.total_files,
                    months,
                },
            )
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub total_accounts: usize,
    pub accounts_with_data: usize,
    pub total_files: usize,
    pub total_transactions: u64,
}

pub fn summarize<'a>(accounts: impl IntoIterator<Item = &'a AccountData>) -> SystemSummary {
    accounts
        .into_iter()
        .fold(SystemSummary::default(), |mut s, a| {
            s.total_accounts += 1;
            if a.total_files > 0 {
                s.accounts_with_data += 1;
            }
            s.total_files += a.total_files;
            s.total_transactions += a.total_transactions;
            s
        })
}
